//! Error reporting of the public add entry points.
//!
//! Caller mistakes surface as `InvalidArgument` / `UnsupportedDtype`,
//! device failures as `CapabilityQuery` or `Launch` with a non-zero status.

use std::sync::Arc;

use npu_kernels::{
    ops, status, DType, Device, KernelConfig, KernelError, NpuContext, NpuTensor, SimulatedNpu,
};

fn context(npu: SimulatedNpu) -> NpuContext {
    NpuContext::new(Arc::new(npu), KernelConfig::default()).unwrap()
}

fn npu(shape: &[usize], dtype: DType) -> NpuTensor {
    NpuTensor::zeros(shape, dtype, Device::Npu(0))
}

fn invalid_argument(err: KernelError) -> String {
    assert!(err.is_caller_error(), "{err:?}");
    match err {
        KernelError::InvalidArgument(msg) => msg,
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
}

#[test]
fn test_dtype_mismatch_reported_first() {
    let ctx = context(SimulatedNpu::new(4));
    let x = npu(&[8], DType::F32);
    // y differs in format, residency and length: format wins.
    let y = NpuTensor::zeros(&[9], DType::F16, Device::Cpu);
    let msg = invalid_argument(ops::add(&ctx, &x, &y).unwrap_err());
    assert!(msg.starts_with("x, y dtype must be same"), "{msg}");
}

#[test]
fn test_output_dtype_mismatch() {
    let ctx = context(SimulatedNpu::new(4));
    let x = npu(&[8], DType::BF16);
    let mut out = npu(&[8], DType::F16);
    let msg = invalid_argument(ops::add_out(&ctx, &mut out, &x, &x).unwrap_err());
    assert!(msg.starts_with("x, out dtype must be same"), "{msg}");
}

#[test]
fn test_host_resident_output() {
    let ctx = context(SimulatedNpu::new(4));
    let x = npu(&[8], DType::F32);
    let mut out = NpuTensor::zeros(&[8], DType::F32, Device::Cpu);
    let msg = invalid_argument(ops::add_out(&ctx, &mut out, &x, &x).unwrap_err());
    assert!(msg.starts_with("out must be on npu"), "{msg}");
}

#[test]
fn test_non_contiguous_input() {
    let ctx = context(SimulatedNpu::new(4));
    let x = npu(&[4, 6], DType::F32).transpose2d().unwrap();
    let y = npu(&[6, 4], DType::F32);
    let msg = invalid_argument(ops::add(&ctx, &x, &y).unwrap_err());
    assert!(msg.starts_with("x must be contiguous"), "{msg}");
}

#[test]
fn test_length_mismatch() {
    let ctx = context(SimulatedNpu::new(4));
    let x = npu(&[8], DType::F16);
    let y = npu(&[2, 5], DType::F16);
    let msg = invalid_argument(ops::add(&ctx, &x, &y).unwrap_err());
    assert!(msg.contains("numel must be same"), "{msg}");
}

#[test]
fn test_unsupported_format() {
    let ctx = context(SimulatedNpu::new(4));
    let x = NpuTensor::from_i32_vec(vec![1, 2, 3], &[3]).unwrap().to_device(Device::Npu(0));
    let err = ops::add(&ctx, &x, &x).unwrap_err();
    assert!(err.is_caller_error());
    assert!(matches!(err, KernelError::UnsupportedDtype(DType::I32)));
}

#[test]
fn test_capability_failure_is_retried() {
    let ctx = context(SimulatedNpu::builder().fail_capability_query("driver not ready").build());
    let x = npu(&[64], DType::F32);
    for _ in 0..2 {
        let err = ops::add(&ctx, &x, &x).unwrap_err();
        assert!(!err.is_caller_error());
        assert!(matches!(err, KernelError::CapabilityQuery(_)), "{err:?}");
    }
    assert_eq!(ctx.device().probe_calls(), 2);
    assert_eq!(ctx.stream().launches(), 0);
}

#[test]
fn test_core_fault_carries_status() {
    let ctx = context(SimulatedNpu::builder().vector_cores(8).fault_on_block(5).build());
    let x = npu(&[8 * 1024], DType::BF16);
    let err = ops::add(&ctx, &x, &x).unwrap_err();
    assert!(!err.is_caller_error());
    assert_eq!(err.status(), Some(status::CORE_FAULT));
    assert!(err.to_string().contains("npu_add_bf16"), "{err}");

    // The stream saw the same failure; a second synchronize is clean.
    let synced = ctx.stream().synchronize().unwrap_err();
    assert_eq!(synced.status(), Some(status::CORE_FAULT));
    assert!(ctx.stream().synchronize().is_ok());
}

#[test]
fn test_fault_on_idle_core_is_harmless() {
    // 1000 floats span two tiles, so only blocks 0 and 1 launch.
    let ctx = context(SimulatedNpu::builder().vector_cores(8).fault_on_block(3).build());
    let x = npu(&[1000], DType::F32);
    ops::add(&ctx, &x, &x).unwrap();
}

#[test]
fn test_invalid_config_rejected() {
    let npu = Arc::new(SimulatedNpu::new(4));
    let err = NpuContext::new(npu, KernelConfig::default().with_tile_size(100)).unwrap_err();
    assert!(matches!(err, KernelError::Config(_)));
}
