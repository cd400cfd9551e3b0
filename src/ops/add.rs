use crate::context::NpuContext;
use crate::error::KernelResult;
use crate::tensor::NpuTensor;
use crate::traits::Add;

use super::elementwise_binary;

/// `out = x + y` elementwise.
///
/// All three tensors must share one supported format, live on the device,
/// be contiguous and hold the same number of elements. Empty tensors are a
/// no-op.
pub fn add_out(
    ctx: &NpuContext,
    out: &mut NpuTensor,
    x: &NpuTensor,
    y: &NpuTensor,
) -> KernelResult<()> {
    elementwise_binary::<Add>(ctx, out, x, y).map(|_| ())
}

/// `x + y` into a new tensor shaped like `x`.
pub fn add(ctx: &NpuContext, x: &NpuTensor, y: &NpuTensor) -> KernelResult<NpuTensor> {
    let mut out = NpuTensor::empty_like(x);
    add_out(ctx, &mut out, x, y)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use half::{bf16, f16};

    use super::*;
    use crate::config::KernelConfig;
    use crate::device::SimulatedNpu;
    use crate::error::{status, KernelError};
    use crate::types::{DType, Device};

    fn ctx(cores: u32) -> NpuContext {
        NpuContext::new(Arc::new(SimulatedNpu::new(cores)), KernelConfig::default()).unwrap()
    }

    fn on_npu(t: NpuTensor) -> NpuTensor {
        t.to_device(Device::Npu(0))
    }

    #[test]
    fn test_add_float() {
        let ctx = ctx(4);
        let x = on_npu(NpuTensor::from_vec((0..2000).map(|i| i as f32).collect(), &[2000]).unwrap());
        let y = on_npu(NpuTensor::from_vec(vec![0.5f32; 2000], &[2000]).unwrap());
        let z = add(&ctx, &x, &y).unwrap();
        assert_eq!(z.device(), Device::Npu(0));
        let got = z.as_slice::<f32>().unwrap();
        assert!(got.iter().enumerate().all(|(i, &v)| v == i as f32 + 0.5));
    }

    #[test]
    fn test_add_half_cancels() {
        let ctx = ctx(4);
        let x = on_npu(NpuTensor::from_vec(vec![f16::ONE; 1000], &[1000]).unwrap());
        let y = on_npu(NpuTensor::from_vec(vec![f16::NEG_ONE; 1000], &[1000]).unwrap());
        let z = add(&ctx, &x, &y).unwrap();
        assert!(z.as_slice::<f16>().unwrap().iter().all(|v| v.to_f32() == 0.0));
    }

    #[test]
    fn test_add_bf16_report() {
        let ctx = ctx(4);
        let x = on_npu(NpuTensor::from_vec(vec![bf16::from_f32(1.5); 4096], &[64, 64]).unwrap());
        let y = on_npu(NpuTensor::from_vec(vec![bf16::from_f32(2.5); 4096], &[64, 64]).unwrap());
        let mut z = NpuTensor::empty_like(&x);
        let report = elementwise_binary::<Add>(&ctx, &mut z, &x, &y).unwrap().unwrap();
        assert_eq!(report.kernel, "npu_add_bf16");
        assert_eq!(report.num_blocks, 4);
        assert_eq!(report.total_stats().steps, 8);
        assert!(z.to_vec_f32().iter().all(|&v| v == 4.0));
    }

    #[test]
    fn test_empty_is_noop() {
        let ctx = ctx(4);
        let x = NpuTensor::zeros(&[0], DType::F32, Device::Npu(0));
        let mut z = NpuTensor::empty_like(&x);
        assert!(elementwise_binary::<Add>(&ctx, &mut z, &x, &x).unwrap().is_none());
        assert_eq!(ctx.device().probe_calls(), 0);
        assert_eq!(ctx.stream().launches(), 0);
    }

    #[test]
    fn test_host_tensors_rejected() {
        let ctx = ctx(4);
        let x = NpuTensor::zeros(&[8], DType::F32, Device::Cpu);
        let err = add(&ctx, &x, &x).unwrap_err();
        assert!(err.to_string().contains("x must be on npu"));
    }

    #[test]
    fn test_device_failure_surfaces_status() {
        let npu = Arc::new(SimulatedNpu::builder().vector_cores(4).fault_on_block(3).build());
        let ctx = NpuContext::new(npu, KernelConfig::default()).unwrap();
        let x = NpuTensor::zeros(&[4096], DType::F16, Device::Npu(0));
        let err = add(&ctx, &x, &x).unwrap_err();
        match &err {
            KernelError::Launch { kernel, status: code, .. } => {
                assert_eq!(kernel, "npu_add_half");
                assert_eq!(*code, status::CORE_FAULT);
            }
            other => panic!("expected launch error, got {other:?}"),
        }
        assert!(ctx.stream().synchronize().is_err());
    }
}
