//! Precondition checks for host-side elementwise ops.
//!
//! Checks run in a fixed order so the reported error is deterministic when
//! several preconditions fail at once: element format, residency,
//! contiguity, element count, then kernel support for the format.

use crate::error::{KernelError, KernelResult};
use crate::tensor::NpuTensor;
use crate::types::DType;

#[inline]
fn invalid(msg: impl Into<String>) -> KernelError {
    KernelError::InvalidArgument(msg.into())
}

/// Validate `out = op(x, y)` operands and return their common format.
pub fn validate_binary_operands(
    out: &NpuTensor,
    x: &NpuTensor,
    y: &NpuTensor,
) -> KernelResult<DType> {
    if x.dtype() != y.dtype() {
        return Err(invalid(format!(
            "x, y dtype must be same (x: {}, y: {})",
            x.dtype(),
            y.dtype()
        )));
    }
    if out.dtype() != x.dtype() {
        return Err(invalid(format!(
            "x, out dtype must be same (x: {}, out: {})",
            x.dtype(),
            out.dtype()
        )));
    }

    for (name, t) in [("x", x), ("y", y), ("out", out)] {
        if !t.device().is_npu() {
            return Err(invalid(format!("{name} must be on npu, got {}", t.device())));
        }
    }
    for (name, t) in [("x", x), ("y", y), ("out", out)] {
        if !t.is_contiguous() {
            return Err(invalid(format!(
                "{name} must be contiguous (shape {:?}, strides {:?})",
                t.shape(),
                t.strides()
            )));
        }
    }

    if x.numel() != y.numel() || out.numel() != x.numel() {
        return Err(invalid(format!(
            "x, y, out numel must be same (x: {}, y: {}, out: {})",
            x.numel(),
            y.numel(),
            out.numel()
        )));
    }

    let dtype = x.dtype();
    if !dtype.is_kernel_supported() {
        return Err(KernelError::UnsupportedDtype(dtype));
    }
    Ok(dtype)
}
