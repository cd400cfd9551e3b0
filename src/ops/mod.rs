//! Host-side elementwise ops.

pub mod add;

pub use add::{add, add_out};

use crate::context::NpuContext;
use crate::error::{KernelError, KernelResult};
use crate::launch::{kernel_name, launch_binary, LaunchReport};
use crate::tensor::NpuTensor;
use crate::tiling::plan_launch;
use crate::traits::{BinaryOp, Element};
use crate::types::DType;
use crate::validation::validate_binary_operands;

/// Bind `$T` to the element type of a kernel-supported `DType` and evaluate
/// `$body`; any other format yields `KernelError::UnsupportedDtype`.
macro_rules! dispatch_float {
    ($dtype:expr, $T:ident => $body:expr) => {
        match $dtype {
            DType::F32 => {
                type $T = f32;
                $body
            }
            DType::F16 => {
                type $T = half::f16;
                $body
            }
            DType::BF16 => {
                type $T = half::bf16;
                $body
            }
            other => Err(KernelError::UnsupportedDtype(other)),
        }
    };
}

/// Validate, plan and launch `out = Op(x, y)`.
///
/// Returns `Ok(None)` without touching the device when the tensors are empty.
pub fn elementwise_binary<Op: BinaryOp>(
    ctx: &NpuContext,
    out: &mut NpuTensor,
    x: &NpuTensor,
    y: &NpuTensor,
) -> KernelResult<Option<LaunchReport>> {
    let dtype = validate_binary_operands(out, x, y)?;
    let total = x.numel();
    if total == 0 {
        log::trace!("{}: empty {dtype} input, skipping launch", Op::NAME);
        return Ok(None);
    }
    let cores = ctx.vector_core_num()?;
    dispatch_float!(dtype, T => launch_typed::<T, Op>(ctx, out, x, y, total, cores).map(Some))
}

fn launch_typed<T: Element, Op: BinaryOp>(
    ctx: &NpuContext,
    out: &mut NpuTensor,
    x: &NpuTensor,
    y: &NpuTensor,
    total: usize,
    cores: u32,
) -> KernelResult<LaunchReport> {
    let plan = plan_launch(total, ctx.config().tile_size, cores, T::SIZE)?;
    let xs = x.as_slice::<T>()?;
    let ys = y.as_slice::<T>()?;
    let zs = out.as_mut_slice::<T>()?;
    launch_binary::<T, Op>(ctx.stream(), &plan, xs, ys, zs).map_err(|source| {
        KernelError::Launch {
            kernel: kernel_name::<T, Op>(),
            status: source.status,
            source,
        }
    })
}
