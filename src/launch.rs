//! Launch of a binary elementwise kernel across vector cores.

use rayon::prelude::*;

use crate::error::{DeviceError, LaunchError};
use crate::device::Stream;
use crate::pipeline::{BinaryPipeline, CoreContext, CoreReport, PipeStats};
use crate::tiling::LaunchPlan;
use crate::traits::{BinaryOp, Element};

/// Entry point name of the kernel instantiated for `T` and `Op`, e.g. `npu_add_bf16`.
pub fn kernel_name<T: Element, Op: BinaryOp>() -> String {
    format!("npu_{}_{}", Op::NAME, T::KERNEL_SUFFIX)
}

#[derive(Debug, Clone)]
pub struct LaunchReport {
    pub kernel: String,
    pub num_blocks: u32,
    /// Per-core reports, ordered by block index.
    pub cores: Vec<CoreReport>,
}

impl LaunchReport {
    pub fn total_stats(&self) -> PipeStats {
        let mut total = PipeStats::default();
        for core in &self.cores {
            total.merge(&core.stats);
        }
        total
    }
}

/// Run `z = Op(x, y)` with one pipeline per planned block.
///
/// Each core gets a disjoint output block split off `z`; inputs are shared
/// read-only. Any failing core fails the whole launch with that core's
/// status (the lowest failing block when several fail). The outcome is
/// also recorded on `stream`.
pub fn launch_binary<T: Element, Op: BinaryOp>(
    stream: &Stream,
    plan: &LaunchPlan,
    x: &[T],
    y: &[T],
    z: &mut [T],
) -> Result<LaunchReport, LaunchError> {
    let result = run_blocks::<T, Op>(stream, plan, x, y, z);
    stream.record(result.as_ref().map(|_| ()));
    result
}

fn run_blocks<T: Element, Op: BinaryOp>(
    stream: &Stream,
    plan: &LaunchPlan,
    x: &[T],
    y: &[T],
    z: &mut [T],
) -> Result<LaunchReport, LaunchError> {
    let kernel = kernel_name::<T, Op>();
    let device = stream.device();

    if plan.num_blocks == 0 || plan.num_blocks > device.vector_cores() {
        log::warn!(
            "{kernel}: rejecting launch of {} blocks on {} vector cores",
            plan.num_blocks,
            device.vector_cores()
        );
        return Err(LaunchError::rejected(DeviceError::InvalidBlockDim {
            requested: plan.num_blocks,
            available: device.vector_cores(),
        }));
    }
    let total = plan.total_elements();
    if x.len() != total || y.len() != total || z.len() != total {
        return Err(LaunchError::rejected(DeviceError::InvalidArguments(format!(
            "plan covers {total} elements, got x={}, y={}, z={}",
            x.len(),
            y.len(),
            z.len()
        ))));
    }

    let mut blocks: Vec<&mut [T]> = Vec::with_capacity(plan.num_blocks as usize);
    let mut rest = z;
    for block_idx in 0..plan.num_blocks {
        let (block, tail) = std::mem::take(&mut rest).split_at_mut(plan.block_len(block_idx));
        blocks.push(block);
        rest = tail;
    }

    log::debug!(
        "{kernel}: launching {} blocks, tiling {:?}, stream {}",
        plan.num_blocks,
        plan.tiling,
        stream.id()
    );

    let local_memory = device.local_memory_bytes();
    let trace = stream.tracing();
    let results: Vec<Result<CoreReport, LaunchError>> = blocks
        .into_par_iter()
        .enumerate()
        .map(|(idx, block)| {
            let block_idx = idx as u32;
            let ctx = CoreContext {
                block_idx,
                block_num: plan.num_blocks,
            };
            device
                .check_core(block_idx)
                .and_then(move |()| {
                    BinaryPipeline::<T, Op>::new(ctx, &plan.tiling, x, y, block, local_memory, trace)
                })
                .and_then(BinaryPipeline::<T, Op>::run)
                .map_err(|err| {
                    log::error!("{kernel}: block {block_idx} failed: {err}");
                    LaunchError::on_block(block_idx, err)
                })
        })
        .collect();

    let cores = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    Ok(LaunchReport {
        kernel,
        num_blocks: plan.num_blocks,
        cores,
    })
}
