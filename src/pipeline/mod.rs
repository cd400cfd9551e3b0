//! Per-core pipelined execution of an elementwise binary op.
//!
//! One `BinaryPipeline` runs on each launched vector core:
//!
//! ```text
//! Init:      pick block length, bind x/y/z at block offset, carve queues
//! Streaming: copy_in(0); for k { copy_in(k+1); compute(k); copy_out(k) }
//! Done:      drain transfers, scratch dropped with the pipeline
//! ```
//!
//! Queues have depth [`BUFFER_NUM`], which is what lets `copy_in(k+1)` fill
//! a second tile while step `k` is still queued for compute.

pub mod compute;
pub mod global;
pub mod pipe;

use std::marker::PhantomData;

use crate::error::DeviceError;
use crate::tiling::{AddTiling, BLOCK_ALIGN_BYTES};
use crate::traits::{BinaryOp, Element};
use crate::types::DType;

use self::compute::ComputePath;
use self::global::{copy_gm_to_local, copy_local_to_gm, GlobalTensor, GlobalTensorMut};
pub use self::pipe::{PipeStats, Stage, TraceEvent, BUFFER_NUM};
use self::pipe::{Pipe, QuePosition, TileQueue};

/// Execution context of one core, provided by the launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreContext {
    pub block_idx: u32,
    pub block_num: u32,
}

impl CoreContext {
    pub fn is_last_block(&self) -> bool {
        self.block_idx + 1 == self.block_num
    }
}

/// What one core did.
#[derive(Debug, Clone)]
pub struct CoreReport {
    pub block_idx: u32,
    pub elements: usize,
    pub stats: PipeStats,
    pub trace: Vec<TraceEvent>,
}

/// Local memory a pipeline for `dtype` needs with the given tile size.
pub fn local_memory_footprint(dtype: DType, tile_size: usize) -> usize {
    let queues = 3 * BUFFER_NUM * tile_size * dtype.size_bytes();
    let scratch = match dtype {
        DType::F32 => <<f32 as Element>::Compute as ComputePath<f32>>::scratch_bytes(tile_size),
        DType::F16 => {
            <<half::f16 as Element>::Compute as ComputePath<half::f16>>::scratch_bytes(tile_size)
        }
        DType::BF16 => {
            <<half::bf16 as Element>::Compute as ComputePath<half::bf16>>::scratch_bytes(tile_size)
        }
        DType::I32 => 0,
    };
    queues + scratch
}

pub struct BinaryPipeline<'a, T: Element, Op: BinaryOp> {
    ctx: CoreContext,
    tile_size: usize,
    block_len: usize,
    x_gm: GlobalTensor<'a, T>,
    y_gm: GlobalTensor<'a, T>,
    z_gm: GlobalTensorMut<'a, T>,
    pipe: Pipe,
    x_q: TileQueue<T>,
    y_q: TileQueue<T>,
    z_q: TileQueue<T>,
    compute: T::Compute,
    _op: PhantomData<Op>,
}

impl<'a, T: Element, Op: BinaryOp> BinaryPipeline<'a, T, Op> {
    /// Init state: bind views and carve local memory.
    ///
    /// `x` and `y` are the full input arrays; `z_block` is this core's
    /// already split-off output block.
    pub fn new(
        ctx: CoreContext,
        tiling: &AddTiling,
        x: &'a [T],
        y: &'a [T],
        z_block: &'a mut [T],
        local_memory_bytes: usize,
        trace: bool,
    ) -> Result<Self, DeviceError> {
        if ctx.block_idx >= ctx.block_num {
            return Err(DeviceError::InvalidArguments(format!(
                "block {} of {}",
                ctx.block_idx, ctx.block_num
            )));
        }
        let tile_size = tiling.tile_size as usize;
        if tile_size == 0 {
            return Err(DeviceError::InvalidArguments("tile size is zero".into()));
        }
        let block_len = if ctx.is_last_block() {
            tiling.last_block_size as usize
        } else {
            tiling.block_size as usize
        };

        let offset = ctx.block_idx as usize * tiling.block_size as usize;
        let offset_bytes = offset * T::SIZE;
        if offset_bytes % BLOCK_ALIGN_BYTES != 0 {
            return Err(DeviceError::MisalignedBlock {
                block_idx: ctx.block_idx,
                offset_bytes,
                align: BLOCK_ALIGN_BYTES,
            });
        }

        let x_gm = GlobalTensor::bind(x, offset, block_len)?;
        let y_gm = GlobalTensor::bind(y, offset, block_len)?;
        let z_gm = GlobalTensorMut::bind(z_block, block_len)?;

        let mut pipe = Pipe::new(local_memory_bytes, trace);
        let x_q = pipe.init_queue("x", QuePosition::VecIn, BUFFER_NUM, tile_size)?;
        let y_q = pipe.init_queue("y", QuePosition::VecIn, BUFFER_NUM, tile_size)?;
        let z_q = pipe.init_queue("z", QuePosition::VecOut, BUFFER_NUM, tile_size)?;
        let compute = <T::Compute as ComputePath<T>>::init(&mut pipe, tile_size)?;

        Ok(Self {
            ctx,
            tile_size,
            block_len,
            x_gm,
            y_gm,
            z_gm,
            pipe,
            x_q,
            y_q,
            z_q,
            compute,
            _op: PhantomData,
        })
    }

    pub fn num_steps(&self) -> usize {
        self.block_len.div_ceil(self.tile_size)
    }

    /// Elements processed by `step`; only the final step may be short.
    pub fn step_len(&self, step: usize) -> usize {
        let num_steps = self.num_steps();
        if step + 1 < num_steps {
            self.tile_size
        } else {
            self.block_len - (num_steps - 1) * self.tile_size
        }
    }

    /// Streaming and Done states.
    pub fn run(mut self) -> Result<CoreReport, DeviceError> {
        let num_steps = self.num_steps();
        if num_steps > 0 {
            self.copy_in(0)?;
            for step in 0..num_steps {
                if step + 1 < num_steps {
                    self.copy_in(step + 1)?;
                }
                self.compute(step)?;
                self.copy_out(step)?;
            }
        }
        self.pipe.drain();

        let stats = self.pipe.stats();
        log::trace!(
            "block {}/{}: {} elements in {} steps, {} barriers",
            self.ctx.block_idx,
            self.ctx.block_num,
            self.block_len,
            stats.steps,
            stats.barriers
        );
        Ok(CoreReport {
            block_idx: self.ctx.block_idx,
            elements: self.block_len,
            stats,
            trace: self.pipe.take_trace(),
        })
    }

    fn copy_in(&mut self, step: usize) -> Result<(), DeviceError> {
        let n = self.step_len(step);
        let offset = step * self.tile_size;

        // Issue both transfers before enqueueing either: the first enqueue
        // waits on all outstanding copy-ins, so x and y share one barrier.
        let mut x = self.x_q.alloc()?;
        let mut y = self.y_q.alloc()?;
        copy_gm_to_local(&mut self.pipe, &mut x, &self.x_gm, offset, n)?;
        copy_gm_to_local(&mut self.pipe, &mut y, &self.y_gm, offset, n)?;
        self.x_q.enqueue(&mut self.pipe, x);
        self.y_q.enqueue(&mut self.pipe, y);

        self.pipe.record(step as u32, Stage::CopyIn);
        Ok(())
    }

    fn compute(&mut self, step: usize) -> Result<(), DeviceError> {
        let n = self.step_len(step);
        let x = self.x_q.dequeue()?;
        let y = self.y_q.dequeue()?;
        let mut z = self.z_q.alloc()?;
        z.set_len(n)?;

        self.compute
            .compute::<Op>(z.as_mut_slice(), x.as_slice(), y.as_slice())?;

        self.x_q.free(&mut self.pipe, x);
        self.y_q.free(&mut self.pipe, y);
        self.z_q.enqueue(&mut self.pipe, z);

        self.pipe.record(step as u32, Stage::Compute);
        Ok(())
    }

    fn copy_out(&mut self, step: usize) -> Result<(), DeviceError> {
        let z = self.z_q.dequeue()?;
        copy_local_to_gm(&mut self.pipe, &mut self.z_gm, &z, step * self.tile_size)?;
        self.z_q.free(&mut self.pipe, z);

        self.pipe.record(step as u32, Stage::CopyOut);
        Ok(())
    }
}
