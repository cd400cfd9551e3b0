//! Compute paths selected per element format.
//!
//! `Native` is used for formats the vector unit operates on directly and is
//! zero-sized, so a native pipeline carries no extra scratch. `CastThroughF32`
//! owns two f32 calc buffers and computes widen -> op -> narrow (RNE).

use crate::error::DeviceError;
use crate::pipeline::pipe::{CalcBuffer, Pipe};
use crate::traits::{BinaryOp, Element, VectorArith};

/// How one tile of `z = op(x, y)` is computed for element format `T`.
pub trait ComputePath<T: Element>: Sized + Send {
    /// Whether inputs go through an intermediate format.
    const NEEDS_CAST: bool;

    /// Local memory this path needs on top of the tile queues.
    fn scratch_bytes(tile_len: usize) -> usize;

    fn init(pipe: &mut Pipe, tile_len: usize) -> Result<Self, DeviceError>;

    fn compute<Op: BinaryOp>(&mut self, z: &mut [T], x: &[T], y: &[T]) -> Result<(), DeviceError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Native;

impl<T: Element + VectorArith> ComputePath<T> for Native {
    const NEEDS_CAST: bool = false;

    fn scratch_bytes(_tile_len: usize) -> usize {
        0
    }

    fn init(_pipe: &mut Pipe, _tile_len: usize) -> Result<Self, DeviceError> {
        Ok(Native)
    }

    fn compute<Op: BinaryOp>(&mut self, z: &mut [T], x: &[T], y: &[T]) -> Result<(), DeviceError> {
        check_lengths(z.len(), x.len(), y.len())?;
        for ((out, &a), &b) in z.iter_mut().zip(x).zip(y) {
            *out = Op::apply(a, b);
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct CastThroughF32 {
    x_tmp: CalcBuffer<f32>,
    y_tmp: CalcBuffer<f32>,
}

impl<T: Element> ComputePath<T> for CastThroughF32 {
    const NEEDS_CAST: bool = true;

    fn scratch_bytes(tile_len: usize) -> usize {
        2 * tile_len * std::mem::size_of::<f32>()
    }

    fn init(pipe: &mut Pipe, tile_len: usize) -> Result<Self, DeviceError> {
        Ok(Self {
            x_tmp: pipe.init_buffer(tile_len)?,
            y_tmp: pipe.init_buffer(tile_len)?,
        })
    }

    fn compute<Op: BinaryOp>(&mut self, z: &mut [T], x: &[T], y: &[T]) -> Result<(), DeviceError> {
        let n = check_lengths(z.len(), x.len(), y.len())?;
        let x_tmp = self.x_tmp.get(n)?;
        let y_tmp = self.y_tmp.get(n)?;

        cast_to_f32(x_tmp, x)?;
        cast_to_f32(y_tmp, y)?;
        // Both operands stay on the vector unit; no transfer sync needed between casts.
        for (a, &b) in x_tmp.iter_mut().zip(y_tmp.iter()) {
            *a = Op::apply(*a, b);
        }
        cast_from_f32_rint(z, x_tmp)
    }
}

fn check_lengths(z: usize, x: usize, y: usize) -> Result<usize, DeviceError> {
    if x != z || y != z {
        return Err(DeviceError::Cast(format!(
            "operand lengths differ: z={z}, x={x}, y={y}"
        )));
    }
    Ok(z)
}

/// Exact widening cast.
pub fn cast_to_f32<T: Element>(dst: &mut [f32], src: &[T]) -> Result<(), DeviceError> {
    if dst.len() != src.len() {
        return Err(DeviceError::Cast(format!(
            "widen {} -> f32: {} elements into {}",
            T::DTYPE,
            src.len(),
            dst.len()
        )));
    }
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = s.to_f32();
    }
    Ok(())
}

/// Narrowing cast with round-to-nearest, ties to even.
pub fn cast_from_f32_rint<T: Element>(dst: &mut [T], src: &[f32]) -> Result<(), DeviceError> {
    if dst.len() != src.len() {
        return Err(DeviceError::Cast(format!(
            "narrow f32 -> {}: {} elements into {}",
            T::DTYPE,
            src.len(),
            dst.len()
        )));
    }
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = T::from_f32_rint(s);
    }
    Ok(())
}
