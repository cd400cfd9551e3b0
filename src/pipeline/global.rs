//! Typed views over global memory and the transfers between global and local memory.

use crate::error::DeviceError;
use crate::pipeline::pipe::{LocalTensor, Pipe, QuePosition};
use crate::traits::Element;
use crate::types::DType;

/// Read-only view of a core's slice of a global-memory array.
#[derive(Debug, Clone, Copy)]
pub struct GlobalTensor<'a, T: Element> {
    data: &'a [T],
}

impl<'a, T: Element> GlobalTensor<'a, T> {
    /// Bind the view to `len` elements starting at `offset` of `base`.
    pub fn bind(base: &'a [T], offset: usize, len: usize) -> Result<Self, DeviceError> {
        let data = checked_range(base.len(), offset, len).map(|r| &base[r])?;
        Ok(Self { data })
    }

    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn tile(&self, offset: usize, len: usize) -> Result<&'a [T], DeviceError> {
        checked_range(self.data.len(), offset, len).map(|r| &self.data[r])
    }
}

/// Writable view of a core's slice of a global-memory array.
#[derive(Debug)]
pub struct GlobalTensorMut<'a, T: Element> {
    data: &'a mut [T],
}

impl<'a, T: Element> GlobalTensorMut<'a, T> {
    /// Bind the view to a block already split off the output array.
    ///
    /// The block must have exactly the length the core was assigned.
    pub fn bind(block: &'a mut [T], len: usize) -> Result<Self, DeviceError> {
        if block.len() != len {
            return Err(DeviceError::TransferOutOfBounds {
                offset: 0,
                len,
                bound: block.len(),
            });
        }
        Ok(Self { data: block })
    }

    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn tile_mut(&mut self, offset: usize, len: usize) -> Result<&mut [T], DeviceError> {
        let range = checked_range(self.data.len(), offset, len)?;
        Ok(&mut self.data[range])
    }
}

fn checked_range(
    bound: usize,
    offset: usize,
    len: usize,
) -> Result<std::ops::Range<usize>, DeviceError> {
    match offset.checked_add(len) {
        Some(end) if end <= bound => Ok(offset..end),
        _ => Err(DeviceError::TransferOutOfBounds { offset, len, bound }),
    }
}

/// Global -> local transfer of `n` elements starting at `offset`.
pub fn copy_gm_to_local<T: Element>(
    pipe: &mut Pipe,
    dst: &mut LocalTensor<T>,
    src: &GlobalTensor<'_, T>,
    offset: usize,
    n: usize,
) -> Result<(), DeviceError> {
    let src = src.tile(offset, n)?;
    dst.set_len(n)?;
    dst.as_mut_slice().copy_from_slice(src);
    pipe.issue(QuePosition::VecIn);
    Ok(())
}

/// Local -> global transfer of the tile's valid elements to `offset`.
pub fn copy_local_to_gm<T: Element>(
    pipe: &mut Pipe,
    dst: &mut GlobalTensorMut<'_, T>,
    src: &LocalTensor<T>,
    offset: usize,
) -> Result<(), DeviceError> {
    let dst = dst.tile_mut(offset, src.len())?;
    dst.copy_from_slice(src.as_slice());
    pipe.issue(QuePosition::VecOut);
    Ok(())
}
