//! Host-side tensors handed to the elementwise ops.
//!
//! An `NpuTensor` owns its elements and records where they live. Moving a
//! tensor to `Device::Npu` only retags the residency: the simulated device
//! shares host memory.

use half::{bf16, f16};

use crate::error::{KernelError, KernelResult};
use crate::traits::Element;
use crate::types::{DType, Device};

/// Typed element storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    F32(Vec<f32>),
    F16(Vec<f16>),
    BF16(Vec<bf16>),
    I32(Vec<i32>),
}

impl Storage {
    pub fn dtype(&self) -> DType {
        match self {
            Self::F32(_) => DType::F32,
            Self::F16(_) => DType::F16,
            Self::BF16(_) => DType::BF16,
            Self::I32(_) => DType::I32,
        }
    }

    fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::F32 => Self::F32(vec![0.0; len]),
            DType::F16 => Self::F16(vec![f16::ZERO; len]),
            DType::BF16 => Self::BF16(vec![bf16::ZERO; len]),
            DType::I32 => Self::I32(vec![0; len]),
        }
    }

    fn get_f32(&self, idx: usize) -> f32 {
        match self {
            Self::F32(v) => v[idx],
            Self::F16(v) => v[idx].to_f32(),
            Self::BF16(v) => v[idx].to_f32(),
            Self::I32(v) => v[idx] as f32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NpuTensor {
    storage: Storage,
    shape: Vec<usize>,
    /// Element strides, one per dimension.
    strides: Vec<usize>,
    device: Device,
}

fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

fn check_len(len: usize, shape: &[usize]) -> KernelResult<()> {
    let numel: usize = shape.iter().product();
    if len != numel {
        return Err(KernelError::InvalidArgument(format!(
            "{len} elements do not fill shape {shape:?} ({numel} elements)"
        )));
    }
    Ok(())
}

impl NpuTensor {
    /// Contiguous host tensor over `data`.
    pub fn from_vec<T: Element>(data: Vec<T>, shape: &[usize]) -> KernelResult<Self> {
        check_len(data.len(), shape)?;
        Ok(Self::contiguous(T::into_storage(data), shape, Device::Cpu))
    }

    pub fn from_i32_vec(data: Vec<i32>, shape: &[usize]) -> KernelResult<Self> {
        check_len(data.len(), shape)?;
        Ok(Self::contiguous(Storage::I32(data), shape, Device::Cpu))
    }

    pub fn zeros(shape: &[usize], dtype: DType, device: Device) -> Self {
        let numel = shape.iter().product();
        Self::contiguous(Storage::zeros(dtype, numel), shape, device)
    }

    /// Zero-filled contiguous tensor with the shape, format and residency of `other`.
    pub fn empty_like(other: &Self) -> Self {
        Self::zeros(&other.shape, other.dtype(), other.device)
    }

    fn contiguous(storage: Storage, shape: &[usize], device: Device) -> Self {
        Self {
            storage,
            strides: row_major_strides(shape),
            shape: shape.to_vec(),
            device,
        }
    }

    pub fn to_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn to_cpu(self) -> Self {
        self.to_device(Device::Cpu)
    }

    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Row-major dense layout. Size-1 dimensions are ignored.
    pub fn is_contiguous(&self) -> bool {
        let mut expected = 1;
        for (&dim, &stride) in self.shape.iter().zip(&self.strides).rev() {
            if dim == 1 {
                continue;
            }
            if stride != expected {
                return false;
            }
            expected *= dim;
        }
        true
    }

    /// Backing elements in storage order, if the tensor holds `T`.
    pub fn as_slice<T: Element>(&self) -> KernelResult<&[T]> {
        let dtype = self.dtype();
        T::storage_ref(&self.storage).ok_or_else(|| {
            KernelError::InvalidArgument(format!(
                "tensor holds {dtype}, requested {}",
                T::DTYPE
            ))
        })
    }

    pub fn as_mut_slice<T: Element>(&mut self) -> KernelResult<&mut [T]> {
        let dtype = self.dtype();
        T::storage_mut(&mut self.storage).ok_or_else(|| {
            KernelError::InvalidArgument(format!(
                "tensor holds {dtype}, requested {}",
                T::DTYPE
            ))
        })
    }

    /// Transposed view of a 2-D tensor, sharing no layout with a dense tensor.
    pub fn transpose2d(&self) -> KernelResult<Self> {
        if self.shape.len() != 2 {
            return Err(KernelError::InvalidArgument(format!(
                "transpose2d needs a 2-D tensor, got shape {:?}",
                self.shape
            )));
        }
        Ok(Self {
            storage: self.storage.clone(),
            shape: vec![self.shape[1], self.shape[0]],
            strides: vec![self.strides[1], self.strides[0]],
            device: self.device,
        })
    }

    /// Elements widened to f32, in logical (row-major) order.
    pub fn to_vec_f32(&self) -> Vec<f32> {
        let numel = self.numel();
        let mut out = Vec::with_capacity(numel);
        let mut index = vec![0usize; self.shape.len()];
        for _ in 0..numel {
            let offset: usize = index.iter().zip(&self.strides).map(|(i, s)| i * s).sum();
            out.push(self.storage.get_f32(offset));
            for d in (0..index.len()).rev() {
                index[d] += 1;
                if index[d] < self.shape[d] {
                    break;
                }
                index[d] = 0;
            }
        }
        out
    }
}
