use std::fmt::Debug;

use half::{bf16, f16};

use crate::pipeline::compute::{CastThroughF32, ComputePath, Native};
use crate::tensor::Storage;
use crate::types::DType;

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for half::f16 {}
    impl Sealed for half::bf16 {}
}

/// Element formats the vector kernels are instantiated for.
///
/// Each format picks its compute path at compile time: formats the vector
/// unit can operate on use [`Native`] (a zero-sized type, no scratch), the
/// rest go through [`CastThroughF32`].
pub trait Element:
    sealed::Sealed + Debug + Copy + Default + PartialEq + Send + Sync + 'static
{
    const DTYPE: DType;
    const SIZE: usize = std::mem::size_of::<Self>();
    /// Suffix of the per-format kernel entry point (`npu_add_float`, ...).
    const KERNEL_SUFFIX: &'static str;

    type Compute: ComputePath<Self>;

    /// Exact widening to f32.
    fn to_f32(self) -> f32;
    /// Narrowing from f32, round-to-nearest-even.
    fn from_f32_rint(v: f32) -> Self;

    fn storage_ref(storage: &Storage) -> Option<&[Self]>;
    fn storage_mut(storage: &mut Storage) -> Option<&mut [Self]>;
    fn into_storage(data: Vec<Self>) -> Storage;
}

/// Arithmetic the vector unit executes natively.
///
/// Deliberately not implemented for `bf16`: the vector unit has no bf16
/// datapath, so a bf16 tile can only be computed after widening.
pub trait VectorArith: Copy + Send + Sync + 'static {
    fn vadd(self, rhs: Self) -> Self;
}

impl VectorArith for f32 {
    #[inline(always)]
    fn vadd(self, rhs: Self) -> Self {
        self + rhs
    }
}

impl VectorArith for f16 {
    #[inline(always)]
    fn vadd(self, rhs: Self) -> Self {
        self + rhs
    }
}

/// An elementwise binary operation, independent of element format.
pub trait BinaryOp: Send + Sync + 'static {
    const NAME: &'static str;

    fn apply<T: VectorArith>(lhs: T, rhs: T) -> T;
}

/// `out = x + y`
#[derive(Debug, Clone, Copy, Default)]
pub struct Add;

impl BinaryOp for Add {
    const NAME: &'static str = "add";

    #[inline(always)]
    fn apply<T: VectorArith>(lhs: T, rhs: T) -> T {
        lhs.vadd(rhs)
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;
    const KERNEL_SUFFIX: &'static str = "float";
    type Compute = Native;

    #[inline(always)]
    fn to_f32(self) -> f32 {
        self
    }
    #[inline(always)]
    fn from_f32_rint(v: f32) -> Self {
        v
    }

    fn storage_ref(storage: &Storage) -> Option<&[Self]> {
        match storage {
            Storage::F32(v) => Some(v),
            _ => None,
        }
    }
    fn storage_mut(storage: &mut Storage) -> Option<&mut [Self]> {
        match storage {
            Storage::F32(v) => Some(v),
            _ => None,
        }
    }
    fn into_storage(data: Vec<Self>) -> Storage {
        Storage::F32(data)
    }
}

impl Element for f16 {
    const DTYPE: DType = DType::F16;
    const KERNEL_SUFFIX: &'static str = "half";
    type Compute = Native;

    #[inline(always)]
    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }
    #[inline(always)]
    fn from_f32_rint(v: f32) -> Self {
        f16::from_f32(v)
    }

    fn storage_ref(storage: &Storage) -> Option<&[Self]> {
        match storage {
            Storage::F16(v) => Some(v),
            _ => None,
        }
    }
    fn storage_mut(storage: &mut Storage) -> Option<&mut [Self]> {
        match storage {
            Storage::F16(v) => Some(v),
            _ => None,
        }
    }
    fn into_storage(data: Vec<Self>) -> Storage {
        Storage::F16(data)
    }
}

impl Element for bf16 {
    const DTYPE: DType = DType::BF16;
    const KERNEL_SUFFIX: &'static str = "bf16";
    type Compute = CastThroughF32;

    #[inline(always)]
    fn to_f32(self) -> f32 {
        bf16::to_f32(self)
    }
    #[inline(always)]
    fn from_f32_rint(v: f32) -> Self {
        bf16::from_f32(v)
    }

    fn storage_ref(storage: &Storage) -> Option<&[Self]> {
        match storage {
            Storage::BF16(v) => Some(v),
            _ => None,
        }
    }
    fn storage_mut(storage: &mut Storage) -> Option<&mut [Self]> {
        match storage {
            Storage::BF16(v) => Some(v),
            _ => None,
        }
    }
    fn into_storage(data: Vec<Self>) -> Storage {
        Storage::BF16(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_sizes_match_dtype() {
        assert_eq!(<f32 as Element>::SIZE, DType::F32.size_bytes());
        assert_eq!(<f16 as Element>::SIZE, DType::F16.size_bytes());
        assert_eq!(<bf16 as Element>::SIZE, DType::BF16.size_bytes());
    }

    #[test]
    fn test_add_applies_natively() {
        assert_eq!(Add::apply(1.5f32, 2.25), 3.75);
        let h = Add::apply(f16::from_f32(1.0), f16::from_f32(-1.0));
        assert_eq!(h.to_f32(), 0.0);
    }

    #[test]
    fn test_storage_downcast_rejects_other_formats() {
        let s = f32::into_storage(vec![1.0, 2.0]);
        assert!(f32::storage_ref(&s).is_some());
        assert!(f16::storage_ref(&s).is_none());
        assert!(bf16::storage_ref(&s).is_none());
    }
}
