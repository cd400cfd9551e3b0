//! Element formats and device residency.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Element format of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    /// IEEE single precision.
    F32,
    /// IEEE half precision.
    F16,
    /// Brain float: f32 exponent range with an 8-bit significand.
    BF16,
    /// 32-bit signed integer. Not supported by the vector kernels.
    I32,
}

impl DType {
    pub const fn size_bytes(self) -> usize {
        match self {
            Self::F32 | Self::I32 => 4,
            Self::F16 | Self::BF16 => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::F32 => "float32",
            Self::F16 => "float16",
            Self::BF16 => "bfloat16",
            Self::I32 => "int32",
        }
    }

    /// Formats the elementwise kernels are instantiated for.
    pub const fn is_kernel_supported(self) -> bool {
        matches!(self, Self::F32 | Self::F16 | Self::BF16)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a tensor's storage lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Device {
    #[default]
    Cpu,
    /// Accelerator with the given ordinal.
    Npu(u32),
}

impl Device {
    pub fn is_npu(&self) -> bool {
        matches!(self, Self::Npu(_))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Npu(ordinal) => write!(f, "npu:{ordinal}"),
        }
    }
}
