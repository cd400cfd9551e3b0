//! npu-kernels: elementwise kernels for a many-core vector accelerator.
//!
//! The crate ships one operation, `add`, built from reusable pieces:
//! - **Capability cache**: the vector-core count is queried once per context
//! - **Tiling planner**: pure host-side partition of the input over cores
//! - **Pipelined engine**: double-buffered copy-in / compute / copy-out per core,
//!   with bf16 computed through f32 and narrowed round-to-nearest-even
//!
//! # Quick Start
//!
//! ```ignore
//! use npu_kernels::{ops, NpuContext, NpuTensor, Device};
//!
//! let ctx = NpuContext::global()?;
//! let x = NpuTensor::from_vec(vec![1.0f32; 4096], &[64, 64])?.to_device(Device::Npu(0));
//! let y = NpuTensor::from_vec(vec![2.0f32; 4096], &[64, 64])?.to_device(Device::Npu(0));
//! let z = ops::add(ctx, &x, &y)?;
//! ```

pub mod capability;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod launch;
pub mod ops;
pub mod pipeline;
pub mod tensor;
pub mod tiling;
pub mod traits;
pub mod types;
pub mod validation;

pub use capability::CoreCountCache;
pub use config::KernelConfig;
pub use context::NpuContext;
pub use device::{CoreCountProbe, SimulatedNpu, SimulatedNpuBuilder, Stream};
pub use error::{status, DeviceError, KernelError, KernelResult, LaunchError};
pub use launch::{kernel_name, launch_binary, LaunchReport};
pub use ops::{add, add_out, elementwise_binary};
pub use pipeline::{CoreContext, CoreReport, PipeStats};
pub use tensor::{NpuTensor, Storage};
pub use tiling::{plan_launch, AddTiling, LaunchPlan, BLOCK_ALIGN_BYTES, DEFAULT_TILE_SIZE};
pub use traits::{Add, BinaryOp, Element, VectorArith};
pub use types::{DType, Device};
