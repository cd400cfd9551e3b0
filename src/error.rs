//! Error types for host-side operations and device-side kernel execution.
//!
//! Host errors (`KernelError`) are surfaced synchronously to the caller.
//! Device errors (`DeviceError`) abort the core that raised them and are
//! folded into a single non-zero launch status.

use thiserror::Error;

use crate::types::DType;

/// Launch status codes reported by the device runtime.
pub mod status {
    pub const SUCCESS: u32 = 0;
    pub const INVALID_ARGUMENT: u32 = 107_000;
    pub const INVALID_BLOCK_DIM: u32 = 107_001;
    pub const CAPABILITY_UNAVAILABLE: u32 = 107_002;
    pub const LOCAL_MEMORY_EXHAUSTED: u32 = 207_001;
    pub const QUEUE_EXHAUSTED: u32 = 207_002;
    pub const QUEUE_EMPTY: u32 = 207_003;
    pub const TILE_OVERFLOW: u32 = 207_004;
    pub const TRANSFER_OUT_OF_BOUNDS: u32 = 507_001;
    pub const MISALIGNED_BLOCK: u32 = 507_002;
    pub const CAST_FAILED: u32 = 507_003;
    pub const CORE_FAULT: u32 = 507_015;
}

/// Failure raised on a vector core (or by the device runtime before any core starts).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("invalid kernel arguments: {0}")]
    InvalidArguments(String),
    #[error("invalid block dim {requested}, device exposes {available} vector cores")]
    InvalidBlockDim { requested: u32, available: u32 },
    #[error("device {ordinal} capability query failed: {reason}")]
    CapabilityUnavailable { ordinal: u32, reason: String },
    #[error("local memory exhausted: requested {requested} bytes, {available} of {capacity} bytes free")]
    LocalMemoryExhausted {
        requested: usize,
        available: usize,
        capacity: usize,
    },
    #[error("tile queue `{queue}` has no free buffer (depth {depth})")]
    QueueExhausted { queue: &'static str, depth: usize },
    #[error("tile queue `{queue}` has no enqueued tile")]
    QueueEmpty { queue: &'static str },
    #[error("tile of {len} elements exceeds buffer capacity {capacity}")]
    TileOverflow { len: usize, capacity: usize },
    #[error("transfer out of bounds: offset {offset} + len {len} exceeds view of {bound} elements")]
    TransferOutOfBounds {
        offset: usize,
        len: usize,
        bound: usize,
    },
    #[error("block {block_idx} starts at byte offset {offset_bytes}, not {align}-byte aligned")]
    MisalignedBlock {
        block_idx: u32,
        offset_bytes: usize,
        align: usize,
    },
    #[error("cast failed: {0}")]
    Cast(String),
    #[error("vector core fault on block {block_idx}")]
    CoreFault { block_idx: u32 },
}

impl DeviceError {
    /// Stable non-zero status code for this failure.
    pub fn status(&self) -> u32 {
        match self {
            Self::InvalidArguments(_) => status::INVALID_ARGUMENT,
            Self::InvalidBlockDim { .. } => status::INVALID_BLOCK_DIM,
            Self::CapabilityUnavailable { .. } => status::CAPABILITY_UNAVAILABLE,
            Self::LocalMemoryExhausted { .. } => status::LOCAL_MEMORY_EXHAUSTED,
            Self::QueueExhausted { .. } => status::QUEUE_EXHAUSTED,
            Self::QueueEmpty { .. } => status::QUEUE_EMPTY,
            Self::TileOverflow { .. } => status::TILE_OVERFLOW,
            Self::TransferOutOfBounds { .. } => status::TRANSFER_OUT_OF_BOUNDS,
            Self::MisalignedBlock { .. } => status::MISALIGNED_BLOCK,
            Self::Cast(_) => status::CAST_FAILED,
            Self::CoreFault { .. } => status::CORE_FAULT,
        }
    }
}

/// A launch that finished with a non-zero status.
///
/// `block_idx` is the lowest failing core, or `None` when the launch was
/// rejected before any core started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("launch failed with status {status}: {source}")]
pub struct LaunchError {
    pub status: u32,
    pub block_idx: Option<u32>,
    #[source]
    pub source: DeviceError,
}

impl LaunchError {
    pub fn rejected(source: DeviceError) -> Self {
        Self {
            status: source.status(),
            block_idx: None,
            source,
        }
    }

    pub fn on_block(block_idx: u32, source: DeviceError) -> Self {
        Self {
            status: source.status(),
            block_idx: Some(block_idx),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported data type {0}")]
    UnsupportedDtype(DType),
    #[error("vector core query failed: {0}")]
    CapabilityQuery(String),
    #[error("internal error in tiling: {0}")]
    TilingInternal(String),
    #[error("cannot partition an empty tensor")]
    EmptyPartition,
    #[error("kernel {kernel} failed with status {status}")]
    Launch {
        kernel: String,
        status: u32,
        #[source]
        source: LaunchError,
    },
    #[error("invalid config: {0}")]
    Config(String),
}

impl KernelError {
    /// True for errors caused by the caller's arguments rather than the device or this crate.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::UnsupportedDtype(_) | Self::EmptyPartition
        )
    }

    /// Launch status attached to the error, if any.
    pub fn status(&self) -> Option<u32> {
        match self {
            Self::Launch { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type KernelResult<T> = Result<T, KernelError>;
