//! Kernel configuration: defaults, JSON file and environment overrides.
//!
//! Lookup order (later wins):
//! 1. built-in defaults,
//! 2. JSON file named by `NPU_KERNELS_CONFIG`,
//! 3. `NPU_KERNELS_TILE_SIZE`, `NPU_KERNELS_TRACE`.

use std::env;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};
use crate::pipeline::local_memory_footprint;
use crate::tiling::{BLOCK_ALIGN_BYTES, DEFAULT_TILE_SIZE};
use crate::types::DType;

const SUPPORTED: [DType; 3] = [DType::F32, DType::F16, DType::BF16];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KernelConfig {
    /// Elements per pipeline step.
    pub tile_size: u32,
    /// Record per-step pipeline traces.
    pub trace: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            trace: false,
        }
    }
}

impl KernelConfig {
    pub fn from_env() -> KernelResult<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Same lookup as [`KernelConfig::from_env`] over an arbitrary variable source.
    pub(crate) fn from_vars(var: impl Fn(&str) -> Option<String>) -> KernelResult<Self> {
        let mut config = match var("NPU_KERNELS_CONFIG") {
            Some(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        let key = "NPU_KERNELS_TILE_SIZE";
        if let Some(tile_size) = parse_override::<u32>(key, var(key))? {
            config.tile_size = tile_size;
        }
        let key = "NPU_KERNELS_TRACE";
        if let Some(trace) = parse_override::<bool>(key, var(key))? {
            config.trace = trace;
        }
        log::debug!("kernel config: {config:?}");
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> KernelResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| KernelError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> KernelResult<Self> {
        serde_json::from_str(text).map_err(|e| KernelError::Config(e.to_string()))
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Check the config against a device with `local_memory_bytes` per core.
    ///
    /// The tile size must keep every tile offset 32-byte aligned for every
    /// supported format, and one pipeline of each format must fit local memory.
    pub fn validate(&self, local_memory_bytes: usize) -> KernelResult<()> {
        if self.tile_size == 0 {
            return Err(KernelError::Config("tile_size must be > 0".into()));
        }
        let tile = self.tile_size as usize;
        for dtype in SUPPORTED {
            let align = BLOCK_ALIGN_BYTES / dtype.size_bytes();
            if tile % align != 0 {
                return Err(KernelError::Config(format!(
                    "tile_size {tile} is not a multiple of {align} ({dtype} alignment unit)"
                )));
            }
            let needed = local_memory_footprint(dtype, tile);
            if needed > local_memory_bytes {
                return Err(KernelError::Config(format!(
                    "tile_size {tile} needs {needed} bytes of local memory for {dtype}, device has {local_memory_bytes}"
                )));
            }
        }
        Ok(())
    }
}

/// Parse an override value; unset or blank means `None`.
pub(crate) fn parse_override<T>(key: &str, value: Option<String>) -> KernelResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| KernelError::Config(format!("{key}={raw}: {e}"))),
        _ => Ok(None),
    }
}
