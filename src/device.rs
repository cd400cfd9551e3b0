//! Simulated vector accelerator and its execution stream.
//!
//! `SimulatedNpu` stands in for the device runtime: it answers capability
//! queries, sizes each core's local memory and runs launched cores on host
//! threads. Faults can be injected to exercise the failure paths.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::parse_override;
use crate::error::{DeviceError, KernelError, KernelResult, LaunchError};

/// Vector cores of the default simulated device.
pub const DEFAULT_VECTOR_CORES: u32 = 48;
/// Local (unified buffer) memory per vector core.
pub const DEFAULT_LOCAL_MEMORY_BYTES: usize = 192 * 1024;

/// Source of the hardware vector-core count.
pub trait CoreCountProbe: Send + Sync {
    fn query_vector_core_num(&self) -> Result<u32, DeviceError>;
}

#[derive(Debug)]
pub struct SimulatedNpu {
    ordinal: u32,
    vector_cores: u32,
    local_memory_bytes: usize,
    probe_failure: Option<String>,
    faulty_block: Option<u32>,
    probe_calls: AtomicUsize,
}

impl SimulatedNpu {
    pub fn new(vector_cores: u32) -> Self {
        Self::builder().vector_cores(vector_cores).build()
    }

    pub fn builder() -> SimulatedNpuBuilder {
        SimulatedNpuBuilder::default()
    }

    /// Default device, sized by `NPU_KERNELS_VECTOR_CORES` / `NPU_KERNELS_UB_BYTES` when set.
    pub fn from_env() -> KernelResult<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_vars(var: impl Fn(&str) -> Option<String>) -> KernelResult<Self> {
        let mut builder = Self::builder();
        let key = "NPU_KERNELS_VECTOR_CORES";
        if let Some(cores) = parse_override::<u32>(key, var(key))? {
            builder = builder.vector_cores(cores);
        }
        let key = "NPU_KERNELS_UB_BYTES";
        if let Some(bytes) = parse_override::<usize>(key, var(key))? {
            builder = builder.local_memory_bytes(bytes);
        }
        Ok(builder.build())
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Cores the device actually has; used to validate launches.
    pub fn vector_cores(&self) -> u32 {
        self.vector_cores
    }

    pub fn local_memory_bytes(&self) -> usize {
        self.local_memory_bytes
    }

    /// Number of times the capability query has been executed.
    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    /// Fault injected at core start, if this block is marked faulty.
    pub(crate) fn check_core(&self, block_idx: u32) -> Result<(), DeviceError> {
        match self.faulty_block {
            Some(faulty) if faulty == block_idx => Err(DeviceError::CoreFault { block_idx }),
            _ => Ok(()),
        }
    }
}

impl CoreCountProbe for SimulatedNpu {
    fn query_vector_core_num(&self) -> Result<u32, DeviceError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        match &self.probe_failure {
            Some(reason) => Err(DeviceError::CapabilityUnavailable {
                ordinal: self.ordinal,
                reason: reason.clone(),
            }),
            None => Ok(self.vector_cores),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedNpuBuilder {
    ordinal: u32,
    vector_cores: u32,
    local_memory_bytes: usize,
    probe_failure: Option<String>,
    faulty_block: Option<u32>,
}

impl Default for SimulatedNpuBuilder {
    fn default() -> Self {
        Self {
            ordinal: 0,
            vector_cores: DEFAULT_VECTOR_CORES,
            local_memory_bytes: DEFAULT_LOCAL_MEMORY_BYTES,
            probe_failure: None,
            faulty_block: None,
        }
    }
}

impl SimulatedNpuBuilder {
    pub fn ordinal(mut self, ordinal: u32) -> Self {
        self.ordinal = ordinal;
        self
    }

    pub fn vector_cores(mut self, cores: u32) -> Self {
        self.vector_cores = cores;
        self
    }

    pub fn local_memory_bytes(mut self, bytes: usize) -> Self {
        self.local_memory_bytes = bytes;
        self
    }

    /// Make every capability query fail with `reason`.
    pub fn fail_capability_query(mut self, reason: impl Into<String>) -> Self {
        self.probe_failure = Some(reason.into());
        self
    }

    /// Make the core running `block_idx` fault at start.
    pub fn fault_on_block(mut self, block_idx: u32) -> Self {
        self.faulty_block = Some(block_idx);
        self
    }

    pub fn build(self) -> SimulatedNpu {
        SimulatedNpu {
            ordinal: self.ordinal,
            vector_cores: self.vector_cores,
            local_memory_bytes: self.local_memory_bytes,
            probe_failure: self.probe_failure,
            faulty_block: self.faulty_block,
            probe_calls: AtomicUsize::new(0),
        }
    }
}

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(0);

/// In-order work queue on a device.
///
/// The simulated stream runs each launch to completion when it is enqueued;
/// its status becomes observable through [`Stream::synchronize`].
#[derive(Debug)]
pub struct Stream {
    id: u64,
    device: Arc<SimulatedNpu>,
    tracing: bool,
    launches: AtomicU64,
    failure: Mutex<Option<LaunchError>>,
}

impl Stream {
    pub fn new(device: Arc<SimulatedNpu>) -> Self {
        Self {
            id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
            device,
            tracing: false,
            launches: AtomicU64::new(0),
            failure: Mutex::new(None),
        }
    }

    /// Record per-step pipeline traces for launches on this stream.
    pub fn with_tracing(mut self, tracing: bool) -> Self {
        self.tracing = tracing;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn device(&self) -> &SimulatedNpu {
        &self.device
    }

    pub fn tracing(&self) -> bool {
        self.tracing
    }

    pub fn launches(&self) -> u64 {
        self.launches.load(Ordering::Relaxed)
    }

    /// Note the outcome of a launch; only the first failure is kept.
    pub(crate) fn record(&self, result: Result<(), &LaunchError>) {
        self.launches.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = result {
            let mut failure = self
                .failure
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if failure.is_none() {
                *failure = Some(err.clone());
            }
        }
    }

    /// Wait for all enqueued work; reports and clears the first failed launch.
    pub fn synchronize(&self) -> KernelResult<()> {
        let mut failure = self
            .failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match failure.take() {
            Some(err) => Err(KernelError::Launch {
                kernel: format!("stream {}", self.id),
                status: err.status,
                source: err,
            }),
            None => Ok(()),
        }
    }
}
