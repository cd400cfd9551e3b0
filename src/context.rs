//! Per-process execution context: device, cached core count, config, stream.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::capability::CoreCountCache;
use crate::config::KernelConfig;
use crate::device::{CoreCountProbe, SimulatedNpu, Stream};
use crate::error::KernelResult;

static GLOBAL: OnceCell<NpuContext> = OnceCell::new();

#[derive(Debug)]
pub struct NpuContext {
    device: Arc<SimulatedNpu>,
    cores: CoreCountCache,
    config: KernelConfig,
    stream: Stream,
}

impl NpuContext {
    /// Context over `device`, which also answers the core-count query.
    pub fn new(device: Arc<SimulatedNpu>, config: KernelConfig) -> KernelResult<Self> {
        let probe: Arc<dyn CoreCountProbe> = device.clone();
        Self::with_probe(device, probe, config)
    }

    pub fn with_probe(
        device: Arc<SimulatedNpu>,
        probe: Arc<dyn CoreCountProbe>,
        config: KernelConfig,
    ) -> KernelResult<Self> {
        config.validate(device.local_memory_bytes())?;
        let stream = Stream::new(device.clone()).with_tracing(config.trace);
        log::info!(
            "npu context: device {} ({} vector cores, {} bytes local memory), {config:?}",
            device.ordinal(),
            device.vector_cores(),
            device.local_memory_bytes()
        );
        Ok(Self {
            device,
            cores: CoreCountCache::new(probe),
            config,
            stream,
        })
    }

    /// Process-wide context, built from the environment on first use.
    ///
    /// A failed initialization is returned to the caller and retried on the
    /// next call.
    pub fn global() -> KernelResult<&'static NpuContext> {
        GLOBAL.get_or_try_init(|| {
            let device = Arc::new(SimulatedNpu::from_env()?);
            Self::new(device, KernelConfig::from_env()?)
        })
    }

    /// Vector cores available for launches, queried once per context.
    pub fn vector_core_num(&self) -> KernelResult<u32> {
        self.cores.vector_core_num()
    }

    pub fn device(&self) -> &SimulatedNpu {
        &self.device
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }
}
