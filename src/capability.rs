//! Vector-core count, queried once and cached.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::device::CoreCountProbe;
use crate::error::{KernelError, KernelResult};

/// Caches the vector-core count reported by a probe.
///
/// The first caller runs the probe while concurrent callers block on the
/// same cell, so a successful query executes exactly once. A failed query
/// caches nothing: the error goes to the caller and the next call probes
/// again.
pub struct CoreCountCache {
    probe: Arc<dyn CoreCountProbe>,
    cores: OnceCell<u32>,
}

impl CoreCountCache {
    pub fn new(probe: Arc<dyn CoreCountProbe>) -> Self {
        Self {
            probe,
            cores: OnceCell::new(),
        }
    }

    pub fn vector_core_num(&self) -> KernelResult<u32> {
        self.cores
            .get_or_try_init(|| {
                let cores = self
                    .probe
                    .query_vector_core_num()
                    .map_err(|e| KernelError::CapabilityQuery(e.to_string()))?;
                if cores == 0 {
                    return Err(KernelError::CapabilityQuery(
                        "device reported 0 vector cores".into(),
                    ));
                }
                log::debug!("vector core num: {cores}");
                Ok(cores)
            })
            .copied()
    }

    /// Cached value, without probing.
    pub fn cached(&self) -> Option<u32> {
        self.cores.get().copied()
    }
}

impl std::fmt::Debug for CoreCountCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreCountCache")
            .field("cores", &self.cores.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::device::SimulatedNpu;
    use crate::error::DeviceError;

    #[test]
    fn test_concurrent_callers_probe_once() {
        let npu = Arc::new(SimulatedNpu::new(40));
        let cache = CoreCountCache::new(npu.clone());
        thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| assert_eq!(cache.vector_core_num().unwrap(), 40));
            }
        });
        assert_eq!(npu.probe_calls(), 1);
        assert_eq!(cache.cached(), Some(40));
    }

    #[test]
    fn test_failure_is_not_cached() {
        let npu = Arc::new(
            SimulatedNpu::builder()
                .fail_capability_query("no device")
                .build(),
        );
        let cache = CoreCountCache::new(npu.clone());
        assert!(matches!(cache.vector_core_num(), Err(KernelError::CapabilityQuery(_))));
        assert!(cache.vector_core_num().is_err());
        assert_eq!(npu.probe_calls(), 2);
        assert_eq!(cache.cached(), None);
    }

    #[test]
    fn test_zero_cores_is_a_failure() {
        let cache = CoreCountCache::new(Arc::new(SimulatedNpu::new(0)));
        let err = cache.vector_core_num().unwrap_err();
        assert!(err.to_string().contains("0 vector cores"));
    }

    /// Fails on the first call, succeeds afterwards.
    struct FlakyProbe {
        calls: AtomicUsize,
    }

    impl CoreCountProbe for FlakyProbe {
        fn query_vector_core_num(&self) -> Result<u32, DeviceError> {
            thread::sleep(Duration::from_millis(1));
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DeviceError::CapabilityUnavailable {
                    ordinal: 0,
                    reason: "busy".into(),
                })
            } else {
                Ok(24)
            }
        }
    }

    #[test]
    fn test_recovers_after_failed_probe() {
        let probe = Arc::new(FlakyProbe { calls: AtomicUsize::new(0) });
        let cache = CoreCountCache::new(probe.clone());
        assert!(cache.vector_core_num().is_err());
        assert_eq!(cache.vector_core_num().unwrap(), 24);
        assert_eq!(cache.vector_core_num().unwrap(), 24);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }
}
