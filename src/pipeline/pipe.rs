//! Per-core local memory, tile queues and transfer synchronization.
//!
//! Every buffer a core uses is carved out of a fixed-capacity local memory
//! (the unified buffer) at init time; nothing is allocated while streaming.
//! Transfers between global and local memory are issued asynchronously and
//! only retire at a queue synchronization point:
//!
//! - enqueueing on a `VecIn` queue waits for all outstanding copy-in transfers,
//! - freeing a tile of a `VecOut` queue waits for all outstanding copy-out transfers.
//!
//! Because a wait retires *every* outstanding transfer in that direction,
//! issuing two copy-ins back to back and then enqueueing both costs a single
//! barrier.

use std::collections::VecDeque;

use crate::error::DeviceError;

/// Buffering depth of every tile queue.
pub const BUFFER_NUM: usize = 2;

/// Role of a tile queue; determines which transfer direction its sync points retire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuePosition {
    VecIn,
    VecOut,
}

/// Pipeline stage, recorded in the optional trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    CopyIn,
    Compute,
    CopyOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEvent {
    pub step: u32,
    pub stage: Stage,
}

/// Counters describing one core's run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipeStats {
    pub steps: u32,
    pub transfers_in: u32,
    pub transfers_out: u32,
    pub barriers: u32,
    pub local_bytes: usize,
}

impl PipeStats {
    pub fn merge(&mut self, other: &PipeStats) {
        self.steps += other.steps;
        self.transfers_in += other.transfers_in;
        self.transfers_out += other.transfers_out;
        self.barriers += other.barriers;
        self.local_bytes = self.local_bytes.max(other.local_bytes);
    }
}

/// Owner of a core's local memory budget and transfer events.
#[derive(Debug)]
pub struct Pipe {
    capacity: usize,
    used: usize,
    pending_in: u32,
    pending_out: u32,
    stats: PipeStats,
    trace: Option<Vec<TraceEvent>>,
}

impl Pipe {
    pub fn new(capacity: usize, trace: bool) -> Self {
        Self {
            capacity,
            used: 0,
            pending_in: 0,
            pending_out: 0,
            stats: PipeStats::default(),
            trace: trace.then(Vec::new),
        }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    fn reserve(&mut self, bytes: usize) -> Result<(), DeviceError> {
        let available = self.capacity - self.used;
        if bytes > available {
            return Err(DeviceError::LocalMemoryExhausted {
                requested: bytes,
                available,
                capacity: self.capacity,
            });
        }
        self.used += bytes;
        self.stats.local_bytes = self.used;
        Ok(())
    }

    /// Carve a queue of `depth` tiles of `tile_len` elements out of local memory.
    pub fn init_queue<T: Copy + Default>(
        &mut self,
        name: &'static str,
        position: QuePosition,
        depth: usize,
        tile_len: usize,
    ) -> Result<TileQueue<T>, DeviceError> {
        let bytes = depth
            .checked_mul(tile_len)
            .and_then(|n| n.checked_mul(std::mem::size_of::<T>()))
            .ok_or(DeviceError::LocalMemoryExhausted {
                requested: usize::MAX,
                available: self.capacity - self.used,
                capacity: self.capacity,
            })?;
        self.reserve(bytes)?;
        let free = (0..depth)
            .map(|_| LocalTensor::with_capacity(tile_len))
            .collect();
        Ok(TileQueue {
            name,
            position,
            depth,
            free,
            ready: VecDeque::with_capacity(depth),
        })
    }

    /// Carve a calc buffer (no queue semantics) out of local memory.
    pub fn init_buffer<T: Copy + Default>(&mut self, len: usize) -> Result<CalcBuffer<T>, DeviceError> {
        let bytes = len.checked_mul(std::mem::size_of::<T>()).ok_or(
            DeviceError::LocalMemoryExhausted {
                requested: usize::MAX,
                available: self.capacity - self.used,
                capacity: self.capacity,
            },
        )?;
        self.reserve(bytes)?;
        Ok(CalcBuffer {
            data: vec![T::default(); len].into_boxed_slice(),
        })
    }

    pub(crate) fn issue(&mut self, position: QuePosition) {
        match position {
            QuePosition::VecIn => {
                self.pending_in += 1;
                self.stats.transfers_in += 1;
            }
            QuePosition::VecOut => {
                self.pending_out += 1;
                self.stats.transfers_out += 1;
            }
        }
    }

    fn wait(&mut self, position: QuePosition) {
        let pending = match position {
            QuePosition::VecIn => &mut self.pending_in,
            QuePosition::VecOut => &mut self.pending_out,
        };
        if *pending > 0 {
            *pending = 0;
            self.stats.barriers += 1;
        }
    }

    /// Retire every outstanding transfer.
    pub fn drain(&mut self) {
        self.wait(QuePosition::VecIn);
        self.wait(QuePosition::VecOut);
    }

    pub fn has_pending(&self) -> bool {
        self.pending_in > 0 || self.pending_out > 0
    }

    pub(crate) fn record(&mut self, step: u32, stage: Stage) {
        log::trace!("step {step}: {stage:?}");
        if stage == Stage::CopyOut {
            self.stats.steps += 1;
        }
        if let Some(trace) = self.trace.as_mut() {
            trace.push(TraceEvent { step, stage });
        }
    }

    pub fn stats(&self) -> PipeStats {
        self.stats
    }

    pub fn take_trace(&mut self) -> Vec<TraceEvent> {
        self.trace.take().unwrap_or_default()
    }
}

/// A tile-sized buffer in local memory.
///
/// `len` is the number of valid elements for the current step; the backing
/// storage always has the queue's full tile capacity.
#[derive(Debug)]
pub struct LocalTensor<T> {
    data: Box<[T]>,
    len: usize,
}

impl<T: Copy + Default> LocalTensor<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![T::default(); capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set_len(&mut self, len: usize) -> Result<(), DeviceError> {
        if len > self.data.len() {
            return Err(DeviceError::TileOverflow {
                len,
                capacity: self.data.len(),
            });
        }
        self.len = len;
        Ok(())
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data[..self.len]
    }
}

/// Fixed-depth queue of local tiles.
///
/// Tiles cycle `alloc -> enqueue -> dequeue -> free`; with depth 2 a producer
/// can fill the next tile while the consumer still holds the previous one.
#[derive(Debug)]
pub struct TileQueue<T> {
    name: &'static str,
    position: QuePosition,
    depth: usize,
    free: Vec<LocalTensor<T>>,
    ready: VecDeque<LocalTensor<T>>,
}

impl<T: Copy + Default> TileQueue<T> {
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn alloc(&mut self) -> Result<LocalTensor<T>, DeviceError> {
        self.free.pop().ok_or(DeviceError::QueueExhausted {
            queue: self.name,
            depth: self.depth,
        })
    }

    /// Publish a tile to the consumer side of the queue.
    pub fn enqueue(&mut self, pipe: &mut Pipe, tile: LocalTensor<T>) {
        if self.position == QuePosition::VecIn {
            pipe.wait(QuePosition::VecIn);
        }
        self.ready.push_back(tile);
    }

    pub fn dequeue(&mut self) -> Result<LocalTensor<T>, DeviceError> {
        self.ready
            .pop_front()
            .ok_or(DeviceError::QueueEmpty { queue: self.name })
    }

    /// Return a tile for reuse by a later step.
    pub fn free(&mut self, pipe: &mut Pipe, mut tile: LocalTensor<T>) {
        if self.position == QuePosition::VecOut {
            pipe.wait(QuePosition::VecOut);
        }
        tile.len = 0;
        self.free.push(tile);
    }
}

/// Scratch buffer in local memory without queue semantics.
#[derive(Debug)]
pub struct CalcBuffer<T> {
    data: Box<[T]>,
}

impl<T> CalcBuffer<T> {
    /// First `len` elements of the buffer.
    pub fn get(&mut self, len: usize) -> Result<&mut [T], DeviceError> {
        let capacity = self.data.len();
        self.data
            .get_mut(..len)
            .ok_or(DeviceError::TileOverflow { len, capacity })
    }
}
