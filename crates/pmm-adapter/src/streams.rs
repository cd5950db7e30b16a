//! Bounded in-memory stream queue.
//!
//! Adapter stream tasks push events; the executor drains the queue at the
//! first step of every tick. Under backpressure the oldest depth update is
//! evicted first. Fills and order-status transitions are never dropped,
//! so position accounting stays exact even when the consumer falls behind.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::warn;

use pmm_core::StreamEvent;

/// Bounded event queue shared between adapter stream tasks and the
/// executor tick.
#[derive(Debug)]
pub struct StreamQueue {
    inner: Mutex<VecDeque<StreamEvent>>,
    capacity: usize,
    dropped_depth: AtomicU64,
}

impl StreamQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped_depth: AtomicU64::new(0),
        }
    }

    /// Enqueue an event.
    ///
    /// At capacity, the oldest depth event is evicted to make room. If no
    /// depth event is queued and the incoming event is itself droppable it
    /// is discarded; critical events are always admitted.
    pub fn push(&self, event: StreamEvent) {
        let mut q = self.inner.lock();
        if q.len() >= self.capacity {
            if let Some(idx) = q.iter().position(|e| e.is_droppable()) {
                q.remove(idx);
                self.dropped_depth.fetch_add(1, Ordering::Relaxed);
            } else if event.is_droppable() {
                self.dropped_depth.fetch_add(1, Ordering::Relaxed);
                return;
            } else {
                warn!(len = q.len(), "Stream queue over capacity with critical events");
            }
        }
        q.push_back(event);
    }

    /// Drain every queued event in arrival order.
    pub fn drain(&self) -> Vec<StreamEvent> {
        let mut q = self.inner.lock();
        q.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Number of depth updates discarded under backpressure.
    pub fn dropped_depth_count(&self) -> u64 {
        self.dropped_depth.load(Ordering::Relaxed)
    }
}
