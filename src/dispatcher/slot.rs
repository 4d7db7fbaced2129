use std::sync::{
    atomic::{self, AtomicUsize},
    Arc,
};

use tokio::sync::OwnedSemaphorePermit;

/// One admitted unit of work's share of the capacity.
///
/// Held by the spawned task for as long as the work runs, so the capacity is returned however the
/// task ends.
#[derive(Debug)]
pub(crate) struct Slot {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Slot {
    pub(crate) fn new(permit: OwnedSemaphorePermit, in_flight: Arc<AtomicUsize>) -> Self {
        in_flight.fetch_add(1, atomic::Ordering::SeqCst);
        Self {
            _permit: permit,
            in_flight,
        }
    }
}

impl Drop for Slot {
    /// Reduces the number of units in flight, then releases the permit back to the pool.
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, atomic::Ordering::SeqCst);
    }
}
