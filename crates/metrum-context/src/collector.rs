//! Deferred dropping of retired snapshots.

use std::sync::Arc;

use bevy_platform::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

/// Parks snapshots that were replaced in a [`TempoMapSlot`] until no reader
/// refers to them anymore, then drops them on the thread that calls
/// [`RetiredSnapshots::collect`].
///
/// Since a parked snapshot always has one reference owned by the
/// collector, a reader letting go of a snapshot can never be the one that
/// frees it. This keeps deallocation off the audio thread.
///
/// [`TempoMapSlot`]: crate::TempoMapSlot
#[derive(Debug)]
pub struct RetiredSnapshots<T> {
    parked: Mutex<Vec<Arc<T>>>,
    // Mirrors `parked.len()` so it can be read without locking.
    len: AtomicUsize,
}

impl<T> RetiredSnapshots<T> {
    pub fn new() -> Self {
        Self {
            parked: Mutex::new(Vec::new()),
            len: AtomicUsize::new(0),
        }
    }

    /// Take ownership of a snapshot that is no longer published.
    pub fn park(&self, snapshot: Arc<T>) {
        let mut parked = self.parked.lock().unwrap_or_else(|e| e.into_inner());
        parked.push(snapshot);
        self.len.store(parked.len(), Ordering::Relaxed);
    }

    /// Drop every parked snapshot that no reader holds anymore.
    ///
    /// Returns the number of snapshots that were dropped.
    pub fn collect(&self) -> usize {
        let mut parked = self.parked.lock().unwrap_or_else(|e| e.into_inner());

        let before = parked.len();
        parked.retain(|snapshot| Arc::strong_count(snapshot) > 1);
        self.len.store(parked.len(), Ordering::Relaxed);

        before - parked.len()
    }

    /// The number of snapshots waiting to be collected.
    pub fn len(&self) -> usize {
        // Relaxed ordering is enough since this is only informational.
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for RetiredSnapshots<T> {
    fn default() -> Self {
        Self::new()
    }
}
