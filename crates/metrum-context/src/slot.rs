use std::sync::Arc;

use arc_swap::ArcSwap;
use bevy_platform::sync::Mutex;
use metrum_core::{TempoMap, TempoMapConfig, TempoMapError};

use crate::collector::RetiredSnapshots;

/// Holds the authoritative [`TempoMap`] and publishes new versions of it.
///
/// Readers get immutable snapshots with a single atomic load and never
/// block. Writers build a new map off to the side and swap it in
/// atomically, so a reader sees either the old map or the new one, never a
/// mix of both. Writers are serialized with each other.
///
/// Replaced snapshots are kept until [`TempoMapSlot::collect`] finds that
/// no reader holds them anymore. Call it periodically from a non-realtime
/// thread.
#[derive(Debug)]
pub struct TempoMapSlot {
    current: ArcSwap<TempoMap>,
    write_lock: Mutex<()>,
    retired: RetiredSnapshots<TempoMap>,
}

impl TempoMapSlot {
    pub fn new(map: TempoMap) -> Self {
        Self {
            current: ArcSwap::from_pointee(map),
            write_lock: Mutex::new(()),
            retired: RetiredSnapshots::new(),
        }
    }

    pub fn from_config(config: TempoMapConfig) -> Self {
        Self::new(TempoMap::new(config))
    }

    /// The currently published map.
    ///
    /// This is a single atomic load and is safe to call on the audio
    /// thread.
    #[inline]
    pub fn load(&self) -> Arc<TempoMap> {
        self.current.load_full()
    }

    /// A detached copy of the currently published map, for example for an
    /// editing preview or an undo snapshot. Changes to the copy are not
    /// visible to anyone until it is published.
    pub fn write_copy(&self) -> TempoMap {
        TempoMap::clone(&self.current.load())
    }

    /// Apply `f` to a copy of the current map and publish the result.
    ///
    /// If `f` fails, or leaves the map inconsistent, nothing is published
    /// and readers keep seeing the previous map.
    pub fn edit<R>(
        &self,
        f: impl FnOnce(&mut TempoMap) -> Result<R, TempoMapError>,
    ) -> Result<R, TempoMapError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut map = self.write_copy();

        let res = f(&mut map).and_then(|r| {
            map.check_invariants()?;
            Ok(r)
        });

        match res {
            Ok(r) => {
                self.swap_in(map);
                Ok(r)
            }
            Err(e) => {
                log::warn!("tempo map edit discarded, keeping the published map: {e}");
                Err(e)
            }
        }
    }

    /// Publish a map that was built elsewhere, typically from
    /// [`TempoMapSlot::write_copy`]. The map replaces whatever is published
    /// at the time of the call.
    pub fn publish(&self, map: TempoMap) -> Result<(), TempoMapError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Err(e) = map.check_invariants() {
            log::error!("refusing to publish an inconsistent tempo map: {e}");
            return Err(e.into());
        }

        self.swap_in(map);
        Ok(())
    }

    /// Drop every retired snapshot that is no longer held by a reader.
    ///
    /// Returns the number of snapshots that were dropped.
    pub fn collect(&self) -> usize {
        let dropped = self.retired.collect();
        if dropped > 0 {
            log::trace!("dropped {dropped} retired tempo map snapshots");
        }
        dropped
    }

    /// The number of retired snapshots waiting for [`TempoMapSlot::collect`].
    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }

    fn swap_in(&self, map: TempoMap) {
        let (n_tempos, n_meters) = (map.n_tempos(), map.n_meters());

        let old = self.current.swap(Arc::new(map));
        self.retired.park(old);

        log::debug!("published tempo map with {n_tempos} tempo and {n_meters} meter sections");
    }
}

impl Default for TempoMapSlot {
    fn default() -> Self {
        Self::new(TempoMap::default())
    }
}

#[cfg(test)]
mod tests {
    use metrum_core::{Tempo, TimePosition};

    use super::*;

    #[test]
    fn edits_are_published() {
        let slot = TempoMapSlot::default();
        let before = slot.load();

        slot.edit(|map| map.set_tempo(Tempo::new(90.0)?, TimePosition::Samples(48_000)))
            .unwrap();

        assert_eq!(before.n_tempos(), 1);
        assert_eq!(slot.load().n_tempos(), 2);
        assert_eq!(slot.retired_len(), 1);

        // `before` still refers to the retired snapshot.
        assert_eq!(slot.collect(), 0);
        drop(before);
        assert_eq!(slot.collect(), 1);
        assert_eq!(slot.retired_len(), 0);
    }

    #[test]
    fn failed_edits_publish_nothing() {
        let slot = TempoMapSlot::default();
        let before = slot.load();

        let res = slot.edit(|map| {
            map.set_tempo(Tempo::new(90.0)?, TimePosition::Samples(48_000))?;
            map.add_tempo(Tempo::new(100.0)?, TimePosition::Samples(48_000))
        });

        assert!(res.is_err());
        assert!(Arc::ptr_eq(&before, &slot.load()));
        assert_eq!(slot.retired_len(), 0);
    }

    #[test]
    fn copies_are_detached() {
        let slot = TempoMapSlot::default();

        let mut copy = slot.write_copy();
        copy.set_tempo(Tempo::new(60.0).unwrap(), TimePosition::Samples(0))
            .unwrap();
        assert_eq!(slot.load().tempo_at(0).tempo().quarters_per_minute(), 120.0);

        slot.publish(copy).unwrap();
        assert_eq!(slot.load().tempo_at(0).tempo().quarters_per_minute(), 60.0);
    }
}
