use core::ops::{Deref, DerefMut};
use std::sync::Arc;

use metrum_core::{BbtOffset, BbtTime, RoundDirection, TempoMap, TempoMapError};
use smallvec::SmallVec;

use crate::TempoMapSlot;

/// The tempo map context of one thread.
///
/// A reader caches the snapshot it last loaded from its [`TempoMapSlot`]
/// and answers every conversion from that snapshot, so a whole audio block
/// is processed against one consistent map. Call [`MapReader::refresh`] at
/// a point where picking up a new map is safe, such as the start of a
/// block.
///
/// [`MapReader::scope`] temporarily substitutes another map, for example a
/// preview map while an edit is being dragged.
#[derive(Debug)]
pub struct MapReader {
    slot: Arc<TempoMapSlot>,
    published: Arc<TempoMap>,
    overrides: SmallVec<[Arc<TempoMap>; 4]>,
}

impl MapReader {
    pub fn new(slot: Arc<TempoMapSlot>) -> Self {
        let published = slot.load();

        Self {
            slot,
            published,
            overrides: SmallVec::new(),
        }
    }

    /// Pick up the most recently published map. This is one atomic load.
    ///
    /// Returns `true` if the published map changed since the last refresh.
    /// Active scopes keep taking precedence over the published map.
    pub fn refresh(&mut self) -> bool {
        let latest = self.slot.load();

        if Arc::ptr_eq(&latest, &self.published) {
            return false;
        }

        // The slot has parked the previous snapshot, so this never drops
        // the last reference.
        self.published = latest;
        true
    }

    /// The map conversions are currently answered from: the innermost
    /// active scope's map, or the cached published snapshot.
    #[inline]
    pub fn map(&self) -> &TempoMap {
        self.overrides.last().unwrap_or(&self.published)
    }

    /// A shared handle to [`MapReader::map`] that outlives the reader's
    /// current state.
    pub fn snapshot(&self) -> Arc<TempoMap> {
        Arc::clone(self.overrides.last().unwrap_or(&self.published))
    }

    pub fn slot(&self) -> &Arc<TempoMapSlot> {
        &self.slot
    }

    /// The number of nested scopes currently active.
    pub fn scope_depth(&self) -> usize {
        self.overrides.len()
    }

    /// Use `map` for all conversions until the returned guard is dropped.
    ///
    /// Scopes nest; dropping a guard restores exactly the map that was in
    /// effect when it was created. Passing `None` creates a guard that
    /// changes nothing.
    pub fn scope(&mut self, map: Option<Arc<TempoMap>>) -> TempoMapScope<'_> {
        let pushed = match map {
            Some(map) => {
                self.overrides.push(map);
                true
            }
            None => false,
        };

        TempoMapScope {
            reader: self,
            pushed,
        }
    }

    #[inline]
    pub fn sample_to_pulse(&self, sample: i64) -> f64 {
        self.map().sample_to_pulse(sample)
    }

    #[inline]
    pub fn pulse_to_sample(&self, pulse: f64) -> Result<i64, TempoMapError> {
        self.map().pulse_to_sample(pulse)
    }

    #[inline]
    pub fn pulse_to_bbt(&self, pulse: f64) -> Result<BbtTime, TempoMapError> {
        self.map().pulse_to_bbt(pulse)
    }

    #[inline]
    pub fn bbt_to_pulse(&self, bbt: &BbtTime) -> Result<f64, TempoMapError> {
        self.map().bbt_to_pulse(bbt)
    }

    #[inline]
    pub fn sample_to_bbt(&self, sample: i64) -> Result<BbtTime, TempoMapError> {
        self.map().sample_to_bbt(sample)
    }

    #[inline]
    pub fn bbt_to_sample(&self, bbt: &BbtTime) -> Result<i64, TempoMapError> {
        self.map().bbt_to_sample(bbt)
    }

    #[inline]
    pub fn framewalk_to_beats(&self, start: i64, distance: i64) -> f64 {
        self.map().framewalk_to_beats(start, distance)
    }

    #[inline]
    pub fn samplepos_minus_qn(&self, sample: i64, quarter_notes: f64) -> Result<i64, TempoMapError> {
        self.map().samplepos_minus_qn(sample, quarter_notes)
    }

    #[inline]
    pub fn samplepos_plus_qn(&self, sample: i64, quarter_notes: f64) -> Result<i64, TempoMapError> {
        self.map().samplepos_plus_qn(sample, quarter_notes)
    }

    #[inline]
    pub fn samplepos_plus_bbt(&self, sample: i64, offset: &BbtOffset) -> Result<i64, TempoMapError> {
        self.map().samplepos_plus_bbt(sample, offset)
    }

    #[inline]
    pub fn round_to_beat(&self, sample: i64, direction: RoundDirection) -> Result<i64, TempoMapError> {
        self.map().round_to_beat(sample, direction)
    }

    #[inline]
    pub fn bbt_walk(&self, bbt: &BbtTime, offset: &BbtOffset) -> BbtTime {
        self.map().bbt_walk(bbt, offset)
    }

    #[inline]
    pub fn quarters_per_minute_at(&self, sample: i64) -> f64 {
        self.map().quarters_per_minute_at(sample)
    }
}

/// Guard returned by [`MapReader::scope`].
///
/// Dereferences to the [`MapReader`], so conversions and further nested
/// scopes go through the guard while it is alive.
#[derive(Debug)]
pub struct TempoMapScope<'a> {
    reader: &'a mut MapReader,
    pushed: bool,
}

impl TempoMapScope<'_> {
    /// Whether this scope substituted a map.
    pub fn is_active(&self) -> bool {
        self.pushed
    }
}

impl Deref for TempoMapScope<'_> {
    type Target = MapReader;

    fn deref(&self) -> &Self::Target {
        self.reader
    }
}

impl DerefMut for TempoMapScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.reader
    }
}

impl Drop for TempoMapScope<'_> {
    fn drop(&mut self) {
        if self.pushed {
            self.reader.overrides.pop();
        }
    }
}
