//! The tempo map: an ordered sequence of tempo and meter sections.

mod convert;
mod edit;
mod grid;
mod snap;

use core::num::NonZeroU32;

pub use grid::GridPoint;
pub use snap::RoundDirection;

use crate::{
    bbt::BbtTime,
    error::InconsistencyError,
    meter::{Meter, MeterPoint},
    section::{Anchor, Section, SectionKind},
    tempo::{Tempo, TempoPoint},
};

/// The configuration of a [`TempoMap`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TempoMapConfig {
    /// The sample rate that sample positions are counted in.
    ///
    /// By default this is set to `48000`.
    pub sample_rate: NonZeroU32,
    /// The tempo of the initial tempo section.
    ///
    /// By default this is set to a constant `120.0` quarter notes per minute.
    pub initial_tempo: Tempo,
    /// The meter of the initial meter section.
    ///
    /// By default this is set to `4/4`.
    pub initial_meter: Meter,
    /// How close (in samples) a new section has to be to an existing section
    /// of the same kind for the edit to replace the existing section instead
    /// of inserting a new one. This prevents zero-length sections.
    ///
    /// Negative values are treated as `0`.
    ///
    /// By default this is set to `1`.
    pub coincidence_epsilon: i64,
}

impl Default for TempoMapConfig {
    fn default() -> Self {
        Self {
            sample_rate: NonZeroU32::new(48_000).unwrap(),
            initial_tempo: Tempo::default(),
            initial_meter: Meter::default(),
            coincidence_epsilon: 1,
        }
    }
}

/// The tempo and meter in effect at a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoMetric<'a> {
    pub tempo: &'a TempoPoint,
    pub meter: &'a MeterPoint,
}

/// Maps between sample time and musical time.
///
/// The map always holds a tempo and a meter section at sample `0`. All
/// sections are kept in one sequence sorted by sample position (a meter
/// sorts before a tempo at the same sample), and the sample, pulse and BBT
/// positions of the sections always agree on that order.
///
/// A `TempoMap` is a plain value. Cloning it yields a fully detached copy,
/// which is how edits are prepared off to the side before being published.
#[derive(Debug, Clone)]
pub struct TempoMap {
    sections: Vec<Section>,
    // Indices into `sections`.
    tempos: Vec<usize>,
    meters: Vec<usize>,
    sample_rate: NonZeroU32,
    coincidence_epsilon: i64,
}

impl TempoMap {
    pub fn new(config: TempoMapConfig) -> Self {
        let mut map = Self {
            sections: vec![
                Section::Meter(MeterPoint::new(config.initial_meter, Anchor::ORIGIN)),
                Section::Tempo(TempoPoint::new(config.initial_tempo, Anchor::ORIGIN)),
            ],
            tempos: Vec::new(),
            meters: Vec::new(),
            sample_rate: config.sample_rate,
            coincidence_epsilon: config.coincidence_epsilon.max(0),
        };

        map.rebuild_indices();

        map
    }

    #[inline]
    pub fn sample_rate(&self) -> NonZeroU32 {
        self.sample_rate
    }

    #[inline]
    pub fn coincidence_epsilon(&self) -> i64 {
        self.coincidence_epsilon
    }

    pub fn set_coincidence_epsilon(&mut self, epsilon: i64) {
        self.coincidence_epsilon = epsilon.max(0);
    }

    /// All sections in time order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn tempos(&self) -> impl Iterator<Item = &TempoPoint> + '_ {
        self.sections.iter().filter_map(Section::as_tempo)
    }

    pub fn meters(&self) -> impl Iterator<Item = &MeterPoint> + '_ {
        self.sections.iter().filter_map(Section::as_meter)
    }

    pub fn n_tempos(&self) -> usize {
        self.tempos.len()
    }

    pub fn n_meters(&self) -> usize {
        self.meters.len()
    }

    /// Whether `section` is one of the two sections at the origin.
    pub fn is_initial(&self, section: &Section) -> bool {
        section.sample() == 0 && self.find(section.kind(), 0).is_some()
    }

    /// Whether `section` is part of this map and may be removed.
    pub fn can_remove(&self, section: &Section) -> bool {
        section.sample() != 0 && self.find(section.kind(), section.sample()).is_some()
    }

    /// The tempo section governing `sample`.
    pub fn tempo_at(&self, sample: i64) -> &TempoPoint {
        self.tempo(self.tempo_index_at_sample(sample))
    }

    /// The meter section governing `sample`.
    pub fn meter_at(&self, sample: i64) -> &MeterPoint {
        let n = self
            .meters
            .partition_point(|&i| self.sections[i].sample() <= sample);
        self.meter(n.saturating_sub(1))
    }

    pub fn metric_at(&self, sample: i64) -> TempoMetric<'_> {
        TempoMetric {
            tempo: self.tempo_at(sample),
            meter: self.meter_at(sample),
        }
    }

    /// The instantaneous tempo at `sample`, following any ramp.
    pub fn quarters_per_minute_at(&self, sample: i64) -> f64 {
        let n = self.tempo_index_at_sample(sample);
        let (tempo, next_sample) = self.tempo_bracket(n);
        tempo.quarters_per_minute_at(sample, next_sample)
    }

    pub fn samples_per_quarter_note_at(&self, sample: i64) -> f64 {
        self.sample_rate_f64() * 60.0 / self.quarters_per_minute_at(sample)
    }

    #[inline]
    pub(crate) fn sample_rate_f64(&self) -> f64 {
        f64::from(self.sample_rate.get())
    }

    pub(crate) fn rebuild_indices(&mut self) {
        self.tempos.clear();
        self.meters.clear();

        for (i, section) in self.sections.iter().enumerate() {
            match section.kind() {
                SectionKind::Tempo => self.tempos.push(i),
                SectionKind::Meter => self.meters.push(i),
            }
        }
    }

    /// The `n`th tempo section.
    pub(crate) fn tempo(&self, n: usize) -> &TempoPoint {
        match &self.sections[self.tempos[n]] {
            Section::Tempo(t) => t,
            Section::Meter(_) => unreachable!("tempo index refers to a meter section"),
        }
    }

    /// The `n`th meter section.
    pub(crate) fn meter(&self, n: usize) -> &MeterPoint {
        match &self.sections[self.meters[n]] {
            Section::Meter(m) => m,
            Section::Tempo(_) => unreachable!("meter index refers to a tempo section"),
        }
    }

    /// The `n`th tempo section and the sample position of the tempo
    /// section after it.
    pub(crate) fn tempo_bracket(&self, n: usize) -> (&TempoPoint, Option<i64>) {
        let next_sample = self
            .tempos
            .get(n + 1)
            .map(|&i| self.sections[i].sample());
        (self.tempo(n), next_sample)
    }

    pub(crate) fn tempo_index_at_sample(&self, sample: i64) -> usize {
        self.tempos
            .partition_point(|&i| self.sections[i].sample() <= sample)
            .saturating_sub(1)
    }

    pub(crate) fn tempo_index_at_pulse(&self, pulse: f64) -> usize {
        self.tempos
            .partition_point(|&i| self.sections[i].anchor().pulse <= pulse)
            .saturating_sub(1)
    }

    pub(crate) fn meter_index_at_pulse(&self, pulse: f64) -> usize {
        self.meters
            .partition_point(|&i| self.sections[i].anchor().pulse <= pulse)
            .saturating_sub(1)
    }

    pub(crate) fn meter_index_at_bbt(&self, bbt: &BbtTime) -> usize {
        self.meters
            .partition_point(|&i| self.sections[i].anchor().bbt <= *bbt)
            .saturating_sub(1)
    }

    pub(crate) fn meter_index_at_bar(&self, bars: i32) -> usize {
        self.meters
            .partition_point(|&i| self.sections[i].anchor().bbt.bars() <= bars)
            .saturating_sub(1)
    }

    /// The index into `sections` of the section of `kind` at exactly
    /// `sample`.
    pub(crate) fn find(&self, kind: SectionKind, sample: i64) -> Option<usize> {
        let indices = match kind {
            SectionKind::Tempo => &self.tempos,
            SectionKind::Meter => &self.meters,
        };

        let n = indices.partition_point(|&i| self.sections[i].sample() < sample);
        indices
            .get(n)
            .copied()
            .filter(|&i| self.sections[i].sample() == sample)
    }

    /// The index into `sections` of the section of `kind` closest to
    /// `sample`, if it lies within the coincidence epsilon.
    pub(crate) fn find_coincident(&self, kind: SectionKind, sample: i64) -> Option<usize> {
        let indices = match kind {
            SectionKind::Tempo => &self.tempos,
            SectionKind::Meter => &self.meters,
        };

        let n = indices.partition_point(|&i| self.sections[i].sample() < sample);

        [n.checked_sub(1), Some(n)]
            .into_iter()
            .flatten()
            .filter_map(|n| indices.get(n).copied())
            .map(|i| (i, (self.sections[i].sample() - sample).abs()))
            .filter(|&(_, distance)| distance <= self.coincidence_epsilon)
            .min_by_key(|&(_, distance)| distance)
            .map(|(i, _)| i)
    }

    /// Append a section whose pulse and BBT anchors are not computed yet.
    /// [`TempoMap::finish_unanchored`] must be called before the map is used.
    pub(crate) fn push_unanchored(&mut self, section: Section) {
        self.sections.push(section);
    }

    pub(crate) fn finish_unanchored(&mut self) -> Result<(), InconsistencyError> {
        self.sections.sort_by_key(|s| s.order_key());
        self.reset_starting_at(0)?;
        self.check_invariants()
    }

    /// Verify that the three time domains agree on the order of all
    /// sections and that both origin sections are in place.
    pub fn check_invariants(&self) -> Result<(), InconsistencyError> {
        let origin_ok = matches!(self.sections.first(), Some(Section::Meter(m)) if m.anchor == Anchor::ORIGIN)
            && matches!(self.sections.get(1), Some(Section::Tempo(t)) if t.anchor == Anchor::ORIGIN);
        if !origin_ok {
            return Err(InconsistencyError::Misordered { index: 0 });
        }

        for (index, pair) in self.sections.windows(2).enumerate() {
            let (a, b) = (pair[0].anchor(), pair[1].anchor());
            let ordered = pair[0].order_key() < pair[1].order_key()
                && a.pulse <= b.pulse
                && a.bbt <= b.bbt;

            if !ordered || !b.pulse.is_finite() {
                return Err(InconsistencyError::Misordered { index: index + 1 });
            }
        }

        // Same-kind sections must never share a sample position.
        for indices in [&self.tempos, &self.meters] {
            for (n, pair) in indices.windows(2).enumerate() {
                if self.sections[pair[0]].sample() >= self.sections[pair[1]].sample() {
                    return Err(InconsistencyError::Misordered { index: n + 1 });
                }
            }
        }

        if self.meters().any(|m| !m.bbt().is_bar_start()) {
            return Err(InconsistencyError::Misordered { index: 0 });
        }

        Ok(())
    }
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new(TempoMapConfig::default())
    }
}

impl PartialEq for TempoMap {
    fn eq(&self, other: &Self) -> bool {
        self.sample_rate == other.sample_rate && self.sections == other.sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_map_has_origin_sections() {
        let map = TempoMap::default();

        assert_eq!(map.n_tempos(), 1);
        assert_eq!(map.n_meters(), 1);
        assert_eq!(map.tempo_at(1_000_000).tempo().quarters_per_minute(), 120.0);
        assert_eq!(*map.meter_at(-5).meter(), Meter::COMMON);
        assert!(map.is_initial(&map.sections()[0]));
        assert!(!map.can_remove(&map.sections()[1]));
        assert_eq!(map.check_invariants(), Ok(()));
    }

    #[test]
    fn samples_per_quarter_note() {
        let map = TempoMap::default();

        assert_eq!(map.samples_per_quarter_note_at(0), 24_000.0);
        assert_eq!(map.quarters_per_minute_at(96_000), 120.0);
    }

    #[test]
    fn clones_are_detached() {
        let map = TempoMap::default();
        let mut copy = map.clone();

        copy.set_tempo(
            Tempo::new(90.0).unwrap(),
            crate::section::TimePosition::Samples(0),
        )
        .unwrap();

        assert_eq!(map.tempo_at(0).tempo().quarters_per_minute(), 120.0);
        assert_eq!(copy.tempo_at(0).tempo().quarters_per_minute(), 90.0);
        assert_ne!(map, copy);
    }
}
