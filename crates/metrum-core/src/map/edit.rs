use core::num::NonZeroU32;

use crate::{
    error::{InconsistencyError, TempoMapError},
    meter::{Meter, MeterPoint},
    section::{Anchor, Section, SectionKind, TimePosition},
    tempo::{Tempo, TempoPoint},
};

use super::TempoMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Fail if a section of the same kind already sits at the exact
    /// position.
    Insert,
    /// Replace a section of the same kind at (or within the coincidence
    /// epsilon of) the position.
    Upsert,
}

impl TempoMap {
    /// Insert a new tempo section.
    ///
    /// Fails with [`TempoMapError::DuplicateSection`] if a tempo section
    /// already exists at the exact sample `at` resolves to. A tempo section
    /// that lies within the coincidence epsilon (but not exactly at the
    /// position) is replaced instead.
    pub fn add_tempo(&mut self, tempo: Tempo, at: TimePosition) -> Result<TempoPoint, TempoMapError> {
        self.transact("add tempo", |map| {
            let anchor = map.resolve(at)?;
            let i = map.place(
                Placement::Insert,
                Section::Tempo(TempoPoint::new(tempo, anchor)),
            )?;
            map.tempo_section(i)
        })
    }

    /// Insert a tempo section, replacing any tempo section at the same
    /// position.
    pub fn set_tempo(&mut self, tempo: Tempo, at: TimePosition) -> Result<TempoPoint, TempoMapError> {
        self.transact("set tempo", |map| {
            let anchor = map.resolve(at)?;
            let i = map.place(
                Placement::Upsert,
                Section::Tempo(TempoPoint::new(tempo, anchor)),
            )?;
            map.tempo_section(i)
        })
    }

    /// Replace `existing` with `tempo` placed at `at`.
    ///
    /// The position is resolved against the map as it is before `existing`
    /// is removed. The initial tempo section can be given a new value but
    /// cannot be moved.
    pub fn replace_tempo(
        &mut self,
        existing: &TempoPoint,
        tempo: Tempo,
        at: TimePosition,
    ) -> Result<TempoPoint, TempoMapError> {
        self.transact("replace tempo", |map| {
            let anchor = map.resolve(at)?;
            map.take_for_replacement(SectionKind::Tempo, existing.sample(), anchor)?;

            let i = map.place(
                Placement::Upsert,
                Section::Tempo(TempoPoint::new(tempo, anchor)),
            )?;
            map.tempo_section(i)
        })
    }

    /// Give `existing` a new tempo without moving it.
    pub fn change_tempo(&mut self, existing: &TempoPoint, tempo: Tempo) -> Result<TempoPoint, TempoMapError> {
        self.transact("change tempo", |map| {
            let i = map.locate(SectionKind::Tempo, existing.sample())?;
            map.modify(i, |section| {
                if let Section::Tempo(t) = section {
                    t.tempo = tempo;
                }
            })?;
            map.tempo_section(i)
        })
    }

    /// Turn the ramp of `existing` on or off.
    ///
    /// A ramp always ends at the start tempo of the following tempo section
    /// and follows it when that section changes, moves or goes away. On the
    /// last tempo section the ramp has no effect until a later tempo
    /// section is added.
    pub fn set_ramped(&mut self, existing: &TempoPoint, ramped: bool) -> Result<TempoPoint, TempoMapError> {
        self.transact("set ramped", |map| {
            let i = map.locate(SectionKind::Tempo, existing.sample())?;

            let current = *map.tempo_section(i)?.tempo();
            // The end tempo is filled in when the map is recomputed.
            let end = ramped.then_some(current.quarters_per_minute());

            let tempo = current.with_ramp_to(end)?;
            map.modify(i, |section| {
                if let Section::Tempo(t) = section {
                    t.tempo = tempo;
                }
            })?;
            map.tempo_section(i)
        })
    }

    /// Remove a tempo section. The initial tempo section cannot be removed.
    pub fn remove_tempo(&mut self, existing: &TempoPoint) -> Result<(), TempoMapError> {
        self.transact("remove tempo", |map| {
            map.remove_section(SectionKind::Tempo, existing.sample())
        })
    }

    /// Insert a new meter section.
    ///
    /// The meter starts a new bar at the position `at` resolves to. Fails
    /// with [`TempoMapError::DuplicateSection`] if a meter section already
    /// exists at that exact sample.
    pub fn add_meter(&mut self, meter: Meter, at: TimePosition) -> Result<MeterPoint, TempoMapError> {
        self.transact("add meter", |map| {
            let anchor = map.resolve(at)?;
            let i = map.place(
                Placement::Insert,
                Section::Meter(MeterPoint::new(meter, anchor)),
            )?;
            map.meter_section(i)
        })
    }

    /// Insert a meter section, replacing any meter section at the same
    /// position.
    pub fn set_meter(&mut self, meter: Meter, at: TimePosition) -> Result<MeterPoint, TempoMapError> {
        self.transact("set meter", |map| {
            let anchor = map.resolve(at)?;
            let i = map.place(
                Placement::Upsert,
                Section::Meter(MeterPoint::new(meter, anchor)),
            )?;
            map.meter_section(i)
        })
    }

    /// Replace `existing` with `meter` placed at `at`.
    ///
    /// The position is resolved against the map as it is before `existing`
    /// is removed. The initial meter section can be given a new value but
    /// cannot be moved.
    pub fn replace_meter(
        &mut self,
        existing: &MeterPoint,
        meter: Meter,
        at: TimePosition,
    ) -> Result<MeterPoint, TempoMapError> {
        self.transact("replace meter", |map| {
            let anchor = map.resolve(at)?;
            map.take_for_replacement(SectionKind::Meter, existing.sample(), anchor)?;

            let i = map.place(
                Placement::Upsert,
                Section::Meter(MeterPoint::new(meter, anchor)),
            )?;
            map.meter_section(i)
        })
    }

    /// Remove a meter section. The initial meter section cannot be removed.
    pub fn remove_meter(&mut self, existing: &MeterPoint) -> Result<(), TempoMapError> {
        self.transact("remove meter", |map| {
            map.remove_section(SectionKind::Meter, existing.sample())
        })
    }

    /// Move every section to the equivalent sample position at `sample_rate`.
    ///
    /// Pulse and BBT positions of the sections are kept.
    pub fn set_sample_rate(&mut self, sample_rate: NonZeroU32) -> Result<(), TempoMapError> {
        if sample_rate == self.sample_rate {
            return Ok(());
        }

        self.transact("set sample rate", |map| {
            let ratio = f64::from(sample_rate.get()) / map.sample_rate_f64();

            for section in map.sections.iter_mut() {
                let anchor = section.anchor_mut();
                anchor.sample = (anchor.sample as f64 * ratio).round() as i64;
            }

            map.sample_rate = sample_rate;
            map.reset_starting_at(0)?;
            Ok(())
        })
    }

    /// Open a gap of `amount` samples at `at` by moving every section at or
    /// after `at` later. The initial sections never move.
    pub fn insert_time(&mut self, at: i64, amount: i64) -> Result<(), TempoMapError> {
        if amount < 0 {
            return Err(TempoMapError::OutOfRange(TimePosition::Samples(amount)));
        }
        if amount == 0 {
            return Ok(());
        }

        self.transact("insert time", |map| {
            let from = at.max(1);

            for section in map.sections.iter_mut() {
                let anchor = section.anchor_mut();
                if anchor.sample >= from {
                    anchor.sample = anchor
                        .sample
                        .checked_add(amount)
                        .ok_or(TempoMapError::OutOfRange(TimePosition::Samples(anchor.sample)))?;
                }
            }

            map.reset_starting_at(from)?;
            Ok(())
        })
    }

    /// Run `edit` on a copy of the map and keep the result only if the edit
    /// succeeded and the copy is still consistent.
    fn transact<R>(
        &mut self,
        what: &str,
        edit: impl FnOnce(&mut Self) -> Result<R, TempoMapError>,
    ) -> Result<R, TempoMapError> {
        let mut next = self.clone();

        let res = edit(&mut next).and_then(|r| {
            next.check_invariants()?;
            Ok(r)
        });

        match res {
            Ok(r) => {
                *self = next;
                log::debug!(
                    "tempo map: {what} applied ({} tempo, {} meter sections)",
                    self.tempos.len(),
                    self.meters.len()
                );
                Ok(r)
            }
            Err(e) => {
                if let TempoMapError::Internal(_) = e {
                    log::error!("tempo map: {what} left the map inconsistent: {e}");
                } else {
                    log::warn!("tempo map: {what} rejected: {e}");
                }
                Err(e)
            }
        }
    }

    /// Put `section` into the sequence at its anchor and recompute
    /// everything after it. Returns the index of the section.
    fn place(&mut self, placement: Placement, mut section: Section) -> Result<usize, TempoMapError> {
        let kind = section.kind();
        let sample = section.sample();

        if let Some(i) = self.find_coincident(kind, sample) {
            let existing = *self.sections[i].anchor();

            if placement == Placement::Insert && existing.sample == sample {
                return Err(TempoMapError::DuplicateSection { kind, sample });
            }

            // Coincident sections are merged into the existing position.
            *section.anchor_mut() = existing;
            self.sections[i] = section;
            self.reset_starting_at(existing.sample)?;

            return Ok(i);
        }

        let i = self
            .sections
            .partition_point(|s| s.order_key() < section.order_key());
        self.sections.insert(i, section);
        self.reset_starting_at(sample)?;

        Ok(i)
    }

    /// Remove the section of `kind` at `sample` so that a replacement can be
    /// placed at `target`. The initial section is kept in place and only
    /// allowed to be replaced where it is.
    fn take_for_replacement(
        &mut self,
        kind: SectionKind,
        sample: i64,
        target: Anchor,
    ) -> Result<(), TempoMapError> {
        self.locate(kind, sample)?;

        if sample == 0 {
            if target.sample > self.coincidence_epsilon {
                return Err(TempoMapError::ProtectedOrigin(kind));
            }
            return Ok(());
        }

        self.remove_section(kind, sample)
    }

    fn remove_section(&mut self, kind: SectionKind, sample: i64) -> Result<(), TempoMapError> {
        let i = self.locate(kind, sample)?;

        if sample == 0 {
            return Err(TempoMapError::ProtectedOrigin(kind));
        }

        self.sections.remove(i);
        self.reset_starting_at(sample)?;

        Ok(())
    }

    fn modify(&mut self, i: usize, f: impl FnOnce(&mut Section)) -> Result<(), TempoMapError> {
        f(&mut self.sections[i]);
        let sample = self.sections[i].sample();
        self.reset_starting_at(sample)?;
        Ok(())
    }

    fn locate(&self, kind: SectionKind, sample: i64) -> Result<usize, TempoMapError> {
        self.find(kind, sample)
            .ok_or(TempoMapError::SectionNotFound { kind, sample })
    }

    fn tempo_section(&self, i: usize) -> Result<TempoPoint, TempoMapError> {
        self.sections[i]
            .as_tempo()
            .copied()
            .ok_or(TempoMapError::Internal(InconsistencyError::Misordered { index: i }))
    }

    fn meter_section(&self, i: usize) -> Result<MeterPoint, TempoMapError> {
        self.sections[i]
            .as_meter()
            .copied()
            .ok_or(TempoMapError::Internal(InconsistencyError::Misordered { index: i }))
    }

    /// Recompute the pulse and BBT anchors of every section that a change
    /// at `sample` can affect, from their sample anchors.
    ///
    /// A change at `sample` alters the span of the tempo section governing
    /// the samples just before it, so recomputation starts right after that
    /// tempo section.
    pub(crate) fn reset_starting_at(&mut self, sample: i64) -> Result<(), InconsistencyError> {
        self.rebuild_indices();
        self.retarget_ramps();

        let sample_rate = self.sample_rate_f64();
        let first = self.tempos[self.tempo_index_at_sample(sample - 1)] + 1;

        for i in first..self.sections.len() {
            let section_sample = self.sections[i].sample();

            let n = self
                .tempos
                .partition_point(|&t| t < i)
                .checked_sub(1)
                .ok_or(InconsistencyError::BracketNotFound)?;
            let m = self
                .meters
                .partition_point(|&j| j < i)
                .checked_sub(1)
                .ok_or(InconsistencyError::BracketNotFound)?;

            let (tempo, next_sample) = self.tempo_bracket(n);
            let pulse = tempo.pulse_at(section_sample, next_sample, sample_rate);

            let governing = self.meter(m);
            let bbt = match self.sections[i] {
                Section::Tempo(_) => governing.bbt_at(pulse),
                // A meter always starts a new bar, truncating the bar it
                // interrupts.
                Section::Meter(_) => governing.meter().round_up_to_bar(&governing.bbt_at(pulse)),
            };

            log::trace!(
                "tempo map: {} section {i} anchored at sample {section_sample}, pulse {pulse}, {bbt}",
                self.sections[i].kind()
            );

            *self.sections[i].anchor_mut() = Anchor {
                sample: section_sample,
                pulse,
                bbt,
            };
        }

        Ok(())
    }

    /// Aim every ramp at the start tempo of the tempo section after it.
    fn retarget_ramps(&mut self) {
        for pair in self.tempos.windows(2) {
            let next_qpm = match &self.sections[pair[1]] {
                Section::Tempo(t) => t.tempo.quarters_per_minute(),
                Section::Meter(_) => continue,
            };

            if let Section::Tempo(t) = &mut self.sections[pair[0]] {
                t.tempo.retarget_ramp(next_qpm);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::{bbt::BbtTime, map::TempoMapConfig};

    fn bbt(bars: i32, beats: i32, ticks: i32) -> BbtTime {
        BbtTime::new(bars, beats, ticks).unwrap()
    }

    fn tempo(qpm: f64) -> Tempo {
        Tempo::new(qpm).unwrap()
    }

    #[test]
    fn set_replaces_and_add_rejects_duplicates() {
        let mut map = TempoMap::default();
        map.add_tempo(tempo(140.0), TimePosition::Samples(96_000))
            .unwrap();

        map.set_tempo(tempo(150.0), TimePosition::Samples(96_000))
            .unwrap();
        assert_eq!(map.n_tempos(), 2);
        assert_eq!(map.tempo_at(96_000).tempo().quarters_per_minute(), 150.0);

        let before = map.clone();
        assert_eq!(
            map.add_tempo(tempo(160.0), TimePosition::Samples(96_000)),
            Err(TempoMapError::DuplicateSection {
                kind: SectionKind::Tempo,
                sample: 96_000
            })
        );
        assert_eq!(map, before);
    }

    #[test]
    fn near_coincident_insert_replaces() {
        let mut map = TempoMap::new(TempoMapConfig {
            coincidence_epsilon: 10,
            ..Default::default()
        });
        map.add_tempo(tempo(140.0), TimePosition::Samples(96_000))
            .unwrap();

        let tp = map
            .add_tempo(tempo(90.0), TimePosition::Samples(96_007))
            .unwrap();
        assert_eq!(tp.sample(), 96_000);
        assert_eq!(map.n_tempos(), 2);

        // Outside the epsilon a new section is inserted.
        map.add_tempo(tempo(80.0), TimePosition::Samples(96_011))
            .unwrap();
        assert_eq!(map.n_tempos(), 3);
    }

    #[test]
    fn negative_positions_are_rejected() {
        let mut map = TempoMap::default();

        assert_eq!(
            map.add_tempo(tempo(100.0), TimePosition::Samples(-1)),
            Err(TempoMapError::OutOfRange(TimePosition::Samples(-1)))
        );
        assert!(map
            .add_meter(Meter::COMMON, TimePosition::Pulses(-4.0))
            .is_err());
        assert_eq!(map, TempoMap::default());
    }

    #[test]
    fn origin_is_protected() {
        let mut map = TempoMap::default();
        let origin_tempo = *map.tempo_at(0);
        let origin_meter = *map.meter_at(0);

        assert_eq!(
            map.remove_tempo(&origin_tempo),
            Err(TempoMapError::ProtectedOrigin(SectionKind::Tempo))
        );
        assert_eq!(
            map.remove_meter(&origin_meter),
            Err(TempoMapError::ProtectedOrigin(SectionKind::Meter))
        );
        assert_eq!(
            map.replace_tempo(&origin_tempo, tempo(90.0), TimePosition::Samples(48_000)),
            Err(TempoMapError::ProtectedOrigin(SectionKind::Tempo))
        );

        // Replacing in place is allowed.
        map.replace_tempo(&origin_tempo, tempo(90.0), TimePosition::Samples(0))
            .unwrap();
        assert_eq!(map.tempo_at(0).tempo().quarters_per_minute(), 90.0);
        assert_eq!(map.n_tempos(), 1);
    }

    #[test]
    fn missing_sections_are_reported() {
        let mut map = TempoMap::default();
        let mut other = TempoMap::default();
        let stray = other
            .add_tempo(tempo(100.0), TimePosition::Samples(1_000))
            .unwrap();

        assert_eq!(
            map.remove_tempo(&stray),
            Err(TempoMapError::SectionNotFound {
                kind: SectionKind::Tempo,
                sample: 1_000
            })
        );
    }

    #[test]
    fn downstream_anchors_follow_tempo_changes() {
        let mut map = TempoMap::default();
        let tp = map
            .add_tempo(tempo(240.0), TimePosition::Bbt(bbt(2, 1, 0)))
            .unwrap();
        let mp = map
            .add_meter(Meter::new(3, 4).unwrap(), TimePosition::Samples(144_000))
            .unwrap();

        assert_eq!(tp.sample(), 96_000);
        assert_eq!(mp.pulse(), 8.0);
        assert_eq!(*mp.bbt(), bbt(3, 1, 0));

        // Slowing down the first bar moves pulses, never samples. The meter
        // now falls on beat 3 of bar 2 and truncates that bar.
        let origin = *map.tempo_at(0);
        map.change_tempo(&origin, tempo(60.0)).unwrap();

        let mp = *map.meter_at(144_000);
        assert_eq!(mp.sample(), 144_000);
        assert_eq!(mp.pulse(), 6.0);
        assert_eq!(*mp.bbt(), bbt(3, 1, 0));
        assert_eq!(map.check_invariants(), Ok(()));
    }

    #[test]
    fn meter_off_the_bar_line_starts_a_new_bar() {
        let mut map = TempoMap::default();

        // Beat 3 of bar 2 under 4/4.
        let mp = map
            .add_meter(Meter::new(3, 4).unwrap(), TimePosition::Samples(144_000))
            .unwrap();
        assert_eq!(*mp.bbt(), bbt(3, 1, 0));
        assert_eq!(mp.pulse(), 6.0);

        assert_eq!(map.sample_to_bbt(120_000), Ok(bbt(2, 2, 0)));
        assert_eq!(map.sample_to_bbt(144_000 + 3 * 24_000), Ok(bbt(4, 1, 0)));
    }

    #[test]
    fn replace_resolves_position_before_removal() {
        let mut map = TempoMap::default();
        let tp = map
            .add_tempo(tempo(240.0), TimePosition::Bbt(bbt(2, 1, 0)))
            .unwrap();

        // Bar 3 lies at sample 144000 while the 240 qpm section exists, and
        // would lie at 192000 without it.
        let moved = map
            .replace_tempo(&tp, tempo(200.0), TimePosition::Bbt(bbt(3, 1, 0)))
            .unwrap();
        assert_eq!(moved.sample(), 144_000);
        assert_eq!(map.n_tempos(), 2);
        assert_eq!(map.tempo_at(100_000).tempo().quarters_per_minute(), 120.0);
    }

    #[test]
    fn removing_restores_downstream_positions() {
        let mut map = TempoMap::default();
        let tp = map
            .add_tempo(tempo(240.0), TimePosition::Samples(96_000))
            .unwrap();
        let tp2 = map
            .add_tempo(tempo(100.0), TimePosition::Samples(192_000))
            .unwrap();
        assert_eq!(tp2.pulse(), 12.0);

        map.remove_tempo(&tp).unwrap();
        assert_eq!(map.tempo_at(192_000).pulse(), 8.0);
        assert_eq!(map.tempo_at(192_000).anchor().bbt, bbt(3, 1, 0));
    }

    #[test]
    fn ramps_end_at_the_next_tempo() {
        let mut map = TempoMap::default();
        map.add_tempo(tempo(240.0), TimePosition::Samples(96_000))
            .unwrap();

        let origin = *map.tempo_at(0);
        let ramped = map.set_ramped(&origin, true).unwrap();
        assert_eq!(ramped.tempo().end_quarters_per_minute(), 240.0);
        assert_abs_diff_eq!(map.quarters_per_minute_at(48_000), 180.0);
        assert_abs_diff_eq!(map.tempo_at(96_000).pulse(), 6.0, epsilon = 1e-9);

        let constant = map.set_ramped(&ramped, false).unwrap();
        assert!(!constant.tempo().is_ramped());
        assert_eq!(map.tempo_at(96_000).pulse(), 4.0);
    }

    /// Origin ramped towards 240 qpm at sample 96000.
    fn ramped_to_240() -> TempoMap {
        let mut map = TempoMap::default();
        map.add_tempo(tempo(240.0), TimePosition::Samples(96_000))
            .unwrap();
        let origin = *map.tempo_at(0);
        map.set_ramped(&origin, true).unwrap();
        map
    }

    #[test]
    fn ramps_follow_a_changed_next_tempo() {
        let mut map = ramped_to_240();

        let next = *map.tempo_at(96_000);
        map.change_tempo(&next, tempo(60.0)).unwrap();

        assert_eq!(map.tempo_at(0).tempo().end_quarters_per_minute(), 60.0);
        assert_abs_diff_eq!(map.quarters_per_minute_at(95_999), 60.0, epsilon = 1e-2);

        // 120 -> 60 over two seconds averages 90 qpm.
        assert_abs_diff_eq!(map.tempo_at(96_000).pulse(), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn ramps_follow_a_removed_next_tempo() {
        let mut map = ramped_to_240();
        map.add_tempo(tempo(60.0), TimePosition::Samples(192_000))
            .unwrap();

        let next = *map.tempo_at(96_000);
        map.remove_tempo(&next).unwrap();

        assert_eq!(map.tempo_at(0).tempo().end_quarters_per_minute(), 60.0);
        // 120 -> 60 over four seconds.
        assert_abs_diff_eq!(map.tempo_at(192_000).pulse(), 6.0, epsilon = 1e-9);
        assert_eq!(map.check_invariants(), Ok(()));
    }

    #[test]
    fn ramps_end_at_a_tempo_inserted_inside_them() {
        let mut map = ramped_to_240();

        map.add_tempo(tempo(180.0), TimePosition::Samples(48_000))
            .unwrap();

        assert_eq!(map.tempo_at(0).tempo().end_quarters_per_minute(), 180.0);
        assert_abs_diff_eq!(map.quarters_per_minute_at(47_999), 180.0, epsilon = 1e-2);
        // One second averaging 150 qpm, then one second at 180 qpm.
        assert_abs_diff_eq!(map.tempo_at(48_000).pulse(), 2.5, epsilon = 1e-9);
        assert_abs_diff_eq!(map.tempo_at(96_000).pulse(), 5.5, epsilon = 1e-9);
    }

    #[test]
    fn inserting_time_moves_later_sections() {
        let mut map = TempoMap::default();
        map.add_tempo(tempo(240.0), TimePosition::Samples(96_000))
            .unwrap();
        map.add_meter(Meter::new(3, 4).unwrap(), TimePosition::Samples(192_000))
            .unwrap();

        map.insert_time(48_000, 48_000).unwrap();

        let tp = *map.tempo_at(144_000);
        assert_eq!(tp.sample(), 144_000);
        assert_eq!(tp.pulse(), 6.0);
        assert_eq!(map.meter_at(240_000).sample(), 240_000);
        assert_eq!(map.tempo_at(0).sample(), 0);
        assert_eq!(map.check_invariants(), Ok(()));

        // Time inserted at the origin leaves the initial sections in place.
        map.insert_time(0, 1_000).unwrap();
        assert_eq!(map.n_tempos(), 2);
        assert_eq!(map.tempo_at(145_000).sample(), 145_000);
        assert_eq!(map.sections()[0].sample(), 0);
        assert_eq!(map.sections()[1].sample(), 0);
    }

    #[test]
    fn inserting_time_stretches_ramps() {
        let mut map = ramped_to_240();

        map.insert_time(50_000, 96_000).unwrap();

        // 120 -> 240 over four seconds averages 180 qpm.
        assert_abs_diff_eq!(map.tempo_at(192_000).pulse(), 12.0, epsilon = 1e-9);
    }

    #[test]
    fn inserting_negative_time_is_rejected() {
        let mut map = ramped_to_240();
        let before = map.clone();

        assert_eq!(
            map.insert_time(0, -1),
            Err(TempoMapError::OutOfRange(TimePosition::Samples(-1)))
        );
        map.insert_time(10, 0).unwrap();
        assert_eq!(map, before);
    }

    #[test]
    fn sample_rate_changes_keep_musical_positions() {
        let mut map = TempoMap::default();
        map.add_tempo(tempo(240.0), TimePosition::Samples(96_000))
            .unwrap();
        map.add_meter(Meter::new(7, 8).unwrap(), TimePosition::Samples(144_000))
            .unwrap();

        map.set_sample_rate(NonZeroU32::new(96_000).unwrap()).unwrap();

        assert_eq!(map.tempo_at(192_000).sample(), 192_000);
        assert_eq!(map.tempo_at(192_000).pulse(), 4.0);
        assert_eq!(map.meter_at(288_000).pulse(), 8.0);
        assert_eq!(*map.meter_at(288_000).bbt(), bbt(3, 1, 0));
    }
}
