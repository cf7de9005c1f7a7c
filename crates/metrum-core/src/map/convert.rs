use crate::{
    bbt::{round_half_up, BbtOffset, BbtTime, TICKS_PER_BEAT},
    error::TempoMapError,
    meter::Meter,
    section::{Anchor, TimePosition},
};

use super::TempoMap;

impl TempoMap {
    /// The pulse (quarter notes since the origin) at `sample`.
    ///
    /// Samples before the origin are converted at the origin's start tempo,
    /// giving negative pulses.
    pub fn sample_to_pulse(&self, sample: i64) -> f64 {
        let n = self.tempo_index_at_sample(sample);
        let (tempo, next_sample) = self.tempo_bracket(n);
        tempo.pulse_at(sample, next_sample, self.sample_rate_f64())
    }

    /// The sample position of `pulse`, rounded to the nearest sample.
    pub fn pulse_to_sample(&self, pulse: f64) -> Result<i64, TempoMapError> {
        if !pulse.is_finite() {
            return Err(TempoMapError::OutOfRange(TimePosition::Pulses(pulse)));
        }

        let n = self.tempo_index_at_pulse(pulse);
        let (tempo, next_sample) = self.tempo_bracket(n);
        let offset = tempo.samples_to(pulse, next_sample, self.sample_rate_f64())?;

        Ok(tempo.sample() + round_half_up(offset) as i64)
    }

    /// The BBT position of `pulse`.
    ///
    /// BBT time is undefined before the origin, so a negative pulse is
    /// rejected.
    pub fn pulse_to_bbt(&self, pulse: f64) -> Result<BbtTime, TempoMapError> {
        if !(pulse >= 0.0) || !pulse.is_finite() {
            return Err(TempoMapError::OutOfRange(TimePosition::Pulses(pulse)));
        }

        let meter = self.meter(self.meter_index_at_pulse(pulse));
        Ok(meter.bbt_at(pulse))
    }

    /// The pulse of `bbt`, measured under the meter section governing it.
    ///
    /// Positions that do not exist are [`TempoMapError::OutOfRange`]: beats
    /// past the meter's numerator, and beats of a bar that the next meter
    /// section cut short.
    pub fn bbt_to_pulse(&self, bbt: &BbtTime) -> Result<f64, TempoMapError> {
        let out_of_range = || TempoMapError::OutOfRange(TimePosition::Bbt(*bbt));

        let n = self.meter_index_at_bbt(bbt);
        let meter = self.meter(n);

        if bbt.beats() as u32 > meter.meter().numerator() {
            return Err(out_of_range());
        }

        let pulse = meter.pulse_at(bbt);
        if n + 1 < self.meters.len() && pulse >= self.meter(n + 1).pulse() {
            return Err(out_of_range());
        }

        Ok(pulse)
    }

    pub fn sample_to_bbt(&self, sample: i64) -> Result<BbtTime, TempoMapError> {
        if sample < 0 {
            return Err(TempoMapError::OutOfRange(TimePosition::Samples(sample)));
        }

        self.pulse_to_bbt(self.sample_to_pulse(sample))
    }

    pub fn bbt_to_sample(&self, bbt: &BbtTime) -> Result<i64, TempoMapError> {
        self.pulse_to_sample(self.bbt_to_pulse(bbt)?)
    }

    /// Resolve a position given in any time domain to a full anchor.
    ///
    /// The sample position is resolved first and the pulse and BBT positions
    /// are derived from it, so the result agrees with what the map would
    /// compute for a section placed there.
    pub fn resolve(&self, position: TimePosition) -> Result<Anchor, TempoMapError> {
        let sample = match position {
            TimePosition::Samples(sample) => sample,
            TimePosition::Pulses(pulse) => {
                if !(pulse >= 0.0) {
                    return Err(TempoMapError::OutOfRange(position));
                }
                self.pulse_to_sample(pulse)?
            }
            TimePosition::Bbt(bbt) => self.bbt_to_sample(&bbt)?,
        };

        if sample < 0 {
            return Err(TempoMapError::OutOfRange(position));
        }

        let pulse = self.sample_to_pulse(sample);

        Ok(Anchor {
            sample,
            pulse,
            bbt: self.pulse_to_bbt(pulse)?,
        })
    }

    /// The number of quarter notes covered by the `distance` samples
    /// starting at `start`.
    ///
    /// The walk is accumulated one tempo section at a time, so walks across
    /// section boundaries stay additive. A negative distance walks backwards
    /// and yields the negated beat count of the forward walk over the same
    /// span. Walks past the ends of the `i64` range stop there.
    pub fn framewalk_to_beats(&self, start: i64, distance: i64) -> f64 {
        let end = start.saturating_add(distance);

        if end < start {
            -self.quarters_between(end, start)
        } else {
            self.quarters_between(start, end)
        }
    }

    /// Quarter notes from `from` up to `to`, which must not lie before
    /// `from`.
    fn quarters_between(&self, from: i64, to: i64) -> f64 {
        let sample_rate = self.sample_rate_f64();
        let mut n = self.tempo_index_at_sample(from);
        let mut position = from;
        let mut beats = 0.0;

        while position < to {
            let (tempo, next_sample) = self.tempo_bracket(n);

            let step_end = match next_sample {
                Some(next) if next < to => next,
                _ => to,
            };

            beats += tempo.pulses_to(step_end, next_sample, sample_rate)
                - tempo.pulses_to(position, next_sample, sample_rate);

            position = step_end;
            n += 1;
        }

        beats
    }

    /// The sample position `quarter_notes` before `sample`.
    ///
    /// The result may lie before the origin.
    pub fn samplepos_minus_qn(&self, sample: i64, quarter_notes: f64) -> Result<i64, TempoMapError> {
        self.pulse_to_sample(self.sample_to_pulse(sample) - quarter_notes)
    }

    /// The sample position `quarter_notes` after `sample`.
    pub fn samplepos_plus_qn(&self, sample: i64, quarter_notes: f64) -> Result<i64, TempoMapError> {
        self.pulse_to_sample(self.sample_to_pulse(sample) + quarter_notes)
    }

    /// The sample position `offset` after `sample`.
    ///
    /// Bars and beats are counted in the meter in effect where they are
    /// walked. A bar or beat that a meter section cuts short ends at that
    /// meter section. Ticks are measured in beats of the meter reached
    /// after the bars and beats.
    pub fn samplepos_plus_bbt(&self, sample: i64, offset: &BbtOffset) -> Result<i64, TempoMapError> {
        let pulse = self.sample_to_pulse(sample);
        let pulse = self.advance_pulse(pulse, offset.bars(), Meter::quarters_per_bar);
        let pulse = self.advance_pulse(pulse, offset.beats(), Meter::quarters_per_beat);

        let meter = self.meter(self.meter_index_at_pulse(pulse)).meter();
        let ticks = f64::from(offset.ticks()) / f64::from(TICKS_PER_BEAT);

        self.pulse_to_sample(pulse + ticks * meter.quarters_per_beat())
    }

    /// Move `pulse` forward by `count` units, each `unit` quarter notes long
    /// under the meter in effect.
    fn advance_pulse(&self, mut pulse: f64, count: i32, unit: fn(&Meter) -> f64) -> f64 {
        const TOLERANCE: f64 = 1e-9;

        let mut left = i64::from(count);

        while left > 0 {
            let n = self.meter_index_at_pulse(pulse);
            let step = unit(self.meter(n).meter());

            if n + 1 >= self.meters.len() {
                return pulse + left as f64 * step;
            }
            let next = self.meter(n + 1).pulse();

            let whole = (((next - pulse) / step + TOLERANCE).floor() as i64).max(0);
            if whole >= left {
                return pulse + left as f64 * step;
            }

            let reached = pulse + whole as f64 * step;
            left -= whole;
            if next - reached > TOLERANCE {
                // This unit was cut short by the meter section.
                left -= 1;
            }

            pulse = next;
        }

        pulse
    }

    /// Move `bbt` forward by `offset`.
    ///
    /// Bars are added first. Beats and ticks are then added, and beats that
    /// overflow a bar carry into the next bar according to the meter in
    /// effect at that bar.
    pub fn bbt_walk(&self, bbt: &BbtTime, offset: &BbtOffset) -> BbtTime {
        let ticks = bbt.ticks() + offset.ticks();
        let mut bars = bbt.bars() + offset.bars();
        // Zero-based beat within `bars`.
        let mut beats = i64::from(bbt.beats() - 1)
            + i64::from(offset.beats())
            + i64::from(ticks / TICKS_PER_BEAT);

        loop {
            let n = self.meter_index_at_bar(bars);
            let per_bar = i64::from(self.meter(n).meter().numerator());
            let whole_bars = beats / per_bar;

            let bars_left_in_meter = self
                .meters
                .get(n + 1)
                .map(|&i| i64::from(self.sections[i].anchor().bbt.bars() - bars));

            match bars_left_in_meter {
                Some(left) if whole_bars >= left => {
                    bars += left as i32;
                    beats -= left * per_bar;
                }
                _ => {
                    bars += whole_bars as i32;
                    beats -= whole_bars * per_bar;
                    break;
                }
            }
        }

        BbtTime::new_unchecked(bars, beats as i32 + 1, ticks % TICKS_PER_BEAT)
    }

    /// Move `bbt` backward by `offset`, borrowing beats from earlier bars
    /// according to the meter in effect at each bar.
    pub fn bbt_walk_back(&self, bbt: &BbtTime, offset: &BbtOffset) -> Result<BbtTime, TempoMapError> {
        let out_of_range = || TempoMapError::OutOfRange(TimePosition::Bbt(*bbt));

        let tpb = i64::from(TICKS_PER_BEAT);
        let total_ticks = i64::from(bbt.ticks()) - i64::from(offset.ticks());
        let ticks = total_ticks.rem_euclid(tpb);

        let mut bars = bbt.bars() - offset.bars();
        let mut beats =
            i64::from(bbt.beats() - 1) - i64::from(offset.beats()) + total_ticks.div_euclid(tpb);

        if bars < 1 {
            return Err(out_of_range());
        }

        while beats < 0 {
            if bars <= 1 {
                return Err(out_of_range());
            }

            // Borrow from the bars before `bars` that share one meter.
            let n = self.meter_index_at_bar(bars - 1);
            let meter = self.meter(n);
            let per_bar = i64::from(meter.meter().numerator());
            let available = i64::from(bars - meter.bbt().bars().max(1)).max(1);
            let needed = (-beats + per_bar - 1) / per_bar;
            let borrowed = needed.min(available);

            bars -= borrowed as i32;
            beats += borrowed * per_bar;
        }

        Ok(BbtTime::new_unchecked(bars, beats as i32 + 1, ticks as i32))
    }

    /// The BBT duration of `distance` samples starting at `start`.
    ///
    /// The beat count is expressed in beats of the meter in effect at
    /// `start`.
    pub fn bbt_duration_at(&self, start: i64, distance: i64) -> Result<BbtOffset, TempoMapError> {
        let quarters = self.framewalk_to_beats(start, distance);
        let meter = self.meter_at(start).meter();

        BbtOffset::from_quarter_notes(quarters / meter.quarters_per_beat())
            .map_err(TempoMapError::from)
    }
}
