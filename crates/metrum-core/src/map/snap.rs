use crate::{bbt::TICKS_PER_BEAT, error::TempoMapError, meter::Meter, section::TimePosition};

use super::TempoMap;

/// Which grid line a position is snapped to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundDirection {
    /// The closest line at or before the position.
    Down,
    /// The closest line on either side. Half-way rounds up.
    #[default]
    Nearest,
    /// The closest line at or after the position.
    Up,
}

impl TempoMap {
    /// Snap `sample` to a bar line.
    pub fn round_to_bar(&self, sample: i64, direction: RoundDirection) -> Result<i64, TempoMapError> {
        self.round_to_lines(sample, direction, Meter::quarters_per_bar)
    }

    /// Snap `sample` to a beat of the meter in effect.
    pub fn round_to_beat(&self, sample: i64, direction: RoundDirection) -> Result<i64, TempoMapError> {
        self.round_to_lines(sample, direction, Meter::quarters_per_beat)
    }

    /// Snap `sample` to one of `subdivisions` equal parts of a beat. The
    /// parts are whole ticks long and restart at every beat.
    pub fn round_to_beat_subdivision(
        &self,
        sample: i64,
        subdivisions: u32,
        direction: RoundDirection,
    ) -> Result<i64, TempoMapError> {
        if subdivisions == 0 || subdivisions > TICKS_PER_BEAT as u32 {
            return Err(TempoMapError::InvalidSubdivision(subdivisions));
        }
        if sample < 0 {
            return Err(TempoMapError::OutOfRange(TimePosition::Samples(sample)));
        }

        let pulse = self.sample_to_pulse(sample);
        let n = self.meter_index_at_pulse(pulse);
        let meter = self.meter(n);
        let next = self.next_meter_pulse(n);

        let beat = meter.meter().quarters_per_beat();
        let beat_start = meter.pulse() + ((pulse - meter.pulse()) / beat).floor().max(0.0) * beat;
        let beat_end = next.map_or(beat_start + beat, |next| next.min(beat_start + beat));

        let part_ticks = TICKS_PER_BEAT / subdivisions as i32;
        let part = beat * f64::from(part_ticks) / f64::from(TICKS_PER_BEAT);

        self.snap(sample, pulse, beat_start, part, beat_end, direction)
    }

    fn round_to_lines(
        &self,
        sample: i64,
        direction: RoundDirection,
        unit: fn(&Meter) -> f64,
    ) -> Result<i64, TempoMapError> {
        if sample < 0 {
            return Err(TempoMapError::OutOfRange(TimePosition::Samples(sample)));
        }

        let pulse = self.sample_to_pulse(sample);
        let n = self.meter_index_at_pulse(pulse);
        let meter = self.meter(n);
        let limit = self.next_meter_pulse(n).unwrap_or(f64::INFINITY);

        self.snap(sample, pulse, meter.pulse(), unit(meter.meter()), limit, direction)
    }

    fn next_meter_pulse(&self, n: usize) -> Option<f64> {
        (n + 1 < self.meters.len()).then(|| self.meter(n + 1).pulse())
    }

    /// Snap to lines every `unit` quarter notes from `base`. No line lies
    /// past `limit`, which is itself a line.
    fn snap(
        &self,
        sample: i64,
        pulse: f64,
        base: f64,
        unit: f64,
        limit: f64,
        direction: RoundDirection,
    ) -> Result<i64, TempoMapError> {
        let k = ((pulse - base) / unit).floor().max(0.0);
        let line = |k: f64| (base + k * unit).min(limit);

        let below = self.pulse_to_sample(line(k))?;
        let above = self.pulse_to_sample(line(k + 1.0))?;

        // `pulse` may sit a hair below the line `sample` is on.
        let down = if above <= sample { above } else { below };
        let up = if below >= sample { below } else { above };

        Ok(match direction {
            RoundDirection::Down => down,
            RoundDirection::Up => up,
            RoundDirection::Nearest if sample - down < up - sample => down,
            RoundDirection::Nearest => up,
        })
    }
}
