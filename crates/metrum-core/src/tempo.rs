//! Tempo values and tempo sections.

use crate::{
    error::{InconsistencyError, TempoMapError},
    section::Anchor,
};

/// A tempo in quarter notes per minute, either constant or ramping
/// linearly (in sample time) towards an end tempo.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tempo {
    quarters_per_minute: f64,
    end_quarters_per_minute: f64,
    ramped: bool,
}

impl Tempo {
    /// A constant tempo.
    pub fn new(quarters_per_minute: f64) -> Result<Self, TempoMapError> {
        validate_qpm(quarters_per_minute)?;

        Ok(Self {
            quarters_per_minute,
            end_quarters_per_minute: quarters_per_minute,
            ramped: false,
        })
    }

    /// A tempo that ramps from `start` to `end` over the span up to the
    /// next tempo section.
    ///
    /// Once the tempo is part of a [`TempoMap`](crate::map::TempoMap), `end`
    /// is kept equal to the start tempo of the next tempo section.
    pub fn ramped(start: f64, end: f64) -> Result<Self, TempoMapError> {
        validate_qpm(start)?;
        validate_qpm(end)?;

        Ok(Self {
            quarters_per_minute: start,
            end_quarters_per_minute: end,
            ramped: true,
        })
    }

    #[inline]
    pub fn quarters_per_minute(&self) -> f64 {
        self.quarters_per_minute
    }

    /// Equal to [`Tempo::quarters_per_minute`] for constant tempos.
    #[inline]
    pub fn end_quarters_per_minute(&self) -> f64 {
        self.end_quarters_per_minute
    }

    #[inline]
    pub fn is_ramped(&self) -> bool {
        self.ramped
    }

    /// Make this tempo ramp towards `end`, or become constant if `end` is
    /// `None`.
    pub fn with_ramp_to(self, end: Option<f64>) -> Result<Self, TempoMapError> {
        match end {
            Some(end) => Self::ramped(self.quarters_per_minute, end),
            None => Self::new(self.quarters_per_minute),
        }
    }

    /// Point a ramp at `end`. Constant tempos are left untouched.
    pub(crate) fn retarget_ramp(&mut self, end: f64) {
        if self.ramped {
            self.end_quarters_per_minute = end;
        }
    }

    pub fn samples_per_quarter_note(&self, sample_rate: f64) -> f64 {
        sample_rate * 60.0 / self.quarters_per_minute
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            quarters_per_minute: 120.0,
            end_quarters_per_minute: 120.0,
            ramped: false,
        }
    }
}

fn validate_qpm(quarters_per_minute: f64) -> Result<(), TempoMapError> {
    if quarters_per_minute.is_finite() && quarters_per_minute > 0.0 {
        Ok(())
    } else {
        Err(TempoMapError::InvalidTempo(quarters_per_minute))
    }
}

/// A tempo anchored on the timeline.
///
/// The tempo governs the span from its anchor up to the next tempo
/// section. Positions before the origin are governed by the origin's
/// start tempo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoPoint {
    pub(crate) tempo: Tempo,
    pub(crate) anchor: Anchor,
}

impl TempoPoint {
    pub(crate) fn new(tempo: Tempo, anchor: Anchor) -> Self {
        Self { tempo, anchor }
    }

    #[inline]
    pub fn tempo(&self) -> &Tempo {
        &self.tempo
    }

    #[inline]
    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    #[inline]
    pub fn sample(&self) -> i64 {
        self.anchor.sample
    }

    #[inline]
    pub fn pulse(&self) -> f64 {
        self.anchor.pulse
    }

    /// The slope of the ramp in quarter notes per minute per sample.
    ///
    /// `next_sample` is the anchor of the following tempo section, if any.
    /// A ramp on the last tempo section has no span and is ignored.
    pub fn ramp_slope(&self, next_sample: Option<i64>) -> f64 {
        match next_sample {
            Some(next) if self.tempo.ramped && next > self.anchor.sample => {
                (self.tempo.end_quarters_per_minute - self.tempo.quarters_per_minute)
                    / (next - self.anchor.sample) as f64
            }
            _ => 0.0,
        }
    }

    /// The instantaneous tempo at `sample`.
    pub fn quarters_per_minute_at(&self, sample: i64, next_sample: Option<i64>) -> f64 {
        let offset = sample.saturating_sub(self.anchor.sample);
        if offset <= 0 {
            return self.tempo.quarters_per_minute;
        }

        let offset = match next_sample {
            Some(next) => offset.min(next - self.anchor.sample),
            None => offset,
        };

        self.tempo.quarters_per_minute + self.ramp_slope(next_sample) * offset as f64
    }

    /// The number of quarter notes between this section's anchor and
    /// `sample`, which may lie before the anchor.
    pub fn pulses_to(&self, sample: i64, next_sample: Option<i64>, sample_rate: f64) -> f64 {
        let offset = sample.saturating_sub(self.anchor.sample);
        let slope = self.ramp_slope(next_sample);
        let start_qpm = self.tempo.quarters_per_minute;

        if slope == 0.0 || offset <= 0 {
            return (offset as f64 * start_qpm) / (60.0 * sample_rate);
        }

        // Integral of a tempo that rises linearly from `start_qpm`.
        let offset = offset as f64;
        (offset * (start_qpm + 0.5 * slope * offset)) / (60.0 * sample_rate)
    }

    pub fn pulse_at(&self, sample: i64, next_sample: Option<i64>, sample_rate: f64) -> f64 {
        self.anchor.pulse + self.pulses_to(sample, next_sample, sample_rate)
    }

    /// The sample offset from this section's anchor at which `pulse` is
    /// reached. This is the inverse of [`TempoPoint::pulses_to`].
    ///
    /// For a ramp, the pulse is a quadratic in the sample offset. While both
    /// tempi are positive the pulse rises strictly, so only the root closest
    /// to the anchor can lie inside the span. That root is chosen; any root
    /// outside the span means the map is inconsistent.
    pub fn samples_to(
        &self,
        pulse: f64,
        next_sample: Option<i64>,
        sample_rate: f64,
    ) -> Result<f64, InconsistencyError> {
        let pulses = pulse - self.anchor.pulse;
        let slope = self.ramp_slope(next_sample);
        let start_qpm = self.tempo.quarters_per_minute;
        let scaled = pulses * 60.0 * sample_rate;

        if slope == 0.0 || pulses <= 0.0 {
            return Ok(scaled / start_qpm);
        }

        // 0.5 * slope * x^2 + start_qpm * x - scaled = 0
        let discriminant = start_qpm * start_qpm + 2.0 * slope * scaled;
        if discriminant < 0.0 {
            log::error!(
                "tempo ramp at sample {} has no root for pulse {}",
                self.anchor.sample,
                pulse
            );
            return Err(InconsistencyError::RampRootOutOfRange {
                pulse,
                offset: f64::NAN,
            });
        }

        // Written this way to avoid cancellation when the slope is tiny.
        let offset = 2.0 * scaled / (start_qpm + discriminant.sqrt());

        if let Some(next) = next_sample {
            let span = (next - self.anchor.sample) as f64;
            if !(offset >= 0.0 && offset <= span + 1.0) {
                log::error!(
                    "tempo ramp at sample {} solved pulse {} to offset {} outside span {}",
                    self.anchor.sample,
                    pulse,
                    offset,
                    span
                );
                return Err(InconsistencyError::RampRootOutOfRange { pulse, offset });
            }
        }

        Ok(offset)
    }
}
