//! Meters (time signatures) and meter sections.

use crate::{
    bbt::{round_half_up, BbtOffset, BbtTime, TICKS_PER_BEAT},
    error::TempoMapError,
    section::Anchor,
};

/// A time signature: `numerator` beats of `1/denominator` notes per bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Meter {
    numerator: u32,
    denominator: u32,
}

impl Meter {
    /// 4/4
    pub const COMMON: Self = Self {
        numerator: 4,
        denominator: 4,
    };

    pub fn new(numerator: u32, denominator: u32) -> Result<Self, TempoMapError> {
        if numerator == 0 || denominator == 0 || numerator > i32::MAX as u32 {
            return Err(TempoMapError::InvalidMeter {
                numerator,
                denominator,
            });
        }

        Ok(Self {
            numerator,
            denominator,
        })
    }

    #[inline]
    pub fn numerator(&self) -> u32 {
        self.numerator
    }

    #[inline]
    pub fn denominator(&self) -> u32 {
        self.denominator
    }

    #[inline]
    fn beats_per_bar(&self) -> i32 {
        self.numerator as i32
    }

    /// The length of one beat in quarter notes.
    #[inline]
    pub fn quarters_per_beat(&self) -> f64 {
        4.0 / f64::from(self.denominator)
    }

    /// The length of one bar in quarter notes.
    #[inline]
    pub fn quarters_per_bar(&self) -> f64 {
        f64::from(self.numerator) * self.quarters_per_beat()
    }

    /// The length of `offset` in quarter notes under this meter.
    pub fn to_quarters(&self, offset: &BbtOffset) -> f64 {
        f64::from(offset.bars()) * self.quarters_per_bar()
            + (f64::from(offset.beats())
                + f64::from(offset.ticks()) / f64::from(TICKS_PER_BEAT))
                * self.quarters_per_beat()
    }

    /// Add `offset` to `bbt`, carrying ticks into beats and beats into bars.
    pub fn bbt_add(&self, bbt: &BbtTime, offset: &BbtOffset) -> BbtTime {
        let ticks = bbt.ticks() + offset.ticks();
        let beats = bbt.beats() - 1 + offset.beats() + ticks / TICKS_PER_BEAT;
        let bars = bbt.bars() + offset.bars() + beats / self.beats_per_bar();

        BbtTime::new_unchecked(
            bars,
            beats % self.beats_per_bar() + 1,
            ticks % TICKS_PER_BEAT,
        )
    }

    /// Subtract `offset` from `bbt`, borrowing from beats and bars.
    ///
    /// Returns `None` if the result would lie before `1|1|0`.
    pub fn bbt_subtract(&self, bbt: &BbtTime, offset: &BbtOffset) -> Option<BbtTime> {
        let total_ticks = i64::from(bbt.ticks()) - i64::from(offset.ticks());
        let tpb = i64::from(TICKS_PER_BEAT);
        let ticks = total_ticks.rem_euclid(tpb);

        let beats = i64::from(bbt.beats() - 1) - i64::from(offset.beats())
            + total_ticks.div_euclid(tpb);
        let bpb = i64::from(self.beats_per_bar());

        let bars = i64::from(bbt.bars()) - i64::from(offset.bars()) + beats.div_euclid(bpb);
        if bars < 1 {
            return None;
        }

        Some(BbtTime::new_unchecked(
            bars as i32,
            beats.rem_euclid(bpb) as i32 + 1,
            ticks as i32,
        ))
    }

    /// Carry a beat that overflowed the bar into the next bar.
    pub fn normalize(&self, bbt: &BbtTime) -> BbtTime {
        self.bbt_add(bbt, &BbtOffset::ZERO)
    }

    pub fn round_up_to_beat(&self, bbt: &BbtTime) -> BbtTime {
        self.normalize(&bbt.round_up_to_beat())
    }

    pub fn round_to_beat(&self, bbt: &BbtTime) -> BbtTime {
        self.normalize(&bbt.round_to_beat())
    }

    /// Round to the closest bar line. Half-way through a bar rounds up.
    pub fn round_to_bar(&self, bbt: &BbtTime) -> BbtTime {
        let b = self.normalize(bbt);
        let into_bar = i64::from(b.beats() - 1) * i64::from(TICKS_PER_BEAT) + i64::from(b.ticks());
        let half_bar = i64::from(self.beats_per_bar()) * i64::from(TICKS_PER_BEAT) / 2;

        if into_bar >= half_bar {
            BbtTime::new_unchecked(b.bars() + 1, 1, 0)
        } else {
            BbtTime::new_unchecked(b.bars(), 1, 0)
        }
    }

    pub fn round_up_to_bar(&self, bbt: &BbtTime) -> BbtTime {
        if bbt.is_bar_start() {
            *bbt
        } else {
            BbtTime::new_unchecked(bbt.bars() + 1, 1, 0)
        }
    }

    pub fn round_down_to_bar(&self, bbt: &BbtTime) -> BbtTime {
        BbtTime::new_unchecked(bbt.bars(), 1, 0)
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::COMMON
    }
}

/// A meter anchored on the timeline. A meter section always starts a bar,
/// so its BBT anchor is always of the form `n|1|0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterPoint {
    pub(crate) meter: Meter,
    pub(crate) anchor: Anchor,
}

impl MeterPoint {
    pub(crate) fn new(meter: Meter, anchor: Anchor) -> Self {
        Self { meter, anchor }
    }

    #[inline]
    pub fn meter(&self) -> &Meter {
        &self.meter
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

    #[inline]
    pub fn bbt(&self) -> &BbtTime {
        &self.anchor.bbt
    }

    /// The BBT position of `pulse`, which must not lie before this
    /// section's anchor.
    ///
    /// Whole bars are accumulated first, then the remainder is split into
    /// beats and ticks. Ticks are rounded half up and any carry is
    /// propagated so the result is always normalized.
    pub fn bbt_at(&self, pulse: f64) -> BbtTime {
        let delta = (pulse - self.anchor.pulse).max(0.0);
        let quarters_per_bar = self.meter.quarters_per_bar();

        let bars = (delta / quarters_per_bar).floor();
        let in_bar = (delta - bars * quarters_per_bar).max(0.0);
        let beats_f = in_bar / self.meter.quarters_per_beat();
        let beats = beats_f.floor();
        let ticks = round_half_up((beats_f - beats) * f64::from(TICKS_PER_BEAT));

        let offset = BbtOffset::new_unchecked(bars as i32, beats as i32, ticks as i32);

        self.meter.bbt_add(&self.anchor.bbt, &offset)
    }

    /// The pulse of `bbt`, which must not lie before this section's anchor.
    pub fn pulse_at(&self, bbt: &BbtTime) -> f64 {
        let offset = BbtOffset::new_unchecked(
            bbt.bars() - self.anchor.bbt.bars(),
            bbt.beats() - 1,
            bbt.ticks(),
        );

        self.anchor.pulse + self.meter.to_quarters(&offset)
    }
}
