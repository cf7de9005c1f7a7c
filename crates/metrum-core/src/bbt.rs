//! Bar|beat|tick positions and offsets.

use core::{
    fmt,
    ops::{Add, Sub},
};

/// The number of ticks in one beat.
///
/// This number was chosen because it is neatly divisible by a bunch of
/// common factors such as 2, 3, 4, 5, 6, 8, 16, 32, 64, and 128.
pub const TICKS_PER_BEAT: i32 = 1920;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BbtError {
    /// Bars and beats of an absolute position start counting at one.
    #[error("Illegal BBT time {bars}|{beats}: bars and beats must be at least 1")]
    IllegalBbtTime { bars: i32, beats: i32 },
    /// Ticks must lie in `[0, TICKS_PER_BEAT)`.
    #[error("BBT ticks out of range: {0}")]
    TicksOutOfRange(i32),
    /// Offsets are counts of units and can never be negative.
    #[error("BBT offsets cannot be negative")]
    NegativeOffset,
}

/// An absolute musical position in bars, beats and ticks.
///
/// The origin of every timeline is `1|1|0`. Ordering is lexicographic over
/// `(bars, beats, ticks)`.
///
/// Adding a distance to a `BbtTime` requires knowing the meter in effect,
/// which is why arithmetic is only provided through [`BbtOffset`],
/// [`Meter::bbt_add`](crate::meter::Meter::bbt_add), and
/// [`TempoMap::bbt_walk`](crate::map::TempoMap::bbt_walk).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BbtTime {
    bars: i32,
    beats: i32,
    ticks: i32,
}

impl BbtTime {
    /// `1|1|0`
    pub const ORIGIN: Self = Self {
        bars: 1,
        beats: 1,
        ticks: 0,
    };

    pub fn new(bars: i32, beats: i32, ticks: i32) -> Result<Self, BbtError> {
        if bars < 1 || beats < 1 {
            return Err(BbtError::IllegalBbtTime { bars, beats });
        }
        if !(0..TICKS_PER_BEAT).contains(&ticks) {
            return Err(BbtError::TicksOutOfRange(ticks));
        }

        Ok(Self { bars, beats, ticks })
    }

    /// The first beat of the given bar.
    pub fn bar(bars: i32) -> Result<Self, BbtError> {
        Self::new(bars, 1, 0)
    }

    /// Only for values that were already normalized by the caller.
    pub(crate) const fn new_unchecked(bars: i32, beats: i32, ticks: i32) -> Self {
        Self { bars, beats, ticks }
    }

    #[inline]
    pub fn bars(&self) -> i32 {
        self.bars
    }

    #[inline]
    pub fn beats(&self) -> i32 {
        self.beats
    }

    #[inline]
    pub fn ticks(&self) -> i32 {
        self.ticks
    }

    /// Whether this position is the downbeat of its bar.
    pub fn is_bar_start(&self) -> bool {
        self.beats == 1 && self.ticks == 0
    }

    /// Round up to the next whole beat.
    ///
    /// The beat may overflow the bar. Use
    /// [`Meter::round_up_to_beat`](crate::meter::Meter::round_up_to_beat)
    /// to carry it into the next bar.
    pub fn round_up_to_beat(&self) -> Self {
        if self.ticks == 0 {
            *self
        } else {
            Self::new_unchecked(self.bars, self.beats + 1, 0)
        }
    }

    pub fn round_down_to_beat(&self) -> Self {
        Self::new_unchecked(self.bars, self.beats, 0)
    }

    /// Round to the nearest whole beat, half-way rounds up.
    pub fn round_to_beat(&self) -> Self {
        if self.ticks >= TICKS_PER_BEAT / 2 {
            Self::new_unchecked(self.bars, self.beats + 1, 0)
        } else {
            self.round_down_to_beat()
        }
    }
}

impl Default for BbtTime {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl fmt::Display for BbtTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.bars, self.beats, self.ticks)
    }
}

/// A musical distance in bars, beats and ticks.
///
/// Unlike [`BbtTime`], bars and beats may be zero. Fields are always
/// non-negative; a backwards distance is expressed by the operation using
/// it (for example [`TempoMap::bbt_walk_back`](crate::map::TempoMap::bbt_walk_back)).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BbtOffset {
    bars: i32,
    beats: i32,
    ticks: i32,
}

impl BbtOffset {
    pub const ZERO: Self = Self {
        bars: 0,
        beats: 0,
        ticks: 0,
    };

    pub fn new(bars: i32, beats: i32, ticks: i32) -> Result<Self, BbtError> {
        if bars < 0 || beats < 0 || ticks < 0 {
            return Err(BbtError::NegativeOffset);
        }

        Ok(Self { bars, beats, ticks }.normalized())
    }

    pub const fn from_beats(beats: u32) -> Self {
        Self {
            bars: 0,
            beats: saturating_count(beats),
            ticks: 0,
        }
    }

    pub const fn from_bars(bars: u32) -> Self {
        Self {
            bars: saturating_count(bars),
            beats: 0,
            ticks: 0,
        }
    }

    /// Only for intermediate values inside the crate. Fields may be
    /// negative or unnormalized.
    pub(crate) const fn new_unchecked(bars: i32, beats: i32, ticks: i32) -> Self {
        Self { bars, beats, ticks }
    }

    #[inline]
    pub fn bars(&self) -> i32 {
        self.bars
    }

    #[inline]
    pub fn beats(&self) -> i32 {
        self.beats
    }

    #[inline]
    pub fn ticks(&self) -> i32 {
        self.ticks
    }

    /// Convert a count of quarter notes into an offset of whole beats and
    /// ticks. Bars are always zero since a bar length needs a meter.
    pub fn from_quarter_notes(quarter_notes: f64) -> Result<Self, BbtError> {
        if !(quarter_notes >= 0.0) {
            return Err(BbtError::NegativeOffset);
        }

        let beats = quarter_notes.floor();
        let ticks = round_half_up((quarter_notes - beats) * f64::from(TICKS_PER_BEAT));

        Ok(Self {
            bars: 0,
            beats: beats as i32,
            ticks: ticks as i32,
        }
        .normalized())
    }

    /// Carry whole beats out of the tick field.
    fn normalized(mut self) -> Self {
        self.beats += self.ticks / TICKS_PER_BEAT;
        self.ticks %= TICKS_PER_BEAT;
        self
    }
}

impl Add for BbtOffset {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            bars: self.bars + rhs.bars,
            beats: self.beats + rhs.beats,
            ticks: self.ticks + rhs.ticks,
        }
        .normalized()
    }
}

impl Sub for BbtOffset {
    type Output = Self;

    /// Saturates at [`BbtOffset::ZERO`] when a field would go negative.
    /// Bars are never borrowed from since that needs a meter.
    fn sub(self, rhs: Self) -> Self::Output {
        let mut ticks = self.ticks - rhs.ticks;
        let mut beats = self.beats - rhs.beats;
        if ticks < 0 {
            ticks += TICKS_PER_BEAT;
            beats -= 1;
        }

        let bars = self.bars - rhs.bars;
        if bars < 0 || beats < 0 {
            return Self::ZERO;
        }

        Self { bars, beats, ticks }
    }
}

impl fmt::Display for BbtOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.bars, self.beats, self.ticks)
    }
}

const fn saturating_count(n: u32) -> i32 {
    if n > i32::MAX as u32 {
        i32::MAX
    } else {
        n as i32
    }
}

#[inline]
pub(crate) fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bars_or_beats_are_rejected() {
        assert_eq!(
            BbtTime::new(0, 1, 0),
            Err(BbtError::IllegalBbtTime { bars: 0, beats: 1 })
        );
        assert_eq!(
            BbtTime::new(1, 0, 0),
            Err(BbtError::IllegalBbtTime { bars: 1, beats: 0 })
        );
        assert_eq!(
            BbtTime::new(1, 1, TICKS_PER_BEAT),
            Err(BbtError::TicksOutOfRange(TICKS_PER_BEAT))
        );
        assert_eq!(BbtTime::new(1, 1, 0), Ok(BbtTime::ORIGIN));
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = BbtTime::new(1, 4, 1919).unwrap();
        let b = BbtTime::new(2, 1, 0).unwrap();
        let c = BbtTime::new(2, 1, 1).unwrap();
        let d = BbtTime::new(2, 2, 0).unwrap();

        assert!(a < b && b < c && c < d);
        assert!(d >= c && b <= b);
        assert_eq!(b.cmp(&b), core::cmp::Ordering::Equal);
    }

    #[test]
    fn offset_from_quarter_notes() {
        let offset = BbtOffset::from_quarter_notes(2.5).unwrap();
        assert_eq!(offset, BbtOffset::new(0, 2, 960).unwrap());

        // Rounds up into the next beat instead of producing 1920 ticks.
        let offset = BbtOffset::from_quarter_notes(0.99999999).unwrap();
        assert_eq!(offset, BbtOffset::from_beats(1));

        assert_eq!(
            BbtOffset::from_quarter_notes(-0.5),
            Err(BbtError::NegativeOffset)
        );
    }

    #[test]
    fn offset_arithmetic_carries_ticks() {
        let a = BbtOffset::new(1, 2, 1500).unwrap();
        let b = BbtOffset::new(0, 1, 600).unwrap();

        assert_eq!(a + b, BbtOffset::new(1, 4, 180).unwrap());
        assert_eq!(a - b, BbtOffset::new(1, 1, 900).unwrap());
        assert_eq!(b - a, BbtOffset::ZERO);
    }

    #[test]
    fn offsets_cannot_go_negative() {
        assert_eq!(BbtOffset::new(0, -1, 0), Err(BbtError::NegativeOffset));
        assert_eq!(BbtOffset::new(-2, 0, 0), Err(BbtError::NegativeOffset));

        let offset = BbtOffset::new(2, 3, 2000).unwrap();
        assert_eq!((offset.bars(), offset.beats(), offset.ticks()), (2, 4, 80));

        assert_eq!(BbtOffset::from_bars(u32::MAX).bars(), i32::MAX);
        assert_eq!(BbtOffset::from_beats(7).beats(), 7);
    }

    #[test]
    fn rounding_to_beats() {
        let bbt = BbtTime::new(3, 2, 960).unwrap();
        assert_eq!(bbt.round_to_beat(), BbtTime::new(3, 3, 0).unwrap());
        assert_eq!(bbt.round_down_to_beat(), BbtTime::new(3, 2, 0).unwrap());
        assert_eq!(bbt.round_up_to_beat(), BbtTime::new(3, 3, 0).unwrap());

        let on_beat = BbtTime::new(3, 2, 0).unwrap();
        assert_eq!(on_beat.round_up_to_beat(), on_beat);
        assert_eq!(format!("{on_beat}"), "3|2|0");
    }
}
