//! The change points a [`TempoMap`](crate::map::TempoMap) is built from.

use core::fmt;

use crate::{bbt::BbtTime, meter::MeterPoint, tempo::TempoPoint};

/// A position on the timeline expressed in all three time domains at once.
///
/// The sample position is authoritative: the map derives the pulse and the
/// BBT position from it whenever sections are recomputed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    /// Samples since the start of the session.
    pub sample: i64,
    /// Quarter notes since the start of the session.
    pub pulse: f64,
    pub bbt: BbtTime,
}

impl Anchor {
    pub const ORIGIN: Self = Self {
        sample: 0,
        pulse: 0.0,
        bbt: BbtTime::ORIGIN,
    };
}

/// A position given in any one of the three time domains.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimePosition {
    Samples(i64),
    /// Quarter notes.
    Pulses(f64),
    Bbt(BbtTime),
}

impl From<BbtTime> for TimePosition {
    fn from(value: BbtTime) -> Self {
        Self::Bbt(value)
    }
}

impl fmt::Display for TimePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Samples(s) => write!(f, "sample {s}"),
            Self::Pulses(p) => write!(f, "pulse {p}"),
            Self::Bbt(bbt) => write!(f, "BBT {bbt}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Tempo,
    Meter,
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tempo => f.write_str("tempo"),
            Self::Meter => f.write_str("meter"),
        }
    }
}

/// One entry of the merged, time-ordered section sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Section {
    Tempo(TempoPoint),
    Meter(MeterPoint),
}

impl Section {
    pub fn kind(&self) -> SectionKind {
        match self {
            Self::Tempo(_) => SectionKind::Tempo,
            Self::Meter(_) => SectionKind::Meter,
        }
    }

    pub fn anchor(&self) -> &Anchor {
        match self {
            Self::Tempo(t) => &t.anchor,
            Self::Meter(m) => &m.anchor,
        }
    }

    pub(crate) fn anchor_mut(&mut self) -> &mut Anchor {
        match self {
            Self::Tempo(t) => &mut t.anchor,
            Self::Meter(m) => &mut m.anchor,
        }
    }

    #[inline]
    pub fn sample(&self) -> i64 {
        self.anchor().sample
    }

    pub fn as_tempo(&self) -> Option<&TempoPoint> {
        match self {
            Self::Tempo(t) => Some(t),
            Self::Meter(_) => None,
        }
    }

    pub fn as_meter(&self) -> Option<&MeterPoint> {
        match self {
            Self::Meter(m) => Some(m),
            Self::Tempo(_) => None,
        }
    }

    /// The key the merged sequence is sorted by. A meter sorts before a
    /// tempo at the same sample since it decides where the bar starts.
    pub(crate) fn order_key(&self) -> (i64, u8) {
        match self {
            Self::Meter(m) => (m.anchor.sample, 0),
            Self::Tempo(t) => (t.anchor.sample, 1),
        }
    }
}
