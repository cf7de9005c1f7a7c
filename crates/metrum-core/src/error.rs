use crate::{
    bbt::BbtError,
    section::{SectionKind, TimePosition},
};

/// An error returned by a tempo map operation.
///
/// When a mutation fails the map is left exactly as it was.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TempoMapError {
    #[error(transparent)]
    Bbt(#[from] BbtError),
    /// An insert-only operation targeted a position that already holds a
    /// section of the same kind.
    #[error("A {kind} section already exists at sample {sample}")]
    DuplicateSection { kind: SectionKind, sample: i64 },
    /// The position lies before the start of the timeline.
    #[error("Position out of range: {0}")]
    OutOfRange(TimePosition),
    /// The first tempo and meter sections can be changed but never removed
    /// or moved.
    #[error("The initial {0} section cannot be removed or moved")]
    ProtectedOrigin(SectionKind),
    #[error("No {kind} section exists at sample {sample}")]
    SectionNotFound { kind: SectionKind, sample: i64 },
    #[error("Invalid tempo in quarter notes per minute: {0}")]
    InvalidTempo(f64),
    #[error("Invalid meter {numerator}/{denominator}")]
    InvalidMeter { numerator: u32, denominator: u32 },
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),
    /// A beat can be split into at most [`TICKS_PER_BEAT`](crate::bbt::TICKS_PER_BEAT)
    /// parts.
    #[error("Invalid beat subdivision: {0}")]
    InvalidSubdivision(u32),
    /// The map's invariants were broken. This is always a bug.
    #[error("Tempo map is inconsistent: {0}")]
    Internal(#[from] InconsistencyError),
}

/// A violation of the map's representational invariants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InconsistencyError {
    #[error("No section brackets the requested position")]
    BracketNotFound,
    #[error("Tempo ramp has no root for pulse {pulse} inside its span (solved offset {offset})")]
    RampRootOutOfRange { pulse: f64, offset: f64 },
    #[error("Sections are out of order at index {index}")]
    Misordered { index: usize },
}
