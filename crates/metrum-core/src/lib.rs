pub mod bbt;
pub mod error;
pub mod map;
pub mod meter;
pub mod section;
pub mod state;
pub mod tempo;

pub use bbt::{BbtError, BbtOffset, BbtTime, TICKS_PER_BEAT};
pub use error::{InconsistencyError, TempoMapError};
pub use map::{GridPoint, RoundDirection, TempoMap, TempoMapConfig, TempoMetric};
pub use meter::{Meter, MeterPoint};
pub use section::{Anchor, Section, SectionKind, TimePosition};
pub use state::{MeterRecord, TempoMapState, TempoRecord};
pub use tempo::{Tempo, TempoPoint};
