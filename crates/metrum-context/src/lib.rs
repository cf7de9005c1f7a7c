//! Publication of tempo maps to real-time readers.

pub mod collector;

mod reader;
mod slot;

pub use reader::{MapReader, TempoMapScope};
pub use slot::TempoMapSlot;
