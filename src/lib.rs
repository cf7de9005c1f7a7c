pub use metrum_core as core;

pub use metrum_context::*;
pub use metrum_core::*;
