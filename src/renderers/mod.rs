//! Renderers module
//!
//! Lossy export of a container into interchange formats.

pub mod midi;
pub mod musicxml;

// Re-export commonly used entry points
pub use midi::write_smf;
pub use musicxml::to_musicxml;
