//! Importers from interchange formats
//!
//! - **midi**: Standard MIDI File to container (via `midly`)
//! - **musicxml**: partwise MusicXML to container (via `quick-xml`)

pub mod midi;
pub mod musicxml;

pub use midi::parse_midi;
pub use musicxml::parse_musicxml;
