//! MusicXML export module
//!
//! Writes a container as a partwise MusicXML 3.1 document.
//!
//! # Module Structure
//!
//! - **export**: Main entry point (`to_musicxml()`), measure splitting and part layout
//! - **builder**: MusicXML XML structure building
//! - **pitch**: MIDI pitch to step/alter/octave conversion (and back)
//! - **duration**: Duration to note type conversion

pub mod builder;
pub mod duration;
pub mod export;
pub mod pitch;

pub use builder::{Clef, MusicXmlBuilder, PartAttributes, XmlNote, DYNAMICS_REFERENCE_VELOCITY};
pub use duration::{duration_to_note_type, ticks_to_note_type};
pub use export::to_musicxml;
pub use pitch::{midi_to_step_alter, step_alter_to_midi};
