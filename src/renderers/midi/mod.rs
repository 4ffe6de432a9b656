//! Standard MIDI File output
//!
//! # Usage
//! ```rust,ignore
//! use music_core::renderers::midi::write_smf;
//!
//! let mut bytes = Vec::new();
//! write_smf(&music, &mut bytes)?;
//! ```

pub mod write;

pub use write::{write_smf, MARKER_GROUP};
