//! Data model for symbolic music
//!
//! A [`Music`] container holds metadata, a time basis and sequences of
//! time-stamped entities. Times are integer ticks at
//! `timing.beat_resolution` ticks per quarter note.

pub mod core;
pub mod elements;
pub mod metadata;
pub mod track;
pub mod validation;

// Re-export commonly used types
pub use self::core::{Entity, Music};
pub use elements::{Annotation, KeyMode, KeySignature, Lyric, Tempo, TimeSignature};
pub use metadata::{MetaData, TimingInfo};
pub use track::{Note, Track};
pub use validation::{remove_invalid_from_list, validate_list, Time, Timed, Validate};
