//! Music Core
//!
//! A universal container for symbolic music with conversions into
//! machine-learning representations and file I/O.
//!
//! - **models**: the [`Music`] container and its time-stamped entities
//! - **converters**: event, note, piano-roll, player and multi-track encodings
//! - **renderers**: MIDI and MusicXML export
//! - **import**: MIDI and MusicXML import
//! - **io**: path-based save/load (JSON, YAML) and write/read (MIDI, MusicXML)
//!
//! ```rust,ignore
//! use music_core::{Music, Note, Tempo, Track};
//!
//! let mut music = Music::new();
//! music.append(Tempo::new(0, 120.0));
//! music.append(Track::new(0, false, None).with_notes(vec![Note::new(0, 60, 24, 64)]));
//! let notes = music.to_note_representation();
//! music.write("song.mid")?;
//! ```

pub mod converters;
pub mod defaults;
pub mod error;
pub mod import;
pub mod io;
pub mod models;
pub mod renderers;

// Re-export commonly used types
pub use converters::{Converted, Representation, Target};
pub use error::{MusicError, Result};
pub use io::{
    load, load_json, load_yaml, midi_bytes, musicxml_string, parse_midi, parse_musicxml, read,
    read_midi, read_musicxml, save, save_json, save_yaml, write, write_midi, write_musicxml,
};
pub use models::{
    Annotation, Entity, KeyMode, KeySignature, Lyric, MetaData, Music, Note, Tempo, Time,
    TimeSignature, TimingInfo, Track, Validate,
};
