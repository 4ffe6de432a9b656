//! Representation converters
//!
//! Pure functions from a [`Music`] container to derived encodings. Nothing in
//! here mutates the source container.
//!
//! # Targets
//! - **event**: token stream of note-on / note-off / time-shift / velocity
//! - **note**: `(time, pitch, duration, velocity)` rows
//! - **pianoroll**: time × pitch grid of velocities
//! - **pretty_midi**: timed-event player model with times in seconds
//! - **pypianoroll**: multi-track piano-roll model
//!
//! Targets are chosen with a case-insensitive selector string parsed into
//! [`Target`].

pub mod event;
pub mod multitrack;
pub mod note;
pub mod pianoroll;
pub mod player;

use std::fmt;
use std::str::FromStr;

use crate::error::{MusicError, Result};
use crate::models::Music;

pub use event::{
    from_event_representation, to_event_representation, Event, EventOptions,
    EventRepresentation,
};
pub use multitrack::{to_pypianoroll, Multitrack, PianorollTrack};
pub use note::{from_note_representation, to_note_representation, NoteRepresentation};
pub use pianoroll::{
    from_pianoroll_representation, to_pianoroll_representation, PianorollOptions,
    PianorollRepresentation,
};
pub use player::{to_pretty_midi, Instrument, PlayerModel, PlayerNote, TempoMap};

/// Closed set of conversion targets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    Event,
    Note,
    Pianoroll,
    PrettyMidi,
    Pypianoroll,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Event => "event",
            Target::Note => "note",
            Target::Pianoroll => "pianoroll",
            Target::PrettyMidi => "pretty_midi",
            Target::Pypianoroll => "pypianoroll",
        }
    }

    /// True for the three targets built inside this crate
    pub fn is_representation(&self) -> bool {
        matches!(self, Target::Event | Target::Note | Target::Pianoroll)
    }
}

impl FromStr for Target {
    type Err = MusicError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "event" | "event-based" => Ok(Target::Event),
            "note" | "note-based" => Ok(Target::Note),
            "pianoroll" | "piano-roll" => Ok(Target::Pianoroll),
            "pretty_midi" => Ok(Target::PrettyMidi),
            "pypianoroll" => Ok(Target::Pypianoroll),
            _ => Err(MusicError::UnsupportedTarget(s.to_string())),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one of the three internal representation builders
#[derive(Clone, Debug, PartialEq)]
pub enum Representation {
    Event(EventRepresentation),
    Note(NoteRepresentation),
    Pianoroll(PianorollRepresentation),
}

/// Result of [`convert`]: a representation or an external object model
#[derive(Clone, Debug, PartialEq)]
pub enum Converted {
    Representation(Representation),
    PrettyMidi(PlayerModel),
    Pypianoroll(Multitrack),
}

impl From<Representation> for Converted {
    fn from(value: Representation) -> Self {
        Converted::Representation(value)
    }
}

/// Build an internal representation chosen by selector
///
/// Only "event", "note" and "pianoroll" (and their aliases) are accepted.
pub fn to_representation(music: &Music, target: &str) -> Result<Representation> {
    let parsed: Target = target.parse()?;
    if !parsed.is_representation() {
        return Err(MusicError::UnsupportedTarget(target.to_string()));
    }
    representation_for(music, parsed)
        .ok_or_else(|| MusicError::UnsupportedTarget(target.to_string()))
}

fn representation_for(music: &Music, target: Target) -> Option<Representation> {
    match target {
        Target::Event => Some(Representation::Event(to_event_representation(
            music,
            &EventOptions::default(),
        ))),
        Target::Note => Some(Representation::Note(to_note_representation(music))),
        Target::Pianoroll => Some(Representation::Pianoroll(to_pianoroll_representation(
            music,
            &PianorollOptions::default(),
        ))),
        Target::PrettyMidi | Target::Pypianoroll => None,
    }
}

/// Convert to any target chosen by selector
pub fn convert(music: &Music, target: &str) -> Result<Converted> {
    let parsed: Target = target.parse()?;
    log::debug!("converting music to {}", parsed);
    match parsed {
        Target::PrettyMidi => Ok(Converted::PrettyMidi(to_pretty_midi(music))),
        Target::Pypianoroll => Ok(Converted::Pypianoroll(to_pypianoroll(music))),
        representation => representation_for(music, representation)
            .map(Converted::from)
            .ok_or_else(|| MusicError::UnsupportedTarget(target.to_string())),
    }
}
