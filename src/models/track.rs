//! Notes and tracks
//!
//! A [`Track`] is one instrument or voice: an ordered collection of notes
//! plus its own lyrics and annotations.

use serde::{Deserialize, Serialize};

use super::elements::{Annotation, Lyric};
use super::validation::{
    remove_invalid_from_list, sort_by_time, validate_list, Time, Timed, Validate,
};
use crate::defaults::{DEFAULT_PROGRAM, MAX_MIDI_VALUE, MIN_MIDI_VALUE};
use crate::error::{MusicError, Result};

/// A single sounding note
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Note {
    pub time: Time,
    /// MIDI note number, 60 = C4
    pub pitch: i32,
    pub duration: Time,
    pub velocity: i32,
}

impl Note {
    pub fn new(time: Time, pitch: i32, duration: Time, velocity: i32) -> Self {
        Self {
            time,
            pitch,
            duration,
            velocity,
        }
    }

    /// Time of the note-off, saturating at the end of the time axis
    pub fn end(&self) -> Time {
        self.time.saturating_add(self.duration)
    }

    pub fn transpose(&mut self, semitone: i32) {
        self.pitch = self.pitch.saturating_add(semitone);
    }

    /// Clamp velocity into `[lower, upper]`; when the bounds cross, `upper` wins
    pub fn clip(&mut self, lower: i32, upper: i32) {
        self.velocity = self.velocity.max(lower).min(upper);
    }
}

impl Validate for Note {
    fn validate(&self) -> Result<()> {
        if !(MIN_MIDI_VALUE..=MAX_MIDI_VALUE).contains(&self.pitch) {
            return Err(MusicError::invalid(
                "pitch",
                format!("must be within 0..=127, got {}", self.pitch),
            ));
        }
        if !(MIN_MIDI_VALUE..=MAX_MIDI_VALUE).contains(&self.velocity) {
            return Err(MusicError::invalid(
                "velocity",
                format!("must be within 0..=127, got {}", self.velocity),
            ));
        }
        Ok(())
    }
}

impl Timed for Note {
    fn time(&self) -> Time {
        self.time
    }
}

/// One instrument or voice
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Track {
    /// General MIDI program number (0-127)
    pub program: i32,
    pub is_drum: bool,
    pub name: Option<String>,
    pub notes: Vec<Note>,
    pub lyrics: Vec<Lyric>,
    pub annotations: Vec<Annotation>,
}

impl Default for Track {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM,
            is_drum: false,
            name: None,
            notes: Vec::new(),
            lyrics: Vec::new(),
            annotations: Vec::new(),
        }
    }
}

impl Track {
    pub fn new(program: i32, is_drum: bool, name: Option<String>) -> Self {
        Self {
            program,
            is_drum,
            name,
            ..Self::default()
        }
    }

    pub fn with_notes(mut self, notes: Vec<Note>) -> Self {
        self.notes = notes;
        self
    }

    /// Drop invalid notes, lyrics and annotations; returns the number removed
    pub fn remove_invalid(&mut self) -> usize {
        remove_invalid_from_list(&mut self.notes)
            + remove_invalid_from_list(&mut self.lyrics)
            + remove_invalid_from_list(&mut self.annotations)
    }

    /// Time of the last note-off, `None` for a track without notes
    ///
    /// Note-offs are not ordered by onset sorting, so this always scans.
    pub fn get_active_length(&self) -> Option<Time> {
        self.notes.iter().map(Note::end).max()
    }

    pub fn sort(&mut self) {
        sort_by_time(&mut self.notes);
        sort_by_time(&mut self.lyrics);
        sort_by_time(&mut self.annotations);
    }

    pub fn clip(&mut self, lower: i32, upper: i32) {
        for note in &mut self.notes {
            note.clip(lower, upper);
        }
    }

    /// Shift every pitch; no range check happens here
    pub fn transpose(&mut self, semitone: i32) {
        for note in &mut self.notes {
            note.transpose(semitone);
        }
    }
}

impl Validate for Track {
    fn validate(&self) -> Result<()> {
        if !(MIN_MIDI_VALUE..=MAX_MIDI_VALUE).contains(&self.program) {
            return Err(MusicError::invalid(
                "program",
                format!("must be within 0..=127, got {}", self.program),
            ));
        }
        validate_list(&self.notes, "notes")?;
        validate_list(&self.lyrics, "lyrics")?;
        validate_list(&self.annotations, "annotations")?;
        Ok(())
    }
}
