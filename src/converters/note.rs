//! Note-based representation: one `(time, pitch, duration, velocity)` row
//! per note, over all tracks, in lexicographic order.

use crate::models::{Music, Note, TimingInfo, Track};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteRepresentation {
    /// Ticks per quarter note the times are expressed in
    pub resolution: u32,
    pub notes: Vec<Note>,
}

impl NoteRepresentation {
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Rows as plain integer tuples, columns time, pitch, duration, velocity
    pub fn rows(&self) -> Vec<[i64; 4]> {
        self.notes
            .iter()
            .map(|n| [n.time as i64, n.pitch as i64, n.duration as i64, n.velocity as i64])
            .collect()
    }
}

pub fn to_note_representation(music: &Music) -> NoteRepresentation {
    let mut notes: Vec<Note> = music
        .tracks
        .iter()
        .flat_map(|track| track.notes.iter().cloned())
        .collect();
    notes.sort_by_key(|n| (n.time, n.pitch, n.duration, n.velocity));
    NoteRepresentation {
        resolution: music.timing.beat_resolution,
        notes,
    }
}

/// Rebuild a single-track container from note rows
pub fn from_note_representation(representation: &NoteRepresentation) -> Music {
    let track = Track::default().with_notes(representation.notes.clone());
    Music::new()
        .with_timing(TimingInfo::new(representation.resolution))
        .with_tracks(vec![track])
}
