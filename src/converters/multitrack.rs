//! Multi-track piano-roll model, shaped like pypianoroll's `Multitrack`

use super::pianoroll::{fill_roll, roll_length, PianorollRow};
use super::player::TempoMap;
use crate::models::{Music, Time};

#[derive(Clone, Debug, PartialEq)]
pub struct PianorollTrack {
    pub name: String,
    pub program: u8,
    pub is_drum: bool,
    pub pianoroll: Vec<PianorollRow>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Multitrack {
    /// Time steps per quarter note
    pub resolution: u32,
    /// Tempo in qpm at every time step
    pub tempo: Vec<f64>,
    /// True at every step holding a downbeat
    pub downbeat: Vec<bool>,
    pub tracks: Vec<PianorollTrack>,
}

impl Multitrack {
    /// Number of time steps shared by every track
    pub fn len(&self) -> usize {
        self.tempo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tempo.is_empty()
    }
}

pub fn to_pypianoroll(music: &Music) -> Multitrack {
    let rows = roll_length(music);
    let map = TempoMap::new(&music.tempos, music.timing.beat_resolution);

    let tempo = (0..rows).map(|step| map.qpm_at(step as Time)).collect();

    let mut downbeat = vec![false; rows];
    for &position in &music.downbeats {
        if let Some(flag) = downbeat.get_mut(position as usize) {
            *flag = true;
        }
    }

    let tracks = music
        .tracks
        .iter()
        .map(|track| PianorollTrack {
            name: track.name.clone().unwrap_or_default(),
            program: track.program.clamp(0, 127) as u8,
            is_drum: track.is_drum,
            pianoroll: fill_roll(&track.notes, rows, false),
        })
        .collect();

    Multitrack {
        resolution: music.timing.beat_resolution,
        tempo,
        downbeat,
        tracks,
    }
}
