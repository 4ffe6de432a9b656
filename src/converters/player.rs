//! Timed-event player model
//!
//! Mirrors the shape of the pretty_midi object model: every time is in
//! seconds, notes are grouped into instruments, and tempo, meter, key and
//! lyric changes sit in their own lists.

use crate::defaults::DEFAULT_TEMPO_QPM;
use crate::models::{KeyMode, Music, Tempo, Time, Validate};

#[derive(Clone, Debug, PartialEq)]
pub struct PlayerNote {
    pub start: f64,
    pub end: f64,
    pub pitch: u8,
    pub velocity: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instrument {
    pub program: u8,
    pub is_drum: bool,
    pub name: String,
    pub notes: Vec<PlayerNote>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TempoChange {
    pub time: f64,
    pub qpm: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimeSignatureChange {
    pub time: f64,
    pub numerator: u32,
    pub denominator: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct KeySignatureChange {
    pub time: f64,
    /// 0-11 major keys on C..B, 12-23 minor keys on C..B
    pub key_number: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlayerLyric {
    pub time: f64,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlayerModel {
    /// Ticks per quarter note of the source container
    pub resolution: u32,
    pub tempo_changes: Vec<TempoChange>,
    pub time_signature_changes: Vec<TimeSignatureChange>,
    pub key_signature_changes: Vec<KeySignatureChange>,
    pub lyrics: Vec<PlayerLyric>,
    pub instruments: Vec<Instrument>,
}

impl PlayerModel {
    /// Time of the last note-off in seconds, 0 when silent
    pub fn get_end_time(&self) -> f64 {
        self.instruments
            .iter()
            .flat_map(|i| &i.notes)
            .map(|n| n.end)
            .fold(0.0, f64::max)
    }
}

/// Piecewise-linear tick to second mapping built from tempo markings
#[derive(Clone, Debug, PartialEq)]
pub struct TempoMap {
    resolution: f64,
    /// (start tick, seconds at start tick, quarter notes per minute)
    segments: Vec<(Time, f64, f64)>,
}

impl TempoMap {
    /// Build from tempos in any order; invalid tempos are ignored and the
    /// default tempo applies before the first marking
    pub fn new(tempos: &[Tempo], resolution: u32) -> Self {
        let mut valid: Vec<&Tempo> = tempos.iter().filter(|t| t.is_valid()).collect();
        valid.sort_by_key(|t| t.time);

        let resolution = f64::from(resolution.max(1));
        let mut segments = vec![(0, 0.0, DEFAULT_TEMPO_QPM)];
        for tempo in valid {
            let (start, seconds, qpm) = *segments.last().unwrap_or(&(0, 0.0, DEFAULT_TEMPO_QPM));
            let elapsed = (tempo.time - start) as f64 * 60.0 / (qpm * resolution);
            if tempo.time == start {
                segments.pop();
            }
            segments.push((tempo.time, seconds + elapsed, tempo.qpm));
        }
        Self {
            resolution,
            segments,
        }
    }

    pub fn tick_to_seconds(&self, tick: Time) -> f64 {
        let segment = self
            .segments
            .iter()
            .rev()
            .find(|(start, _, _)| *start <= tick)
            .or_else(|| self.segments.first());
        match segment {
            Some(&(start, seconds, qpm)) => {
                seconds + (tick.saturating_sub(start)) as f64 * 60.0 / (qpm * self.resolution)
            }
            None => tick as f64 * 60.0 / (DEFAULT_TEMPO_QPM * self.resolution),
        }
    }

    pub fn qpm_at(&self, tick: Time) -> f64 {
        self.segments
            .iter()
            .rev()
            .find(|(start, _, _)| *start <= tick)
            .map(|&(_, _, qpm)| qpm)
            .unwrap_or(DEFAULT_TEMPO_QPM)
    }
}

pub fn to_pretty_midi(music: &Music) -> PlayerModel {
    let map = TempoMap::new(&music.tempos, music.timing.beat_resolution);

    let mut tempo_changes: Vec<TempoChange> = music
        .tempos
        .iter()
        .filter(|t| t.is_valid())
        .map(|t| TempoChange {
            time: map.tick_to_seconds(t.time),
            qpm: t.qpm,
        })
        .collect();
    tempo_changes.sort_by(|a, b| a.time.total_cmp(&b.time));

    let time_signature_changes = music
        .time_signatures
        .iter()
        .filter(|ts| ts.is_valid())
        .map(|ts| TimeSignatureChange {
            time: map.tick_to_seconds(ts.start()),
            numerator: ts.numerator,
            denominator: ts.denominator,
        })
        .collect();

    let key_signature_changes = music
        .key_signatures
        .iter()
        .filter_map(|ks| {
            let root = ks.root?;
            let offset = match ks.mode {
                Some(KeyMode::Minor) => 12,
                _ => 0,
            };
            Some(KeySignatureChange {
                time: map.tick_to_seconds(ks.time),
                key_number: root % 12 + offset,
            })
        })
        .collect();

    let lyrics = music
        .lyrics
        .iter()
        .map(|l| PlayerLyric {
            time: map.tick_to_seconds(l.time),
            text: l.lyric.clone(),
        })
        .collect();

    let instruments = music
        .tracks
        .iter()
        .map(|track| Instrument {
            program: track.program.clamp(0, 127) as u8,
            is_drum: track.is_drum,
            name: track.name.clone().unwrap_or_default(),
            notes: track
                .notes
                .iter()
                .filter(|n| n.is_valid())
                .map(|n| PlayerNote {
                    start: map.tick_to_seconds(n.time),
                    end: map.tick_to_seconds(n.end()),
                    pitch: n.pitch as u8,
                    velocity: n.velocity as u8,
                })
                .collect(),
        })
        .collect();

    PlayerModel {
        resolution: music.timing.beat_resolution,
        tempo_changes,
        time_signature_changes,
        key_signature_changes,
        lyrics,
        instruments,
    }
}
