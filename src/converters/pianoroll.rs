//! Piano-roll representation: one row per tick, one column per MIDI pitch

use crate::defaults::{DEFAULT_VELOCITY, MAX_MIDI_VALUE, MAX_PIANOROLL_STEPS, PITCH_COUNT};
use crate::models::{Music, Note, Time, TimingInfo, Track, Validate};

/// One tick of a piano roll
pub type PianorollRow = [u8; PITCH_COUNT];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PianorollOptions {
    /// Store 1 for sounding cells instead of the velocity
    pub binarized: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PianorollRepresentation {
    pub resolution: u32,
    pub binarized: bool,
    pub data: Vec<PianorollRow>,
}

impl PianorollRepresentation {
    /// Number of time steps
    pub fn rows(&self) -> usize {
        self.data.len()
    }

    pub fn get(&self, time: usize, pitch: usize) -> u8 {
        self.data
            .get(time)
            .and_then(|row| row.get(pitch))
            .copied()
            .unwrap_or(0)
    }

    /// Pitches sounding at a time step
    pub fn active_pitches(&self, time: usize) -> Vec<u8> {
        self.data
            .get(time)
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|&(_, &v)| v > 0)
                    .map(|(p, _)| p as u8)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Rasterize notes into a grid of `rows` steps
///
/// Overlapping notes on the same pitch keep the larger value; out-of-range
/// notes and cells beyond `rows` are dropped.
pub(crate) fn fill_roll<'a>(
    notes: impl IntoIterator<Item = &'a Note>,
    rows: usize,
    binarized: bool,
) -> Vec<PianorollRow> {
    let mut data = vec![[0u8; PITCH_COUNT]; rows];
    for note in notes {
        if note.validate().is_err() {
            continue;
        }
        let value = if binarized {
            1
        } else {
            note.velocity.clamp(0, MAX_MIDI_VALUE) as u8
        };
        let start = step_index(note.time, rows);
        let end = step_index(note.end(), rows);
        for row in &mut data[start..end] {
            let cell = &mut row[note.pitch as usize];
            *cell = (*cell).max(value);
        }
    }
    data
}

fn step_index(time: Time, rows: usize) -> usize {
    usize::try_from(time).map_or(rows, |step| step.min(rows))
}

/// Latest valid note-off over all tracks, 0 when there are no notes
///
/// Capped at `MAX_PIANOROLL_STEPS`; notes past the cap are cut off.
pub(crate) fn roll_length(music: &Music) -> usize {
    let end = music
        .tracks
        .iter()
        .flat_map(|t| &t.notes)
        .filter(|n| n.is_valid())
        .map(Note::end)
        .max()
        .unwrap_or(0);
    let rows = step_index(end, MAX_PIANOROLL_STEPS);
    if rows == MAX_PIANOROLL_STEPS {
        log::warn!(
            "piano roll of {} steps truncated to {}",
            end,
            MAX_PIANOROLL_STEPS
        );
    }
    rows
}

pub fn to_pianoroll_representation(
    music: &Music,
    options: &PianorollOptions,
) -> PianorollRepresentation {
    let rows = roll_length(music);
    let data = fill_roll(music.tracks.iter().flat_map(|t| &t.notes), rows, options.binarized);
    PianorollRepresentation {
        resolution: music.timing.beat_resolution,
        binarized: options.binarized,
        data,
    }
}

/// Turn runs of sounding cells back into notes
///
/// A run takes the velocity of its first cell (or the default velocity for a
/// binarized roll). Repeated notes with no gap merge into one.
pub fn from_pianoroll_representation(representation: &PianorollRepresentation) -> Music {
    let mut notes = Vec::new();
    for pitch in 0..PITCH_COUNT {
        let mut onset: Option<(usize, u8)> = None;
        for (time, row) in representation.data.iter().enumerate() {
            let value = row[pitch];
            match (onset, value > 0) {
                (None, true) => onset = Some((time, value)),
                (Some((start, velocity)), false) => {
                    notes.push(run_to_note(start, time, pitch, velocity, representation.binarized));
                    onset = None;
                }
                _ => {}
            }
        }
        if let Some((start, velocity)) = onset {
            let end = representation.data.len();
            notes.push(run_to_note(start, end, pitch, velocity, representation.binarized));
        }
    }
    notes.sort_by_key(|n| (n.time, n.pitch));

    Music::new()
        .with_timing(TimingInfo::new(representation.resolution))
        .with_tracks(vec![Track::default().with_notes(notes)])
}

fn run_to_note(start: usize, end: usize, pitch: usize, value: u8, binarized: bool) -> Note {
    let velocity = if binarized {
        DEFAULT_VELOCITY
    } else {
        i32::from(value)
    };
    Note::new(start as Time, pitch as i32, (end - start) as Time, velocity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn music() -> Music {
        Music::new().with_tracks(vec![
            Track::default().with_notes(vec![Note::new(0, 60, 4, 100), Note::new(2, 64, 4, 50)]),
            Track::new(1, false, None).with_notes(vec![Note::new(1, 60, 2, 120)]),
        ])
    }

    #[test]
    fn test_length_is_capped() {
        let far = Music::new().with_tracks(vec![
            Track::default().with_notes(vec![Note::new(1 << 40, 60, 4, 100)])
        ]);
        assert_eq!(roll_length(&far), MAX_PIANOROLL_STEPS);
    }

    #[test]
    fn test_cells_past_rows_are_dropped() {
        let notes = [Note::new(2, 60, 10, 100), Note::new(u64::MAX - 1, 62, 10, 100)];
        let data = fill_roll(&notes, 4, false);
        assert_eq!(data.len(), 4);
        assert_eq!(data[3][60], 100);
        assert!(data.iter().all(|row| row[62] == 0));
    }

    #[test]
    fn test_grid_spans_active_length() {
        let roll = to_pianoroll_representation(&music(), &PianorollOptions::default());
        assert_eq!(roll.rows(), 6);
        assert_eq!(roll.get(0, 60), 100);
        assert_eq!(roll.get(3, 64), 50);
        assert_eq!(roll.get(6, 64), 0);
        assert_eq!(roll.active_pitches(2), vec![60, 64]);
    }

    #[test]
    fn test_overlap_keeps_louder_value() {
        let roll = to_pianoroll_representation(&music(), &PianorollOptions::default());
        assert_eq!(roll.get(1, 60), 120);
        assert_eq!(roll.get(3, 60), 100);
    }

    #[test]
    fn test_binarized() {
        let roll = to_pianoroll_representation(&music(), &PianorollOptions { binarized: true });
        assert!(roll.data.iter().flatten().all(|&v| v <= 1));
        assert_eq!(roll.get(0, 60), 1);
    }

    #[test]
    fn test_values_stay_in_midi_range() {
        let mut loud = music();
        loud.tracks[0].notes[0].velocity = 127;
        let roll = to_pianoroll_representation(&loud, &PianorollOptions::default());
        assert!(roll.data.iter().flatten().all(|&v| v <= 127));
    }

    #[test]
    fn test_inverse_recovers_separate_notes() {
        let original = Music::new().with_tracks(vec![Track::default().with_notes(vec![
            Note::new(0, 60, 2, 90),
            Note::new(3, 60, 2, 80),
            Note::new(1, 72, 4, 70),
        ])]);
        let roll = to_pianoroll_representation(&original, &PianorollOptions::default());
        let decoded = from_pianoroll_representation(&roll);
        assert_eq!(
            decoded.tracks[0].notes,
            vec![Note::new(0, 60, 2, 90), Note::new(1, 72, 4, 70), Note::new(3, 60, 2, 80)]
        );
    }

    #[test]
    fn test_empty_music_gives_empty_roll() {
        let roll = to_pianoroll_representation(&Music::new(), &PianorollOptions::default());
        assert_eq!(roll.rows(), 0);
        assert!(from_pianoroll_representation(&roll).tracks[0].notes.is_empty());
    }
}
