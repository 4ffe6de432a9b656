//! Event-based representation
//!
//! A piece becomes a stream of tokens over a fixed vocabulary:
//!
//! | index range | event |
//! |---|---|
//! | `0..128` | note-on, pitch = index |
//! | `128..256` | note-off, pitch = index - 128 |
//! | `256..256 + max_time_shift` | time shift of `1..=max_time_shift` ticks |
//! | then `velocity_bins` entries | velocity change, quantised |
//!
//! At equal times note-offs come before note-ons, except the note-off of a
//! zero-length note which follows its own note-on.

use std::collections::{HashMap, VecDeque};

use crate::defaults::{
    DEFAULT_MAX_TIME_SHIFT, DEFAULT_VELOCITY, DEFAULT_VELOCITY_BINS, MAX_MIDI_VALUE, PITCH_COUNT,
};
use crate::models::{Music, Note, Time, TimingInfo, Track, Validate};

/// Vocabulary settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventOptions {
    /// Longest single time-shift token, in ticks
    pub max_time_shift: u32,
    /// Number of velocity levels; velocity tokens are skipped when false
    pub velocity_bins: u32,
    pub use_velocity: bool,
}

impl Default for EventOptions {
    fn default() -> Self {
        Self {
            max_time_shift: DEFAULT_MAX_TIME_SHIFT,
            velocity_bins: DEFAULT_VELOCITY_BINS,
            use_velocity: true,
        }
    }
}

impl EventOptions {
    pub fn vocabulary_size(&self) -> u32 {
        2 * PITCH_COUNT as u32 + self.max_time_shift + self.velocity_bins
    }

    fn quantize_velocity(&self, velocity: i32) -> u32 {
        let clamped = velocity.clamp(0, MAX_MIDI_VALUE) as u32;
        clamped * self.velocity_bins.max(1) / (MAX_MIDI_VALUE as u32 + 1)
    }

    /// Centre of a velocity bin
    fn dequantize_velocity(&self, bin: u32) -> i32 {
        let width = f64::from(MAX_MIDI_VALUE + 1) / f64::from(self.velocity_bins.max(1));
        ((f64::from(bin) + 0.5) * width).floor().min(f64::from(MAX_MIDI_VALUE)) as i32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    NoteOn(u8),
    NoteOff(u8),
    /// Advance the clock by this many ticks (at least 1)
    TimeShift(u32),
    /// Set the velocity bin used by following note-ons
    Velocity(u32),
}

impl Event {
    pub fn index(&self, options: &EventOptions) -> u32 {
        let pitches = PITCH_COUNT as u32;
        match *self {
            Event::NoteOn(pitch) => u32::from(pitch),
            Event::NoteOff(pitch) => pitches + u32::from(pitch),
            Event::TimeShift(ticks) => 2 * pitches + ticks - 1,
            Event::Velocity(bin) => 2 * pitches + options.max_time_shift + bin,
        }
    }

    pub fn from_index(index: u32, options: &EventOptions) -> Option<Event> {
        let pitches = PITCH_COUNT as u32;
        let shift_start = 2 * pitches;
        let velocity_start = shift_start + options.max_time_shift;
        if index < pitches {
            Some(Event::NoteOn(index as u8))
        } else if index < shift_start {
            Some(Event::NoteOff((index - pitches) as u8))
        } else if index < velocity_start {
            Some(Event::TimeShift(index - shift_start + 1))
        } else if index < velocity_start + options.velocity_bins {
            Some(Event::Velocity(index - velocity_start))
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EventRepresentation {
    pub resolution: u32,
    pub options: EventOptions,
    pub events: Vec<Event>,
}

impl EventRepresentation {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Token indices into the vocabulary
    pub fn indices(&self) -> Vec<u32> {
        self.events.iter().map(|e| e.index(&self.options)).collect()
    }

    pub fn from_indices(resolution: u32, options: EventOptions, indices: &[u32]) -> Self {
        let events = indices
            .iter()
            .filter_map(|&i| Event::from_index(i, &options))
            .collect();
        Self {
            resolution,
            options,
            events,
        }
    }
}

/// Sort rank of a timed note boundary
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Boundary {
    Off,
    On,
    ZeroLengthOff,
}

pub fn to_event_representation(music: &Music, options: &EventOptions) -> EventRepresentation {
    let mut boundaries: Vec<(Time, Boundary, u8, i32)> = Vec::new();
    for note in music.tracks.iter().flat_map(|t| &t.notes) {
        if note.validate().is_err() {
            log::debug!("skipping out-of-range note {:?} in event encoding", note);
            continue;
        }
        let pitch = note.pitch as u8;
        let off = if note.duration == 0 {
            Boundary::ZeroLengthOff
        } else {
            Boundary::Off
        };
        boundaries.push((note.time, Boundary::On, pitch, note.velocity));
        boundaries.push((note.end(), off, pitch, note.velocity));
    }
    boundaries.sort_by_key(|&(time, kind, pitch, _)| (time, kind, pitch));

    let max_shift = options.max_time_shift.max(1);
    let mut events = Vec::with_capacity(boundaries.len() * 2);
    let mut cursor: Time = 0;
    let mut current_bin: Option<u32> = None;

    for (time, kind, pitch, velocity) in boundaries {
        let mut gap = time - cursor;
        while gap > 0 {
            let step = gap.min(u64::from(max_shift));
            events.push(Event::TimeShift(step as u32));
            gap -= step;
        }
        cursor = time;

        match kind {
            Boundary::On => {
                if options.use_velocity && options.velocity_bins > 0 {
                    let bin = options.quantize_velocity(velocity);
                    if current_bin != Some(bin) {
                        events.push(Event::Velocity(bin));
                        current_bin = Some(bin);
                    }
                }
                events.push(Event::NoteOn(pitch));
            }
            Boundary::Off | Boundary::ZeroLengthOff => events.push(Event::NoteOff(pitch)),
        }
    }

    EventRepresentation {
        resolution: music.timing.beat_resolution,
        options: options.clone(),
        events,
    }
}

/// Decode an event stream into a single-track container
///
/// Note-offs close the oldest open note of the same pitch; notes still open
/// at the end are closed at the final clock position.
pub fn from_event_representation(representation: &EventRepresentation) -> Music {
    let options = &representation.options;
    let mut cursor: Time = 0;
    let mut velocity = DEFAULT_VELOCITY;
    let mut open: HashMap<u8, VecDeque<(Time, i32)>> = HashMap::new();
    let mut notes = Vec::new();

    for event in &representation.events {
        match *event {
            Event::TimeShift(ticks) => cursor += u64::from(ticks),
            Event::Velocity(bin) => velocity = options.dequantize_velocity(bin),
            Event::NoteOn(pitch) => open.entry(pitch).or_default().push_back((cursor, velocity)),
            Event::NoteOff(pitch) => {
                if let Some((start, vel)) = open.get_mut(&pitch).and_then(|q| q.pop_front()) {
                    notes.push(Note::new(start, i32::from(pitch), cursor - start, vel));
                }
            }
        }
    }
    for (pitch, queue) in open {
        for (start, vel) in queue {
            notes.push(Note::new(start, i32::from(pitch), cursor - start, vel));
        }
    }
    notes.sort_by_key(|n| (n.time, n.pitch));

    Music::new()
        .with_timing(TimingInfo::new(representation.resolution))
        .with_tracks(vec![Track::default().with_notes(notes)])
}
