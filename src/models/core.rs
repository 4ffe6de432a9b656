//! The `Music` container
//!
//! `Music` owns one piece of symbolic music: metadata, a time basis, five
//! sequences of time-stamped entities, downbeat positions and the tracks.
//! It offers validation, pruning, length queries, bulk mutation and the
//! dispatch into representations and file formats.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::elements::{Annotation, KeySignature, Lyric, Tempo, TimeSignature};
use super::metadata::{MetaData, TimingInfo};
use super::track::Track;
use super::validation::{
    last_time, remove_invalid_from_list, sort_by_time, validate_list, Time, Validate,
};
use crate::converters::{
    self, Converted, EventOptions, EventRepresentation, Multitrack, NoteRepresentation,
    PianorollOptions, PianorollRepresentation, PlayerModel, Representation,
};
use crate::defaults::{MAX_MIDI_VALUE, MIN_MIDI_VALUE};
use crate::error::{MusicError, Result};
use crate::io;

/// A universal container for symbolic music
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Music {
    pub meta_data: MetaData,
    pub timing: TimingInfo,
    pub time_signatures: Vec<TimeSignature>,
    pub key_signatures: Vec<KeySignature>,
    pub tempos: Vec<Tempo>,
    /// Downbeat positions in ticks
    pub downbeats: Vec<Time>,
    pub lyrics: Vec<Lyric>,
    pub annotations: Vec<Annotation>,
    pub tracks: Vec<Track>,
}

/// Anything `Music::append` accepts, one variant per target sequence
#[derive(Clone, Debug, PartialEq)]
pub enum Entity {
    TimeSignature(TimeSignature),
    KeySignature(KeySignature),
    Tempo(Tempo),
    Lyric(Lyric),
    Annotation(Annotation),
    Track(Track),
}

macro_rules! entity_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Entity {
                fn from(value: $variant) -> Self {
                    Entity::$variant(value)
                }
            }
        )*
    };
}

entity_from!(TimeSignature, KeySignature, Tempo, Lyric, Annotation, Track);

impl Music {
    /// Empty container with fresh default metadata and timing
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_meta_data(mut self, meta_data: MetaData) -> Self {
        self.meta_data = meta_data;
        self
    }

    pub fn with_timing(mut self, timing: TimingInfo) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_tracks(mut self, tracks: Vec<Track>) -> Self {
        self.tracks = tracks;
        self
    }

    /// Return to the freshly constructed state
    ///
    /// Downbeats are left untouched.
    pub fn reset(&mut self) {
        self.meta_data = MetaData::default();
        self.timing = TimingInfo::default();
        self.time_signatures.clear();
        self.key_signatures.clear();
        self.tempos.clear();
        self.lyrics.clear();
        self.annotations.clear();
        self.tracks.clear();
    }

    /// Check every attribute; the first failure is returned with its path
    pub fn validate(&self) -> Result<()> {
        self.meta_data.validate()?;
        self.timing.validate()?;
        validate_list(&self.time_signatures, "time_signatures")?;
        validate_list(&self.key_signatures, "key_signatures")?;
        validate_list(&self.tempos, "tempos")?;
        validate_list(&self.lyrics, "lyrics")?;
        validate_list(&self.annotations, "annotations")?;
        validate_list(&self.tracks, "tracks")?;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Drop invalid time signatures, key signatures, tempos, lyrics and
    /// annotations, and each track's invalid notes, lyrics and annotations.
    /// Tracks themselves are kept.
    pub fn remove_invalid(&mut self) {
        let mut removed = remove_invalid_from_list(&mut self.time_signatures);
        removed += remove_invalid_from_list(&mut self.key_signatures);
        removed += remove_invalid_from_list(&mut self.tempos);
        removed += remove_invalid_from_list(&mut self.lyrics);
        removed += remove_invalid_from_list(&mut self.annotations);
        for track in &mut self.tracks {
            removed += track.remove_invalid();
        }
        if removed > 0 {
            log::debug!("remove_invalid dropped {} entities", removed);
        }
    }

    /// End time of the last note over all tracks
    pub fn get_active_length(&self) -> Result<Time> {
        if self.tracks.is_empty() {
            return Err(MusicError::EmptyAggregate("tracks"));
        }
        self.tracks
            .iter()
            .filter_map(Track::get_active_length)
            .max()
            .ok_or(MusicError::EmptyAggregate("notes"))
    }

    /// Time of the last event: note-offs, time signatures, key signatures,
    /// tempos, lyrics and annotations
    ///
    /// With `is_sorted` the last element of each sequence is trusted (call
    /// [`Music::sort`] first); otherwise every sequence is scanned.
    pub fn get_length(&self, is_sorted: bool) -> Result<Time> {
        let mut length = self.get_active_length()?;
        let candidates = [
            (last_time(&self.time_signatures, is_sorted), "time_signatures"),
            (last_time(&self.key_signatures, is_sorted), "key_signatures"),
            (last_time(&self.tempos, is_sorted), "tempos"),
            (last_time(&self.lyrics, is_sorted), "lyrics"),
            (last_time(&self.annotations, is_sorted), "annotations"),
        ];
        for (time, name) in candidates {
            length = length.max(time.ok_or(MusicError::EmptyAggregate(name))?);
        }
        Ok(length)
    }

    /// Append to the sequence matching the entity's type
    pub fn append(&mut self, obj: impl Into<Entity>) {
        match obj.into() {
            Entity::TimeSignature(value) => self.time_signatures.push(value),
            Entity::KeySignature(value) => self.key_signatures.push(value),
            Entity::Tempo(value) => self.tempos.push(value),
            Entity::Lyric(value) => self.lyrics.push(value),
            Entity::Annotation(value) => self.annotations.push(value),
            Entity::Track(value) => self.tracks.push(value),
        }
    }

    /// Clamp every note velocity into `[lower, upper]`
    pub fn clip(&mut self, lower: i32, upper: i32) {
        for track in &mut self.tracks {
            track.clip(lower, upper);
        }
    }

    /// Clamp every note velocity into the 7-bit MIDI range
    pub fn clip_default(&mut self) {
        self.clip(MIN_MIDI_VALUE, MAX_MIDI_VALUE);
    }

    /// Stable sort of every time-stamped sequence, then of each track
    ///
    /// Time signatures order by [`TimeSignature::start`]. Downbeats are not
    /// touched.
    pub fn sort(&mut self) {
        self.time_signatures.sort_by_key(TimeSignature::start);
        sort_by_time(&mut self.key_signatures);
        sort_by_time(&mut self.tempos);
        sort_by_time(&mut self.lyrics);
        sort_by_time(&mut self.annotations);
        for track in &mut self.tracks {
            track.sort();
        }
    }

    /// Shift every note by `semitone`; positive raises the pitch
    pub fn transpose(&mut self, semitone: i32) {
        for track in &mut self.tracks {
            track.transpose(semitone);
        }
    }

    // ----- representation dispatch -----

    /// Convert to a representation or object model chosen by name
    ///
    /// Accepted (case-insensitive): "event", "event-based", "note",
    /// "note-based", "pianoroll", "piano-roll", "pretty_midi", "pypianoroll".
    pub fn to(&self, target: &str) -> Result<Converted> {
        converters::convert(self, target)
    }

    /// Convert to one of the three internal representations chosen by name
    pub fn to_representation(&self, target: &str) -> Result<Representation> {
        converters::to_representation(self, target)
    }

    pub fn to_event_representation(&self) -> EventRepresentation {
        converters::to_event_representation(self, &EventOptions::default())
    }

    pub fn to_note_representation(&self) -> NoteRepresentation {
        converters::to_note_representation(self)
    }

    pub fn to_pianoroll_representation(&self) -> PianorollRepresentation {
        converters::to_pianoroll_representation(self, &PianorollOptions::default())
    }

    pub fn to_pretty_midi(&self) -> PlayerModel {
        converters::to_pretty_midi(self)
    }

    pub fn to_pypianoroll(&self) -> Multitrack {
        converters::to_pypianoroll(self)
    }

    // ----- file output -----

    /// Save losslessly; JSON or YAML chosen by extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        io::save(self, path)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        io::save_json(self, path)
    }

    pub fn save_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        io::save_yaml(self, path)
    }

    /// Write lossily; MIDI or MusicXML chosen by extension
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        io::write(self, path)
    }

    pub fn write_midi(&self, path: impl AsRef<Path>) -> Result<()> {
        io::write_midi(self, path)
    }

    pub fn write_musicxml(&self, path: impl AsRef<Path>) -> Result<()> {
        io::write_musicxml(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{KeyMode, Note};

    fn populated() -> Music {
        let mut music = Music::new();
        music.append(TimeSignature::new(48, 3, 4));
        music.append(TimeSignature::new(0, 4, 4));
        music.append(KeySignature::new(30, 7, KeyMode::Major));
        music.append(KeySignature::new(0, 0, KeyMode::Major));
        music.append(Tempo::new(5, 100.0));
        music.append(Tempo::new(2, 120.0));
        music.append(Lyric::new(200, "end"));
        music.append(Lyric::new(10, "la"));
        music.append(Annotation::new(7, "dolce"));
        music.append(Annotation::new(1, "p"));
        music.append(Track::new(0, false, None).with_notes(vec![
            Note::new(12, 64, 12, 90),
            Note::new(0, 60, 96, 80),
        ]));
        music.append(Track::new(33, false, None).with_notes(vec![Note::new(100, 40, 20, 70)]));
        music
    }

    #[test]
    fn test_new_is_empty_and_valid() {
        let music = Music::new();
        assert!(music.time_signatures.is_empty());
        assert!(music.key_signatures.is_empty());
        assert!(music.tempos.is_empty());
        assert!(music.downbeats.is_empty());
        assert!(music.lyrics.is_empty());
        assert!(music.annotations.is_empty());
        assert!(music.tracks.is_empty());
        assert_eq!(music.meta_data, MetaData::default());
        assert_eq!(music.timing, TimingInfo::default());
        assert!(music.validate().is_ok());
    }

    #[test]
    fn test_append_tempo_touches_only_tempos() {
        let mut music = Music::new();
        music.append(Tempo::new(0, 90.0));
        assert_eq!(music.tempos.len(), 1);
        assert_eq!(music.tempos[0], Tempo::new(0, 90.0));
        assert!(music.time_signatures.is_empty());
        assert!(music.key_signatures.is_empty());
        assert!(music.lyrics.is_empty());
        assert!(music.annotations.is_empty());
        assert!(music.tracks.is_empty());
    }

    #[test]
    fn test_append_routes_every_entity_kind() {
        let mut music = Music::new();
        music.append(TimeSignature::new(0, 4, 4));
        music.append(KeySignature::new(0, 2, KeyMode::Minor));
        music.append(Lyric::new(3, "oh"));
        music.append(Annotation::new(4, "fine"));
        music.append(Track::default());
        assert_eq!(music.time_signatures.len(), 1);
        assert_eq!(music.key_signatures.len(), 1);
        assert_eq!(music.lyrics.last(), Some(&Lyric::new(3, "oh")));
        assert_eq!(music.annotations.len(), 1);
        assert_eq!(music.tracks.len(), 1);
    }

    #[test]
    fn test_reset_keeps_downbeats() {
        let mut music = populated();
        music.downbeats = vec![0, 96];
        music.meta_data.title = Some("Old".to_string());
        music.timing.beat_resolution = 480;
        music.reset();

        assert!(music.tracks.is_empty());
        assert!(music.tempos.is_empty());
        assert!(music.lyrics.is_empty());
        assert_eq!(music.meta_data, MetaData::default());
        assert_eq!(music.timing, TimingInfo::default());
        assert_eq!(music.downbeats, vec![0, 96]);
    }

    #[test]
    fn test_validate_reports_first_failure_path() {
        let mut music = populated();
        music.tempos[1].qpm = 0.0;
        music.tracks[1].notes[0].pitch = 130;
        match music.validate() {
            Err(MusicError::Invalid { field, .. }) => assert_eq!(field, "tempos[1].qpm"),
            other => panic!("unexpected result: {:?}", other),
        }
        music.tempos[1].qpm = 60.0;
        match music.validate() {
            Err(MusicError::Invalid { field, .. }) => {
                assert_eq!(field, "tracks[1].notes[0].pitch")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_checks_timing() {
        let mut music = Music::new();
        music.timing.beat_resolution = 0;
        assert!(music.validate().is_err());
    }

    #[test]
    fn test_remove_invalid_is_idempotent() {
        let mut music = populated();
        music.append(Tempo::new(9, -1.0));
        music.append(Lyric::new(9, ""));
        music.tracks[0].notes.push(Note::new(0, 60, 1, 300));
        let track_count = music.tracks.len();

        music.remove_invalid();
        let once = music.clone();
        music.remove_invalid();

        assert_eq!(music, once);
        assert_eq!(music.tracks.len(), track_count);
        assert_eq!(music.tempos.len(), 2);
        assert_eq!(music.lyrics.len(), 2);
        assert!(music.is_valid());
    }

    #[test]
    fn test_remove_invalid_keeps_empty_tracks() {
        let mut music = Music::new();
        music.append(Track::default().with_notes(vec![Note::new(0, -3, 1, 64)]));
        music.remove_invalid();
        assert_eq!(music.tracks.len(), 1);
        assert!(music.tracks[0].notes.is_empty());
    }

    #[test]
    fn test_active_length() {
        let music = populated();
        assert_eq!(music.get_active_length().unwrap(), 120);
    }

    #[test]
    fn test_active_length_empty_aggregates() {
        let mut music = Music::new();
        assert!(matches!(
            music.get_active_length(),
            Err(MusicError::EmptyAggregate("tracks"))
        ));
        music.append(Track::default());
        assert!(matches!(
            music.get_active_length(),
            Err(MusicError::EmptyAggregate("notes"))
        ));
    }

    #[test]
    fn test_length_sorted_matches_unsorted() {
        let mut music = populated();
        let unsorted = music.get_length(false).unwrap();
        music.sort();
        let sorted = music.get_length(true).unwrap();
        assert_eq!(unsorted, 200);
        assert_eq!(sorted, unsorted);
    }

    #[test]
    fn test_length_requires_every_sequence() {
        let mut music = populated();
        music.annotations.clear();
        assert!(matches!(
            music.get_length(false),
            Err(MusicError::EmptyAggregate("annotations"))
        ));
    }

    #[test]
    fn test_sort_orders_tempos() {
        let mut music = Music::new();
        music.append(Tempo::new(5, 100.0));
        music.append(Tempo::new(2, 120.0));
        music.sort();
        let times: Vec<Time> = music.tempos.iter().map(|t| t.time).collect();
        assert_eq!(times, vec![2, 5]);
    }

    #[test]
    fn test_sort_leaves_sequences_non_decreasing() {
        let mut music = populated();
        music.downbeats = vec![96, 0];
        music.sort();

        assert!(music.time_signatures.windows(2).all(|w| w[0].start() <= w[1].start()));
        assert!(music.key_signatures.windows(2).all(|w| w[0].time <= w[1].time));
        assert!(music.tempos.windows(2).all(|w| w[0].time <= w[1].time));
        assert!(music.lyrics.windows(2).all(|w| w[0].time <= w[1].time));
        assert!(music.annotations.windows(2).all(|w| w[0].time <= w[1].time));
        assert!(music.tracks[0].notes.windows(2).all(|w| w[0].time <= w[1].time));
        assert_eq!(music.downbeats, vec![96, 0]);
    }

    #[test]
    fn test_clip_is_idempotent_and_bounded() {
        let mut music = populated();
        music.tracks[0].notes[0].velocity = 200;
        music.tracks[1].notes[0].velocity = -4;
        music.clip_default();
        let once = music.clone();
        music.clip_default();
        assert_eq!(music, once);

        music.clip(75, 85);
        for note in music.tracks.iter().flat_map(|t| &t.notes) {
            assert!((75..=85).contains(&note.velocity));
        }
    }

    #[test]
    fn test_transpose_round_trip() {
        let mut music = populated();
        let original = music.clone();
        music.transpose(5);
        assert_eq!(music.tracks[0].notes[1].pitch, 65);
        music.transpose(-5);
        assert_eq!(music, original);
    }

    #[test]
    fn test_to_unsupported_names_selector() {
        let music = populated();
        match music.to("unsupported") {
            Err(MusicError::UnsupportedTarget(value)) => assert_eq!(value, "unsupported"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_forwarding_methods_return_values() {
        let music = populated();
        assert_eq!(music.to_note_representation().len(), 3);
        assert!(!music.to_event_representation().is_empty());
        assert_eq!(music.to_pianoroll_representation().rows(), 120);
        assert_eq!(music.to_pretty_midi().instruments.len(), 2);
        assert_eq!(music.to_pypianoroll().tracks.len(), 2);
    }
}
