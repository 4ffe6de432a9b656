use std::collections::{BTreeMap, HashMap, VecDeque};

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use crate::defaults::DRUM_CHANNEL;
use crate::error::{MusicError, Result};
use crate::models::{
    Annotation, KeyMode, KeySignature, Lyric, Music, Note, Tempo, Time, TimeSignature, TimingInfo,
    Track,
};
use crate::renderers::midi::MARKER_GROUP;

/// Per-MIDI-track state while walking its events
#[derive(Default)]
struct TrackReader {
    name: Option<String>,
    programs: [i32; 16],
    /// Finished notes by channel
    notes: BTreeMap<u8, Vec<Note>>,
    /// Open notes by (channel, pitch), oldest first
    open: HashMap<(u8, u8), VecDeque<(Time, i32)>>,
}

impl TrackReader {
    fn note_on(&mut self, tick: Time, channel: u8, key: u8, velocity: u8) {
        self.open
            .entry((channel, key))
            .or_default()
            .push_back((tick, i32::from(velocity)));
    }

    fn note_off(&mut self, tick: Time, channel: u8, key: u8) {
        match self.open.get_mut(&(channel, key)).and_then(|q| q.pop_front()) {
            Some((start, velocity)) => self.notes.entry(channel).or_default().push(Note::new(
                start,
                i32::from(key),
                tick - start,
                velocity,
            )),
            None => log::debug!("note-off without note-on: channel {} key {} at {}", channel, key, tick),
        }
    }

    /// Close hanging notes at the last tick of the track
    fn close_open_notes(&mut self, end: Time) {
        let open: Vec<((u8, u8), VecDeque<(Time, i32)>)> = self.open.drain().collect();
        for ((channel, key), queue) in open {
            for (start, velocity) in queue {
                log::warn!("closing hanging note: channel {} key {} from {}", channel, key, start);
                self.notes.entry(channel).or_default().push(Note::new(
                    start,
                    i32::from(key),
                    end.saturating_sub(start),
                    velocity,
                ));
            }
        }
    }

    /// One `Track` per channel that carried notes
    fn into_tracks(self) -> Vec<Track> {
        let TrackReader {
            name,
            programs,
            notes,
            ..
        } = self;
        notes
            .into_iter()
            .map(|(channel, mut notes)| {
                notes.sort_by_key(|n| (n.time, n.pitch));
                Track::new(programs[channel as usize], channel == DRUM_CHANNEL, name.clone())
                    .with_notes(notes)
            })
            .collect()
    }
}

/// Parse a Standard MIDI File into a container
///
/// Metrical timing sets the beat resolution. Tempo, meter, key, lyric, text
/// and marker events from every MIDI track land on the container; notes are
/// grouped into one track per (MIDI track, channel). A note-on with velocity
/// 0 ends a note.
pub fn parse_midi(bytes: &[u8]) -> Result<Music> {
    let smf = Smf::parse(bytes).map_err(|e| MusicError::Midi(format!("Failed to parse MIDI: {}", e)))?;

    let resolution = match smf.header.timing {
        Timing::Metrical(ticks_per_beat) => u32::from(ticks_per_beat.as_int()),
        Timing::Timecode(..) => {
            return Err(MusicError::UnsupportedFormat(
                "MIDI files with SMPTE timecode timing".to_string(),
            ))
        }
    };

    let mut music = Music::new().with_timing(TimingInfo::new(resolution));
    music.meta_data.source_format = Some("midi".to_string());

    for (index, events) in smf.tracks.iter().enumerate() {
        let mut reader = TrackReader::default();
        let mut tick: Time = 0;

        for event in events {
            tick += u64::from(event.delta.as_int());
            match event.kind {
                TrackEventKind::Midi { channel, message } => {
                    let channel = channel.as_int();
                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            reader.note_on(tick, channel, key.as_int(), vel.as_int())
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            reader.note_off(tick, channel, key.as_int())
                        }
                        MidiMessage::ProgramChange { program } => {
                            reader.programs[channel as usize] = i32::from(program.as_int())
                        }
                        _ => {}
                    }
                }
                TrackEventKind::Meta(meta) => match meta {
                    MetaMessage::TrackName(name) => reader.name = Some(text(name)),
                    MetaMessage::Copyright(notice) => music.meta_data.copyright = Some(text(notice)),
                    MetaMessage::Tempo(micros) => {
                        let micros = micros.as_int().max(1);
                        music.tempos.push(Tempo::new(tick, 60_000_000.0 / f64::from(micros)));
                    }
                    MetaMessage::TimeSignature(numerator, denominator_power, _, _) => {
                        music.time_signatures.push(TimeSignature::new(
                            tick,
                            u32::from(numerator),
                            1u32 << denominator_power.min(31),
                        ));
                    }
                    MetaMessage::KeySignature(fifths, minor) => {
                        let mode = if minor { KeyMode::Minor } else { KeyMode::Major };
                        music
                            .key_signatures
                            .push(KeySignature::from_fifths(tick, fifths, Some(mode)));
                    }
                    MetaMessage::Lyric(syllable) => music.lyrics.push(Lyric::new(tick, text(syllable))),
                    MetaMessage::Text(body) => music.annotations.push(Annotation::new(tick, text(body))),
                    MetaMessage::Marker(body) => {
                        let mut annotation = Annotation::new(tick, text(body));
                        annotation.group = Some(MARKER_GROUP.to_string());
                        music.annotations.push(annotation);
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        reader.close_open_notes(tick);

        // A name on a note-less first track is the sequence title
        if index == 0 && reader.notes.is_empty() {
            if let Some(title) = reader.name.take() {
                music.meta_data.title = Some(title);
            }
        }
        music.tracks.extend(reader.into_tracks());
    }

    log::debug!(
        "parsed MIDI: {} tracks at {} ticks per quarter",
        music.tracks.len(),
        resolution
    );
    Ok(music)
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::{Format, Header, Track as MidiTrack, TrackEvent};

    fn event(delta: u32, kind: TrackEventKind<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: delta.into(),
            kind,
        }
    }

    fn note_on(delta: u32, channel: u8, key: u8, vel: u8) -> TrackEvent<'static> {
        event(
            delta,
            TrackEventKind::Midi {
                channel: channel.into(),
                message: MidiMessage::NoteOn {
                    key: key.into(),
                    vel: vel.into(),
                },
            },
        )
    }

    fn end_of_track() -> TrackEvent<'static> {
        event(0, TrackEventKind::Meta(MetaMessage::EndOfTrack))
    }

    fn encode(tracks: Vec<MidiTrack<'static>>, timing: Timing) -> Vec<u8> {
        let smf = Smf {
            header: Header {
                format: Format::Parallel,
                timing,
            },
            tracks,
        };
        let mut out = Vec::new();
        smf.write(&mut out).unwrap();
        out
    }

    #[test]
    fn test_velocity_zero_ends_note() {
        let bytes = encode(
            vec![vec![
                event(0, TrackEventKind::Meta(MetaMessage::TrackName(b"Lead"))),
                note_on(0, 0, 60, 100),
                note_on(96, 0, 60, 0),
                end_of_track(),
            ]],
            Timing::Metrical(96.into()),
        );
        let music = parse_midi(&bytes).unwrap();
        assert_eq!(music.timing.beat_resolution, 96);
        assert_eq!(music.tracks.len(), 1);
        assert_eq!(music.tracks[0].name.as_deref(), Some("Lead"));
        assert_eq!(music.tracks[0].notes, vec![Note::new(0, 60, 96, 100)]);
        assert_eq!(music.meta_data.source_format.as_deref(), Some("midi"));
    }

    #[test]
    fn test_overlapping_same_pitch_pairs_oldest_first() {
        let bytes = encode(
            vec![vec![
                note_on(0, 0, 64, 80),
                note_on(10, 0, 64, 90),
                note_on(10, 0, 64, 0),
                note_on(10, 0, 64, 0),
                end_of_track(),
            ]],
            Timing::Metrical(24.into()),
        );
        let music = parse_midi(&bytes).unwrap();
        assert_eq!(
            music.tracks[0].notes,
            vec![Note::new(0, 64, 20, 80), Note::new(10, 64, 20, 90)]
        );
    }

    #[test]
    fn test_channels_split_into_tracks() {
        let bytes = encode(
            vec![vec![
                event(
                    0,
                    TrackEventKind::Midi {
                        channel: 1.into(),
                        message: MidiMessage::ProgramChange { program: 33.into() },
                    },
                ),
                note_on(0, 1, 40, 100),
                note_on(0, 9, 36, 100),
                note_on(12, 1, 40, 0),
                note_on(0, 9, 36, 0),
                end_of_track(),
            ]],
            Timing::Metrical(24.into()),
        );
        let music = parse_midi(&bytes).unwrap();
        assert_eq!(music.tracks.len(), 2);
        assert_eq!(music.tracks[0].program, 33);
        assert!(!music.tracks[0].is_drum);
        assert!(music.tracks[1].is_drum);
    }

    #[test]
    fn test_conductor_events() {
        let bytes = encode(
            vec![
                vec![
                    event(0, TrackEventKind::Meta(MetaMessage::TrackName(b"Title"))),
                    event(0, TrackEventKind::Meta(MetaMessage::Tempo(500_000.into()))),
                    event(0, TrackEventKind::Meta(MetaMessage::TimeSignature(6, 3, 24, 8))),
                    event(0, TrackEventKind::Meta(MetaMessage::KeySignature(-3, true))),
                    event(48, TrackEventKind::Meta(MetaMessage::Marker(b"Verse"))),
                    event(0, TrackEventKind::Meta(MetaMessage::Lyric(b"la"))),
                    end_of_track(),
                ],
                vec![note_on(0, 0, 60, 64), note_on(24, 0, 60, 0), end_of_track()],
            ],
            Timing::Metrical(24.into()),
        );
        let music = parse_midi(&bytes).unwrap();
        assert_eq!(music.meta_data.title.as_deref(), Some("Title"));
        assert_eq!(music.tempos, vec![Tempo::new(0, 120.0)]);
        assert_eq!(music.time_signatures, vec![TimeSignature::new(0, 6, 8)]);
        assert_eq!(music.key_signatures[0].fifths, Some(-3));
        assert_eq!(music.key_signatures[0].root, Some(0));
        assert_eq!(music.lyrics, vec![Lyric::new(48, "la")]);
        assert_eq!(music.annotations[0].text(), Some("Verse"));
        assert_eq!(music.annotations[0].group.as_deref(), Some(MARKER_GROUP));
        assert_eq!(music.tracks.len(), 1);
    }

    #[test]
    fn test_hanging_note_closed_at_track_end() {
        let bytes = encode(
            vec![vec![note_on(0, 0, 60, 64), event(30, TrackEventKind::Meta(MetaMessage::EndOfTrack))]],
            Timing::Metrical(24.into()),
        );
        let music = parse_midi(&bytes).unwrap();
        assert_eq!(music.tracks[0].notes, vec![Note::new(0, 60, 30, 64)]);
    }

    #[test]
    fn test_timecode_rejected() {
        let bytes = encode(vec![vec![end_of_track()]], Timing::Timecode(midly::Fps::Fps25, 40));
        assert!(matches!(parse_midi(&bytes), Err(MusicError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(parse_midi(b"not a midi file"), Err(MusicError::Midi(_))));
    }
}
