use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};

use crate::defaults::{assign_channel, DRUM_CHANNEL};
use crate::error::{MusicError, Result};
use crate::models::{Annotation, Lyric, Music, Time, Validate};

/// Largest ticks-per-quarter value a metrical SMF header can carry
const MAX_TICKS_PER_QUARTER: u32 = 0x7FFF;

/// Annotation group written as a MIDI marker instead of a text event
pub const MARKER_GROUP: &str = "marker";

/// Order of events sharing one tick
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Meta,
    Program,
    NoteOff,
    NoteOn,
    /// Off of a zero-length note, after its own on
    ZeroLengthOff,
}

type TimedEvent<'a> = (Time, Rank, TrackEventKind<'a>);

/// Write the container as a Standard MIDI File (SMF) Format 1
///
/// Track 0 holds tempo, meter, key, container lyrics and text annotations;
/// every `Track` becomes its own MIDI track.
pub fn write_smf(music: &Music, out: &mut Vec<u8>) -> Result<()> {
    let resolution = music.timing.beat_resolution;
    if resolution == 0 || resolution > MAX_TICKS_PER_QUARTER {
        return Err(MusicError::Midi(format!(
            "beat resolution {} does not fit a MIDI header",
            resolution
        )));
    }

    let mut tracks = Vec::with_capacity(music.tracks.len() + 1);
    tracks.push(build_conductor_track(music));
    for (index, track) in music.tracks.iter().enumerate() {
        tracks.push(build_note_track(track, index));
    }

    let smf = Smf {
        header: Header {
            format: Format::Parallel,
            timing: Timing::Metrical((resolution as u16).into()),
        },
        tracks,
    };

    smf.write(out)
        .map_err(|e| MusicError::Midi(format!("Failed to write MIDI: {}", e)))?;

    Ok(())
}

fn build_conductor_track(music: &Music) -> Track<'_> {
    let mut events: Vec<TimedEvent> = Vec::new();

    if let Some(title) = &music.meta_data.title {
        events.push((0, Rank::Meta, TrackEventKind::Meta(MetaMessage::TrackName(title.as_bytes()))));
    }
    if let Some(copyright) = &music.meta_data.copyright {
        events.push((0, Rank::Meta, TrackEventKind::Meta(MetaMessage::Copyright(copyright.as_bytes()))));
    }

    for tempo in music.tempos.iter().filter(|t| t.is_valid()) {
        let micros = tempo.microseconds_per_quarter().min(0xFF_FFFF);
        events.push((tempo.time, Rank::Meta, TrackEventKind::Meta(MetaMessage::Tempo(micros.into()))));
    }

    for ts in music.time_signatures.iter().filter(|t| t.is_valid()) {
        // Denominator as power of 2 (e.g., 4 -> 2, 8 -> 3)
        let denominator_power = ts.denominator.trailing_zeros() as u8;
        events.push((
            ts.start(),
            Rank::Meta,
            TrackEventKind::Meta(MetaMessage::TimeSignature(
                ts.numerator.min(255) as u8,
                denominator_power,
                24, // MIDI clocks per metronome click
                8,  // 32nd notes per quarter note
            )),
        ));
    }

    for key in music.key_signatures.iter().filter(|k| k.is_valid()) {
        if let Some(fifths) = key.resolved_fifths() {
            let minor = matches!(key.mode, Some(crate::models::KeyMode::Minor));
            events.push((key.time, Rank::Meta, TrackEventKind::Meta(MetaMessage::KeySignature(fifths, minor))));
        }
    }

    push_lyrics(&mut events, &music.lyrics);
    push_annotations(&mut events, &music.annotations);

    finish_track(events)
}

fn build_note_track(track: &crate::models::Track, index: usize) -> Track<'_> {
    let mut events: Vec<TimedEvent> = Vec::new();
    let channel = if track.is_drum {
        DRUM_CHANNEL
    } else {
        assign_channel(index)
    };

    if let Some(name) = &track.name {
        events.push((0, Rank::Meta, TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes()))));
    }

    events.push((
        0,
        Rank::Program,
        TrackEventKind::Midi {
            channel: channel.into(),
            message: MidiMessage::ProgramChange {
                program: (track.program.clamp(0, 127) as u8).into(),
            },
        },
    ));

    for note in track.notes.iter().filter(|n| n.is_valid()) {
        let key = note.pitch as u8;
        events.push((
            note.time,
            Rank::NoteOn,
            TrackEventKind::Midi {
                channel: channel.into(),
                message: MidiMessage::NoteOn {
                    key: key.into(),
                    vel: (note.velocity as u8).into(),
                },
            },
        ));
        let off_rank = if note.duration == 0 {
            Rank::ZeroLengthOff
        } else {
            Rank::NoteOff
        };
        events.push((
            note.end(),
            off_rank,
            TrackEventKind::Midi {
                channel: channel.into(),
                message: MidiMessage::NoteOff {
                    key: key.into(),
                    vel: 0.into(),
                },
            },
        ));
    }

    push_lyrics(&mut events, &track.lyrics);
    push_annotations(&mut events, &track.annotations);

    finish_track(events)
}

fn push_lyrics<'a>(events: &mut Vec<TimedEvent<'a>>, lyrics: &'a [Lyric]) {
    for lyric in lyrics.iter().filter(|l| l.is_valid()) {
        events.push((lyric.time, Rank::Meta, TrackEventKind::Meta(MetaMessage::Lyric(lyric.lyric.as_bytes()))));
    }
}

/// Only plain-string annotations have a MIDI equivalent
fn push_annotations<'a>(events: &mut Vec<TimedEvent<'a>>, annotations: &'a [Annotation]) {
    for annotation in annotations {
        let Some(text) = annotation.text() else {
            log::debug!("skipping non-text annotation at {} in MIDI output", annotation.time);
            continue;
        };
        let message = if annotation.group.as_deref() == Some(MARKER_GROUP) {
            MetaMessage::Marker(text.as_bytes())
        } else {
            MetaMessage::Text(text.as_bytes())
        };
        events.push((annotation.time, Rank::Meta, TrackEventKind::Meta(message)));
    }
}

/// Sort by absolute tick, convert to delta times and close the track
fn finish_track(mut events: Vec<TimedEvent>) -> Track {
    events.sort_by_key(|&(tick, rank, _)| (tick, rank));

    let mut track = Vec::with_capacity(events.len() + 1);
    let mut prev_tick: Time = 0;
    for (tick, _, kind) in events {
        let delta = tick.saturating_sub(prev_tick).min(u64::from(u32::MAX >> 4)) as u32;
        track.push(TrackEvent {
            delta: delta.into(),
            kind,
        });
        prev_tick = tick;
    }

    // End of track
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    track
}
