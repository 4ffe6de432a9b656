//! Container to MusicXML conversion
//!
//! Every track becomes one part. Measures follow the first time signature;
//! notes sharing an onset are written as a chord, silent gaps become
//! `<forward>` and notes that overlap a previous group are placed with
//! `<backup>`. A measure without notes holds one measure rest. Notes are not
//! split at bar lines; a note that runs past its measure is followed by a
//! `<backup>` back to the bar line.

use std::collections::BTreeMap;

use super::builder::{Clef, MusicXmlBuilder, PartAttributes, XmlNote};
use crate::defaults::{assign_channel, DEFAULT_TIME_SIGNATURE, DRUM_CHANNEL};
use crate::error::{MusicError, Result};
use crate::models::{KeySignature, Lyric, Music, Note, Tempo, Time, TimeSignature, Track, Validate};

/// Middle C; tracks sounding lower on average get a bass clef
const BASS_CLEF_THRESHOLD: f64 = 60.0;

pub fn to_musicxml(music: &Music) -> Result<String> {
    let resolution = music.timing.beat_resolution;
    if resolution == 0 {
        return Err(MusicError::Xml("beat resolution must be positive".to_string()));
    }

    let time_signature = first_valid(&music.time_signatures, TimeSignature::start);
    let (beats, beat_type) = time_signature
        .map(|ts| (ts.numerator, ts.denominator))
        .unwrap_or(DEFAULT_TIME_SIGNATURE);
    let measure_length = TimeSignature::new(0, beats, beat_type)
        .measure_length(resolution)
        .max(1);

    let key = first_valid(&music.key_signatures, |k: &KeySignature| k.time);
    let fifths = key.and_then(KeySignature::resolved_fifths).unwrap_or(0);
    let mode = key.and_then(|k| k.mode);
    let tempo = first_valid(&music.tempos, |t: &Tempo| t.time).map(|t| t.qpm);

    let end = music
        .tracks
        .iter()
        .flat_map(|t| &t.notes)
        .filter(|n| n.is_valid())
        .map(Note::end)
        .max()
        .unwrap_or(0);
    let measure_count = end.div_ceil(measure_length).max(1);

    let mut builder = MusicXmlBuilder::new(resolution);
    builder.set_title(music.meta_data.title.clone());
    builder.set_identification(&music.meta_data.creators, music.meta_data.copyright.as_deref());
    builder.set_key_spelling(fifths);

    for (index, track) in music.tracks.iter().enumerate() {
        let name = track
            .name
            .clone()
            .unwrap_or_else(|| format!("Track {}", index + 1));
        let channel = if track.is_drum {
            DRUM_CHANNEL
        } else {
            assign_channel(index)
        };
        let id = builder.start_part(&name, track.program, channel);

        let attributes = PartAttributes {
            divisions: resolution,
            fifths,
            mode,
            beats,
            beat_type,
            clef: clef_for(track),
        };

        // Container-level lyrics ride on the first part
        let mut lyrics: Vec<&Lyric> = track.lyrics.iter().collect();
        if index == 0 {
            lyrics.extend(&music.lyrics);
        }

        write_part(
            &mut builder,
            track,
            &lyrics,
            &attributes,
            if index == 0 { tempo } else { None },
            measure_length,
            measure_count,
        );
        builder.end_part(&id);
    }

    log::debug!(
        "MusicXML export: {} parts, {} measures of {} ticks",
        music.tracks.len(),
        measure_count,
        measure_length
    );

    Ok(builder.finalize())
}

fn write_part(
    builder: &mut MusicXmlBuilder,
    track: &Track,
    lyrics: &[&Lyric],
    attributes: &PartAttributes,
    tempo: Option<f64>,
    measure_length: Time,
    measure_count: Time,
) {
    // Onset -> notes, ordered by pitch within the group
    let mut groups: BTreeMap<Time, Vec<&Note>> = BTreeMap::new();
    for note in track.notes.iter().filter(|n| n.is_valid()) {
        groups.entry(note.time).or_default().push(note);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|n| (n.pitch, n.duration));
    }

    let mut lyric_at: BTreeMap<Time, &str> = BTreeMap::new();
    for lyric in lyrics.iter().filter(|l| l.is_valid()) {
        lyric_at.entry(lyric.time).or_insert(lyric.lyric.as_str());
    }

    for measure in 0..measure_count {
        let start = measure.saturating_mul(measure_length);
        let end = start.saturating_add(measure_length);

        builder.start_measure();
        if measure == 0 {
            builder.write_attributes(attributes);
            if let Some(qpm) = tempo {
                builder.write_tempo(qpm);
            }
        }

        let mut measure_groups = groups.range(start..end).peekable();
        if measure_groups.peek().is_none() {
            builder.write_rest(measure_length);
            builder.end_measure();
            continue;
        }

        let mut cursor = start;
        for (&onset, group) in measure_groups {
            if onset > cursor {
                builder.write_forward(onset - cursor);
            } else if onset < cursor {
                builder.write_backup(cursor - onset);
            }

            for (position, note) in group.iter().enumerate() {
                builder.write_note(&XmlNote {
                    pitch: note.pitch,
                    duration: note.duration,
                    velocity: note.velocity,
                    chord: position > 0,
                    lyric: if position == 0 {
                        lyric_at.get(&onset).copied()
                    } else {
                        None
                    },
                });
            }
            // A chord advances by its first note
            cursor = onset.saturating_add(group[0].duration.max(1));
        }

        // Leave every measure positioned at its bar line
        if cursor < end {
            builder.write_forward(end - cursor);
        } else if cursor > end {
            builder.write_backup(cursor - end);
        }
        builder.end_measure();
    }
}

fn clef_for(track: &Track) -> Clef {
    if track.is_drum {
        return Clef::Percussion;
    }
    let pitches: Vec<f64> = track
        .notes
        .iter()
        .filter(|n| n.is_valid())
        .map(|n| f64::from(n.pitch))
        .collect();
    if pitches.is_empty() {
        return Clef::Treble;
    }
    let mean = pitches.iter().sum::<f64>() / pitches.len() as f64;
    if mean < BASS_CLEF_THRESHOLD {
        Clef::Bass
    } else {
        Clef::Treble
    }
}

/// Earliest valid item by the given time key
fn first_valid<T: Validate>(items: &[T], time: impl Fn(&T) -> Time) -> Option<&T> {
    items.iter().filter(|i| i.is_valid()).min_by_key(|i| time(i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{KeyMode, MetaData, TimingInfo};

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn test_empty_music_has_no_parts() {
        let xml = to_musicxml(&Music::new()).unwrap();
        assert!(xml.contains("<part-list>"));
        assert_eq!(count(&xml, "<part id="), 0);
    }

    #[test]
    fn test_measures_follow_time_signature() {
        let mut music = Music::new();
        music.append(TimeSignature::new(0, 3, 4));
        // 3/4 at 24 ticks per quarter: 72-tick measures
        music.append(Track::default().with_notes(vec![Note::new(0, 60, 24, 64), Note::new(100, 62, 24, 64)]));
        let xml = to_musicxml(&music).unwrap();
        assert_eq!(count(&xml, "<measure number="), 2);
        assert!(xml.contains("<beats>3</beats>"));
        assert!(xml.contains("<beat-type>4</beat-type>"));
    }

    #[test]
    fn test_chords_and_gaps() {
        let music = Music::new().with_tracks(vec![Track::default().with_notes(vec![
            Note::new(24, 60, 24, 64),
            Note::new(24, 64, 24, 64),
        ])]);
        let xml = to_musicxml(&music).unwrap();
        assert_eq!(count(&xml, "<chord/>"), 1);
        // Leading gap, then trailing gap to fill 4/4
        assert!(xml.contains("<forward><duration>24</duration></forward>"));
        assert!(xml.contains("<forward><duration>48</duration></forward>"));
        assert_eq!(count(&xml, "<rest/>"), 0);
    }

    #[test]
    fn test_empty_measure_gets_rest() {
        let music = Music::new().with_tracks(vec![Track::default().with_notes(vec![Note::new(100, 60, 24, 64)])]);
        let xml = to_musicxml(&music).unwrap();
        assert_eq!(count(&xml, "<measure number="), 2);
        assert_eq!(count(&xml, "<rest/>"), 1);
        assert!(xml.contains("<type>whole</type>"));
    }

    #[test]
    fn test_overlap_uses_backup() {
        let music = Music::new().with_tracks(vec![Track::default().with_notes(vec![
            Note::new(0, 60, 48, 64),
            Note::new(24, 67, 24, 64),
        ])]);
        let xml = to_musicxml(&music).unwrap();
        assert!(xml.contains("<backup><duration>24</duration></backup>"));
    }

    #[test]
    fn test_note_across_bar_line_backs_up() {
        let music = Music::new().with_tracks(vec![Track::default().with_notes(vec![
            Note::new(72, 60, 48, 64),
            Note::new(120, 62, 24, 64),
        ])]);
        let xml = to_musicxml(&music).unwrap();
        assert_eq!(count(&xml, "<measure number="), 2);
        assert!(xml.contains("<forward><duration>72</duration></forward>"));
        assert!(xml.contains("<backup><duration>24</duration></backup>"));
    }

    #[test]
    fn test_header_fields() {
        let mut music = Music::new().with_meta_data(MetaData::with_title("Air & Variations"));
        music.append(KeySignature::new(0, 2, KeyMode::Major));
        music.append(Tempo::new(0, 100.0));
        music.append(Track::new(0, false, Some("Bass".to_string())).with_notes(vec![Note::new(0, 40, 24, 64)]));
        music.append(Lyric::new(0, "Ah"));
        let xml = to_musicxml(&music).unwrap();
        assert!(xml.contains("<movement-title>Air &amp; Variations</movement-title>"));
        assert!(xml.contains("<fifths>2</fifths>"));
        assert!(xml.contains("<mode>major</mode>"));
        assert!(xml.contains("<sound tempo=\"100\"/>"));
        assert!(xml.contains("<part-name>Bass</part-name>"));
        assert!(xml.contains("<sign>F</sign>"));
        assert!(xml.contains("<text>Ah</text>"));
    }

    #[test]
    fn test_drum_part() {
        let music = Music::new()
            .with_timing(TimingInfo::new(4))
            .with_tracks(vec![Track::new(0, true, None).with_notes(vec![Note::new(0, 36, 4, 100)])]);
        let xml = to_musicxml(&music).unwrap();
        assert!(xml.contains("<sign>percussion</sign>"));
        assert!(xml.contains("<midi-channel>10</midi-channel>"));
        assert!(xml.contains("<part-name>Track 1</part-name>"));
    }

    #[test]
    fn test_zero_resolution_rejected() {
        let music = Music::new().with_timing(TimingInfo {
            is_symbolic_timing: true,
            beat_resolution: 0,
        });
        assert!(matches!(to_musicxml(&music), Err(MusicError::Xml(_))));
    }
}
