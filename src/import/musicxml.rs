use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::defaults::{DEFAULT_RESOLUTION, DEFAULT_VELOCITY, MAX_MIDI_VALUE, MIN_MIDI_VALUE};
use crate::error::{MusicError, Result};
use crate::models::{
    KeyMode, KeySignature, Lyric, Music, Note, Tempo, Time, TimeSignature, TimingInfo, Track,
};
use crate::renderers::musicxml::{step_alter_to_midi, DYNAMICS_REFERENCE_VELOCITY};

/// MIDI channel (1-based) MusicXML uses for percussion parts
const PERCUSSION_CHANNEL: u8 = 10;

#[derive(Clone, Debug, Default)]
struct PartInfo {
    name: Option<String>,
    program: i32,
    is_drum: bool,
}

/// Reading position inside one `<part>`
struct PartState {
    track: Track,
    /// Only the first part contributes key and time signatures
    is_first: bool,
    divisions: u64,
    cursor: Time,
    last_onset: Time,
    /// Pitch -> index of the note an open tie extends
    open_ties: HashMap<i32, usize>,
}

impl PartState {
    fn new(info: PartInfo, is_first: bool) -> Self {
        Self {
            track: Track::new(info.program, info.is_drum, info.name),
            is_first,
            divisions: 1,
            cursor: 0,
            last_onset: 0,
            open_ties: HashMap::new(),
        }
    }

    fn to_ticks(&self, divs: u64, resolution: u32) -> Time {
        let divisions = self.divisions.max(1);
        (divs * u64::from(resolution) + divisions / 2) / divisions
    }

    fn add_note(&mut self, note: ParsedNote, dynamics: Option<f64>, resolution: u32) {
        if note.grace {
            return;
        }
        let duration = self.to_ticks(note.duration, resolution);
        let onset = if note.chord {
            self.last_onset
        } else {
            self.cursor
        };
        if !note.chord {
            self.last_onset = onset;
            self.cursor = onset + duration;
        }
        if note.rest {
            return;
        }

        let Some(pitch) = step_alter_to_midi(&note.step, note.alter.round() as i32, note.octave)
        else {
            log::warn!("skipping note with unknown step '{}' at tick {}", note.step, onset);
            return;
        };
        let velocity = dynamics
            .map(|d| (d * DYNAMICS_REFERENCE_VELOCITY / 100.0).round() as i32)
            .unwrap_or(DEFAULT_VELOCITY)
            .clamp(MIN_MIDI_VALUE, MAX_MIDI_VALUE);

        if let Some(text) = note.lyric {
            self.track.lyrics.push(Lyric::new(onset, text));
        }

        if note.tie_stop {
            if let Some(&index) = self.open_ties.get(&pitch) {
                let tied = &mut self.track.notes[index];
                tied.duration = (onset + duration).saturating_sub(tied.time);
                if !note.tie_start {
                    self.open_ties.remove(&pitch);
                }
                return;
            }
        }

        self.track.notes.push(Note::new(onset, pitch, duration, velocity));
        if note.tie_start {
            self.open_ties.insert(pitch, self.track.notes.len() - 1);
        }
    }
}

#[derive(Clone, Debug, Default)]
struct ParsedNote {
    rest: bool,
    chord: bool,
    grace: bool,
    step: String,
    alter: f64,
    octave: i32,
    duration: u64,
    tie_start: bool,
    tie_stop: bool,
    lyric: Option<String>,
}

impl ParsedNote {
    /// Flags that may come as either empty or start elements
    fn flag(&mut self, name: &[u8], e: &BytesStart) {
        match name {
            b"rest" => self.rest = true,
            b"chord" => self.chord = true,
            b"grace" => self.grace = true,
            b"tie" => match attribute(e, b"type").as_deref() {
                Some("start") => self.tie_start = true,
                Some("stop") => self.tie_stop = true,
                _ => {}
            },
            _ => {}
        }
    }
}

/// Parse a partwise MusicXML document
///
/// Parts become tracks. The first `<divisions>` value becomes the beat
/// resolution; parts with other divisions are rescaled to it.
pub fn parse_musicxml(xml: &[u8]) -> Result<Music> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut music = Music::new();
    music.meta_data.source_format = Some("musicxml".to_string());

    let mut buf = Vec::new();
    let mut saw_root = false;
    let mut resolution: Option<u32> = None;
    let mut part_infos: HashMap<String, PartInfo> = HashMap::new();
    let mut score_part: Option<String> = None;
    let mut part: Option<PartState> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"score-partwise" => saw_root = true,
                b"score-timewise" => {
                    return Err(MusicError::UnsupportedFormat(
                        "timewise MusicXML".to_string(),
                    ))
                }
                b"movement-title" => {
                    music.meta_data.title = non_empty(parse_text_content(&mut reader, &mut buf)?);
                }
                b"work-title" => {
                    let title = non_empty(parse_text_content(&mut reader, &mut buf)?);
                    if music.meta_data.title.is_none() {
                        music.meta_data.title = title;
                    }
                }
                b"creator" => {
                    if let Some(creator) = non_empty(parse_text_content(&mut reader, &mut buf)?) {
                        music.meta_data.creators.push(creator);
                    }
                }
                b"rights" => {
                    music.meta_data.copyright = non_empty(parse_text_content(&mut reader, &mut buf)?);
                }
                b"score-part" => {
                    let id = attribute(e, b"id").unwrap_or_default();
                    part_infos.insert(id.clone(), PartInfo::default());
                    score_part = Some(id);
                }
                b"part-name" => {
                    let name = non_empty(parse_text_content(&mut reader, &mut buf)?);
                    if let Some(info) = score_part.as_ref().and_then(|id| part_infos.get_mut(id)) {
                        info.name = name;
                    }
                }
                b"midi-channel" => {
                    let channel: u8 = parse_text_content(&mut reader, &mut buf)?.trim().parse().unwrap_or(1);
                    if let Some(info) = score_part.as_ref().and_then(|id| part_infos.get_mut(id)) {
                        info.is_drum = channel == PERCUSSION_CHANNEL;
                    }
                }
                b"midi-program" => {
                    let program: i32 = parse_text_content(&mut reader, &mut buf)?.trim().parse().unwrap_or(1);
                    if let Some(info) = score_part.as_ref().and_then(|id| part_infos.get_mut(id)) {
                        info.program = (program - 1).clamp(MIN_MIDI_VALUE, MAX_MIDI_VALUE);
                    }
                }
                b"part" => {
                    let id = attribute(e, b"id").unwrap_or_default();
                    let info = part_infos.get(&id).cloned().unwrap_or_default();
                    part = Some(PartState::new(info, music.tracks.is_empty()));
                }
                b"attributes" => {
                    if let Some(state) = part.as_mut() {
                        parse_attributes(&mut reader, &mut buf, state, &mut music, &mut resolution)?;
                    }
                }
                b"note" => {
                    let dynamics = attribute(e, b"dynamics").and_then(|d| d.trim().parse::<f64>().ok());
                    let note = parse_note(&mut reader, &mut buf)?;
                    if let Some(state) = part.as_mut() {
                        let resolution = *resolution.get_or_insert(state.divisions as u32);
                        state.add_note(note, dynamics, resolution);
                    }
                }
                b"backup" => {
                    let divs = parse_duration_block(&mut reader, &mut buf, b"backup")?;
                    if let Some(state) = part.as_mut() {
                        let resolution = *resolution.get_or_insert(state.divisions as u32);
                        state.cursor = state.cursor.saturating_sub(state.to_ticks(divs, resolution));
                    }
                }
                b"forward" => {
                    let divs = parse_duration_block(&mut reader, &mut buf, b"forward")?;
                    if let Some(state) = part.as_mut() {
                        let resolution = *resolution.get_or_insert(state.divisions as u32);
                        state.cursor += state.to_ticks(divs, resolution);
                    }
                }
                b"sound" => add_sound_tempo(e, part.as_ref(), &mut music),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"sound" {
                    add_sound_tempo(e, part.as_ref(), &mut music);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"part" => {
                    if let Some(state) = part.take() {
                        music.tracks.push(state.track);
                    }
                }
                b"score-part" => score_part = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(MusicError::Xml(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(MusicError::Xml("missing <score-partwise> root element".to_string()));
    }

    music.timing = TimingInfo::new(resolution.unwrap_or(DEFAULT_RESOLUTION));
    log::debug!(
        "parsed MusicXML: {} tracks at {} ticks per quarter",
        music.tracks.len(),
        music.timing.beat_resolution
    );
    Ok(music)
}

fn add_sound_tempo(e: &BytesStart, part: Option<&PartState>, music: &mut Music) {
    let Some(qpm) = attribute(e, b"tempo").and_then(|t| t.trim().parse::<f64>().ok()) else {
        return;
    };
    let time = part.map(|p| p.cursor).unwrap_or(0);
    // Several parts usually repeat the same marking
    if music.tempos.iter().any(|t| t.time == time) {
        return;
    }
    music.tempos.push(Tempo::new(time, qpm));
}

fn parse_note(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<ParsedNote> {
    let mut note = ParsedNote {
        octave: 4,
        ..ParsedNote::default()
    };

    loop {
        match reader.read_event_into(buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"pitch" => parse_pitch(reader, buf, &mut note)?,
                b"duration" => {
                    note.duration = parse_text_content(reader, buf)?.trim().parse().unwrap_or(0);
                }
                b"lyric" => {
                    let text = parse_lyric(reader, buf)?;
                    if note.lyric.is_none() {
                        note.lyric = text;
                    }
                }
                other => note.flag(other, e),
            },
            Ok(Event::Empty(ref e)) => note.flag(e.name().as_ref(), e),
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"note" {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(MusicError::Xml(format!("Error parsing note: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(note)
}

fn parse_pitch(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>, note: &mut ParsedNote) -> Result<()> {
    loop {
        match reader.read_event_into(buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"step" => note.step = parse_text_content(reader, buf)?,
                b"alter" => note.alter = parse_text_content(reader, buf)?.trim().parse().unwrap_or(0.0),
                b"octave" => note.octave = parse_text_content(reader, buf)?.trim().parse().unwrap_or(4),
                _ => {}
            },
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"pitch" {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(MusicError::Xml(format!("Error parsing pitch: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

/// First `<text>` of a `<lyric>`
fn parse_lyric(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<Option<String>> {
    let mut text = None;
    loop {
        match reader.read_event_into(buf) {
            Ok(Event::Start(ref e)) => {
                if e.name().as_ref() == b"text" && text.is_none() {
                    text = non_empty(parse_text_content(reader, buf)?);
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"lyric" {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(MusicError::Xml(format!("Error parsing lyric: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

fn parse_attributes(
    reader: &mut Reader<&[u8]>,
    buf: &mut Vec<u8>,
    state: &mut PartState,
    music: &mut Music,
    resolution: &mut Option<u32>,
) -> Result<()> {
    loop {
        match reader.read_event_into(buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"divisions" => {
                    let divisions: u64 = parse_text_content(reader, buf)?.trim().parse().unwrap_or(1);
                    state.divisions = divisions.max(1);
                    if resolution.is_none() {
                        *resolution = Some(state.divisions as u32);
                    }
                }
                b"key" => {
                    let (fifths, mode) = parse_key(reader, buf)?;
                    if state.is_first {
                        music
                            .key_signatures
                            .push(KeySignature::from_fifths(state.cursor, fifths, mode));
                    }
                }
                b"time" => {
                    let (numerator, denominator) = parse_time_signature(reader, buf)?;
                    if state.is_first {
                        music
                            .time_signatures
                            .push(TimeSignature::new(state.cursor, numerator, denominator));
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"attributes" {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(MusicError::Xml(format!("Error parsing attributes: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn parse_key(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<(i8, Option<KeyMode>)> {
    let mut fifths = 0i8;
    let mut mode = None;

    loop {
        match reader.read_event_into(buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"fifths" => fifths = parse_text_content(reader, buf)?.trim().parse().unwrap_or(0),
                b"mode" => {
                    mode = match parse_text_content(reader, buf)?.trim() {
                        "major" => Some(KeyMode::Major),
                        "minor" => Some(KeyMode::Minor),
                        _ => None,
                    };
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"key" {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(MusicError::Xml(format!("Error parsing key: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok((fifths, mode))
}

fn parse_time_signature(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<(u32, u32)> {
    let mut numerator = 4u32;
    let mut denominator = 4u32;

    loop {
        match reader.read_event_into(buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                // Compound beats such as "3+2" are summed
                b"beats" => {
                    numerator = parse_text_content(reader, buf)?
                        .split('+')
                        .filter_map(|part| part.trim().parse::<u32>().ok())
                        .sum::<u32>()
                        .max(1);
                }
                b"beat-type" => denominator = parse_text_content(reader, buf)?.trim().parse().unwrap_or(4),
                _ => {}
            },
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"time" {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(MusicError::Xml(format!("Error parsing time signature: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok((numerator, denominator))
}

/// Duration inside a `<backup>` or `<forward>` element
fn parse_duration_block(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>, end: &[u8]) -> Result<u64> {
    let mut duration = 0;
    loop {
        match reader.read_event_into(buf) {
            Ok(Event::Start(ref e)) => {
                if e.name().as_ref() == b"duration" {
                    duration = parse_text_content(reader, buf)?.trim().parse().unwrap_or(0);
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == end {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(MusicError::Xml(format!("Error parsing duration: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(duration)
}

fn attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .find(|a| a.as_ref().map(|attr| attr.key.as_ref() == name).unwrap_or(false))
        .and_then(|a| a.ok())
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

fn parse_text_content(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<String> {
    match reader.read_event_into(buf) {
        Ok(Event::Text(e)) => e
            .unescape()
            .map(|text| text.into_owned())
            .map_err(|e| MusicError::Xml(format!("Invalid text: {}", e))),
        Ok(_) => Ok(String::new()),
        Err(e) => Err(MusicError::Xml(format!("Error reading text: {}", e))),
    }
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
