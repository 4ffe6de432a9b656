// MusicXML document builder

use super::duration::ticks_to_note_type;
use super::pitch::midi_to_step_alter;
use crate::models::{KeyMode, Time};

/// Velocity 90 is the MusicXML reference loudness for `dynamics="100"`
pub const DYNAMICS_REFERENCE_VELOCITY: f64 = 90.0;

/// Attributes written at the top of a part's first measure
#[derive(Clone, Debug, PartialEq)]
pub struct PartAttributes {
    pub divisions: u32,
    pub fifths: i8,
    pub mode: Option<KeyMode>,
    pub beats: u32,
    pub beat_type: u32,
    pub clef: Clef,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Clef {
    Treble,
    Bass,
    Percussion,
}

impl Clef {
    fn sign_and_line(&self) -> (&'static str, u8) {
        match self {
            Clef::Treble => ("G", 2),
            Clef::Bass => ("F", 4),
            Clef::Percussion => ("percussion", 2),
        }
    }
}

/// One pitched note as written to the document
#[derive(Clone, Debug, PartialEq)]
pub struct XmlNote<'a> {
    pub pitch: i32,
    pub duration: Time,
    pub velocity: i32,
    /// Sounds with the previous note
    pub chord: bool,
    pub lyric: Option<&'a str>,
}

/// Builds a partwise MusicXML 3.1 document part by part
pub struct MusicXmlBuilder {
    title: Option<String>,
    creators: Vec<String>,
    copyright: Option<String>,
    part_list: String,
    parts: String,
    buffer: String,
    part_count: usize,
    measure_number: usize,
    resolution: u32,
    prefer_flats: bool,
}

impl MusicXmlBuilder {
    pub fn new(resolution: u32) -> Self {
        Self {
            title: None,
            creators: Vec::new(),
            copyright: None,
            part_list: String::new(),
            parts: String::new(),
            buffer: String::new(),
            part_count: 0,
            measure_number: 1,
            resolution: resolution.max(1),
            prefer_flats: false,
        }
    }

    /// Set the document title
    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    pub fn set_identification(&mut self, creators: &[String], copyright: Option<&str>) {
        self.creators = creators.to_vec();
        self.copyright = copyright.map(str::to_string);
    }

    /// Spell black keys with flats for keys on the flat side
    pub fn set_key_spelling(&mut self, fifths: i8) {
        self.prefer_flats = fifths < 0;
    }

    /// Register a part and start its body; returns the part id
    pub fn start_part(&mut self, name: &str, program: i32, channel: u8) -> String {
        self.part_count += 1;
        self.measure_number = 1;
        let id = format!("P{}", self.part_count);

        self.part_list.push_str(&format!("    <score-part id=\"{}\">\n", id));
        self.part_list.push_str(&format!("      <part-name>{}</part-name>\n", xml_escape(name)));
        self.part_list.push_str(&format!("      <score-instrument id=\"{}-I1\">\n", id));
        self.part_list.push_str(&format!(
            "        <instrument-name>{}</instrument-name>\n",
            xml_escape(name)
        ));
        self.part_list.push_str("      </score-instrument>\n");
        self.part_list.push_str(&format!("      <midi-instrument id=\"{}-I1\">\n", id));
        // MusicXML channels and programs are 1-based
        self.part_list.push_str(&format!("        <midi-channel>{}</midi-channel>\n", channel + 1));
        self.part_list.push_str(&format!(
            "        <midi-program>{}</midi-program>\n",
            program.clamp(0, 127) + 1
        ));
        self.part_list.push_str("      </midi-instrument>\n");
        self.part_list.push_str("    </score-part>\n");

        self.buffer.clear();
        id
    }

    pub fn end_part(&mut self, id: &str) {
        self.parts.push_str(&format!("  <part id=\"{}\">\n", id));
        self.parts.push_str(&self.buffer);
        self.parts.push_str("  </part>\n");
        self.buffer.clear();
    }

    pub fn start_measure(&mut self) {
        self.buffer
            .push_str(&format!("    <measure number=\"{}\">\n", self.measure_number));
    }

    /// Close current measure and increment number
    pub fn end_measure(&mut self) {
        self.buffer.push_str("    </measure>\n");
        self.measure_number += 1;
    }

    pub fn write_attributes(&mut self, attributes: &PartAttributes) {
        let b = &mut self.buffer;
        b.push_str("      <attributes>\n");
        b.push_str(&format!("        <divisions>{}</divisions>\n", attributes.divisions));
        b.push_str("        <key>\n");
        b.push_str(&format!("          <fifths>{}</fifths>\n", attributes.fifths));
        if let Some(mode) = attributes.mode {
            let mode = match mode {
                KeyMode::Major => "major",
                KeyMode::Minor => "minor",
            };
            b.push_str(&format!("          <mode>{}</mode>\n", mode));
        }
        b.push_str("        </key>\n");
        b.push_str("        <time>\n");
        b.push_str(&format!("          <beats>{}</beats>\n", attributes.beats));
        b.push_str(&format!("          <beat-type>{}</beat-type>\n", attributes.beat_type));
        b.push_str("        </time>\n");
        let (sign, line) = attributes.clef.sign_and_line();
        b.push_str(&format!(
            "        <clef><sign>{}</sign><line>{}</line></clef>\n",
            sign, line
        ));
        b.push_str("      </attributes>\n");
    }

    /// Metronome mark plus a playback tempo
    pub fn write_tempo(&mut self, qpm: f64) {
        let b = &mut self.buffer;
        b.push_str("      <direction placement=\"above\">\n");
        b.push_str("        <direction-type>\n");
        b.push_str("          <metronome>\n");
        b.push_str("            <beat-unit>quarter</beat-unit>\n");
        b.push_str(&format!("            <per-minute>{}</per-minute>\n", format_number(qpm)));
        b.push_str("          </metronome>\n");
        b.push_str("        </direction-type>\n");
        b.push_str(&format!("        <sound tempo=\"{}\"/>\n", format_number(qpm)));
        b.push_str("      </direction>\n");
    }

    pub fn write_note(&mut self, note: &XmlNote) {
        let (step, alter, octave) = midi_to_step_alter(note.pitch, self.prefer_flats);
        // Zero-length notes are not expressible; write the shortest duration
        let duration = note.duration.max(1);
        let dynamics = f64::from(note.velocity) * 100.0 / DYNAMICS_REFERENCE_VELOCITY;

        let b = &mut self.buffer;
        b.push_str(&format!("      <note dynamics=\"{:.2}\">\n", dynamics));
        if note.chord {
            b.push_str("        <chord/>\n");
        }
        b.push_str("        <pitch>\n");
        b.push_str(&format!("          <step>{}</step>\n", step));
        if alter != 0 {
            b.push_str(&format!("          <alter>{}</alter>\n", alter));
        }
        b.push_str(&format!("          <octave>{}</octave>\n", octave));
        b.push_str("        </pitch>\n");
        b.push_str(&format!("        <duration>{}</duration>\n", duration));

        let (note_type, dots) = ticks_to_note_type(duration, self.resolution);
        b.push_str(&format!("        <type>{}</type>\n", note_type));
        for _ in 0..dots {
            b.push_str("        <dot/>\n");
        }

        if let Some(text) = note.lyric {
            b.push_str("        <lyric number=\"1\">\n");
            b.push_str("          <syllabic>single</syllabic>\n");
            b.push_str(&format!("          <text>{}</text>\n", xml_escape(text)));
            b.push_str("        </lyric>\n");
        }
        b.push_str("      </note>\n");
    }

    pub fn write_rest(&mut self, duration: Time) {
        if duration == 0 {
            return;
        }
        let (note_type, dots) = ticks_to_note_type(duration, self.resolution);
        let b = &mut self.buffer;
        b.push_str("      <note>\n");
        b.push_str("        <rest/>\n");
        b.push_str(&format!("        <duration>{}</duration>\n", duration));
        b.push_str(&format!("        <type>{}</type>\n", note_type));
        for _ in 0..dots {
            b.push_str("        <dot/>\n");
        }
        b.push_str("      </note>\n");
    }

    /// Advance the measure cursor over a silent gap
    pub fn write_forward(&mut self, duration: Time) {
        if duration > 0 {
            self.buffer.push_str(&format!(
                "      <forward><duration>{}</duration></forward>\n",
                duration
            ));
        }
    }

    /// Move the measure cursor back for an overlapping voice
    pub fn write_backup(&mut self, duration: Time) {
        if duration > 0 {
            self.buffer.push_str(&format!(
                "      <backup><duration>{}</duration></backup>\n",
                duration
            ));
        }
    }

    pub fn finalize(self) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<!DOCTYPE score-partwise PUBLIC \"-//Recordare//DTD MusicXML 3.1 Partwise//EN\" \"http://www.musicxml.org/dtds/partwise.dtd\">\n");
        xml.push_str("<score-partwise version=\"3.1\">\n");

        if let Some(title) = &self.title {
            if !title.is_empty() {
                xml.push_str("  <movement-title>");
                xml.push_str(&xml_escape(title));
                xml.push_str("</movement-title>\n");
            }
        }

        if !self.creators.is_empty() || self.copyright.is_some() {
            xml.push_str("  <identification>\n");
            for creator in &self.creators {
                xml.push_str(&format!(
                    "    <creator type=\"composer\">{}</creator>\n",
                    xml_escape(creator)
                ));
            }
            if let Some(rights) = &self.copyright {
                xml.push_str(&format!("    <rights>{}</rights>\n", xml_escape(rights)));
            }
            xml.push_str("  </identification>\n");
        }

        xml.push_str("  <part-list>\n");
        xml.push_str(&self.part_list);
        xml.push_str("  </part-list>\n");
        xml.push_str(&self.parts);
        xml.push_str("</score-partwise>\n");
        xml
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.3}", value)
    }
}

pub(crate) fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
