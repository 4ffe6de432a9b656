//! Time-stamped musical facts stored in the container
//!
//! Each type carries a `time` position in ticks and implements
//! [`Validate`] and [`Timed`].

use serde::{Deserialize, Serialize};

use super::validation::{Time, Timed, Validate};
use crate::error::{MusicError, Result};

/// Meter change, e.g. 3/4 starting at `time`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TimeSignature {
    pub time: Time,
    pub numerator: u32,
    pub denominator: u32,
}

impl TimeSignature {
    pub fn new(time: Time, numerator: u32, denominator: u32) -> Self {
        Self {
            time,
            numerator,
            denominator,
        }
    }

    /// Position where the meter takes effect; the field `sort` orders by
    pub fn start(&self) -> Time {
        self.time
    }

    /// Length of one measure in ticks for the given resolution
    pub fn measure_length(&self, resolution: u32) -> Time {
        let quarters_num = u64::from(self.numerator) * 4 * u64::from(resolution);
        quarters_num / u64::from(self.denominator.max(1))
    }
}

impl Validate for TimeSignature {
    fn validate(&self) -> Result<()> {
        if self.numerator == 0 {
            return Err(MusicError::invalid("numerator", "must be positive"));
        }
        if !self.denominator.is_power_of_two() {
            return Err(MusicError::invalid(
                "denominator",
                format!("must be a power of two, got {}", self.denominator),
            ));
        }
        Ok(())
    }
}

impl Timed for TimeSignature {
    fn time(&self) -> Time {
        self.start()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    Major,
    Minor,
}

/// Key change; any of root, mode and fifths may be unknown
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct KeySignature {
    pub time: Time,
    /// Pitch class of the tonic, 0 = C
    #[serde(default)]
    pub root: Option<u8>,
    #[serde(default)]
    pub mode: Option<KeyMode>,
    /// Position on the circle of fifths (-7 to +7)
    #[serde(default)]
    pub fifths: Option<i8>,
}

impl KeySignature {
    pub fn new(time: Time, root: u8, mode: KeyMode) -> Self {
        Self {
            time,
            root: Some(root),
            mode: Some(mode),
            fifths: Some(fifths_for(root, mode)),
        }
    }

    /// Key known only by its circle-of-fifths position, as in MIDI and MusicXML
    pub fn from_fifths(time: Time, fifths: i8, mode: Option<KeyMode>) -> Self {
        let major_root = (fifths as i32 * 7).rem_euclid(12) as u8;
        let root = match mode {
            Some(KeyMode::Minor) => Some((major_root + 9) % 12),
            Some(KeyMode::Major) => Some(major_root),
            None => None,
        };
        Self {
            time,
            root,
            mode,
            fifths: Some(fifths),
        }
    }

    /// Circle-of-fifths position, derived from root and mode when not stored
    pub fn resolved_fifths(&self) -> Option<i8> {
        self.fifths
            .or_else(|| match (self.root, self.mode) {
                (Some(root), Some(mode)) => Some(fifths_for(root, mode)),
                _ => None,
            })
    }
}

/// Fifths position of a tonic, preferring flats beyond six sharps
fn fifths_for(root: u8, mode: KeyMode) -> i8 {
    let major_root = match mode {
        KeyMode::Major => root % 12,
        KeyMode::Minor => (root + 3) % 12,
    };
    // C G D A E B F# Db Ab Eb Bb F
    let fifths = (major_root as i32 * 7) % 12;
    if fifths > 6 {
        (fifths - 12) as i8
    } else {
        fifths as i8
    }
}

impl Validate for KeySignature {
    fn validate(&self) -> Result<()> {
        if let Some(root) = self.root {
            if root >= 12 {
                return Err(MusicError::invalid("root", format!("must be below 12, got {}", root)));
            }
        }
        if let Some(fifths) = self.fifths {
            if !(-7..=7).contains(&fifths) {
                return Err(MusicError::invalid(
                    "fifths",
                    format!("must be within -7..=7, got {}", fifths),
                ));
            }
        }
        Ok(())
    }
}

impl Timed for KeySignature {
    fn time(&self) -> Time {
        self.time
    }
}

/// Tempo marking in quarter notes per minute
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Tempo {
    pub time: Time,
    pub qpm: f64,
}

impl Tempo {
    pub fn new(time: Time, qpm: f64) -> Self {
        Self { time, qpm }
    }

    /// Microseconds per quarter note, as stored in MIDI tempo events
    pub fn microseconds_per_quarter(&self) -> u32 {
        (60_000_000.0 / self.qpm).round() as u32
    }
}

impl Validate for Tempo {
    fn validate(&self) -> Result<()> {
        if !self.qpm.is_finite() || self.qpm <= 0.0 {
            return Err(MusicError::invalid("qpm", format!("must be positive, got {}", self.qpm)));
        }
        Ok(())
    }
}

impl Timed for Tempo {
    fn time(&self) -> Time {
        self.time
    }
}

/// Lyric syllable or word
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Lyric {
    pub time: Time,
    pub lyric: String,
}

impl Lyric {
    pub fn new(time: Time, lyric: impl Into<String>) -> Self {
        Self {
            time,
            lyric: lyric.into(),
        }
    }
}

impl Validate for Lyric {
    fn validate(&self) -> Result<()> {
        if self.lyric.is_empty() {
            return Err(MusicError::invalid("lyric", "must not be empty"));
        }
        Ok(())
    }
}

impl Timed for Lyric {
    fn time(&self) -> Time {
        self.time
    }
}

/// Free-form payload pinned to a time
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Annotation {
    pub time: Time,
    pub annotation: serde_json::Value,
    #[serde(default)]
    pub group: Option<String>,
}

impl Annotation {
    pub fn new(time: Time, annotation: impl Into<serde_json::Value>) -> Self {
        Self {
            time,
            annotation: annotation.into(),
            group: None,
        }
    }

    /// Text payload, when the annotation is a plain string
    pub fn text(&self) -> Option<&str> {
        self.annotation.as_str()
    }
}

impl Validate for Annotation {
    fn validate(&self) -> Result<()> {
        if self.annotation.is_null() {
            return Err(MusicError::invalid("annotation", "must not be null"));
        }
        Ok(())
    }
}

impl Timed for Annotation {
    fn time(&self) -> Time {
        self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_signature_validation() {
        assert!(TimeSignature::new(0, 3, 4).is_valid());
        assert!(TimeSignature::new(0, 7, 8).is_valid());
        assert!(!TimeSignature::new(0, 0, 4).is_valid());
        assert!(!TimeSignature::new(0, 3, 6).is_valid());
        assert!(!TimeSignature::new(0, 3, 0).is_valid());
    }

    #[test]
    fn test_time_signature_start_is_time() {
        let ts = TimeSignature::new(96, 6, 8);
        assert_eq!(ts.start(), 96);
        assert_eq!(Timed::time(&ts), 96);
    }

    #[test]
    fn test_measure_length() {
        assert_eq!(TimeSignature::new(0, 4, 4).measure_length(24), 96);
        assert_eq!(TimeSignature::new(0, 3, 4).measure_length(24), 72);
        assert_eq!(TimeSignature::new(0, 6, 8).measure_length(24), 72);
    }

    #[test]
    fn test_key_signature_fifths() {
        assert_eq!(KeySignature::new(0, 0, KeyMode::Major).fifths, Some(0));
        assert_eq!(KeySignature::new(0, 7, KeyMode::Major).fifths, Some(1)); // G
        assert_eq!(KeySignature::new(0, 5, KeyMode::Major).fifths, Some(-1)); // F
        assert_eq!(KeySignature::new(0, 9, KeyMode::Minor).fifths, Some(0)); // A minor
        assert_eq!(KeySignature::new(0, 4, KeyMode::Minor).fifths, Some(1)); // E minor
        assert_eq!(KeySignature::new(0, 3, KeyMode::Major).fifths, Some(-3)); // Eb
    }

    #[test]
    fn test_key_signature_from_fifths() {
        let d_major = KeySignature::from_fifths(0, 2, Some(KeyMode::Major));
        assert_eq!(d_major.root, Some(2));
        let b_minor = KeySignature::from_fifths(0, 2, Some(KeyMode::Minor));
        assert_eq!(b_minor.root, Some(11));
        let bb = KeySignature::from_fifths(0, -2, Some(KeyMode::Major));
        assert_eq!(bb.root, Some(10));
        assert_eq!(KeySignature::from_fifths(0, 3, None).root, None);
    }

    #[test]
    fn test_key_signature_validation() {
        let mut key = KeySignature::new(0, 2, KeyMode::Major);
        assert!(key.is_valid());
        key.root = Some(12);
        assert!(!key.is_valid());
        key.root = None;
        key.fifths = Some(8);
        assert!(!key.is_valid());
    }

    #[test]
    fn test_tempo_validation() {
        assert!(Tempo::new(0, 120.0).is_valid());
        assert!(!Tempo::new(0, 0.0).is_valid());
        assert!(!Tempo::new(0, -60.0).is_valid());
        assert!(!Tempo::new(0, f64::NAN).is_valid());
    }

    #[test]
    fn test_tempo_microseconds() {
        assert_eq!(Tempo::new(0, 120.0).microseconds_per_quarter(), 500_000);
        assert_eq!(Tempo::new(0, 60.0).microseconds_per_quarter(), 1_000_000);
    }

    #[test]
    fn test_lyric_and_annotation_validation() {
        assert!(Lyric::new(0, "la").is_valid());
        assert!(!Lyric::new(0, "").is_valid());
        assert!(Annotation::new(0, "crescendo").is_valid());
        assert!(!Annotation::new(0, serde_json::Value::Null).is_valid());
        assert_eq!(Annotation::new(0, "rit.").text(), Some("rit."));
    }
}
