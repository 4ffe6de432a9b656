// Pitch mapping between MIDI numbers and MusicXML step/alter/octave

const SHARP_SPELLING: [(&str, i8); 12] = [
    ("C", 0),
    ("C", 1),
    ("D", 0),
    ("D", 1),
    ("E", 0),
    ("F", 0),
    ("F", 1),
    ("G", 0),
    ("G", 1),
    ("A", 0),
    ("A", 1),
    ("B", 0),
];

const FLAT_SPELLING: [(&str, i8); 12] = [
    ("C", 0),
    ("D", -1),
    ("D", 0),
    ("E", -1),
    ("E", 0),
    ("F", 0),
    ("G", -1),
    ("G", 0),
    ("A", -1),
    ("A", 0),
    ("B", -1),
    ("B", 0),
];

/// Convert a MIDI pitch to MusicXML (step, alter, octave)
///
/// Black keys are spelled with flats when `prefer_flats` is set (keys with
/// negative fifths), with sharps otherwise. MIDI 60 is C4.
pub fn midi_to_step_alter(pitch: i32, prefer_flats: bool) -> (&'static str, i8, i32) {
    let pitch_class = pitch.rem_euclid(12) as usize;
    let octave = pitch.div_euclid(12) - 1;
    let (step, alter) = if prefer_flats {
        FLAT_SPELLING[pitch_class]
    } else {
        SHARP_SPELLING[pitch_class]
    };
    (step, alter, octave)
}

/// Convert MusicXML step/alter/octave back to a MIDI pitch
///
/// Returns None for an unknown step letter.
pub fn step_alter_to_midi(step: &str, alter: i32, octave: i32) -> Option<i32> {
    let base = match step.trim().to_ascii_uppercase().as_str() {
        "C" => 0,
        "D" => 2,
        "E" => 4,
        "F" => 5,
        "G" => 7,
        "A" => 9,
        "B" => 11,
        _ => return None,
    };
    Some((octave + 1) * 12 + base + alter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middle_c() {
        assert_eq!(midi_to_step_alter(60, false), ("C", 0, 4));
        assert_eq!(step_alter_to_midi("C", 0, 4), Some(60));
    }

    #[test]
    fn test_black_key_spelling() {
        assert_eq!(midi_to_step_alter(61, false), ("C", 1, 4));
        assert_eq!(midi_to_step_alter(61, true), ("D", -1, 4));
        assert_eq!(midi_to_step_alter(70, true), ("B", -1, 4));
    }

    #[test]
    fn test_extremes() {
        assert_eq!(midi_to_step_alter(0, false), ("C", 0, -1));
        assert_eq!(midi_to_step_alter(127, false), ("G", 0, 9));
    }

    #[test]
    fn test_every_pitch_maps_back() {
        for pitch in 0..128 {
            for prefer_flats in [false, true] {
                let (step, alter, octave) = midi_to_step_alter(pitch, prefer_flats);
                assert_eq!(step_alter_to_midi(step, i32::from(alter), octave), Some(pitch));
            }
        }
    }

    #[test]
    fn test_unknown_step() {
        assert_eq!(step_alter_to_midi("H", 0, 4), None);
        assert_eq!(step_alter_to_midi("b", -1, 3), Some(58));
    }
}
