// Duration helpers for MusicXML export

use crate::models::Time;

/// Note types with their length in quarter notes, longest first
const NOTE_TYPES: [(&str, f64); 8] = [
    ("breve", 8.0),
    ("whole", 4.0),
    ("half", 2.0),
    ("quarter", 1.0),
    ("eighth", 0.5),
    ("16th", 0.25),
    ("32nd", 0.125),
    ("64th", 0.0625),
];

/// Convert duration (in quarter notes) to MusicXML note type and dot count
///
/// Exact matches (with up to two dots) win; anything else gets the longest
/// type that fits inside the duration, falling back to "64th".
///
/// # Examples
/// ```
/// use music_core::renderers::musicxml::duration::duration_to_note_type;
///
/// assert_eq!(duration_to_note_type(1.0), ("quarter", 0));
/// assert_eq!(duration_to_note_type(0.75), ("eighth", 1));
/// ```
pub fn duration_to_note_type(duration: f64) -> (&'static str, usize) {
    const EPSILON: f64 = 0.001;

    for &(name, length) in &NOTE_TYPES {
        for dots in 0..=2 {
            // Each dot adds half of the previous value
            let dotted = length * (2.0 - 0.5f64.powi(dots as i32));
            if (duration - dotted).abs() < EPSILON {
                return (name, dots);
            }
        }
    }

    NOTE_TYPES
        .iter()
        .find(|&&(_, length)| length <= duration + EPSILON)
        .map(|&(name, _)| (name, 0))
        .unwrap_or(("64th", 0))
}

/// Note type for a duration in ticks at the given resolution
pub fn ticks_to_note_type(ticks: Time, resolution: u32) -> (&'static str, usize) {
    duration_to_note_type(ticks as f64 / f64::from(resolution.max(1)))
}
