//! Default values shared by the container, the converters and the writers

/// Version string stamped into fresh metadata
pub const SCHEMA_VERSION: &str = "0.1";

/// Default ticks per quarter note for new containers
pub const DEFAULT_RESOLUTION: u32 = 24;

/// Tempo assumed before the first tempo marking, in quarter notes per minute
pub const DEFAULT_TEMPO_QPM: f64 = 120.0;

/// Default MIDI velocity (1-127, where 64 is "normal")
pub const DEFAULT_VELOCITY: i32 = 64;

/// Default MIDI program (0 = Acoustic Grand Piano in General MIDI)
pub const DEFAULT_PROGRAM: i32 = 0;

/// Lowest and highest 7-bit MIDI values, used for pitch, velocity and program
pub const MIN_MIDI_VALUE: i32 = 0;
pub const MAX_MIDI_VALUE: i32 = 127;

/// Number of MIDI pitches, the width of every piano-roll grid
pub const PITCH_COUNT: usize = 128;

/// Longest piano roll, in time steps, the converters will allocate
pub const MAX_PIANOROLL_STEPS: usize = 1 << 22;

/// Time signature assumed when a container carries none
pub const DEFAULT_TIME_SIGNATURE: (u32, u32) = (4, 4);

/// Channel reserved for percussion (10 in 1-indexed terms)
pub const DRUM_CHANNEL: u8 = 9;

/// Event representation vocabulary sizes
pub const DEFAULT_MAX_TIME_SHIFT: u32 = 100;
pub const DEFAULT_VELOCITY_BINS: u32 = 32;

/// Assign MIDI channel from track index
/// - Channels 0-15 are available
/// - Channel 9 is reserved for drums, so melodic tracks skip it
pub fn assign_channel(track_index: usize) -> u8 {
    let channel = track_index % 15;
    if channel >= DRUM_CHANNEL as usize {
        (channel + 1) as u8
    } else {
        channel as u8
    }
}
