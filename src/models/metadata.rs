//! Non-temporal information attached to a piece: metadata and time basis

use serde::{Deserialize, Serialize};

use super::validation::Validate;
use crate::defaults::{DEFAULT_RESOLUTION, SCHEMA_VERSION};
use crate::error::{MusicError, Result};

/// Descriptive information about a piece
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MetaData {
    /// Version of the serialized container layout
    pub schema_version: String,
    pub title: Option<String>,
    pub creators: Vec<String>,
    pub copyright: Option<String>,
    /// Dataset or collection the piece belongs to
    pub collection: Option<String>,
    pub source_filename: Option<String>,
    /// Format the piece was read from, e.g. "midi" or "musicxml"
    pub source_format: Option<String>,
}

impl Default for MetaData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            title: None,
            creators: Vec::new(),
            copyright: None,
            collection: None,
            source_filename: None,
            source_format: None,
        }
    }
}

impl MetaData {
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

impl Validate for MetaData {
    fn validate(&self) -> Result<()> {
        if self.schema_version.trim().is_empty() {
            return Err(MusicError::invalid("meta_data.schema_version", "must not be empty"));
        }
        Ok(())
    }
}

/// Time basis of every `time`/`duration` value in the container
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct TimingInfo {
    /// True when times count metrical ticks rather than absolute units
    pub is_symbolic_timing: bool,
    /// Ticks per quarter note
    pub beat_resolution: u32,
}

impl Default for TimingInfo {
    fn default() -> Self {
        Self {
            is_symbolic_timing: true,
            beat_resolution: DEFAULT_RESOLUTION,
        }
    }
}

impl TimingInfo {
    pub fn new(beat_resolution: u32) -> Self {
        Self {
            is_symbolic_timing: true,
            beat_resolution,
        }
    }
}

impl Validate for TimingInfo {
    fn validate(&self) -> Result<()> {
        if self.beat_resolution == 0 {
            return Err(MusicError::invalid("timing.beat_resolution", "must be positive"));
        }
        Ok(())
    }
}
