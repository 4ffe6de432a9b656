//! Error types for the music container
//!
//! One enum covers validation, dispatch, length queries and file I/O so that
//! every public operation can return the same `Result`.

use thiserror::Error;

/// Top-level error type
#[derive(Debug, Error)]
pub enum MusicError {
    /// An entity failed its own validation rule
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    /// Selector passed to `to` / `to_representation` is not known
    #[error("Unsupported target : {0}.")]
    UnsupportedTarget(String),

    /// Length query over a sequence with no elements
    #[error("cannot aggregate over empty `{0}`")]
    EmptyAggregate(&'static str),

    /// File extension or embedded format variant we cannot handle
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("midi error: {0}")]
    Midi(String),

    #[error("xml error: {0}")]
    Xml(String),
}

impl MusicError {
    /// Shorthand for building a validation failure
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        MusicError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Prefix the field path of a validation failure, leaving other errors alone
    pub(crate) fn nested(self, parent: &str) -> Self {
        match self {
            MusicError::Invalid { field, reason } => MusicError::Invalid {
                field: format!("{}.{}", parent, field),
                reason,
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, MusicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_target_names_value() {
        let err = MusicError::UnsupportedTarget("unsupported".to_string());
        assert!(err.to_string().contains("unsupported"));
    }

    #[test]
    fn test_nested_prefixes_field_path() {
        let err = MusicError::invalid("notes[2]", "pitch out of range").nested("tracks[0]");
        match err {
            MusicError::Invalid { field, .. } => assert_eq!(field, "tracks[0].notes[2]"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_nested_keeps_other_errors() {
        let err = MusicError::EmptyAggregate("tracks").nested("ignored");
        assert!(matches!(err, MusicError::EmptyAggregate("tracks")));
    }
}
