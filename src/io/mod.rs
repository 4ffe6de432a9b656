//! File input and output
//!
//! `save`/`load` are lossless (JSON or YAML through serde). `write`/`read`
//! go through the lossy interchange formats, MIDI and MusicXML. The
//! dispatching forms pick the format from the file extension,
//! case-insensitively.

use std::fs;
use std::path::Path;

use crate::error::{MusicError, Result};
use crate::models::Music;
use crate::renderers::{to_musicxml, write_smf};

pub use crate::import::{parse_midi, parse_musicxml};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
    Midi,
    MusicXml,
}

fn format_of(path: &Path) -> Option<Format> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "json" => Some(Format::Json),
        "yaml" | "yml" => Some(Format::Yaml),
        "mid" | "midi" => Some(Format::Midi),
        "xml" | "musicxml" => Some(Format::MusicXml),
        _ => None,
    }
}

fn unsupported(path: &Path) -> MusicError {
    log::warn!("no format for extension of {}", path.display());
    MusicError::UnsupportedFormat(format!("{}", path.display()))
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

// ----- lossless -----

/// Save as JSON or YAML, chosen by extension
pub fn save(music: &Music, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match format_of(path) {
        Some(Format::Json) => save_json(music, path),
        Some(Format::Yaml) => save_yaml(music, path),
        _ => Err(unsupported(path)),
    }
}

pub fn save_json(music: &Music, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(music)?;
    fs::write(path, json)?;
    log::debug!("saved JSON to {}", path.display());
    Ok(())
}

pub fn save_yaml(music: &Music, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let yaml = serde_yaml::to_string(music)?;
    fs::write(path, yaml)?;
    log::debug!("saved YAML to {}", path.display());
    Ok(())
}

/// Load a container saved with `save`, chosen by extension
pub fn load(path: impl AsRef<Path>) -> Result<Music> {
    let path = path.as_ref();
    match format_of(path) {
        Some(Format::Json) => load_json(path),
        Some(Format::Yaml) => load_yaml(path),
        _ => Err(unsupported(path)),
    }
}

pub fn load_json(path: impl AsRef<Path>) -> Result<Music> {
    let text = fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&text)?)
}

pub fn load_yaml(path: impl AsRef<Path>) -> Result<Music> {
    let text = fs::read_to_string(path.as_ref())?;
    Ok(serde_yaml::from_str(&text)?)
}

// ----- lossy -----

/// Write as MIDI or MusicXML, chosen by extension
pub fn write(music: &Music, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match format_of(path) {
        Some(Format::Midi) => write_midi(music, path),
        Some(Format::MusicXml) => write_musicxml(music, path),
        _ => Err(unsupported(path)),
    }
}

pub fn midi_bytes(music: &Music) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_smf(music, &mut out)?;
    Ok(out)
}

pub fn write_midi(music: &Music, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, midi_bytes(music)?)?;
    log::debug!("wrote MIDI to {}", path.display());
    Ok(())
}

pub fn musicxml_string(music: &Music) -> Result<String> {
    to_musicxml(music)
}

pub fn write_musicxml(music: &Music, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, musicxml_string(music)?)?;
    log::debug!("wrote MusicXML to {}", path.display());
    Ok(())
}

/// Read a MIDI or MusicXML file, chosen by extension
pub fn read(path: impl AsRef<Path>) -> Result<Music> {
    let path = path.as_ref();
    match format_of(path) {
        Some(Format::Midi) => read_midi(path),
        Some(Format::MusicXml) => read_musicxml(path),
        _ => Err(unsupported(path)),
    }
}

pub fn read_midi(path: impl AsRef<Path>) -> Result<Music> {
    let path = path.as_ref();
    let mut music = parse_midi(&fs::read(path)?)?;
    music.meta_data.source_filename = file_name(path);
    Ok(music)
}

pub fn read_musicxml(path: impl AsRef<Path>) -> Result<Music> {
    let path = path.as_ref();
    let mut music = parse_musicxml(&fs::read(path)?)?;
    music.meta_data.source_filename = file_name(path);
    Ok(music)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Note, Tempo, Track};
    use tempfile::{Builder, NamedTempFile};

    fn music() -> Music {
        let mut music = Music::new();
        music.append(Tempo::new(0, 100.0));
        music.append(Track::new(0, false, Some("Piano".to_string())).with_notes(vec![Note::new(0, 60, 24, 64)]));
        music
    }

    fn temp_with_suffix(suffix: &str) -> NamedTempFile {
        Builder::new().suffix(suffix).tempfile().unwrap()
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(format_of(Path::new("a.JSON")), Some(Format::Json));
        assert_eq!(format_of(Path::new("a.yml")), Some(Format::Yaml));
        assert_eq!(format_of(Path::new("dir/a.MID")), Some(Format::Midi));
        assert_eq!(format_of(Path::new("a.musicxml")), Some(Format::MusicXml));
        assert_eq!(format_of(Path::new("a.mxl")), None);
        assert_eq!(format_of(Path::new("noext")), None);
    }

    #[test]
    fn test_save_and_load_json() {
        let file = temp_with_suffix(".json");
        save(&music(), file.path()).unwrap();
        assert_eq!(load(file.path()).unwrap(), music());
    }

    #[test]
    fn test_save_and_load_yaml() {
        let file = temp_with_suffix(".yaml");
        save(&music(), file.path()).unwrap();
        assert_eq!(load(file.path()).unwrap(), music());
    }

    #[test]
    fn test_unknown_extension() {
        let file = temp_with_suffix(".txt");
        assert!(matches!(save(&music(), file.path()), Err(MusicError::UnsupportedFormat(_))));
        assert!(matches!(write(&music(), file.path()), Err(MusicError::UnsupportedFormat(_))));
        assert!(matches!(load(file.path()), Err(MusicError::UnsupportedFormat(_))));
        assert!(matches!(read(file.path()), Err(MusicError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_lossy_formats_not_accepted_by_save() {
        let file = temp_with_suffix(".mid");
        assert!(matches!(save(&music(), file.path()), Err(MusicError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_read_sets_source_filename() {
        let file = temp_with_suffix(".mid");
        write(&music(), file.path()).unwrap();
        let read_back = read(file.path()).unwrap();
        assert_eq!(read_back.meta_data.source_filename, file_name(file.path()));
        assert_eq!(read_back.meta_data.source_format.as_deref(), Some("midi"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(matches!(load(&path), Err(MusicError::Io(_))));
    }

    #[test]
    fn test_malformed_json() {
        let file = temp_with_suffix(".json");
        fs::write(file.path(), "{ not json").unwrap();
        assert!(matches!(load_json(file.path()), Err(MusicError::Json(_))));
    }
}
