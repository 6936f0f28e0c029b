use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{Error, Result};

/// Writes the trimmed text, creating the parent folder if needed and
/// replacing any previous artifact.
pub(crate) fn write(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text.trim())?;
    Ok(())
}

pub(crate) fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => Error::MissingArtifact {
            path: path.to_path_buf(),
        },
        _ => Error::Io(err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_returns_stripped_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GenAI").join("generated_text.txt");
        write(&path, "\n  Ferris is a crab. He likes Rust.  \n\n").unwrap();
        assert_eq!(read(&path).unwrap(), "Ferris is a crab. He likes Rust.");
    }

    #[test]
    fn round_trip_preserves_utf8_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generated_text.txt");
        let text = "Café au lait, 東京, emoji 🦀.";
        write(&path, text).unwrap();
        assert_eq!(fs::read(&path).unwrap(), text.as_bytes());
        assert_eq!(read(&path).unwrap(), text);
    }

    #[test]
    fn write_overwrites_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generated_text.txt");
        write(&path, "a much longer first version").unwrap();
        write(&path, "short").unwrap();
        assert_eq!(read(&path).unwrap(), "short");
    }

    #[test]
    fn missing_file_is_a_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GenAI").join("generated_text.txt");
        match read(&path) {
            Err(Error::MissingArtifact { path: reported }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
