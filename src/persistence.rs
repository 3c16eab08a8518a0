// File: src/persistence.rs
use crate::error::PersistenceError;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// On-disk form of a compiled vocabulary: the normalized words in rank order.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
struct VocabularySnapshot {
    version: u32,
    words: Vec<String>,
}

const SNAPSHOT_VERSION: u32 = 1;

/// Writes the snapshot next to its destination, then renames it into place so a
/// crash never leaves a half-written file behind.
pub fn save_word_list(words: &[String], path: &Path) -> Result<(), PersistenceError> {
    let parent_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent_dir)?;

    let snapshot = VocabularySnapshot {
        version: SNAPSHOT_VERSION,
        words: words.to_vec(),
    };

    let temp_file = NamedTempFile::new_in(parent_dir)?;
    {
        let mut writer = BufWriter::new(&temp_file);
        bincode::serialize_into(&mut writer, &snapshot)?;
        writer.flush()?;
    }
    temp_file.persist(path)?;
    Ok(())
}

pub fn load_word_list(path: &Path) -> Result<Vec<String>, PersistenceError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let snapshot: VocabularySnapshot = bincode::deserialize_from(reader)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(PersistenceError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unsupported snapshot version {}", snapshot.version),
        )));
    }
    Ok(snapshot.words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vocab.bin");
        let words = vec!["the".to_string(), "of".to_string()];
        save_word_list(&words, &path).unwrap();
        assert_eq!(load_word_list(&path).unwrap(), words);
    }

    #[test]
    fn garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.bin");
        std::fs::write(&path, [0xffu8; 3]).unwrap();
        assert!(load_word_list(&path).is_err());
    }
}
