//! The on-disk stream tree: inbox, archive and quarantine.
//!
//! Also the scoped decrypt-then-unpack step. Extraction happens in a
//! temporary directory that is removed on every exit path; the
//! original drop is only ever moved by atomic rename.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::TempDir;
use tracing::info;

use crate::crypto::{self, KeyPair};
use crate::error::StreamError;

/// Data files extracted from one drop. Dropping this removes the
/// backing temporary directory.
pub struct ExtractedFiles {
    _temp_dir: TempDir,
    pub files: Vec<PathBuf>,
}

/// Decrypt one drop with `key_pair` and unpack it when the plaintext
/// is a zip archive.
pub fn extract(path: &Path, key_pair: &KeyPair) -> Result<ExtractedFiles, StreamError> {
    let ciphertext = fs::read(path)?;
    let plaintext = crypto::decrypt(&ciphertext, key_pair)?;

    let temp_dir = TempDir::new()?;
    let filename = path
        .file_name()
        .ok_or_else(|| StreamError::corrupted(format!("no file name in {}", path.display())))?;
    let plaintext_path = temp_dir.path().join(filename);
    fs::write(&plaintext_path, &plaintext)?;

    if plaintext_path.extension().is_some_and(|e| e == "zip") {
        let file = fs::File::open(&plaintext_path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| StreamError::corrupted(format!("unzip failed: {e}")))?;
        archive
            .extract(temp_dir.path())
            .map_err(|e| StreamError::corrupted(format!("unzip failed: {e}")))?;
        fs::remove_file(&plaintext_path)?;
    }

    let mut files = Vec::new();
    collect_files(temp_dir.path(), &mut files)?;
    files.sort();

    Ok(ExtractedFiles {
        _temp_dir: temp_dir,
        files,
    })
}

/// Try every configured key pair in order; exhausting them all means
/// the file is corrupt.
pub fn extract_with_keys(path: &Path, keys: &[KeyPair]) -> Result<ExtractedFiles, StreamError> {
    for key_pair in keys {
        match extract(path, key_pair) {
            Ok(extracted) => return Ok(extracted),
            Err(StreamError::Corrupted(_)) => continue,
            Err(other) => return Err(other),
        }
    }
    Err(StreamError::corrupted(format!(
        "unable to decrypt {}",
        path.display()
    )))
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), StreamError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// The inbox/archive/errors directory triple.
pub struct StreamsFiles {
    pub inbox_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub errors_dir: PathBuf,
    pub keys: Vec<KeyPair>,
    /// Replay mode: read from the archive and never move anything.
    pub publish_archives: bool,
}

impl StreamsFiles {
    /// Every regular file currently discoverable, recursively.
    pub fn scan(&self) -> Result<Vec<PathBuf>, StreamError> {
        let root = if self.publish_archives {
            &self.archive_dir
        } else {
            &self.inbox_dir
        };
        let pattern = root.join("**").join("*");
        let pattern = pattern
            .to_str()
            .ok_or_else(|| StreamError::corrupted(format!("non-utf8 path {root:?}")))?;

        let mut files = Vec::new();
        for entry in
            glob::glob(pattern).map_err(|e| StreamError::corrupted(format!("bad glob: {e}")))?
        {
            let path = entry.map_err(|e| StreamError::Io(e.into_error()))?;
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn archive(&self, path: &Path) -> Result<(), StreamError> {
        if self.publish_archives {
            return Ok(());
        }
        self.move_into(path, &self.archive_dir)
    }

    pub fn move_to_errors(&self, path: &Path) -> Result<(), StreamError> {
        if self.publish_archives {
            return Ok(());
        }
        info!(path = %path.display(), "Quarantining file");
        self.move_into(path, &self.errors_dir)
    }

    fn move_into(&self, path: &Path, target_dir: &Path) -> Result<(), StreamError> {
        let filename = path
            .file_name()
            .ok_or_else(|| StreamError::corrupted(format!("no file name in {}", path.display())))?;
        let dated_dir = target_dir.join(Utc::now().date_naive().to_string());
        fs::create_dir_all(&dated_dir)?;
        // Same filesystem, so the rename is atomic.
        fs::rename(path, dated_dir.join(filename))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::encrypt;

    fn key_pair(n: u8) -> KeyPair {
        let hex_byte = format!("{n:02x}");
        KeyPair::from_hex(&hex_byte.repeat(16), &hex_byte.repeat(16)).unwrap()
    }

    fn write_encrypted(dir: &Path, name: &str, content: &[u8], key: &KeyPair) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, encrypt(content, key)).unwrap();
        path
    }

    #[test]
    fn extracts_plain_payload() {
        let dir = tempfile::tempdir().unwrap();
        let key = key_pair(1);
        let path = write_encrypted(dir.path(), "Enedis_SGE_HDM_test.csv", b"payload", &key);

        let extracted = extract(&path, &key).unwrap();
        assert_eq!(extracted.files.len(), 1);
        assert_eq!(fs::read(&extracted.files[0]).unwrap(), b"payload");
    }

    #[test]
    fn extracts_zip_payload() {
        use std::io::Write;

        let mut zip_bytes = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut zip_bytes));
            writer
                .start_file("inner.xml", zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(b"<doc/>").unwrap();
            writer.finish().unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let key = key_pair(2);
        let path = write_encrypted(dir.path(), "ERDF_R50_test.zip", &zip_bytes, &key);

        let extracted = extract(&path, &key).unwrap();
        assert_eq!(extracted.files.len(), 1);
        assert!(extracted.files[0].ends_with("inner.xml"));
        assert_eq!(fs::read(&extracted.files[0]).unwrap(), b"<doc/>");
    }

    #[test]
    fn key_rotation_tries_later_keys() {
        let dir = tempfile::tempdir().unwrap();
        let old_key = key_pair(3);
        let new_key = key_pair(4);
        let path = write_encrypted(dir.path(), "ERDF_R151_test.zip.enc", b"data", &new_key);

        let extracted = extract_with_keys(&path, &[old_key.clone(), new_key]).unwrap();
        assert_eq!(fs::read(&extracted.files[0]).unwrap(), b"data");

        let exhausted = extract_with_keys(&path, &[old_key]);
        assert!(matches!(exhausted, Err(StreamError::Corrupted(_))));
    }

    #[test]
    fn quarantine_moves_into_dated_directory() {
        let dir = tempfile::tempdir().unwrap();
        let inbox = dir.path().join("inbox");
        let archive = dir.path().join("archive");
        let errors = dir.path().join("errors");
        fs::create_dir_all(&inbox).unwrap();

        let streams = StreamsFiles {
            inbox_dir: inbox.clone(),
            archive_dir: archive.clone(),
            errors_dir: errors.clone(),
            keys: vec![],
            publish_archives: false,
        };

        let dropped = inbox.join("ENEDIS_R171_bad.zip");
        fs::write(&dropped, b"junk").unwrap();
        streams.move_to_errors(&dropped).unwrap();

        assert!(!dropped.exists());
        let today = Utc::now().date_naive().to_string();
        assert!(errors.join(&today).join("ENEDIS_R171_bad.zip").exists());
    }

    #[test]
    fn replay_mode_reads_archive_and_never_moves() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("archive").join("2023-01-15");
        fs::create_dir_all(&archive).unwrap();
        let kept = archive.join("ERDF_R50_x.zip");
        fs::write(&kept, b"data").unwrap();

        let streams = StreamsFiles {
            inbox_dir: dir.path().join("inbox"),
            archive_dir: dir.path().join("archive"),
            errors_dir: dir.path().join("errors"),
            keys: vec![],
            publish_archives: true,
        };

        assert_eq!(streams.scan().unwrap(), vec![kept.clone()]);
        streams.archive(&kept).unwrap();
        streams.move_to_errors(&kept).unwrap();
        assert!(kept.exists());
    }
}
