//! Where subtitle files live.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::trace;

/// Identifies one stored subtitle file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubtitleKey {
    pub platform: String,
    pub video_id: String,
    pub lang: String,
}

impl SubtitleKey {
    pub fn new(
        platform: impl Into<String>,
        video_id: impl Into<String>,
        lang: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            video_id: video_id.into(),
            lang: lang.into(),
        }
    }

    /// Every component must be a single, non-empty path segment.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("platform", &self.platform),
            ("id", &self.video_id),
            ("lang", &self.lang),
        ] {
            if value.is_empty() {
                return Err(Error::Validation(format!("missing {name}")));
            }
            if value == "." || value == ".." || value.contains(['/', '\\', '\0']) {
                return Err(Error::Validation(format!("{name} {value:?} is not a valid name")));
            }
        }
        Ok(())
    }
}

/// File operations the version store performs during a save.
pub trait SubtitleStorage: Send + Sync {
    /// Create whatever containers the key needs before anything is written.
    fn prepare(&self, key: &SubtitleKey) -> io::Result<()>;

    /// Current content, or `None` when nothing has been saved yet.
    fn read_active(&self, key: &SubtitleKey) -> io::Result<Option<String>>;

    fn write_backup(&self, key: &SubtitleKey, version: u32, contents: &str) -> io::Result<()>;

    /// Replace the active file. Either the new content lands completely or the old stays.
    fn write_active(&self, key: &SubtitleKey, contents: &str) -> io::Result<()>;

    /// Put back what `read_active` returned before a failed save.
    fn restore_active(&self, key: &SubtitleKey, previous: Option<&str>) -> io::Result<()>;
}

/// Directory tree layout: `<root>/<platform>/<id>/<lang>.srt`, backups under `version/`.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn video_dir(&self, key: &SubtitleKey) -> PathBuf {
        self.root.join(&key.platform).join(&key.video_id)
    }

    pub fn active_path(&self, key: &SubtitleKey) -> PathBuf {
        self.video_dir(key).join(format!("{}.srt", key.lang))
    }

    pub fn backup_path(&self, key: &SubtitleKey, version: u32) -> PathBuf {
        self.video_dir(key)
            .join("version")
            .join(format!("r{}-{}.srt", version, key.lang))
    }
}

impl SubtitleStorage for FsStorage {
    fn prepare(&self, key: &SubtitleKey) -> io::Result<()> {
        fs::create_dir_all(self.video_dir(key).join("version"))
    }

    fn read_active(&self, key: &SubtitleKey) -> io::Result<Option<String>> {
        match fs::read_to_string(self.active_path(key)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn write_backup(&self, key: &SubtitleKey, version: u32, contents: &str) -> io::Result<()> {
        let path = self.backup_path(key, version);
        trace!("write_backup path={}", path.display());
        fs::write(path, contents)
    }

    fn write_active(&self, key: &SubtitleKey, contents: &str) -> io::Result<()> {
        let path = self.active_path(key);
        trace!("write_active path={}", path.display());
        let mut tmp = NamedTempFile::new_in(self.video_dir(key))?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|err| err.error)?;
        Ok(())
    }

    fn restore_active(&self, key: &SubtitleKey, previous: Option<&str>) -> io::Result<()> {
        match previous {
            Some(text) => self.write_active(key, text),
            None => match fs::remove_file(self.active_path(key)) {
                Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
                _ => Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn lays_out_paths_like_the_deployment() {
        let storage = FsStorage::new("/srv/subtitle");
        let key = SubtitleKey::new("youtube", "dQw4w9WgXcQ", "ko");
        assert_eq!(
            storage.active_path(&key),
            PathBuf::from("/srv/subtitle/youtube/dQw4w9WgXcQ/ko.srt")
        );
        assert_eq!(
            storage.backup_path(&key, 3),
            PathBuf::from("/srv/subtitle/youtube/dQw4w9WgXcQ/version/r3-ko.srt")
        );
    }

    #[test]
    fn rejects_keys_that_escape_the_root() {
        for key in [
            SubtitleKey::new("", "id", "ko"),
            SubtitleKey::new("youtube", "../etc", "ko"),
            SubtitleKey::new("youtube", "id", ".."),
            SubtitleKey::new("you\\tube", "id", "ko"),
        ] {
            assert_eq!(key.validate().unwrap_err().kind(), ErrorKind::Validation);
        }
        assert!(SubtitleKey::new("youtube", "a-b_c", "ko").validate().is_ok());
    }

    #[test]
    fn active_file_roundtrip_and_restore() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        let key = SubtitleKey::new("youtube", "vid", "ko");
        storage.prepare(&key).unwrap();
        assert_eq!(storage.read_active(&key).unwrap(), None);

        storage.write_active(&key, "first").unwrap();
        storage.write_active(&key, "second").unwrap();
        assert_eq!(storage.read_active(&key).unwrap().as_deref(), Some("second"));

        storage.restore_active(&key, Some("first")).unwrap();
        assert_eq!(storage.read_active(&key).unwrap().as_deref(), Some("first"));
        storage.restore_active(&key, None).unwrap();
        assert_eq!(storage.read_active(&key).unwrap(), None);
        storage.restore_active(&key, None).unwrap();
    }
}
