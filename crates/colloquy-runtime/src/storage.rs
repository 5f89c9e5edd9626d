//! Filesystem session storage.
//!
//! Each session is one JSON file under a base directory. File names are the
//! storage key with every byte outside `[A-Za-z0-9_-]` percent-encoded, so
//! keys such as `slack/conversations/C1/users/U1` map to a single flat file.

use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use colloquy_dialog::{DialogSession, Storage, StorageError, StorageResult};
use tracing::trace;

/// Stores sessions as JSON files in `base_dir`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    /// Creates a store rooted at `base_dir`. The directory is created on
    /// first save.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Root directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the file holding `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len() + 5);
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
                name.push(byte as char);
            } else {
                let _ = write!(name, "%{byte:02X}");
            }
        }
        name.push_str(".json");
        self.base_dir.join(name)
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn load(&self, key: &str) -> StorageResult<Option<DialogSession>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        trace!(key, path = %path.display(), "Loaded session file");
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::serialization(key, e))
    }

    async fn save(&self, key: &str, session: &DialogSession) -> StorageResult<()> {
        let bytes =
            serde_json::to_vec_pretty(session).map_err(|e| StorageError::serialization(key, e))?;
        tokio::fs::create_dir_all(&self.base_dir).await?;

        // Write-then-rename so readers never see a partial file.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        trace!(key, path = %path.display(), "Saved session file");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
