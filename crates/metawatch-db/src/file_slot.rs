//! Single-file state slot.
//!
//! The whole file is the slot. Writes go to a sibling `<name>.tmp` file
//! which is then renamed over the target, so a crash mid-write leaves
//! either the old contents or the new ones, never a truncated mix.

use std::io::ErrorKind;
use std::path::PathBuf;

use metawatch_core::{SlotBackend, StoreError};

/// A [`SlotBackend`] stored in one file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    /// Use the file at `path`. The file does not have to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl SlotBackend for FileSlot {
    fn read(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read {
                location: self.location(),
                source,
            }),
        }
    }

    fn write(&mut self, value: &[u8]) -> Result<(), StoreError> {
        let temp = self.temp_path();
        std::fs::write(&temp, value)
            .and_then(|()| std::fs::rename(&temp, &self.path))
            .map_err(|source| StoreError::Write {
                location: self.location(),
                source,
            })?;
        tracing::debug!(path = %self.path.display(), bytes = value.len(), "state slot written");
        Ok(())
    }
}
