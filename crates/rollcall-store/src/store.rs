use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use rollcall_core::SchoolConfig;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to create data directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to write {0}: {1}")]
    Write(PathBuf, std::io::Error),
    #[error("corrupt collection file {0}: {1}")]
    Corrupt(PathBuf, serde_json::Error),
}

/// The four persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Students,
    Users,
    AttendanceEvents,
    SchoolConfig,
}

impl Collection {
    fn file_name(&self) -> &'static str {
        match self {
            Collection::Students => "students.json",
            Collection::Users => "users.json",
            Collection::AttendanceEvents => "attendance_events.json",
            Collection::SchoolConfig => "school_config.json",
        }
    }
}

/// One JSON file per collection under a data directory.
///
/// Writes go to a temp file first and are moved into place with `rename`,
/// so a crash mid-save leaves the previous contents intact.
pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    /// Open (and create if needed) the data directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::CreateDir(dir.clone(), e))?;
        tracing::debug!(dir = %dir.display(), "document store opened");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read a whole collection. A missing file is an empty collection, not
    /// an error — first run starts from nothing.
    pub fn load<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>, StoreError> {
        let path = self.dir.join(collection.file_name());
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Read(path, e)),
        };
        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(path, e))
    }

    /// Replace a whole collection.
    pub fn save<T: Serialize>(
        &self,
        collection: Collection,
        records: &[T],
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(records)
            .expect("collection records always serialize");
        self.write_atomic(collection, json.as_bytes())
    }

    /// The school config is a singleton document, not a list.
    pub fn load_school_config(&self) -> Result<Option<SchoolConfig>, StoreError> {
        let path = self.dir.join(Collection::SchoolConfig.file_name());
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Read(path, e)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Corrupt(path, e))
    }

    pub fn save_school_config(&self, config: &SchoolConfig) -> Result<(), StoreError> {
        let json =
            serde_json::to_string_pretty(config).expect("school config always serializes");
        self.write_atomic(Collection::SchoolConfig, json.as_bytes())
    }

    fn write_atomic(&self, collection: Collection, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.dir.join(collection.file_name());
        let tmp = self.dir.join(format!("{}.tmp", collection.file_name()));
        fs::write(&tmp, bytes).map_err(|e| StoreError::Write(tmp.clone(), e))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::Write(path.clone(), e))?;
        tracing::debug!(file = %path.display(), bytes = bytes.len(), "collection saved");
        Ok(())
    }
}
