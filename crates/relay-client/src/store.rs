//! Device-local store for search history and saved responses
//!
//! Backed by a single JSON file that is opened once and rewritten after
//! every mutation. Writes go to a sibling temp file that is then renamed
//! over the original, so a crash never leaves a truncated store behind.

use std::io;
use std::path::PathBuf;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Most recent searches kept
pub const HISTORY_LIMIT: usize = 10;

/// Saved responses kept
pub const SAVED_LIMIT: usize = 50;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the store file failed
    #[error("store I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Store file exists but is not valid store JSON
    #[error("store file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One completed search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub query: String,
    pub timestamp: Timestamp,
}

/// A response the user chose to keep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedResponse {
    pub query: String,
    pub response: String,
    pub timestamp: Timestamp,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    history: Vec<HistoryEntry>,
    #[serde(default)]
    saved: Vec<SavedResponse>,
}

/// Bounded, newest-first logs of searches and saved responses
#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    data: StoreData,
}

impl LocalStore {
    /// Open the store at `path`, starting empty when the file does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not hold store JSON
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let data = match std::fs::read(&path) {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => StoreData::default(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self { path: Some(path), data })
    }

    /// Store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: StoreData::default(),
        }
    }

    /// Record a completed search, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be flushed
    pub fn record_search(&mut self, query: &str) -> Result<(), StoreError> {
        self.data.history.insert(
            0,
            HistoryEntry {
                query: query.to_owned(),
                timestamp: Timestamp::now(),
            },
        );
        self.data.history.truncate(HISTORY_LIMIT);
        self.flush()
    }

    /// Keep a response, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be flushed
    pub fn save_response(&mut self, query: &str, response: &str) -> Result<(), StoreError> {
        self.data.saved.insert(
            0,
            SavedResponse {
                query: query.to_owned(),
                response: response.to_owned(),
                timestamp: Timestamp::now(),
            },
        );
        self.data.saved.truncate(SAVED_LIMIT);
        self.flush()
    }

    /// Search history, newest first
    pub fn history(&self) -> &[HistoryEntry] {
        &self.data.history
    }

    /// Saved responses, newest first
    pub fn saved(&self) -> &[SavedResponse] {
        &self.data.saved
    }

    fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let io_error = |source: io::Error| StoreError::Io {
            path: path.clone(),
            source,
        };

        let json = serde_json::to_vec_pretty(&self.data).map_err(|e| io_error(io::Error::other(e)))?;

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, json).map_err(io_error)?;
        std::fs::rename(&tmp, path).map_err(io_error)
    }
}
