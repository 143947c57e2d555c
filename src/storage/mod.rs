//! Persistent fingerprint index backed by SQLite.
//!
//! Two tables: `songs` holds catalog metadata keyed by an opaque UUID, and
//! `fingerprints` holds one row per hash occurrence. The connection is
//! serialized behind a mutex; readers tolerate the serialization and writers
//! require it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fingerprint::hasher::Couple;

mod read;
mod schema;
mod write;

/// A cataloged reference recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    /// Opaque identifier (UUID v4) minted at registration.
    pub id: String,
    pub title: String,
    pub artist: String,
    /// External video id; empty when unknown.
    pub youtube_id: String,
    pub duration_ms: i64,
    /// Registration time in epoch seconds.
    pub created_at: i64,
}

/// Errors returned by the index.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite query failed.
    #[error("Database query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    /// Database is locked or busy.
    #[error("Database is busy, please retry")]
    Busy,
    /// No song with the given id.
    #[error("No song with id {0}")]
    NotFound(String),
    /// Failed to create the database's parent directory.
    #[error("Could not create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// SQLite returned an unexpected result.
    #[error("SQLite returned an unexpected result")]
    Unexpected,
}

/// Translate rusqlite errors into friendlier StorageError variants.
pub(crate) fn map_sql_error(err: rusqlite::Error) -> StorageError {
    match err {
        rusqlite::Error::SqliteFailure(sql_err, _)
            if sql_err.extended_code == rusqlite::ffi::SQLITE_BUSY =>
        {
            StorageError::Busy
        }
        rusqlite::Error::InvalidQuery
        | rusqlite::Error::InvalidParameterName(_)
        | rusqlite::Error::MultipleStatement => StorageError::Unexpected,
        other => StorageError::Sql(other),
    }
}

/// The operations the engine needs from its index.
///
/// The SQLite implementation below is the production binding; tests swap in
/// doubles to exercise failure paths.
pub trait Storage: Send + Sync {
    /// Idempotent upsert on `(title, artist)`; returns the song id.
    fn register_song(
        &self,
        title: &str,
        artist: &str,
        youtube_id: &str,
        duration_ms: i64,
    ) -> Result<String, StorageError>;
    /// Insert all rows of one ingest atomically.
    fn store_fingerprints(
        &self,
        fingerprints: &HashMap<u32, Vec<Couple>>,
    ) -> Result<(), StorageError>;
    /// All couples for a single hash; empty when none.
    fn lookup_by_hash(&self, hash: u32) -> Result<Vec<Couple>, StorageError>;
    /// Batched lookup; result keys are the subset of `hashes` with rows.
    fn lookup_by_hashes(&self, hashes: &[u32]) -> Result<HashMap<u32, Vec<Couple>>, StorageError>;
    /// Delete a song and all its fingerprints, returning the removed record.
    fn delete_song(&self, id: &str) -> Result<Song, StorageError>;
    /// Number of fingerprint rows for a song.
    fn count_fingerprints(&self, id: &str) -> Result<usize, StorageError>;
    fn get_song(&self, id: &str) -> Result<Song, StorageError>;
    fn list_songs(&self) -> Result<Vec<Song>, StorageError>;
    /// Flush and release underlying resources.
    fn close(&self) -> Result<(), StorageError>;
}

/// SQLite-backed index shared by all operations of a service instance.
pub struct Database {
    connection: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let connection = Connection::open(path)?;
        schema::apply_pragmas(&connection)?;
        schema::apply_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Open a transient in-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let connection = Connection::open_in_memory()?;
        schema::apply_pragmas(&connection)?;
        schema::apply_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for Database {
    fn register_song(
        &self,
        title: &str,
        artist: &str,
        youtube_id: &str,
        duration_ms: i64,
    ) -> Result<String, StorageError> {
        Database::register_song(self, title, artist, youtube_id, duration_ms)
    }

    fn store_fingerprints(
        &self,
        fingerprints: &HashMap<u32, Vec<Couple>>,
    ) -> Result<(), StorageError> {
        Database::store_fingerprints(self, fingerprints)
    }

    fn lookup_by_hash(&self, hash: u32) -> Result<Vec<Couple>, StorageError> {
        Database::lookup_by_hash(self, hash)
    }

    fn lookup_by_hashes(&self, hashes: &[u32]) -> Result<HashMap<u32, Vec<Couple>>, StorageError> {
        Database::lookup_by_hashes(self, hashes)
    }

    fn delete_song(&self, id: &str) -> Result<Song, StorageError> {
        Database::delete_song(self, id)
    }

    fn count_fingerprints(&self, id: &str) -> Result<usize, StorageError> {
        Database::count_fingerprints(self, id)
    }

    fn get_song(&self, id: &str) -> Result<Song, StorageError> {
        Database::get_song(self, id)
    }

    fn list_songs(&self) -> Result<Vec<Song>, StorageError> {
        Database::list_songs(self)
    }

    fn close(&self) -> Result<(), StorageError> {
        Database::close(self)
    }
}

impl Database {
    /// Checkpoint the write-ahead log. The connection itself closes on drop.
    pub fn close(&self) -> Result<(), StorageError> {
        self.lock()
            .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            .map_err(map_sql_error)
    }
}

fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs() as i64
}
