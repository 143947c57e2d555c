use rusqlite::Connection;

use super::{map_sql_error, StorageError};

pub(super) fn apply_pragmas(connection: &Connection) -> Result<(), StorageError> {
    connection
        .execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;
             PRAGMA temp_store=MEMORY;",
        )
        .map_err(map_sql_error)
}

pub(super) fn apply_schema(connection: &Connection) -> Result<(), StorageError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS songs (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                artist TEXT NOT NULL,
                youtube_id TEXT NOT NULL DEFAULT '',
                duration_ms INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                UNIQUE (title, artist)
             );
             CREATE INDEX IF NOT EXISTS idx_songs_youtube_id ON songs (youtube_id);
             CREATE TABLE IF NOT EXISTS fingerprints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hash INTEGER NOT NULL,
                song_id TEXT NOT NULL REFERENCES songs(id) ON DELETE CASCADE,
                anchor_time_ms INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_fingerprints_hash ON fingerprints (hash);
             CREATE INDEX IF NOT EXISTS idx_fingerprints_song_id ON fingerprints (song_id);",
        )
        .map_err(map_sql_error)
}
