use std::collections::HashMap;

use rusqlite::params;
use uuid::Uuid;

use crate::fingerprint::hasher::Couple;

use super::read::song_from_row;
use super::{map_sql_error, now_epoch_seconds, Database, Song, StorageError};

impl Database {
    /// Idempotent upsert on `(title, artist)`.
    ///
    /// When the pair already exists its id is returned, filling in a
    /// previously empty `youtube_id` if the caller supplies one. A losing
    /// racer on the unique constraint re-reads the winner's id.
    pub fn register_song(
        &self,
        title: &str,
        artist: &str,
        youtube_id: &str,
        duration_ms: i64,
    ) -> Result<String, StorageError> {
        let conn = self.lock();
        if let Some(id) = find_existing(&conn, title, artist, youtube_id)? {
            return Ok(id);
        }

        let id = Uuid::new_v4().to_string();
        let inserted = conn
            .prepare_cached(
                "INSERT INTO songs (id, title, artist, youtube_id, duration_ms, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .map_err(map_sql_error)?
            .execute(params![
                id,
                title,
                artist,
                youtube_id,
                duration_ms,
                now_epoch_seconds()
            ]);
        match inserted {
            Ok(_) => Ok(id),
            Err(err) if is_unique_violation(&err) => {
                find_existing(&conn, title, artist, youtube_id)?.ok_or(StorageError::Unexpected)
            }
            Err(err) => Err(map_sql_error(err)),
        }
    }

    /// Insert every row of one ingest inside a single transaction.
    ///
    /// Rows stream through a cached prepared statement, so memory stays
    /// bounded regardless of reference length, and observers see either
    /// none or all of the call's rows. Duplicate rows are kept; they carry
    /// real collision information.
    pub fn store_fingerprints(
        &self,
        fingerprints: &HashMap<u32, Vec<Couple>>,
    ) -> Result<(), StorageError> {
        if fingerprints.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(map_sql_error)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO fingerprints (hash, song_id, anchor_time_ms) VALUES (?1, ?2, ?3)",
                )
                .map_err(map_sql_error)?;
            for (hash, couples) in fingerprints {
                for couple in couples {
                    stmt.execute(params![
                        *hash as i64,
                        couple.song_id,
                        couple.anchor_time_ms as i64
                    ])
                    .map_err(map_sql_error)?;
                }
            }
        }
        tx.commit().map_err(map_sql_error)
    }

    /// Remove a song and all of its fingerprint rows atomically.
    pub fn delete_song(&self, id: &str) -> Result<Song, StorageError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(map_sql_error)?;
        let song = {
            use rusqlite::OptionalExtension;
            tx.query_row(
                "SELECT id, title, artist, youtube_id, duration_ms, created_at
                 FROM songs WHERE id = ?1",
                params![id],
                song_from_row,
            )
            .optional()
            .map_err(map_sql_error)?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?
        };
        tx.execute("DELETE FROM fingerprints WHERE song_id = ?1", params![id])
            .map_err(map_sql_error)?;
        tx.execute("DELETE FROM songs WHERE id = ?1", params![id])
            .map_err(map_sql_error)?;
        tx.commit().map_err(map_sql_error)?;
        Ok(song)
    }
}

fn find_existing(
    conn: &rusqlite::Connection,
    title: &str,
    artist: &str,
    youtube_id: &str,
) -> Result<Option<String>, StorageError> {
    use rusqlite::OptionalExtension;
    let existing: Option<(String, String)> = conn
        .query_row(
            "SELECT id, youtube_id FROM songs WHERE title = ?1 AND artist = ?2",
            params![title, artist],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(map_sql_error)?;
    let Some((id, stored_youtube_id)) = existing else {
        return Ok(None);
    };
    if stored_youtube_id.is_empty() && !youtube_id.is_empty() {
        conn.execute(
            "UPDATE songs SET youtube_id = ?1 WHERE id = ?2",
            params![youtube_id, id],
        )
        .map_err(map_sql_error)?;
    }
    Ok(Some(id))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(sql_err, _)
            if sql_err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
