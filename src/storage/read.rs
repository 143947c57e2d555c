use std::collections::HashMap;

use rusqlite::{params, OptionalExtension, Row};

use crate::fingerprint::hasher::Couple;

use super::{map_sql_error, Database, Song, StorageError};

/// Keys per SQL `IN` clause. Stays well under SQLite's parameter limit.
const LOOKUP_CHUNK: usize = 500;

impl Database {
    /// Fetch all couples for a single hash.
    pub fn lookup_by_hash(&self, hash: u32) -> Result<Vec<Couple>, StorageError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT song_id, anchor_time_ms FROM fingerprints WHERE hash = ?1",
            )
            .map_err(map_sql_error)?;
        let rows = stmt
            .query_map(params![hash as i64], |row| {
                Ok(Couple {
                    song_id: row.get(0)?,
                    anchor_time_ms: row.get::<_, i64>(1)? as u32,
                })
            })
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        Ok(rows)
    }

    /// Fetch couples for many hashes at once, grouped by hash.
    ///
    /// This is the query hot path: each chunk of keys goes out as one
    /// `IN` clause instead of a round trip per hash. Hashes without rows
    /// are absent from the result.
    pub fn lookup_by_hashes(
        &self,
        hashes: &[u32],
    ) -> Result<HashMap<u32, Vec<Couple>>, StorageError> {
        let mut grouped: HashMap<u32, Vec<Couple>> = HashMap::new();
        if hashes.is_empty() {
            return Ok(grouped);
        }
        let conn = self.lock();
        for chunk in hashes.chunks(LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT hash, song_id, anchor_time_ms FROM fingerprints WHERE hash IN ({placeholders})"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let rows = stmt
                .query_map(
                    rusqlite::params_from_iter(chunk.iter().map(|&h| h as i64)),
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)? as u32,
                            Couple {
                                song_id: row.get(1)?,
                                anchor_time_ms: row.get::<_, i64>(2)? as u32,
                            },
                        ))
                    },
                )
                .map_err(map_sql_error)?;
            for row in rows {
                let (hash, couple) = row.map_err(map_sql_error)?;
                grouped.entry(hash).or_default().push(couple);
            }
        }
        Ok(grouped)
    }

    /// Fetch a song's metadata by id.
    pub fn get_song(&self, id: &str) -> Result<Song, StorageError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT id, title, artist, youtube_id, duration_ms, created_at
             FROM songs WHERE id = ?1",
            params![id],
            song_from_row,
        )
        .optional()
        .map_err(map_sql_error)?
        .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    /// Fetch all songs ordered by registration time.
    pub fn list_songs(&self) -> Result<Vec<Song>, StorageError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, title, artist, youtube_id, duration_ms, created_at
                 FROM songs ORDER BY created_at ASC, title ASC",
            )
            .map_err(map_sql_error)?;
        let rows = stmt
            .query_map([], song_from_row)
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        Ok(rows)
    }

    /// Count fingerprint rows belonging to a song.
    pub fn count_fingerprints(&self, id: &str) -> Result<usize, StorageError> {
        let conn = self.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM fingerprints WHERE song_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .map_err(map_sql_error)?;
        Ok(count.max(0) as usize)
    }
}

pub(super) fn song_from_row(row: &Row<'_>) -> Result<Song, rusqlite::Error> {
    Ok(Song {
        id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        youtube_id: row.get(3)?,
        duration_ms: row.get(4)?,
        created_at: row.get(5)?,
    })
}
