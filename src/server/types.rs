//! Request and response shapes for the HTTP API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::service::MatchResult;
use crate::storage::Song;

/// Recommended maximum for one hash-match request, about 30 seconds of audio.
pub const MAX_HASHES_SOFT_LIMIT: usize = 10_000;
/// Absolute maximum; larger requests are rejected outright.
pub const MAX_HASHES_HARD_LIMIT: usize = 50_000;

/// Body of `POST /api/match/hashes`.
///
/// Keys are hash values as decimal strings (JSON object keys are always
/// strings); values are anchor times in milliseconds.
#[derive(Debug, Deserialize)]
pub struct MatchHashesRequest {
    pub hashes: HashMap<String, u32>,
}

impl MatchHashesRequest {
    /// Reject empty and oversized requests.
    pub fn validate(&self) -> Result<(), String> {
        if self.hashes.is_empty() {
            return Err("hashes cannot be empty".to_string());
        }
        if self.hashes.len() > MAX_HASHES_HARD_LIMIT {
            return Err(format!(
                "too many hashes: {} (maximum: {})",
                self.hashes.len(),
                MAX_HASHES_HARD_LIMIT
            ));
        }
        Ok(())
    }

    /// Parse the decimal string keys. Structural validation of each hash
    /// happens in the engine, which skips invalid entries individually.
    pub fn to_hash_map(&self) -> Result<HashMap<u32, u32>, String> {
        let mut result = HashMap::with_capacity(self.hashes.len());
        for (hash_str, &anchor_ms) in &self.hashes {
            let hash: u32 = hash_str
                .parse()
                .map_err(|_| format!("invalid hash key '{hash_str}'"))?;
            result.insert(hash, anchor_ms);
        }
        Ok(result)
    }
}

/// Body of `POST /api/songs/youtube`.
#[derive(Debug, Deserialize)]
pub struct AddSongYoutubeRequest {
    pub youtube_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
}

#[derive(Debug, Serialize)]
pub struct SongDto {
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub youtube_id: String,
    pub duration_ms: i64,
}

impl From<Song> for SongDto {
    fn from(song: Song) -> Self {
        Self {
            id: song.id,
            title: song.title,
            artist: song.artist,
            youtube_id: song.youtube_id,
            duration_ms: song.duration_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListSongsResponse {
    pub songs: Vec<SongDto>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct AddSongResponse {
    pub message: String,
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub youtube_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteSongResponse {
    pub message: String,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub matches: Vec<MatchResult>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub status: String,
    pub database_path: String,
    pub song_count: usize,
    pub sample_rate: u32,
}

/// Standard error envelope for all failure responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    pub code: u16,
}
