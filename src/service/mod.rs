//! Ingest and query orchestration.
//!
//! The service owns a shared index handle and runs the pipeline stages in
//! order. Decoding and file reads happen at the edges; everything between
//! samples and ranked results is pure computation over transient data.

pub mod cancel;
mod confidence;

pub use cancel::CancelToken;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::audio::{convert, wav};
use crate::config::Config;
use crate::error::ServiceError;
use crate::fingerprint::{self, hasher, matcher};
use crate::storage::{Database, Song, Storage, StorageError};

/// A ranked candidate decorated with catalog metadata.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub song_id: String,
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub youtube_id: String,
    /// Vote count of the modal offset.
    pub score: usize,
    pub offset_ms: i32,
    pub confidence: f64,
}

/// Fingerprinting service over a storage binding.
pub struct Service<S: Storage = Database> {
    storage: Arc<S>,
    config: Config,
}

impl Service<Database> {
    /// Open the SQLite index named by the configuration.
    pub fn open(config: Config) -> Result<Self, ServiceError> {
        let storage = Database::open(&config.db_path)?;
        Ok(Self::with_storage(config, storage))
    }
}

impl<S: Storage> Service<S> {
    /// Bind the service to an explicit storage implementation.
    pub fn with_storage(config: Config, storage: S) -> Self {
        Self {
            storage: Arc::new(storage),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ingest an audio file as a reference recording.
    ///
    /// The file is normalized by the external decoder, fingerprinted, and
    /// persisted. Returns the song id.
    pub fn add_song(
        &self,
        cancel: &CancelToken,
        audio_path: &Path,
        title: &str,
        artist: &str,
        youtube_id: &str,
    ) -> Result<String, ServiceError> {
        require_metadata(title, artist)?;
        tracing::info!("Ingesting '{title}' by '{artist}' from {}", audio_path.display());
        cancel.check()?;
        let wav_path = convert::convert_to_mono_wav(
            audio_path,
            &self.config.temp_dir,
            self.config.sample_rate,
            cancel,
        )?;
        cancel.check()?;
        let (samples, sample_rate) = wav::read_wav(&wav_path)?;
        self.add_song_from_samples(cancel, &samples, sample_rate, title, artist, youtube_id)
    }

    /// Ingest pre-decoded samples.
    ///
    /// This is the entry point for runtimes that decode on their own; the
    /// file-based path above funnels into it.
    pub fn add_song_from_samples(
        &self,
        cancel: &CancelToken,
        samples: &[f32],
        sample_rate: u32,
        title: &str,
        artist: &str,
        youtube_id: &str,
    ) -> Result<String, ServiceError> {
        require_metadata(title, artist)?;
        if sample_rate == 0 {
            return Err(ServiceError::InvalidInput("sample rate must be positive".to_string()));
        }
        cancel.check()?;

        let duration_ms = ((samples.len() as f64 / sample_rate as f64) * 1000.0).round() as i64;
        let peaks = fingerprint::analyze_samples(samples, sample_rate)?;
        tracing::info!("Extracted {} peaks", peaks.len());

        cancel.check()?;
        let id = self
            .storage
            .register_song(title, artist, youtube_id, duration_ms)?;
        let fingerprints = hasher::fingerprint_peaks(&peaks, &id);
        tracing::info!("Generated {} distinct hashes", fingerprints.len());

        let stored = cancel.check().and_then(|()| {
            self.storage
                .store_fingerprints(&fingerprints)
                .map_err(ServiceError::from)
        });
        if let Err(err) = stored {
            // Best effort: restore the pre-ingest state, keep the original error.
            if let Err(rollback_err) = self.storage.delete_song(&id) {
                tracing::warn!("Rollback of {id} after failed ingest also failed: {rollback_err}");
            }
            return Err(err);
        }

        tracing::info!("Registered song {id}");
        Ok(id)
    }

    /// Identify an audio file against the catalog.
    pub fn match_file(
        &self,
        cancel: &CancelToken,
        audio_path: &Path,
    ) -> Result<Vec<MatchResult>, ServiceError> {
        tracing::info!("Matching {}", audio_path.display());
        cancel.check()?;
        let wav_path = convert::convert_to_mono_wav(
            audio_path,
            &self.config.temp_dir,
            self.config.sample_rate,
            cancel,
        )?;
        cancel.check()?;
        let (samples, sample_rate) = wav::read_wav(&wav_path)?;
        self.match_samples(cancel, &samples, sample_rate)
    }

    /// Identify pre-decoded samples against the catalog.
    pub fn match_samples(
        &self,
        cancel: &CancelToken,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<Vec<MatchResult>, ServiceError> {
        let query = fingerprint::query_samples(samples, sample_rate)?;
        tracing::info!("Query produced {} hashes", query.len());
        self.rank(cancel, &query)
    }

    /// Identify pre-computed hashes arriving from an external client.
    ///
    /// Each hash is re-validated structurally; invalid ones are skipped
    /// with a counter, and input where every hash is invalid is rejected.
    pub fn match_hashes(
        &self,
        cancel: &CancelToken,
        hashes: &HashMap<u32, u32>,
    ) -> Result<Vec<MatchResult>, ServiceError> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let mut valid: HashMap<u32, u32> = HashMap::with_capacity(hashes.len());
        for (&hash, &anchor_ms) in hashes {
            if hasher::is_valid_wire_hash(hash) {
                valid.insert(hash, anchor_ms);
            }
        }
        let skipped = hashes.len() - valid.len();
        if skipped > 0 {
            tracing::warn!("Skipped {skipped} invalid hashes out of {}", hashes.len());
        }
        if valid.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "all {} hashes were invalid",
                hashes.len()
            )));
        }
        self.rank(cancel, &valid)
    }

    /// Fetch couples for the query set, vote, and decorate candidates.
    fn rank(
        &self,
        cancel: &CancelToken,
        query: &HashMap<u32, u32>,
    ) -> Result<Vec<MatchResult>, ServiceError> {
        cancel.check()?;
        let keys: Vec<u32> = query.keys().copied().collect();
        let db_hashes = self.storage.lookup_by_hashes(&keys)?;
        tracing::info!("Index returned couples for {}/{} hashes", db_hashes.len(), keys.len());

        let candidates = matcher::vote(query, &db_hashes);
        let mut results = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            cancel.check()?;
            let song = match self.storage.get_song(&candidate.song_id) {
                Ok(song) => song,
                Err(StorageError::NotFound(id)) => {
                    tracing::warn!("Dropping candidate whose song {id} vanished mid-query");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let db_hash_count = match self.storage.count_fingerprints(&candidate.song_id) {
                Ok(count) => count,
                Err(err) => {
                    tracing::warn!(
                        "Using query hash count for {}: {err}",
                        candidate.song_id
                    );
                    query.len()
                }
            };
            results.push(MatchResult {
                song_id: song.id,
                title: song.title,
                artist: song.artist,
                youtube_id: song.youtube_id,
                score: candidate.count,
                offset_ms: candidate.offset_ms,
                confidence: confidence::confidence(candidate.count, query.len(), db_hash_count),
            });
        }
        tracing::info!("Returning {} matches", results.len());
        Ok(results)
    }

    pub fn get_song(&self, id: &str) -> Result<Song, ServiceError> {
        Ok(self.storage.get_song(id)?)
    }

    pub fn list_songs(&self) -> Result<Vec<Song>, ServiceError> {
        Ok(self.storage.list_songs()?)
    }

    /// Delete a song and its fingerprints, returning the removed record.
    pub fn delete_song(&self, cancel: &CancelToken, id: &str) -> Result<Song, ServiceError> {
        cancel.check()?;
        let song = self.storage.delete_song(id)?;
        tracing::info!("Deleted song {id} ('{}' by '{}')", song.title, song.artist);
        Ok(song)
    }

    pub fn close(&self) -> Result<(), ServiceError> {
        Ok(self.storage.close()?)
    }
}

fn require_metadata(title: &str, artist: &str) -> Result<(), ServiceError> {
    if title.trim().is_empty() || artist.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "title and artist are required".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::hasher::pack_address;

    fn service() -> Service<Database> {
        let config = Config::default();
        Service::with_storage(config, Database::open_in_memory().unwrap())
    }

    fn tone_sequence(sample_rate: u32, seconds: f32) -> Vec<f32> {
        let total = (sample_rate as f32 * seconds) as usize;
        let segment = sample_rate as usize / 4;
        let freqs = [392.0_f32, 523.25, 659.25, 783.99, 440.0, 587.33, 880.0];
        (0..total)
            .map(|i| {
                let freq = freqs[(i / segment) % freqs.len()];
                (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin() * 0.7
            })
            .collect()
    }

    #[test]
    fn ingested_audio_matches_itself_at_zero_offset() {
        let service = service();
        let cancel = CancelToken::new();
        let samples = tone_sequence(11_025, 8.0);
        let id = service
            .add_song_from_samples(&cancel, &samples, 11_025, "Self", "Test", "")
            .unwrap();

        let results = service.match_samples(&cancel, &samples, 11_025).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].song_id, id);
        assert_eq!(results[0].offset_ms, 0);
        assert!(results[0].score > 0);
        assert!(results[0].confidence >= 70.0, "confidence {}", results[0].confidence);
    }

    #[test]
    fn matching_an_empty_catalog_returns_no_results() {
        let service = service();
        let cancel = CancelToken::new();
        let samples = tone_sequence(11_025, 5.0);
        let results = service.match_samples(&cancel, &samples, 11_025).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn match_hashes_skips_invalid_entries_and_rejects_all_invalid() {
        let service = service();
        let cancel = CancelToken::new();

        let mut all_invalid = HashMap::new();
        all_invalid.insert(0u32, 0u32);
        all_invalid.insert(pack_address(7, 7, 500).unwrap(), 10);
        let err = service.match_hashes(&cancel, &all_invalid).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let mut mixed = all_invalid.clone();
        mixed.insert(pack_address(10, 20, 500).unwrap(), 10);
        let results = service.match_hashes(&cancel, &mixed).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn match_hashes_with_no_input_is_empty() {
        let service = service();
        let cancel = CancelToken::new();
        assert!(service.match_hashes(&cancel, &HashMap::new()).unwrap().is_empty());
    }

    #[test]
    fn missing_metadata_is_rejected_before_any_work() {
        let service = service();
        let cancel = CancelToken::new();
        let err = service
            .add_song_from_samples(&cancel, &[0.0; 4_096], 11_025, "", "artist", "")
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(service.list_songs().unwrap().is_empty());
    }

    #[test]
    fn cancelled_token_stops_ingest_before_registration() {
        let service = service();
        let cancel = CancelToken::new();
        cancel.cancel();
        let samples = tone_sequence(11_025, 5.0);
        let err = service
            .add_song_from_samples(&cancel, &samples, 11_025, "T", "A", "")
            .unwrap_err();
        assert!(matches!(err, ServiceError::Cancelled));
        assert!(service.list_songs().unwrap().is_empty());
    }

    #[test]
    fn deleting_through_the_service_maps_missing_ids_to_not_found() {
        let service = service();
        let cancel = CancelToken::new();
        let err = service.delete_song(&cancel, "missing").unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn short_degenerate_input_surfaces_a_pipeline_error() {
        let service = service();
        let cancel = CancelToken::new();
        let err = service
            .add_song_from_samples(&cancel, &[0.0; 10], 11_025, "T", "A", "")
            .unwrap_err();
        assert!(matches!(err, ServiceError::Pipeline(_)));
    }
}
