//! Ingest and query scenarios running the whole pipeline against SQLite.

mod support;

use std::collections::HashMap;

use tempfile::TempDir;

use acousticdna::config::Config;
use acousticdna::error::ServiceError;
use acousticdna::fingerprint::{self, hasher::Couple};
use acousticdna::service::{CancelToken, Service};
use acousticdna::storage::{Database, Song, Storage, StorageError};

const SAMPLE_RATE: u32 = 11_025;
/// One spectrogram hop in samples; shifts aligned to it keep peak grids equal.
const HOP: usize = 256;

fn open_service(dir: &TempDir) -> Service<Database> {
    let config = Config::default()
        .with_db_path(dir.path().join("catalog.sqlite3"))
        .with_temp_dir(dir.path().join("tmp"));
    Service::open(config).unwrap()
}

#[test]
fn exact_query_identifies_its_reference_with_high_confidence() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);
    let cancel = CancelToken::new();

    let samples = support::melody(SAMPLE_RATE, 60.0, 3);
    let id = service
        .add_song_from_samples(&cancel, &samples, SAMPLE_RATE, "Reference One", "Integration", "")
        .unwrap();

    let results = service.match_samples(&cancel, &samples, SAMPLE_RATE).unwrap();
    assert!(!results.is_empty());
    let top = &results[0];
    assert_eq!(top.song_id, id);
    assert_eq!(top.offset_ms, 0);
    assert!(top.score > 0);
    assert!(top.confidence >= 90.0, "confidence was {}", top.confidence);
}

#[test]
fn shifted_query_reports_the_truncation_offset() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);
    let cancel = CancelToken::new();

    let samples = support::melody(SAMPLE_RATE, 60.0, 5);
    let id = service
        .add_song_from_samples(&cancel, &samples, SAMPLE_RATE, "Reference Two", "Integration", "")
        .unwrap();

    // Drop just under five seconds from the start, then query ten seconds.
    let start = 215 * HOP;
    let end = start + SAMPLE_RATE as usize * 10;
    let query = &samples[start..end];
    let results = service.match_samples(&cancel, query, SAMPLE_RATE).unwrap();
    assert!(!results.is_empty());
    let top = &results[0];
    assert_eq!(top.song_id, id);
    assert!(
        (4_977..=5_023).contains(&top.offset_ms),
        "offset was {} ms",
        top.offset_ms
    );
    assert!(top.confidence >= 60.0, "confidence was {}", top.confidence);
}

#[test]
fn unrelated_noise_never_matches_confidently() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);
    let cancel = CancelToken::new();

    let samples = support::melody(SAMPLE_RATE, 30.0, 1);
    service
        .add_song_from_samples(&cancel, &samples, SAMPLE_RATE, "Reference Three", "Integration", "")
        .unwrap();

    let noise = support::white_noise(SAMPLE_RATE, 30.0, 0xACDC);
    let query_hashes = fingerprint::query_samples(&noise, SAMPLE_RATE).unwrap();
    let results = service.match_samples(&cancel, &noise, SAMPLE_RATE).unwrap();

    if let Some(top) = results.first() {
        let ceiling = 0.02 * query_hashes.len() as f64;
        assert!(
            (top.score as f64) <= ceiling,
            "top score {} exceeds {:.1} of {} query hashes",
            top.score,
            ceiling,
            query_hashes.len()
        );
        assert!(top.confidence < 20.0, "confidence was {}", top.confidence);
    }
}

#[test]
fn reingesting_the_same_title_and_artist_reuses_the_record() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);
    let cancel = CancelToken::new();

    let samples = support::melody(SAMPLE_RATE, 15.0, 9);
    let first = service
        .add_song_from_samples(&cancel, &samples, SAMPLE_RATE, "x", "y", "")
        .unwrap();
    let second = service
        .add_song_from_samples(&cancel, &samples, SAMPLE_RATE, "x", "y", "v")
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(service.get_song(&first).unwrap().youtube_id, "v");
}

#[test]
fn deleted_songs_disappear_from_lookups_and_queries() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);
    let cancel = CancelToken::new();

    let samples = support::melody(SAMPLE_RATE, 20.0, 4);
    let id = service
        .add_song_from_samples(&cancel, &samples, SAMPLE_RATE, "Ephemeral", "Integration", "")
        .unwrap();
    assert!(!service.match_samples(&cancel, &samples, SAMPLE_RATE).unwrap().is_empty());

    let deleted = service.delete_song(&cancel, &id).unwrap();
    assert_eq!(deleted.id, id);
    assert!(matches!(
        service.get_song(&id).unwrap_err(),
        ServiceError::NotFound(_)
    ));
    assert!(service.match_samples(&cancel, &samples, SAMPLE_RATE).unwrap().is_empty());
}

/// Storage double whose fingerprint writes always fail.
struct FailingStorage {
    inner: Database,
}

impl Storage for FailingStorage {
    fn register_song(
        &self,
        title: &str,
        artist: &str,
        youtube_id: &str,
        duration_ms: i64,
    ) -> Result<String, StorageError> {
        self.inner.register_song(title, artist, youtube_id, duration_ms)
    }

    fn store_fingerprints(
        &self,
        _fingerprints: &HashMap<u32, Vec<Couple>>,
    ) -> Result<(), StorageError> {
        Err(StorageError::Unexpected)
    }

    fn lookup_by_hash(&self, hash: u32) -> Result<Vec<Couple>, StorageError> {
        self.inner.lookup_by_hash(hash)
    }

    fn lookup_by_hashes(&self, hashes: &[u32]) -> Result<HashMap<u32, Vec<Couple>>, StorageError> {
        self.inner.lookup_by_hashes(hashes)
    }

    fn delete_song(&self, id: &str) -> Result<Song, StorageError> {
        self.inner.delete_song(id)
    }

    fn count_fingerprints(&self, id: &str) -> Result<usize, StorageError> {
        self.inner.count_fingerprints(id)
    }

    fn get_song(&self, id: &str) -> Result<Song, StorageError> {
        self.inner.get_song(id)
    }

    fn list_songs(&self) -> Result<Vec<Song>, StorageError> {
        self.inner.list_songs()
    }

    fn close(&self) -> Result<(), StorageError> {
        self.inner.close()
    }
}

#[test]
fn failed_fingerprint_store_rolls_back_the_registration() {
    let storage = FailingStorage {
        inner: Database::open_in_memory().unwrap(),
    };
    let service = Service::with_storage(Config::default(), storage);
    let cancel = CancelToken::new();

    let samples = support::melody(SAMPLE_RATE, 10.0, 2);
    let err = service
        .add_song_from_samples(&cancel, &samples, SAMPLE_RATE, "Doomed", "Integration", "")
        .unwrap_err();
    assert!(matches!(err, ServiceError::Index(_)));
    assert!(service.list_songs().unwrap().is_empty());
}
