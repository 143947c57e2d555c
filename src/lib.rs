//! Audio fingerprinting and matching engine backed by a SQLite inverted index.
/// Audio acquisition: WAV reading plus the external decode and fetch boundaries.
pub mod audio;
/// Service configuration with defaults and environment fallbacks.
pub mod config;
/// Service-level error taxonomy.
pub mod error;
/// Fingerprinting pipeline: spectrogram, peak extraction, hashing, voting.
pub mod fingerprint;
/// Logging setup for the binaries.
pub mod logging;
/// HTTP API surface.
pub mod server;
/// Ingest and query orchestration.
pub mod service;
/// Persistent fingerprint index.
pub mod storage;
