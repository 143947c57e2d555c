//! Audio acquisition: WAV reading plus the external decode and fetch boundaries.

/// External ffmpeg transcoder boundary.
pub mod convert;
mod process;
/// Canonical PCM-16 WAV reader.
pub mod wav;
/// yt-dlp media fetcher boundary.
pub mod youtube;
