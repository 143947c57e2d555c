//! Fingerprinting pipeline: spectrogram, peak extraction, hashing, voting.

mod fft;
/// Anchor-target pairing and the 32-bit packed hash address.
pub mod hasher;
/// Offset-histogram voting and candidate ranking.
pub mod matcher;
/// Band-partitioned spectral peak extraction.
pub mod peaks;
/// Short-time Fourier transform with a Hamming window.
pub mod spectrogram;

use std::collections::HashMap;

use crate::error::ServiceError;
use hasher::Couple;
use peaks::Peak;
use spectrogram::StftParams;

/// Run the analysis stages on decoded samples, yielding sorted peaks.
pub fn analyze_samples(samples: &[f32], sample_rate: u32) -> Result<Vec<Peak>, ServiceError> {
    let params = StftParams::default();
    let frames = spectrogram::compute(samples, params)?;
    Ok(peaks::extract_peaks(&frames, sample_rate, params))
}

/// Full ingest pipeline from samples to storable fingerprints.
pub fn fingerprint_samples(
    samples: &[f32],
    sample_rate: u32,
    song_id: &str,
) -> Result<HashMap<u32, Vec<Couple>>, ServiceError> {
    let peaks = analyze_samples(samples, sample_rate)?;
    Ok(hasher::fingerprint_peaks(&peaks, song_id))
}

/// Full query pipeline from samples to the hash to anchor-time map.
pub fn query_samples(samples: &[f32], sample_rate: u32) -> Result<HashMap<u32, u32>, ServiceError> {
    let peaks = analyze_samples(samples, sample_rate)?;
    Ok(hasher::query_hashes(&peaks))
}
