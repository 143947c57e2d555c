//! Band-partitioned spectral peak extraction.
//!
//! Each frame is split into logarithmic frequency bands. The strongest bin
//! per band becomes a candidate, candidates must clear the frame's average
//! band-winner level by a fixed margin, and survivors must dominate their
//! two-dimensional neighborhood.

use super::spectrogram::StftParams;

const TIME_NEIGHBOURHOOD: i64 = 1;
const FREQ_NEIGHBOURHOOD: i64 = 3;
const MIN_DB_ABOVE_AVG: f32 = 3.0;
const EPS: f32 = 1e-10;

/// A spectral landmark chosen from the magnitude spectrogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Frame index within the spectrogram.
    pub time_idx: usize,
    /// FFT bin index within the frame.
    pub freq_idx: usize,
    /// Frame time in seconds.
    pub time: f32,
    /// Bin center frequency in Hz.
    pub freq: f32,
    /// Magnitude in decibels.
    pub mag_db: f32,
}

/// Extract peaks from linear magnitude frames.
///
/// Returns peaks sorted by `(time_idx, freq_idx)` ascending. A degenerate
/// spectrogram yields an empty list.
pub fn extract_peaks(spectrogram: &[Vec<f32>], sample_rate: u32, params: StftParams) -> Vec<Peak> {
    if spectrogram.is_empty() || spectrogram[0].is_empty() {
        return Vec::new();
    }

    let n_frames = spectrogram.len();
    let n_bins = spectrogram[0].len();
    let freq_resolution = sample_rate as f32 / params.window_size as f32;
    let frame_time = params.hop_size as f32 / sample_rate as f32;
    let bands = log_bands(n_bins);

    let mut peaks = Vec::with_capacity(n_frames * 2);
    let mut winners: Vec<(usize, f32)> = Vec::with_capacity(bands.len());

    for (t, frame) in spectrogram.iter().enumerate() {
        winners.clear();
        for &(start, end) in &bands {
            let mut max_mag = 0.0_f32;
            let mut max_idx = start;
            for (bin, &mag) in frame.iter().enumerate().take(end).skip(start) {
                if mag > max_mag {
                    max_mag = mag;
                    max_idx = bin;
                }
            }
            winners.push((max_idx, max_mag));
        }

        // Silent bands still weigh the average down, which keeps isolated
        // energy in quiet frames from being accepted too eagerly.
        let avg_db = winners
            .iter()
            .map(|&(_, mag)| 20.0 * (mag + EPS).log10())
            .sum::<f32>()
            / winners.len() as f32;

        for &(bin, mag) in &winners {
            if mag <= 0.0 {
                continue;
            }
            let mag_db = 20.0 * (mag + EPS).log10();
            if mag_db < avg_db + MIN_DB_ABOVE_AVG {
                continue;
            }
            if !is_local_maximum(spectrogram, t, bin, mag) {
                continue;
            }
            peaks.push(Peak {
                time_idx: t,
                freq_idx: bin,
                time: t as f32 * frame_time,
                freq: bin as f32 * freq_resolution,
                mag_db,
            });
        }
    }

    peaks.sort_by_key(|p| (p.time_idx, p.freq_idx));
    peaks
}

/// Logarithmic band boundaries: `[0, 10)`, then doubling from 10 up to `n_bins`.
fn log_bands(n_bins: usize) -> Vec<(usize, usize)> {
    let mut bands = vec![(0, 10.min(n_bins))];
    let mut start = 10usize;
    while start < n_bins {
        let end = (start * 2).min(n_bins);
        bands.push((start, end));
        if end == n_bins {
            break;
        }
        start *= 2;
    }
    bands
}

/// A strictly greater neighbor rejects the candidate; equal magnitudes pass.
fn is_local_maximum(spectrogram: &[Vec<f32>], t: usize, bin: usize, mag: f32) -> bool {
    let n_frames = spectrogram.len() as i64;
    let n_bins = spectrogram[0].len() as i64;
    for dt in -TIME_NEIGHBOURHOOD..=TIME_NEIGHBOURHOOD {
        let t_idx = t as i64 + dt;
        if t_idx < 0 || t_idx >= n_frames {
            continue;
        }
        for df in -FREQ_NEIGHBOURHOOD..=FREQ_NEIGHBOURHOOD {
            let f_idx = bin as i64 + df;
            if f_idx < 0 || f_idx >= n_bins {
                continue;
            }
            if dt == 0 && df == 0 {
                continue;
            }
            if spectrogram[t_idx as usize][f_idx as usize] > mag {
                return false;
            }
        }
    }
    true
}
