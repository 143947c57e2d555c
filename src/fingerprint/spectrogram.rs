//! Short-time Fourier transform producing linear magnitude frames.

use thiserror::Error;

use super::fft::{fft_radix2_inplace, hamming_window, Complex32};

/// Default analysis window length in samples.
pub const WINDOW_SIZE: usize = 1024;
/// Default hop between consecutive frames in samples.
pub const HOP_SIZE: usize = 256;

/// Framing parameters for the short-time transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StftParams {
    pub window_size: usize,
    pub hop_size: usize,
}

impl Default for StftParams {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE,
            hop_size: HOP_SIZE,
        }
    }
}

/// Errors from spectrogram computation.
#[derive(Debug, Error)]
pub enum SpectrogramError {
    #[error("Window of {actual} coefficients does not match the {expected} sample frame")]
    WindowLengthMismatch { expected: usize, actual: usize },
    #[error("Input of {samples} samples is shorter than the {window} sample analysis window")]
    InputTooShort { samples: usize, window: usize },
    #[error("Analysis window length must be a power of two, got {0}")]
    WindowNotPowerOfTwo(usize),
}

/// Compute linear magnitude frames with a Hamming window.
///
/// Produces `(samples.len() - window) / hop + 1` frames of `window / 2` bins.
/// Input shorter than one window is an error; no padding is applied.
pub fn compute(samples: &[f32], params: StftParams) -> Result<Vec<Vec<f32>>, SpectrogramError> {
    let window = hamming_window(params.window_size);
    stft(samples, &window, params)
}

/// Short-time transform with an explicit window.
pub fn stft(
    samples: &[f32],
    window: &[f32],
    params: StftParams,
) -> Result<Vec<Vec<f32>>, SpectrogramError> {
    let window_size = params.window_size;
    if window.len() != window_size {
        return Err(SpectrogramError::WindowLengthMismatch {
            expected: window_size,
            actual: window.len(),
        });
    }
    if window_size == 0 || !window_size.is_power_of_two() {
        return Err(SpectrogramError::WindowNotPowerOfTwo(window_size));
    }
    if samples.len() < window_size {
        return Err(SpectrogramError::InputTooShort {
            samples: samples.len(),
            window: window_size,
        });
    }

    let hop = params.hop_size.max(1);
    let bins = window_size / 2;
    let mut frame = vec![Complex32::default(); window_size];
    let mut frames = Vec::with_capacity((samples.len() - window_size) / hop + 1);
    let mut start = 0usize;
    while start + window_size <= samples.len() {
        for (i, cell) in frame.iter_mut().enumerate() {
            *cell = Complex32::new(samples[start + i] * window[i], 0.0);
        }
        fft_radix2_inplace(&mut frame)
            .map_err(|_| SpectrogramError::WindowNotPowerOfTwo(window_size))?;
        frames.push(frame[..bins].iter().map(|c| c.magnitude()).collect());
        start += hop;
    }
    Ok(frames)
}
