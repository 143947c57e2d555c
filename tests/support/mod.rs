//! Synthesized audio for the end-to-end scenarios.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Chromatic-ish note table used to build deterministic melodies.
const SCALE: [f32; 12] = [
    261.63, 293.66, 329.63, 349.23, 392.00, 440.00, 493.88, 523.25, 587.33, 659.25, 698.46, 783.99,
];

/// A deterministic melody of quarter-second notes with a soft octave partial.
///
/// The `seed` rotates the note order so distinct references do not share a
/// constellation.
pub fn melody(sample_rate: u32, seconds: f32, seed: usize) -> Vec<f32> {
    let total = (sample_rate as f32 * seconds) as usize;
    let segment = (sample_rate / 4).max(1) as usize;
    (0..total)
        .map(|i| {
            let note = SCALE[((i / segment) * 7 + seed) % SCALE.len()];
            let t = i as f32 / sample_rate as f32;
            let fundamental = (2.0 * std::f32::consts::PI * note * t).sin();
            let partial = (2.0 * std::f32::consts::PI * 2.0 * note * t).sin();
            0.6 * fundamental + 0.25 * partial
        })
        .collect()
}

/// Seeded uniform noise, unrelated to anything in the catalog.
pub fn white_noise(sample_rate: u32, seconds: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let total = (sample_rate as f32 * seconds) as usize;
    (0..total).map(|_| rng.gen_range(-0.8_f32..0.8)).collect()
}
