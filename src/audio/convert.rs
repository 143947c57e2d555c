//! External transcoder boundary.
//!
//! Arbitrary input formats are normalized to canonical mono PCM-16 WAV by
//! spawning ffmpeg; the engine itself only ever reads the canonical form.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ServiceError;
use crate::service::cancel::CancelToken;

use super::process::{run_command, CommandError};

/// Transcode `input` to a mono PCM-16 WAV at `sample_rate` inside `temp_dir`.
///
/// The output is written to a temporary file first and renamed into place so
/// an interrupted conversion never leaves a half-written WAV behind.
pub fn convert_to_mono_wav(
    input: &Path,
    temp_dir: &Path,
    sample_rate: u32,
    cancel: &CancelToken,
) -> Result<PathBuf, ServiceError> {
    fs::create_dir_all(temp_dir)
        .map_err(|err| ServiceError::DecoderFailed(format!("creating {}: {err}", temp_dir.display())))?;

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ServiceError::InvalidInput(format!("unusable input path: {}", input.display())))?;
    let output = temp_dir.join(format!("{stem}.wav"));
    let staging = temp_dir.join(format!("{stem}.tmp.wav"));

    let mut command = Command::new("ffmpeg");
    command
        .arg("-y")
        .args(["-v", "quiet"])
        .arg("-i")
        .arg(input)
        .args(["-ac", "1"])
        .args(["-ar", &sample_rate.to_string()])
        .args(["-c:a", "pcm_s16le"])
        .arg(&staging);

    let result = run_command(&mut command, cancel);
    match result {
        Ok(output_data) if output_data.status.success() => {}
        Ok(output_data) => {
            let _ = fs::remove_file(&staging);
            let stderr = String::from_utf8_lossy(&output_data.stderr);
            return Err(ServiceError::DecoderFailed(format!(
                "ffmpeg exited with {}: {}",
                output_data.status,
                stderr.trim()
            )));
        }
        Err(CommandError::Cancelled) => {
            let _ = fs::remove_file(&staging);
            return Err(ServiceError::Cancelled);
        }
        Err(err) => {
            let _ = fs::remove_file(&staging);
            return Err(ServiceError::DecoderFailed(format!("ffmpeg {err}")));
        }
    }

    fs::rename(&staging, &output)
        .map_err(|err| ServiceError::DecoderFailed(format!("moving converted audio: {err}")))?;
    Ok(output)
}
