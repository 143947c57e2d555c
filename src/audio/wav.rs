//! Reader for canonical RIFF/WAVE containers holding 16-bit PCM.
//!
//! Walks the chunk list rather than assuming a fixed 44-byte header: unknown
//! chunks are skipped (with the odd-size pad byte honored), and only the
//! `fmt ` and `data` chunks are required. Stereo input is folded to mono by
//! averaging after normalization.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;

/// Full-scale divisor for 16-bit PCM, mapping samples into [-1, 1).
const PCM16_SCALE: f32 = 1.0 / 32_768.0;

/// Errors from WAV decoding.
#[derive(Debug, Error)]
pub enum WavError {
    #[error("Not a RIFF/WAVE file")]
    NotAWaveFile,
    #[error("Required fmt chunk not found")]
    MissingFmtChunk,
    #[error("Required data chunk not found")]
    MissingDataChunk,
    #[error("Unsupported encoding: format code {format}, {bits} bits per sample")]
    UnsupportedEncoding { format: u16, bits: u16 },
    #[error("Unsupported channel count: {0}")]
    UnsupportedChannelCount(u16),
    #[error("File ended before a declared chunk was complete")]
    Truncated,
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy)]
struct WavFormat {
    audio_format: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

/// Read a 16-bit PCM WAV file as mono samples normalized to [-1, 1).
///
/// Returns the samples and the container's sample rate.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), WavError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    read_riff_header(&mut reader)?;
    let (format, data) = scan_chunks(&mut reader)?;

    if format.audio_format != 1 || format.bits_per_sample != 16 {
        return Err(WavError::UnsupportedEncoding {
            format: format.audio_format,
            bits: format.bits_per_sample,
        });
    }
    if format.channels == 0 || format.channels > 2 {
        return Err(WavError::UnsupportedChannelCount(format.channels));
    }

    let samples = decode_pcm16(&data, format.channels);
    Ok((samples, format.sample_rate))
}

fn read_riff_header(reader: &mut impl Read) -> Result<(), WavError> {
    let mut header = [0u8; 12];
    read_exact_or_truncated(reader, &mut header)?;
    if &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
        return Err(WavError::NotAWaveFile);
    }
    Ok(())
}

fn scan_chunks<R: Read + Seek>(reader: &mut R) -> Result<(WavFormat, Vec<u8>), WavError> {
    let mut format: Option<WavFormat> = None;
    let mut data: Option<Vec<u8>> = None;

    while format.is_none() || data.is_none() {
        let Some(chunk_id) = read_chunk_id(reader)? else {
            break;
        };
        let chunk_size = read_u32(reader)?;

        match &chunk_id {
            b"fmt " => format = Some(read_fmt_chunk(reader, chunk_size)?),
            b"data" => {
                let mut buf = vec![0u8; chunk_size as usize];
                read_exact_or_truncated(reader, &mut buf)?;
                data = Some(buf);
            }
            _ => {
                reader.seek(SeekFrom::Current(chunk_size as i64))?;
            }
        }

        // Chunks with an odd declared size are followed by one pad byte.
        if chunk_size % 2 == 1 {
            reader.seek(SeekFrom::Current(1))?;
        }
    }

    let format = format.ok_or(WavError::MissingFmtChunk)?;
    let data = data.ok_or(WavError::MissingDataChunk)?;
    Ok((format, data))
}

fn read_fmt_chunk(reader: &mut (impl Read + Seek), chunk_size: u32) -> Result<WavFormat, WavError> {
    if chunk_size < 16 {
        return Err(WavError::Truncated);
    }
    let mut body = [0u8; 16];
    read_exact_or_truncated(reader, &mut body)?;
    let extra = chunk_size - 16;
    if extra > 0 {
        reader.seek(SeekFrom::Current(extra as i64))?;
    }
    Ok(WavFormat {
        audio_format: u16::from_le_bytes([body[0], body[1]]),
        channels: u16::from_le_bytes([body[2], body[3]]),
        sample_rate: u32::from_le_bytes([body[4], body[5], body[6], body[7]]),
        bits_per_sample: u16::from_le_bytes([body[14], body[15]]),
    })
}

/// Read a chunk id, or `None` on a clean end of file.
fn read_chunk_id(reader: &mut impl Read) -> Result<Option<[u8; 4]>, WavError> {
    let mut id = [0u8; 4];
    let mut filled = 0usize;
    while filled < 4 {
        let n = reader.read(&mut id[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(WavError::Truncated);
        }
        filled += n;
    }
    Ok(Some(id))
}

fn read_u32(reader: &mut impl Read) -> Result<u32, WavError> {
    let mut buf = [0u8; 4];
    read_exact_or_truncated(reader, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_exact_or_truncated(reader: &mut impl Read, buf: &mut [u8]) -> Result<(), WavError> {
    reader.read_exact(buf).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            WavError::Truncated
        } else {
            WavError::Io(err)
        }
    })
}

fn decode_pcm16(data: &[u8], channels: u16) -> Vec<f32> {
    let values: Vec<f32> = data
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 * PCM16_SCALE)
        .collect();
    if channels == 1 {
        return values;
    }
    values
        .chunks_exact(2)
        .map(|frame| (frame[0] + frame[1]) * 0.5)
        .collect()
}
