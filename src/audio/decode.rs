//! Decoding of client audio payloads into 16 kHz mono PCM.
//!
//! Chunks arrive as base64 text. The payload is either a complete WAV file
//! (any rate/channel layout, sniffed by its RIFF header) or raw 16-bit
//! little-endian PCM at the session sample rate. Files arrive as data URLs
//! wrapping the same payload kinds.

use crate::defaults::{NORMALIZE_FLOOR, NORMALIZE_PEAK};
use crate::error::{Result, ScribedError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::io::Cursor;

/// Decode a streaming `audio_chunk` payload into normalized samples.
pub fn decode_chunk(data: &str, target_rate: u32) -> Result<Vec<i16>> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| ScribedError::AudioFormat {
            message: format!("invalid base64 payload: {}", e),
        })?;
    decode_bytes(&bytes, target_rate)
}

/// Decode an `audio_file` payload: a `data:<mime>;base64,<payload>` URL, or
/// bare base64 when the client skips the URL wrapper.
pub fn decode_data_url(url: &str, target_rate: u32) -> Result<Vec<i16>> {
    let Some(rest) = url.strip_prefix("data:") else {
        return decode_chunk(url, target_rate);
    };
    let (_mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| ScribedError::AudioFormat {
            message: "data URL is missing the base64 marker".to_string(),
        })?;
    decode_chunk(payload, target_rate)
}

/// Sniff the payload container and decode to mono samples at `target_rate`.
///
/// Also the entry point for raw binary frames, which skip the base64 step.
pub fn decode_bytes(bytes: &[u8], target_rate: u32) -> Result<Vec<i16>> {
    let mut samples = if is_riff_wave(bytes) {
        decode_wav(bytes, target_rate)?
    } else {
        decode_pcm16(bytes)?
    };
    normalize(&mut samples);
    Ok(samples)
}

fn is_riff_wave(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Parse a WAV container, downmixing to mono and resampling to `target_rate`.
fn decode_wav(bytes: &[u8], target_rate: u32) -> Result<Vec<i16>> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| ScribedError::AudioFormat {
            message: format!("malformed WAV payload: {}", e),
        })?;

    let spec = reader.spec();
    let source_rate = spec.sample_rate;
    let source_channels = spec.channels;

    let raw_samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ScribedError::AudioFormat {
            message: format!("failed to read WAV samples: {}", e),
        })?;

    // Downmix stereo by averaging channel pairs
    let mono_samples = if source_channels == 2 {
        raw_samples
            .chunks_exact(2)
            .map(|chunk| {
                let left = chunk[0] as i32;
                let right = chunk[1] as i32;
                ((left + right) / 2) as i16
            })
            .collect()
    } else if source_channels == 1 {
        raw_samples
    } else {
        return Err(ScribedError::AudioFormat {
            message: format!("unsupported channel count: {}", source_channels),
        });
    };

    if source_rate != target_rate {
        Ok(resample(&mono_samples, source_rate, target_rate))
    } else {
        Ok(mono_samples)
    }
}

/// Interpret the payload as raw 16-bit little-endian PCM at the session rate.
fn decode_pcm16(bytes: &[u8]) -> Result<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(ScribedError::AudioFormat {
            message: format!("raw PCM payload has odd length ({} bytes)", bytes.len()),
        });
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Scale quiet audio up so its peak sits near full scale.
///
/// Buffers whose peak is below the silence floor are left untouched, as is
/// anything already at or above the target peak. Gain is always >= 1, so the
/// scaled samples cannot clip.
fn normalize(samples: &mut [i16]) {
    let peak = samples.iter().map(|s| (*s as i32).abs()).max().unwrap_or(0);
    if peak <= NORMALIZE_FLOOR as i32 {
        return;
    }
    let target = (NORMALIZE_PEAK * i16::MAX as f32) as i32;
    if peak >= target {
        return;
    }
    let gain = target as f32 / peak as f32;
    for s in samples.iter_mut() {
        *s = (*s as f32 * gain) as i16;
    }
}

/// Simple linear interpolation resampling.
pub(crate) fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}
