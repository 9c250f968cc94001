//! Default configuration constants for scribed.
//!
//! Shared between the config types, the session pipeline, and the CLI so the
//! documented defaults stay in one place.

/// Audio sample rate in Hz used for inference.
///
/// 16kHz is the standard for speech recognition and is what Whisper models
/// are trained on. All decoded audio is resampled to this rate.
pub const SAMPLE_RATE: u32 = 16000;

/// Window threshold in milliseconds for streaming transcription.
///
/// Buffered audio is submitted for inference once it reaches this duration.
/// This is also the effective end-to-end latency floor for partial results.
pub const WINDOW_MS: u64 = 3000;

/// Silence gap in milliseconds that triggers a speaker change.
///
/// When the pause between two voiced segments exceeds this value, the next
/// segment is attributed to a new speaker label.
pub const SPEAKER_GAP_MS: u64 = 2000;

/// Inference timeout in seconds for streaming windows.
pub const STREAM_TIMEOUT_SECS: u64 = 15;

/// Inference timeout in seconds for one-shot file transcription.
///
/// Files can be arbitrarily long, so this budget is much larger than the
/// streaming one.
pub const FILE_TIMEOUT_SECS: u64 = 60;

/// Maximum buffered-but-unprocessed audio per session, in milliseconds.
///
/// If inference falls this far behind the incoming stream, the oldest
/// buffered audio is dropped instead of growing without bound.
pub const MAX_BACKLOG_MS: u64 = 120_000;

/// Default Whisper model path.
pub const DEFAULT_MODEL_PATH: &str = "models/ggml-base.bin";

/// Default language code for transcription.
///
/// "auto" lets Whisper detect the spoken language. Clients can override it
/// per session with a `set_language` message or a `language` field.
pub const DEFAULT_LANGUAGE: &str = "auto";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Display language transcripts are translated into when the detected
/// language differs.
pub const TARGET_LANGUAGE: &str = "en";

/// Default listen address for the WebSocket server.
pub const LISTEN_ADDR: &str = "127.0.0.1:8017";

/// Target peak amplitude for normalization, as a fraction of i16 full scale.
pub const NORMALIZE_PEAK: f32 = 0.9;

/// Peak below which a decoded payload is left unnormalized.
///
/// About 1% of full scale. Scaling quieter payloads up would only amplify
/// noise, so they pass through untouched.
pub const NORMALIZE_FLOOR: i16 = 327;

/// Timeout in seconds for a single translation request.
pub const TRANSLATE_TIMEOUT_SECS: u64 = 10;

/// Capacity of the per-session outbound message channel.
///
/// A peer that stops reading backpressures its own session once this many
/// messages are queued; other sessions are unaffected.
pub const OUTBOUND_CHANNEL: usize = 64;

/// Capacity of the per-session work queue feeding the pipeline worker.
pub const WORK_CHANNEL: usize = 64;

/// Report the GPU backend compiled into this build.
///
/// Returns a human-readable name based on the compile-time feature flags.
/// Only one GPU backend can be active at a time; if none is enabled, returns "CPU".
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else if cfg!(feature = "hipblas") {
        "HipBLAS (AMD)"
    } else if cfg!(feature = "openblas") {
        "OpenBLAS"
    } else {
        "CPU"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_backend_matches_compiled_feature() {
        let expected = if cfg!(feature = "cuda") {
            "CUDA"
        } else if cfg!(feature = "vulkan") {
            "Vulkan"
        } else if cfg!(feature = "hipblas") {
            "HipBLAS (AMD)"
        } else if cfg!(feature = "openblas") {
            "OpenBLAS"
        } else {
            "CPU"
        };
        assert_eq!(gpu_backend(), expected);
    }
}
