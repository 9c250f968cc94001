//! Speech-to-text: engine trait, result types, and the Whisper backend.

pub mod engine;
pub mod whisper;

pub use engine::{MockEngine, Segment, SpeechEngine, Transcription, strip_markers};
pub use whisper::{WhisperConfig, WhisperEngine};
