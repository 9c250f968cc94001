//! Per-session state: lifecycle, audio buffer, speaker tracking, transcript.
//!
//! A `Session` is owned by exactly one worker task; nothing here is shared,
//! so the state machine stays synchronous and unit-testable. The async shell
//! around it lives in [`worker`].

pub mod speaker;
pub mod worker;

pub use speaker::SpeakerTracker;
pub use worker::{SessionOutcome, SessionWorker, WorkItem, WorkerConfig};

use crate::audio::{Accumulator, AccumulatorConfig, Window};
use crate::stt::Segment;
use tracing::debug;
use uuid::Uuid;

/// Lifecycle states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, no audio yet.
    Connected,
    /// At least one audio frame received.
    Streaming,
    /// Stop or end-of-file seen, remainder being flushed.
    Finalizing,
    /// Final message emitted, state about to be discarded.
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Connected => "connected",
            SessionState::Streaming => "streaming",
            SessionState::Finalizing => "finalizing",
            SessionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finalized window's worth of transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    /// Speaker-labeled lines, joined with newlines.
    pub text: String,
    /// Target-language rendering, when translation succeeded.
    pub translation: Option<String>,
}

/// All state for one live connection.
pub struct Session {
    id: Uuid,
    state: SessionState,
    /// Language hint from the client, changeable mid-session.
    declared_language: Option<String>,
    accumulator: Accumulator,
    speaker: SpeakerTracker,
    /// Append-only log of finalized window transcripts.
    transcript: Vec<TranscriptEntry>,
    /// Most recent language the engine detected.
    detected_language: Option<String>,
}

impl Session {
    pub fn new(id: Uuid, accumulator: AccumulatorConfig, speaker_gap_ms: u64) -> Self {
        Self {
            id,
            state: SessionState::Connected,
            declared_language: None,
            accumulator: Accumulator::new(accumulator),
            speaker: SpeakerTracker::new(speaker_gap_ms),
            transcript: Vec::new(),
            detected_language: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_state(&mut self, next: SessionState) {
        if next != self.state {
            debug!(session = %self.id, from = %self.state, to = %next, "session state change");
            self.state = next;
        }
    }

    /// Current language hint for the engine, if the client declared one.
    pub fn declared_language(&self) -> Option<&str> {
        self.declared_language.as_deref()
    }

    pub fn set_declared_language(&mut self, language: &str) {
        self.declared_language = Some(language.to_string());
    }

    /// Append decoded samples; returns milliseconds dropped to the backlog cap.
    pub fn push_audio(&mut self, samples: &[i16]) -> u64 {
        self.accumulator.push(samples)
    }

    /// Append a one-shot file payload, exempt from the backlog cap so the
    /// whole file goes out as a single window.
    pub fn push_file_audio(&mut self, samples: &[i16]) {
        self.accumulator.push_unbounded(samples)
    }

    /// Total audio time received, in milliseconds.
    pub fn accumulated_ms(&self) -> u64 {
        self.accumulator.accumulated_ms()
    }

    /// Drain a full window if the threshold is reached.
    pub fn take_ready_window(&mut self) -> Option<Window> {
        self.accumulator.take_window()
    }

    /// Drain whatever audio remains, regardless of the threshold.
    pub fn flush_window(&mut self) -> Option<Window> {
        self.accumulator.flush()
    }

    /// Label a window's segments with speaker prefixes.
    pub fn label(&mut self, segments: &[Segment], window_offset_ms: u64) -> Vec<String> {
        self.speaker.label(segments, window_offset_ms)
    }

    pub fn current_speaker(&self) -> u32 {
        self.speaker.current_index()
    }

    /// Record a processed window in the transcript log.
    pub fn record_entry(&mut self, text: String, translation: Option<String>) {
        self.transcript.push(TranscriptEntry { text, translation });
    }

    /// Remember the engine-detected language; the latest report wins.
    pub fn note_detected_language(&mut self, language: Option<String>) {
        if language.is_some() {
            self.detected_language = language;
        }
    }

    /// Last detected source language, for the final message.
    pub fn detected_language(&self) -> Option<&str> {
        self.detected_language.as_deref()
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Complete speaker-labeled transcript, one line per labeled segment.
    pub fn final_text(&self) -> String {
        self.transcript
            .iter()
            .map(|entry| entry.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Joined translations of the windows that were translated, if any.
    pub fn final_translation(&self) -> Option<String> {
        let translated: Vec<&str> = self
            .transcript
            .iter()
            .filter_map(|entry| entry.translation.as_deref())
            .collect();
        if translated.is_empty() {
            None
        } else {
            Some(translated.join("\n"))
        }
    }
}
