//! Audio accumulation and windowing for a transcription session.
//!
//! Incoming decoded samples are appended to a single pending buffer. When the
//! buffer reaches the window threshold (~3s default) the whole buffer is
//! drained as one window, so audio that piled up while an inference was in
//! flight is merged into the next submission instead of queueing extra
//! windows. `flush` drains whatever remains regardless of the threshold, for
//! stop and disconnect handling.

use crate::defaults;

/// Configuration for audio windowing.
#[derive(Debug, Clone)]
pub struct AccumulatorConfig {
    /// Window threshold in milliseconds (default: 3000ms).
    pub window_ms: u64,
    /// Maximum pending audio in milliseconds before the oldest is dropped.
    pub max_backlog_ms: u64,
    /// Sample rate for duration calculations.
    pub sample_rate: u32,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            window_ms: defaults::WINDOW_MS,
            max_backlog_ms: defaults::MAX_BACKLOG_MS,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

/// One drained window of session audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Mono PCM samples at the session rate.
    pub samples: Vec<i16>,
    /// Audio-time offset of the window start within the session.
    pub offset_ms: u64,
    /// Window length in milliseconds.
    pub duration_ms: u64,
}

/// Accumulates decoded samples and drains them as windows.
pub struct Accumulator {
    config: AccumulatorConfig,
    /// Samples not yet handed to the transcriber.
    buffer: Vec<i16>,
    /// Audio time already drained (or dropped), in milliseconds. Window
    /// offsets are taken from this so they stay on the session timeline.
    consumed_ms: u64,
}

impl Accumulator {
    pub fn new(config: AccumulatorConfig) -> Self {
        Self {
            config,
            buffer: Vec::new(),
            consumed_ms: 0,
        }
    }

    /// Append decoded samples to the pending buffer.
    ///
    /// Returns the number of milliseconds of oldest audio dropped to stay
    /// under the backlog cap (0 in the normal case).
    pub fn push(&mut self, samples: &[i16]) -> u64 {
        self.buffer.extend_from_slice(samples);

        let max_samples =
            (self.config.max_backlog_ms * self.config.sample_rate as u64 / 1000) as usize;
        if self.buffer.len() > max_samples {
            let excess = self.buffer.len() - max_samples;
            self.buffer.drain(..excess);
            let dropped_ms = samples_to_ms(excess, self.config.sample_rate);
            self.consumed_ms += dropped_ms;
            return dropped_ms;
        }
        0
    }

    /// Append decoded samples without applying the backlog cap.
    ///
    /// For one-shot payloads that are flushed as a single window right away;
    /// the cap exists to bound audio piling up behind a slow inference, which
    /// cannot happen when nothing else is queued.
    pub fn push_unbounded(&mut self, samples: &[i16]) {
        self.buffer.extend_from_slice(samples);
    }

    /// Pending audio length in milliseconds.
    pub fn pending_ms(&self) -> u64 {
        samples_to_ms(self.buffer.len(), self.config.sample_rate)
    }

    /// Total audio time seen by the session, drained plus pending.
    pub fn accumulated_ms(&self) -> u64 {
        self.consumed_ms + self.pending_ms()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether enough audio is pending to form a window.
    pub fn is_ready(&self) -> bool {
        self.pending_ms() >= self.config.window_ms
    }

    /// Drain the whole pending buffer as one window once the threshold is
    /// reached. Returns `None` below the threshold.
    pub fn take_window(&mut self) -> Option<Window> {
        if !self.is_ready() {
            return None;
        }
        self.drain()
    }

    /// Drain whatever is pending regardless of the threshold.
    /// Returns `None` when nothing is buffered.
    pub fn flush(&mut self) -> Option<Window> {
        self.drain()
    }

    fn drain(&mut self) -> Option<Window> {
        if self.buffer.is_empty() {
            return None;
        }

        let samples = std::mem::take(&mut self.buffer);
        let duration_ms = samples_to_ms(samples.len(), self.config.sample_rate);
        let offset_ms = self.consumed_ms;
        self.consumed_ms += duration_ms;

        Some(Window {
            samples,
            offset_ms,
            duration_ms,
        })
    }
}

fn samples_to_ms(count: usize, sample_rate: u32) -> u64 {
    (count as u64 * 1000) / sample_rate as u64
}
