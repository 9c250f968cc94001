use crate::error::{Result, ScribedError};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One timed segment within a transcribed window.
///
/// Timestamps are milliseconds relative to the start of the window; callers
/// add the window's session offset to place segments on the session timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Result of transcribing one window of audio.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transcription {
    pub segments: Vec<Segment>,
    /// Source language detected by the model (ISO 639-1), when reported.
    pub language: Option<String>,
}

impl Transcription {
    /// Concatenated segment text, unlabeled.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Trait for the speech-to-text capability.
///
/// This trait allows swapping implementations (real Whisper vs mock). Calls
/// block the current thread; async callers run them on a blocking pool.
pub trait SpeechEngine: Send + Sync {
    /// Transcribe one window of mono PCM audio.
    ///
    /// # Arguments
    /// * `audio` - 16-bit PCM samples, mono
    /// * `sample_rate` - sample rate of `audio` in Hz
    /// * `language_hint` - ISO 639-1 code, or `None` for auto-detection
    fn transcribe(
        &self,
        audio: &[i16],
        sample_rate: u32,
        language_hint: Option<&str>,
    ) -> Result<Transcription>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;

    /// Check if the engine is ready
    fn is_ready(&self) -> bool;
}

/// Implement SpeechEngine for Arc<T> to allow sharing across sessions.
impl<T: SpeechEngine + ?Sized> SpeechEngine for std::sync::Arc<T> {
    fn transcribe(
        &self,
        audio: &[i16],
        sample_rate: u32,
        language_hint: Option<&str>,
    ) -> Result<Transcription> {
        (**self).transcribe(audio, sample_rate, language_hint)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Removes non-speech markers the model emits for silence and noise.
pub fn strip_markers(text: &str) -> String {
    let markers = [
        "[BLANK_AUDIO]",
        "[INAUDIBLE]",
        "[MUSIC]",
        "[APPLAUSE]",
        "[LAUGHTER]",
        "(BLANK_AUDIO)",
        "(inaudible)",
    ];

    let mut cleaned = text.to_string();
    for marker in markers {
        cleaned = cleaned.replace(marker, "");
    }
    cleaned.trim().to_string()
}

enum MockReply {
    Text(String),
    Exact(Transcription),
    Fail(String),
}

/// Mock engine for testing.
///
/// Replies are scripted in FIFO order; once the script is exhausted the
/// engine falls back to a fixed default text. Counters expose how the engine
/// was driven so tests can assert on call patterns.
#[derive(Debug)]
pub struct MockEngine {
    model_name: String,
    default_text: String,
    default_language: Option<String>,
    delay: Option<Duration>,
    replies: Mutex<VecDeque<MockReply>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    hints_seen: Mutex<Vec<Option<String>>>,
    audio_seen: Mutex<Vec<usize>>,
}

impl std::fmt::Debug for MockReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MockReply::Text(t) => write!(f, "Text({:?})", t),
            MockReply::Exact(t) => write!(f, "Exact({:?})", t),
            MockReply::Fail(m) => write!(f, "Fail({:?})", m),
        }
    }
}

impl MockEngine {
    /// Create a new mock engine with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            default_text: "mock transcription".to_string(),
            default_language: Some("en".to_string()),
            delay: None,
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            hints_seen: Mutex::new(Vec::new()),
            audio_seen: Mutex::new(Vec::new()),
        }
    }

    /// Queue a plain-text reply for the next call
    pub fn with_response(self, text: &str) -> Self {
        self.push(MockReply::Text(text.to_string()));
        self
    }

    /// Queue an exact transcription (segments and language) for the next call
    pub fn with_transcription(self, transcription: Transcription) -> Self {
        self.push(MockReply::Exact(transcription));
        self
    }

    /// Queue a failure for the next call
    pub fn with_failure(self, message: &str) -> Self {
        self.push(MockReply::Fail(message.to_string()));
        self
    }

    /// Set the detected language reported for text replies
    pub fn with_language(mut self, code: &str) -> Self {
        self.default_language = Some(code.to_string());
        self
    }

    /// Make every call sleep, to simulate inference latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(&self, reply: MockReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Total number of transcribe calls made
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously outstanding calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Language hints received, in call order
    pub fn hints_seen(&self) -> Vec<Option<String>> {
        self.hints_seen
            .lock()
            .map(|hints| hints.clone())
            .unwrap_or_default()
    }

    /// Sample counts of the audio buffers received, in call order
    pub fn audio_seen(&self) -> Vec<usize> {
        self.audio_seen
            .lock()
            .map(|lens| lens.clone())
            .unwrap_or_default()
    }

    fn text_reply(&self, text: String, audio_len: usize, sample_rate: u32) -> Transcription {
        let end_ms = if sample_rate == 0 {
            0
        } else {
            audio_len as u64 * 1000 / sample_rate as u64
        };
        Transcription {
            segments: vec![Segment {
                text,
                start_ms: 0,
                end_ms,
            }],
            language: self.default_language.clone(),
        }
    }
}

impl SpeechEngine for MockEngine {
    fn transcribe(
        &self,
        audio: &[i16],
        sample_rate: u32,
        language_hint: Option<&str>,
    ) -> Result<Transcription> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Ok(mut hints) = self.hints_seen.lock() {
            hints.push(language_hint.map(|s| s.to_string()));
        }
        if let Ok(mut lens) = self.audio_seen.lock() {
            lens.push(audio.len());
        }

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front());

        let result = match reply {
            Some(MockReply::Text(text)) => Ok(self.text_reply(text, audio.len(), sample_rate)),
            Some(MockReply::Exact(transcription)) => Ok(transcription),
            Some(MockReply::Fail(message)) => Err(ScribedError::Inference { message }),
            None => Ok(self.text_reply(self.default_text.clone(), audio.len(), sample_rate)),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_mock_engine_returns_scripted_response() {
        let engine = MockEngine::new("test-model").with_response("Hello, this is a test");

        let audio = vec![0i16; 16000];
        let result = engine.transcribe(&audio, 16000, None).unwrap();

        assert_eq!(result.text(), "Hello, this is a test");
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.segments[0].end_ms, 1000);
        assert_eq!(result.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_mock_engine_replies_in_fifo_order() {
        let engine = MockEngine::new("test-model")
            .with_response("first")
            .with_response("second");

        let audio = vec![0i16; 100];
        assert_eq!(engine.transcribe(&audio, 16000, None).unwrap().text(), "first");
        assert_eq!(engine.transcribe(&audio, 16000, None).unwrap().text(), "second");
        // Script exhausted, falls back to the default
        assert_eq!(
            engine.transcribe(&audio, 16000, None).unwrap().text(),
            "mock transcription"
        );
        assert_eq!(engine.calls(), 3);
    }

    #[test]
    fn test_mock_engine_scripted_failure() {
        let engine = MockEngine::new("test-model").with_failure("mock inference failure");

        let audio = vec![0i16; 1000];
        let result = engine.transcribe(&audio, 16000, None);

        match result {
            Err(ScribedError::Inference { message }) => {
                assert_eq!(message, "mock inference failure");
            }
            other => panic!("expected Inference error, got {:?}", other),
        }
    }

    #[test]
    fn test_mock_engine_failure_does_not_consume_later_replies() {
        let engine = MockEngine::new("test-model")
            .with_failure("boom")
            .with_response("after the failure");

        let audio = vec![0i16; 100];
        assert!(engine.transcribe(&audio, 16000, None).is_err());
        assert_eq!(
            engine.transcribe(&audio, 16000, None).unwrap().text(),
            "after the failure"
        );
    }

    #[test]
    fn test_mock_engine_exact_transcription() {
        let scripted = Transcription {
            segments: vec![
                Segment {
                    text: "uno".to_string(),
                    start_ms: 0,
                    end_ms: 900,
                },
                Segment {
                    text: "dos".to_string(),
                    start_ms: 3400,
                    end_ms: 4000,
                },
            ],
            language: Some("es".to_string()),
        };
        let engine = MockEngine::new("test-model").with_transcription(scripted.clone());

        let result = engine.transcribe(&[0i16; 10], 16000, None).unwrap();
        assert_eq!(result, scripted);
    }

    #[test]
    fn test_mock_engine_records_language_hints() {
        let engine = MockEngine::new("test-model");

        let audio = vec![0i16; 10];
        engine.transcribe(&audio, 16000, Some("de")).unwrap();
        engine.transcribe(&audio, 16000, None).unwrap();

        assert_eq!(
            engine.hints_seen(),
            vec![Some("de".to_string()), None]
        );
    }

    #[test]
    fn test_mock_engine_with_language() {
        let engine = MockEngine::new("test-model").with_language("es");
        let result = engine.transcribe(&[0i16; 10], 16000, None).unwrap();
        assert_eq!(result.language.as_deref(), Some("es"));
    }

    #[test]
    fn test_mock_engine_tracks_concurrent_calls() {
        let engine = Arc::new(MockEngine::new("test-model").with_delay(Duration::from_millis(50)));

        let a = Arc::clone(&engine);
        let b = Arc::clone(&engine);
        let t1 = std::thread::spawn(move || a.transcribe(&[0i16; 10], 16000, None));
        let t2 = std::thread::spawn(move || b.transcribe(&[0i16; 10], 16000, None));
        t1.join().unwrap().unwrap();
        t2.join().unwrap().unwrap();

        assert_eq!(engine.calls(), 2);
        assert_eq!(engine.max_in_flight(), 2);
    }

    #[test]
    fn test_engine_trait_is_object_safe() {
        let engine: Box<dyn SpeechEngine> =
            Box::new(MockEngine::new("test-model").with_response("boxed test"));

        assert_eq!(engine.model_name(), "test-model");
        assert!(engine.is_ready());

        let result = engine.transcribe(&[0i16; 100], 16000, None).unwrap();
        assert_eq!(result.text(), "boxed test");
    }

    #[test]
    fn test_arc_dyn_engine_implements_trait() {
        fn takes_engine(engine: impl SpeechEngine) -> String {
            engine.model_name().to_string()
        }

        let engine: Arc<dyn SpeechEngine> = Arc::new(MockEngine::new("shared-model"));
        assert_eq!(takes_engine(engine), "shared-model");
    }

    #[test]
    fn test_transcription_text_joins_segments() {
        let transcription = Transcription {
            segments: vec![
                Segment {
                    text: "hello".to_string(),
                    start_ms: 0,
                    end_ms: 500,
                },
                Segment {
                    text: "world".to_string(),
                    start_ms: 600,
                    end_ms: 1000,
                },
            ],
            language: None,
        };
        assert_eq!(transcription.text(), "hello world");
    }

    #[test]
    fn test_transcription_empty() {
        let transcription = Transcription::default();
        assert!(transcription.is_empty());
        assert_eq!(transcription.text(), "");
    }

    #[test]
    fn test_strip_markers_removes_blank_audio() {
        assert_eq!(strip_markers("[BLANK_AUDIO]"), "");
        assert_eq!(strip_markers("Hello [BLANK_AUDIO] world"), "Hello  world");
        assert_eq!(strip_markers("  (inaudible) hi  "), "hi");
    }

    #[test]
    fn test_strip_markers_keeps_normal_text() {
        assert_eq!(strip_markers("plain sentence"), "plain sentence");
    }

    #[test]
    fn test_mock_engine_empty_audio() {
        let engine = MockEngine::new("test-model");
        let result = engine.transcribe(&[], 16000, None).unwrap();
        assert_eq!(result.segments[0].end_ms, 0);
    }
}
