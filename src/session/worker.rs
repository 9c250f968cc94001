//! Per-session processing loop.
//!
//! Each connection gets one worker task that owns the session state and
//! consumes work items strictly in arrival order:
//!
//! ```text
//!   connection ──▶ WorkItem queue ──▶ SessionWorker ──▶ ServerMessage queue ──▶ connection
//! ```
//!
//! The worker submits at most one inference at a time. Audio that arrives
//! while a window is being transcribed stays in the accumulator and is folded
//! into the next window, so a slow model produces fewer, larger windows
//! instead of a growing queue of stale ones.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::audio::Window;
use crate::defaults;
use crate::error::{Result, ScribedError};
use crate::server::protocol::ServerMessage;
use crate::session::{Session, SessionState};
use crate::stt::{SpeechEngine, Transcription};
use crate::translate::Translator;

/// One unit of work for a session task.
#[derive(Debug)]
pub enum WorkItem {
    /// Decoded streaming chunk, with an optional per-chunk language override.
    Audio {
        samples: Vec<i16>,
        language: Option<String>,
    },
    /// Decoded one-shot file. Transcribed as a single window, then the
    /// session finalizes.
    File {
        samples: Vec<i16>,
        language: Option<String>,
    },
    /// Mid-session language change; applies to windows submitted after it.
    SetLanguage(String),
    /// Client asked for the final transcript.
    Stop,
}

/// Worker tuning, shared by every session of a server.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sample rate of the decoded audio handed to the engine.
    pub sample_rate: u32,
    /// Language translations are produced in.
    pub target_language: String,
    /// Inference deadline for streaming windows.
    pub stream_timeout: Duration,
    /// Inference deadline for one-shot files, which can be much longer.
    pub file_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            target_language: defaults::TARGET_LANGUAGE.to_string(),
            stream_timeout: Duration::from_secs(defaults::STREAM_TIMEOUT_SECS),
            file_timeout: Duration::from_secs(defaults::FILE_TIMEOUT_SECS),
        }
    }
}

/// Why a session stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopCause {
    Stop,
    File,
    Disconnect,
}

impl StopCause {
    fn as_str(self) -> &'static str {
        match self {
            StopCause::Stop => "stop",
            StopCause::File => "file",
            StopCause::Disconnect => "disconnect",
        }
    }
}

/// Counters reported when a session worker exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Windows that contributed text to the transcript.
    pub windows: usize,
    /// Errors surfaced to the client: abandoned windows, failed translations,
    /// and dropped backlog.
    pub errors: usize,
    /// Total audio received over the session, in milliseconds.
    pub audio_ms: u64,
}

/// Owns one session end to end.
pub struct SessionWorker {
    session: Session,
    engine: Arc<dyn SpeechEngine>,
    translator: Option<Arc<dyn Translator>>,
    config: WorkerConfig,
    windows: usize,
    errors: usize,
}

impl SessionWorker {
    pub fn new(
        session: Session,
        engine: Arc<dyn SpeechEngine>,
        translator: Option<Arc<dyn Translator>>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            session,
            engine,
            translator,
            config,
            windows: 0,
            errors: 0,
        }
    }

    /// Run the session to completion.
    ///
    /// Consumes work items until a stop request, a file, or the input channel
    /// closing, then flushes the remaining audio and emits the final
    /// transcript exactly once.
    pub async fn run(
        mut self,
        mut input: mpsc::Receiver<WorkItem>,
        output: mpsc::Sender<ServerMessage>,
    ) -> SessionOutcome {
        let cause = loop {
            let Some(first) = input.recv().await else {
                break StopCause::Disconnect;
            };

            // Drain everything that queued up behind the first item so audio
            // received during a slow inference lands in one merged window.
            let mut items = vec![first];
            while let Ok(item) = input.try_recv() {
                items.push(item);
            }

            let mut cause = None;
            for item in items {
                match item {
                    WorkItem::Audio { samples, language } => {
                        self.ingest(&samples, language.as_deref(), &output).await;
                    }
                    WorkItem::File { samples, language } => {
                        self.ingest_file(&samples, language.as_deref());
                        cause = Some(StopCause::File);
                        break;
                    }
                    WorkItem::SetLanguage(language) => {
                        self.session.set_declared_language(&language);
                    }
                    WorkItem::Stop => {
                        cause = Some(StopCause::Stop);
                        break;
                    }
                }
            }

            if let Some(cause) = cause {
                break cause;
            }

            if let Some(window) = self.session.take_ready_window() {
                self.process_window(window, self.config.stream_timeout, true, &output)
                    .await;
            }
        };

        self.finalize(cause, &output).await;

        SessionOutcome {
            windows: self.windows,
            errors: self.errors,
            audio_ms: self.session.accumulated_ms(),
        }
    }

    /// Buffer decoded streaming audio. Audio dropped by the backlog cap is
    /// reported to the client the same way a lost window is.
    async fn ingest(
        &mut self,
        samples: &[i16],
        language: Option<&str>,
        output: &mpsc::Sender<ServerMessage>,
    ) {
        self.note_audio(language);
        let dropped_ms = self.session.push_audio(samples);
        if dropped_ms > 0 {
            self.errors += 1;
            warn!(
                session = %self.session.id(),
                dropped_ms,
                "audio backlog over the cap, oldest samples dropped"
            );
            let e = ScribedError::Inference {
                message: format!(
                    "transcription fell behind, dropped {dropped_ms} ms of buffered audio"
                ),
            };
            self.send(output, ServerMessage::Error {
                message: e.to_string(),
            })
            .await;
        }
    }

    /// Buffer a one-shot file. The whole payload forms a single window no
    /// matter how long it is, so the streaming backlog cap does not apply.
    fn ingest_file(&mut self, samples: &[i16], language: Option<&str>) {
        self.note_audio(language);
        self.session.push_file_audio(samples);
    }

    /// Record a per-chunk language override and take the session to
    /// `Streaming` on the first audio.
    fn note_audio(&mut self, language: Option<&str>) {
        if let Some(language) = language {
            self.session.set_declared_language(language);
        }
        if self.session.state() == SessionState::Connected {
            self.session.set_state(SessionState::Streaming);
        }
    }

    /// Transcribe one window, label it, translate it, and record it.
    ///
    /// Streaming windows also emit a partial; flushed remainders and file
    /// windows surface only through the final transcript.
    async fn process_window(
        &mut self,
        window: Window,
        timeout: Duration,
        emit_partial: bool,
        output: &mpsc::Sender<ServerMessage>,
    ) {
        let offset_ms = window.offset_ms;
        debug!(
            session = %self.session.id(),
            offset_ms,
            duration_ms = window.duration_ms,
            "transcribing window"
        );

        let transcription = match self.transcribe(window.samples, timeout).await {
            Ok(transcription) => transcription,
            Err(e) => {
                self.errors += 1;
                warn!(session = %self.session.id(), error = %e, "window abandoned");
                self.send(output, ServerMessage::Error {
                    message: e.to_string(),
                })
                .await;
                return;
            }
        };

        self.session
            .note_detected_language(transcription.language.clone());

        let lines = self.session.label(&transcription.segments, offset_ms);
        if lines.is_empty() {
            debug!(session = %self.session.id(), "window transcribed to nothing");
            return;
        }
        let text = lines.join("\n");

        let translation = self
            .maybe_translate(&transcription.text(), transcription.language.as_deref(), output)
            .await;

        self.session.record_entry(text.clone(), translation.clone());
        self.windows += 1;

        if emit_partial {
            self.send(output, ServerMessage::Partial { text, translation })
                .await;
        }
    }

    /// Submit one window to the engine on the blocking pool, bounded by
    /// `timeout`.
    ///
    /// On timeout the blocking call is left to finish on its own; its result
    /// is discarded and the window is excluded from the transcript.
    async fn transcribe(&self, samples: Vec<i16>, timeout: Duration) -> Result<Transcription> {
        let engine = Arc::clone(&self.engine);
        let sample_rate = self.config.sample_rate;
        let hint = self.session.declared_language().map(str::to_string);
        let task = tokio::task::spawn_blocking(move || {
            engine.transcribe(&samples, sample_rate, hint.as_deref())
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ScribedError::Inference {
                message: format!("inference task failed: {join_error}"),
            }),
            Err(_) => Err(ScribedError::InferenceTimeout {
                seconds: timeout.as_secs().max(1),
            }),
        }
    }

    /// Translate window text into the configured target language.
    ///
    /// Returns `None` when translation is disabled, the source language is
    /// unknown or already the target, or the request fails. A failure is
    /// reported to the client but never blocks the transcript.
    async fn maybe_translate(
        &mut self,
        text: &str,
        detected: Option<&str>,
        output: &mpsc::Sender<ServerMessage>,
    ) -> Option<String> {
        let translator = self.translator.as_ref()?;
        let declared = self
            .session
            .declared_language()
            .filter(|l| *l != defaults::AUTO_LANGUAGE && !l.is_empty());
        let source = detected.or(declared)?;
        if source == self.config.target_language {
            return None;
        }

        match translator
            .translate(text, source, &self.config.target_language)
            .await
        {
            Ok(translated) => Some(translated),
            Err(e) => {
                self.errors += 1;
                warn!(
                    session = %self.session.id(),
                    error = %e,
                    "translation failed, window kept untranslated"
                );
                if output
                    .send(ServerMessage::Error {
                        message: e.to_string(),
                    })
                    .await
                    .is_err()
                {
                    debug!(session = %self.session.id(), "client gone, message dropped");
                }
                None
            }
        }
    }

    /// Flush the remaining audio and emit the final transcript.
    async fn finalize(&mut self, cause: StopCause, output: &mpsc::Sender<ServerMessage>) {
        self.session.set_state(SessionState::Finalizing);

        let timeout = match cause {
            StopCause::File => self.config.file_timeout,
            StopCause::Stop | StopCause::Disconnect => self.config.stream_timeout,
        };
        if let Some(window) = self.session.flush_window() {
            self.process_window(window, timeout, false, output).await;
        }

        let message = ServerMessage::Final {
            text: self.session.final_text(),
            translation: self.session.final_translation(),
            source_language: self.session.detected_language().map(str::to_string),
        };
        if output.send(message).await.is_err() {
            debug!(session = %self.session.id(), "client gone before the final transcript");
        }

        self.session.set_state(SessionState::Closed);
        info!(
            session = %self.session.id(),
            cause = cause.as_str(),
            windows = self.windows,
            errors = self.errors,
            audio_ms = self.session.accumulated_ms(),
            "session closed"
        );
    }

    /// Best-effort send; a closed output means the connection is gone and the
    /// message can only be dropped.
    async fn send(&self, output: &mpsc::Sender<ServerMessage>, message: ServerMessage) {
        if output.send(message).await.is_err() {
            debug!(session = %self.session.id(), "client gone, message dropped");
        }
    }
}
