//! WebSocket connection handling.
//!
//! Every accepted socket gets three tasks: this reader, which parses and
//! decodes client frames; a [`SessionWorker`] that owns the session; and a
//! writer that serializes replies back onto the socket. Decode failures are
//! answered directly from the reader and never reach the worker, so a bad
//! chunk costs one error message and nothing else.
//!
//! ```text
//!   socket ──frames──▶ reader ──WorkItem──▶ worker ──ServerMessage──▶ writer ──▶ socket
//! ```

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::audio::{decode_bytes, decode_chunk, decode_data_url};
use crate::defaults;
use crate::error::{Result, ScribedError};
use crate::server::AppState;
use crate::server::protocol::{ClientMessage, ServerMessage};
use crate::session::{Session, SessionState, SessionWorker, WorkItem};

/// `GET /stream` upgrade entry point.
pub async fn ws_handler(
    State(state): State<AppState>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let session_id = Uuid::new_v4();
    info!(session = %session_id, "client connected");
    state.registry.register(session_id).await;

    let (sink, mut frames) = socket.split();
    let (work_tx, work_rx) = mpsc::channel(defaults::WORK_CHANNEL);
    let (out_tx, out_rx) = mpsc::channel(defaults::OUTBOUND_CHANNEL);

    let mut session = Session::new(
        session_id,
        state.settings.accumulator.clone(),
        state.settings.speaker_gap_ms,
    );
    if let Some(language) = &state.settings.default_language {
        session.set_declared_language(language);
    }
    let worker = SessionWorker::new(
        session,
        state.engine.clone(),
        state.translator.clone(),
        state.settings.worker.clone(),
    );

    out_tx.send(ServerMessage::Connected).await.ok();
    let mut worker_task = tokio::spawn(worker.run(work_rx, out_tx.clone()));
    let writer_task = tokio::spawn(write_frames(sink, out_rx));

    // Read until the socket drops or the worker finishes. The worker finishing
    // first means a stop or file request ran to completion and the server is
    // the side that closes.
    let joined = loop {
        tokio::select! {
            joined = &mut worker_task => break Some(joined),
            frame = frames.next() => {
                let message = match frame {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        debug!(session = %session_id, error = %e, "socket read failed");
                        break None;
                    }
                    None => break None,
                };
                match message {
                    Message::Text(text) => {
                        if !handle_text(&state, session_id, &text, &work_tx, &out_tx).await {
                            break None;
                        }
                    }
                    // Binary frames are raw chunk payloads without the JSON
                    // envelope; they follow the audio_chunk path otherwise.
                    Message::Binary(bytes) => {
                        let item = decode_bytes(&bytes, state.settings.accumulator.sample_rate)
                            .map(|samples| WorkItem::Audio {
                                samples,
                                language: None,
                            });
                        if !forward(&state, session_id, item, &work_tx, &out_tx).await {
                            break None;
                        }
                    }
                    Message::Close(_) => break None,
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
        }
    };

    // Closing the work channel is what tells the worker to flush; on the
    // disconnect path it has not seen a stop item.
    drop(work_tx);
    let joined = match joined {
        Some(joined) => joined,
        None => {
            state
                .registry
                .set_state(session_id, SessionState::Finalizing)
                .await;
            worker_task.await
        }
    };
    match joined {
        Ok(outcome) => info!(
            session = %session_id,
            windows = outcome.windows,
            errors = outcome.errors,
            audio_ms = outcome.audio_ms,
            "connection closing"
        ),
        Err(e) => error!(session = %session_id, error = %e, "session worker task failed"),
    }

    // With every sender gone the writer drains the remaining messages,
    // including the final transcript, and exits.
    drop(out_tx);
    if let Err(e) = writer_task.await {
        debug!(session = %session_id, error = %e, "writer task join failed");
    }
    state.registry.deregister(session_id).await;
    info!(session = %session_id, "client disconnected");
}

/// Parse one text frame and hand the result to the worker.
///
/// Returns `false` once the worker is gone and reading should stop.
async fn handle_text(
    state: &AppState,
    session_id: Uuid,
    text: &str,
    work: &mpsc::Sender<WorkItem>,
    out: &mpsc::Sender<ServerMessage>,
) -> bool {
    let sample_rate = state.settings.accumulator.sample_rate;
    let message = match ClientMessage::from_json(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(session = %session_id, error = %e, "unparseable client frame");
            let error = ScribedError::Protocol {
                message: format!("unrecognized client message: {}", e),
            };
            report(out, &error).await;
            return true;
        }
    };

    let item = match message {
        ClientMessage::AudioChunk { data, language } => {
            decode_chunk(&data, sample_rate).map(|samples| WorkItem::Audio { samples, language })
        }
        ClientMessage::AudioFile { data, language } => {
            decode_data_url(&data, sample_rate).map(|samples| WorkItem::File { samples, language })
        }
        ClientMessage::SetLanguage { language } => Ok(WorkItem::SetLanguage(language)),
        ClientMessage::Stop => Ok(WorkItem::Stop),
    };
    forward(state, session_id, item, work, out).await
}

/// Forward a decoded work item, or report the decode error and carry on.
async fn forward(
    state: &AppState,
    session_id: Uuid,
    item: Result<WorkItem>,
    work: &mpsc::Sender<WorkItem>,
    out: &mpsc::Sender<ServerMessage>,
) -> bool {
    let item = match item {
        Ok(item) => item,
        Err(e) => {
            debug!(session = %session_id, error = %e, "audio payload rejected");
            report(out, &e).await;
            return true;
        }
    };

    match &item {
        WorkItem::Audio { .. } => {
            state
                .registry
                .set_state(session_id, SessionState::Streaming)
                .await;
        }
        WorkItem::File { .. } | WorkItem::Stop => {
            state
                .registry
                .set_state(session_id, SessionState::Finalizing)
                .await;
        }
        WorkItem::SetLanguage(_) => {}
    }

    work.send(item).await.is_ok()
}

async fn report(out: &mpsc::Sender<ServerMessage>, error: &ScribedError) {
    let sent = out
        .send(ServerMessage::Error {
            message: error.to_string(),
        })
        .await;
    if sent.is_err() {
        debug!("client gone, error report dropped");
    }
}

/// Serialize server messages onto the socket until every sender is gone.
async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut out: mpsc::Receiver<ServerMessage>,
) {
    while let Some(message) = out.recv().await {
        let payload = match message.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "failed to serialize server message");
                continue;
            }
        };
        if sink.send(Message::Text(payload)).await.is_err() {
            break;
        }
    }
    sink.send(Message::Close(None)).await.ok();
}
