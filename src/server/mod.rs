//! WebSocket transcription server.
//!
//! ```text
//!           GET /stream (upgrade)            GET /health
//!                 │                               │
//!                 ▼                               ▼
//!           connection task ◀──────────── SessionRegistry
//!                 │
//!                 ▼
//!           SessionWorker (one per connection)
//! ```
//!
//! The engine handle and translator are built once at startup and shared by
//! reference; everything per-session lives inside the connection's tasks.

pub mod connection;
pub mod protocol;
pub mod registry;

pub use registry::SessionRegistry;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tracing::{info, warn};

use crate::audio::AccumulatorConfig;
use crate::config::Config;
use crate::defaults;
use crate::error::{Result, ScribedError};
use crate::session::WorkerConfig;
use crate::stt::SpeechEngine;
use crate::translate::Translator;

/// Per-session knobs, derived from the config once at startup.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub accumulator: AccumulatorConfig,
    pub worker: WorkerConfig,
    pub speaker_gap_ms: u64,
    /// Starting declared language for new sessions, when the config pins one.
    pub default_language: Option<String>,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            accumulator: AccumulatorConfig {
                window_ms: config.audio.window_ms,
                max_backlog_ms: config.audio.max_backlog_ms,
                sample_rate: config.audio.sample_rate,
            },
            worker: WorkerConfig {
                sample_rate: config.audio.sample_rate,
                target_language: config.translation.target_language.clone(),
                stream_timeout: Duration::from_secs(config.model.stream_timeout_secs),
                file_timeout: Duration::from_secs(config.model.file_timeout_secs),
            },
            speaker_gap_ms: config.audio.speaker_gap_ms,
            default_language: match config.model.language.as_str() {
                "" | defaults::AUTO_LANGUAGE => None,
                pinned => Some(pinned.to_string()),
            },
        }
    }
}

/// Shared state behind every route handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn SpeechEngine>,
    pub translator: Option<Arc<dyn Translator>>,
    pub settings: SessionSettings,
    pub registry: SessionRegistry,
}

impl AppState {
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        translator: Option<Arc<dyn Translator>>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            engine,
            translator,
            settings,
            registry: SessionRegistry::new(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("model", &self.engine.model_name())
            .field("translator", &self.translator.as_ref().map(|t| t.name()))
            .field("settings", &self.settings)
            .finish()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/stream", get(connection::ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "model": state.engine.model_name(),
        "active_sessions": state.registry.active_count().await,
        "streaming_sessions": state.registry.streaming_count().await,
    }))
}

/// Bind the listener and serve until SIGINT or SIGTERM.
pub async fn run(listen: &str, state: AppState) -> Result<()> {
    let app = build_router(state.clone());
    let listener =
        tokio::net::TcpListener::bind(listen)
            .await
            .map_err(|e| ScribedError::Connection {
                message: format!("failed to bind {}: {}", listen, e),
            })?;
    let addr = listener
        .local_addr()
        .map_err(|e| ScribedError::Connection {
            message: format!("failed to read listener address: {}", e),
        })?;
    info!(address = %addr, model = state.engine.model_name(), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ScribedError::Connection {
            message: format!("server error: {}", e),
        })?;

    let remaining = state.registry.active_count().await;
    if remaining > 0 {
        warn!(sessions = remaining, "shut down with sessions still connected");
    }
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT, shutting down");
        }
        _ = wait_for_sigterm() => {
            info!("received SIGTERM, shutting down");
        }
    }
}

/// Wait for SIGTERM, for service managers that stop us politely.
#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "failed to register SIGTERM handler");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_default_config() {
        let settings = SessionSettings::from_config(&Config::default());
        assert_eq!(settings.accumulator.window_ms, defaults::WINDOW_MS);
        assert_eq!(settings.accumulator.sample_rate, defaults::SAMPLE_RATE);
        assert_eq!(settings.speaker_gap_ms, defaults::SPEAKER_GAP_MS);
        assert_eq!(settings.worker.target_language, defaults::TARGET_LANGUAGE);
        // "auto" means no pinned language for new sessions
        assert_eq!(settings.default_language, None);
    }

    #[test]
    fn test_settings_pin_configured_language() {
        let mut config = Config::default();
        config.model.language = "de".to_string();
        let settings = SessionSettings::from_config(&config);
        assert_eq!(settings.default_language.as_deref(), Some("de"));
    }
}
