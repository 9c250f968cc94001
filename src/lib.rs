//! scribed - Streaming speech transcription over WebSocket
//!
//! Persistent duplex sessions with incremental partial results, speaker
//! change labels, and optional per-window translation.

// Error handling discipline: daemon code propagates, never panics
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod server;
pub mod session;
pub mod stt;
pub mod translate;

// Core capability traits (audio in → text out, text → translated text)
pub use stt::{MockEngine, Segment, SpeechEngine, Transcription};
pub use translate::{MockTranslator, Translator};

// Session engine
pub use session::{Session, SessionOutcome, SessionState, SessionWorker, WorkItem, WorkerConfig};

// Server composition
pub use server::{AppState, SessionRegistry, SessionSettings, build_router};

// Wire protocol
pub use server::protocol::{ClientMessage, ServerMessage};

// Error handling
pub use error::{Result, ScribedError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.2.1+abc1234"` when git hash is available, `"0.2.1"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        // In a git repo build, GIT_HASH is set → expect "0.2.1+<hash>"
        // In CI without git, expect plain "0.2.1"
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(
                ver.contains('+'),
                "With GIT_HASH set, version should contain '+', got: {}",
                ver
            );
            let hash_part = ver.split('+').nth(1).unwrap_or("");
            assert_eq!(
                hash_part.len(),
                7,
                "Git hash should be 7 chars, got: {}",
                hash_part
            );
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
