//! JSON message protocol for the duplex transcription stream.
//!
//! Every WebSocket text frame carries exactly one of these messages. The
//! `type` tag is the discriminator in both directions.

use serde::{Deserialize, Serialize};

/// Messages sent by a client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A streaming audio frame: base64-encoded WAV or raw 16-bit PCM.
    AudioChunk {
        data: String,
        /// Optional language hint, applied from this chunk onward.
        #[serde(skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    /// A complete audio file as a data URL (`data:<mime>;base64,<payload>`).
    /// Transcribed as a single window; ends the session with a final message.
    AudioFile {
        data: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    /// End of stream: flush remaining audio and emit the final transcript.
    Stop,
    /// Change the language hint for subsequent windows.
    SetLanguage { language: String },
}

impl ClientMessage {
    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Messages sent by the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once after the connection is accepted.
    Connected,
    /// Incremental transcript for one processed window.
    Partial {
        text: String,
        /// Present when the window was translated to the target language.
        #[serde(skip_serializing_if = "Option::is_none")]
        translation: Option<String>,
    },
    /// Complete transcript, sent exactly once per session.
    Final {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        translation: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        source_language: Option<String>,
    },
    /// A recoverable or terminal error, human-readable.
    Error { message: String },
}

impl ServerMessage {
    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
