//! Error types for scribed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribedError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Transport errors
    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    // Audio decode errors
    #[error("Audio format error: {message}")]
    AudioFormat { message: String },

    // Inference errors
    #[error("Speech model not found at {path}")]
    ModelNotFound { path: String },

    #[error("Inference failed: {message}")]
    Inference { message: String },

    #[error("Inference timed out after {seconds}s")]
    InferenceTimeout { seconds: u64 },

    // Translation errors (non-fatal, the transcript is still delivered)
    #[error("Translation failed: {message}")]
    Translation { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScribedError>;
