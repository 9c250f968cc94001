//! Daemon configuration: TOML file, environment overrides, validation.
//!
//! Precedence is file, then `SCRIBED_*` environment variables, then CLI
//! flags; each layer only touches the fields it names.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::defaults;
use crate::error::{Result, ScribedError};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub model: ModelConfig,
    pub translation: TranslationConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub listen: String,
}

/// Audio windowing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate sessions are normalized to, in Hz.
    pub sample_rate: u32,
    /// Audio accumulated before a window is transcribed.
    pub window_ms: u64,
    /// Silence between segments that starts a new speaker.
    pub speaker_gap_ms: u64,
    /// Cap on audio held for one window; the oldest samples beyond it drop.
    pub max_backlog_ms: u64,
}

/// Speech model configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the whisper model file.
    pub path: PathBuf,
    /// Default language for new sessions; "auto" lets the model detect.
    pub language: String,
    /// Inference threads; `None` picks a count from the machine.
    pub threads: Option<usize>,
    /// Inference deadline for streaming windows, in seconds.
    pub stream_timeout_secs: u64,
    /// Inference deadline for one-shot files, in seconds.
    pub file_timeout_secs: u64,
}

/// Translation service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslationConfig {
    /// LibreTranslate-compatible endpoint; empty disables translation.
    pub endpoint: String,
    /// Language transcripts are translated into.
    pub target_language: String,
    /// API key sent with each request, if the endpoint wants one.
    pub api_key: Option<String>,
    /// Per-request deadline, in seconds.
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: defaults::LISTEN_ADDR.to_string(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            window_ms: defaults::WINDOW_MS,
            speaker_gap_ms: defaults::SPEAKER_GAP_MS,
            max_backlog_ms: defaults::MAX_BACKLOG_MS,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(defaults::DEFAULT_MODEL_PATH),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
            stream_timeout_secs: defaults::STREAM_TIMEOUT_SECS,
            file_timeout_secs: defaults::FILE_TIMEOUT_SECS,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            target_language: defaults::TARGET_LANGUAGE.to_string(),
            api_key: None,
            timeout_secs: defaults::TRANSLATE_TIMEOUT_SECS,
        }
    }
}

impl TranslationConfig {
    pub fn enabled(&self) -> bool {
        !self.endpoint.is_empty()
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Missing fields take their defaults; invalid TOML is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScribedError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ScribedError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration, treating a missing file as "use defaults".
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(ScribedError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supported environment variables:
    /// - SCRIBED_LISTEN → server.listen
    /// - SCRIBED_MODEL → model.path
    /// - SCRIBED_LANGUAGE → model.language
    /// - SCRIBED_TRANSLATE_ENDPOINT → translation.endpoint
    /// - SCRIBED_TRANSLATE_API_KEY → translation.api_key
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(listen) = std::env::var("SCRIBED_LISTEN")
            && !listen.is_empty()
        {
            self.server.listen = listen;
        }

        if let Ok(model) = std::env::var("SCRIBED_MODEL")
            && !model.is_empty()
        {
            self.model.path = PathBuf::from(model);
        }

        if let Ok(language) = std::env::var("SCRIBED_LANGUAGE")
            && !language.is_empty()
        {
            self.model.language = language;
        }

        if let Ok(endpoint) = std::env::var("SCRIBED_TRANSLATE_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.translation.endpoint = endpoint;
        }

        if let Ok(api_key) = std::env::var("SCRIBED_TRANSLATE_API_KEY")
            && !api_key.is_empty()
        {
            self.translation.api_key = Some(api_key);
        }

        self
    }

    /// Reject values the session engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(ScribedError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.audio.window_ms == 0 {
            return Err(ScribedError::ConfigInvalidValue {
                key: "audio.window_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.audio.max_backlog_ms < self.audio.window_ms {
            return Err(ScribedError::ConfigInvalidValue {
                key: "audio.max_backlog_ms".to_string(),
                message: "must be at least audio.window_ms".to_string(),
            });
        }
        if self.model.stream_timeout_secs == 0 || self.model.file_timeout_secs == 0 {
            return Err(ScribedError::ConfigInvalidValue {
                key: "model.stream_timeout_secs".to_string(),
                message: "timeouts must be greater than zero".to_string(),
            });
        }
        if self.translation.enabled() && self.translation.target_language.is_empty() {
            return Err(ScribedError::ConfigInvalidValue {
                key: "translation.target_language".to_string(),
                message: "must be set when translation is enabled".to_string(),
            });
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ScribedError::Other(format!("failed to render config: {}", e)))
    }

    /// Get the default configuration file path.
    ///
    /// Returns ~/.config/scribed/config.toml on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scribed")
            .join("config.toml")
    }
}
