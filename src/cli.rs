//! Command-line interface for scribed
//!
//! Provides argument parsing using clap derive macros. A bare invocation
//! starts the daemon; subcommands cover configuration and completions.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::config::Config;

/// Streaming transcription session daemon
#[derive(Parser, Debug)]
#[command(
    name = "scribed",
    version = crate::version_string(),
    about = "Streaming transcription session daemon"
)]
pub struct Cli {
    /// Subcommand to execute (default: start the daemon)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: per-window detail, -vv: full tracing)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Address to listen on (default: 127.0.0.1:8017)
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Path to the whisper model file
    #[arg(long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Default language for new sessions (default: auto-detect). Examples: auto, en, de, es
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Window of audio per transcription (default: 3s). Examples: 3s, 5000, 2500ms
    #[arg(long, short = 'w', value_name = "DURATION", value_parser = parse_duration_ms)]
    pub window: Option<u64>,

    /// Silence gap that starts a new speaker (default: 2s)
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_ms)]
    pub gap: Option<u64>,

    /// Number of CPU threads for inference (default: auto)
    #[arg(long, short = 't', value_name = "THREADS")]
    pub threads: Option<usize>,

    /// LibreTranslate-compatible endpoint for window translation
    #[arg(long, value_name = "URL")]
    pub translate: Option<String>,
}

/// Parse a duration string into milliseconds.
///
/// Supports bare numbers (milliseconds) and any duration format accepted by
/// `humantime`: single-unit (`3s`, `500ms`, `2m`) and compound (`1m30s`).
fn parse_duration_ms(s: &str) -> Result<u64, String> {
    let s = s.trim();
    // Bare number → milliseconds
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(ms);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_millis() as u64)
        .map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration inspection actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration after file, env, and CLI overrides
    Show,
    /// Print the configuration file path in use
    Path,
    /// Dump a default configuration template
    Dump,
}

impl Cli {
    /// Fold the CLI flags into a loaded configuration.
    ///
    /// CLI flags are the last layer, over the file and the environment.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(listen) = &self.listen {
            config.server.listen = listen.clone();
        }
        if let Some(model) = &self.model {
            config.model.path = model.clone();
        }
        if let Some(language) = &self.language {
            config.model.language = language.clone();
        }
        if let Some(window) = self.window {
            config.audio.window_ms = window;
        }
        if let Some(gap) = self.gap {
            config.audio.speaker_gap_ms = gap;
        }
        if let Some(threads) = self.threads {
            config.model.threads = Some(threads);
        }
        if let Some(endpoint) = &self.translate {
            config.translation.endpoint = endpoint.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_command() {
        let cli = Cli::try_parse_from(["scribed"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.listen.is_none());
        assert!(cli.model.is_none());
        assert!(cli.language.is_none());
        assert!(cli.window.is_none());
        assert!(cli.gap.is_none());
        assert!(cli.threads.is_none());
        assert!(cli.translate.is_none());
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_verbose_single() {
        let cli = Cli::try_parse_from(["scribed", "-v"]).unwrap();
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["scribed", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_quiet_short_flag() {
        let cli = Cli::try_parse_from(["scribed", "-q"]).unwrap();
        assert!(cli.quiet);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_with_options() {
        let cli = Cli::try_parse_from([
            "scribed",
            "--listen",
            "0.0.0.0:9000",
            "--model",
            "/models/ggml-small.bin",
            "--language",
            "en",
        ])
        .unwrap();

        assert_eq!(cli.listen.as_deref(), Some("0.0.0.0:9000"));
        assert_eq!(cli.model, Some(PathBuf::from("/models/ggml-small.bin")));
        assert_eq!(cli.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_parse_global_config() {
        let cli = Cli::try_parse_from(["scribed", "--config", "/path/to/config.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_global_options_after_command() {
        let cli = Cli::try_parse_from(["scribed", "config", "show", "--config", "/tmp/c.toml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
    }

    #[test]
    fn test_invalid_command_returns_error() {
        let result = Cli::try_parse_from(["scribed", "invalid"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn test_help_flag() {
        let result = Cli::try_parse_from(["scribed", "--help"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_version_flag() {
        let result = Cli::try_parse_from(["scribed", "--version"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    // ── Duration parsing tests ───────────────────────────────────────────

    #[test]
    fn test_parse_duration_ms_bare_number() {
        assert_eq!(parse_duration_ms("3000").unwrap(), 3000);
        assert_eq!(parse_duration_ms("0").unwrap(), 0);
        assert_eq!(parse_duration_ms("500").unwrap(), 500);
    }

    #[test]
    fn test_parse_duration_ms_with_units() {
        assert_eq!(parse_duration_ms("3s").unwrap(), 3000);
        assert_eq!(parse_duration_ms("500ms").unwrap(), 500);
        assert_eq!(parse_duration_ms("2m").unwrap(), 120_000);
    }

    #[test]
    fn test_parse_duration_ms_compound() {
        assert_eq!(parse_duration_ms("1m30s").unwrap(), 90_000);
        assert_eq!(parse_duration_ms("2s500ms").unwrap(), 2500);
    }

    #[test]
    fn test_parse_duration_ms_invalid() {
        assert!(parse_duration_ms("abc").is_err());
        assert!(parse_duration_ms("10x").is_err());
        assert!(parse_duration_ms("").is_err());
        assert!(parse_duration_ms("-5").is_err());
    }

    #[test]
    fn test_window_cli_arg() {
        let cli = Cli::try_parse_from(["scribed", "--window", "5s"]).unwrap();
        assert_eq!(cli.window, Some(5000));
    }

    #[test]
    fn test_window_cli_arg_short() {
        let cli = Cli::try_parse_from(["scribed", "-w", "2500"]).unwrap();
        assert_eq!(cli.window, Some(2500));
    }

    #[test]
    fn test_gap_cli_arg() {
        let cli = Cli::try_parse_from(["scribed", "--gap", "1500ms"]).unwrap();
        assert_eq!(cli.gap, Some(1500));
    }

    // ── Config command tests ────────────────────────────────────────────

    #[test]
    fn test_parse_config_show() {
        let cli = Cli::try_parse_from(["scribed", "config", "show"]).unwrap();
        match cli.command {
            Some(Commands::Config { action }) => match action {
                ConfigAction::Show => {}
                _ => panic!("Expected Show action"),
            },
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_parse_config_path() {
        let cli = Cli::try_parse_from(["scribed", "config", "path"]).unwrap();
        match cli.command {
            Some(Commands::Config { action }) => match action {
                ConfigAction::Path => {}
                _ => panic!("Expected Path action"),
            },
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_parse_config_dump() {
        let cli = Cli::try_parse_from(["scribed", "config", "dump"]).unwrap();
        match cli.command {
            Some(Commands::Config { action }) => match action {
                ConfigAction::Dump => {}
                _ => panic!("Expected Dump action"),
            },
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_config_requires_subcommand() {
        let result = Cli::try_parse_from(["scribed", "config"]);
        let err = result.unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["scribed", "completions", "bash"]).unwrap();
        match cli.command {
            Some(Commands::Completions { shell }) => {
                assert_eq!(shell, Shell::Bash);
            }
            _ => panic!("Expected Completions command"),
        }
    }

    // ── Override folding tests ──────────────────────────────────────────

    #[test]
    fn test_apply_overrides_touches_only_named_fields() {
        let cli = Cli::try_parse_from(["scribed", "--listen", "0.0.0.0:9000", "--window", "5s"])
            .unwrap();
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.server.listen, "0.0.0.0:9000");
        assert_eq!(config.audio.window_ms, 5000);
        // Untouched fields keep their defaults
        assert_eq!(config.audio.speaker_gap_ms, 2000);
        assert_eq!(config.model.language, "auto");
    }

    #[test]
    fn test_apply_overrides_full_set() {
        let cli = Cli::try_parse_from([
            "scribed",
            "--listen",
            "[::1]:8017",
            "--model",
            "/m/ggml-tiny.bin",
            "--language",
            "sv",
            "--window",
            "4s",
            "--gap",
            "3s",
            "--threads",
            "4",
            "--translate",
            "http://localhost:5000",
        ])
        .unwrap();
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.server.listen, "[::1]:8017");
        assert_eq!(config.model.path, PathBuf::from("/m/ggml-tiny.bin"));
        assert_eq!(config.model.language, "sv");
        assert_eq!(config.audio.window_ms, 4000);
        assert_eq!(config.audio.speaker_gap_ms, 3000);
        assert_eq!(config.model.threads, Some(4));
        assert_eq!(config.translation.endpoint, "http://localhost:5000");
        assert!(config.translation.enabled());
    }

    #[test]
    fn test_apply_overrides_noop_without_flags() {
        let cli = Cli::try_parse_from(["scribed"]).unwrap();
        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config, Config::default());
    }
}
