use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::sync::Arc;
use tracing::info;

use scribed::cli::{Cli, Commands, ConfigAction};
use scribed::config::Config;
use scribed::error::ScribedError;
use scribed::server::{self, AppState, SessionSettings};
use scribed::stt::{SpeechEngine, WhisperConfig, WhisperEngine};
use scribed::translate::Translator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    match &cli.command {
        None => run_daemon(&cli).await?,
        Some(Commands::Config { action }) => handle_config_command(action, &cli)?,
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                *shell,
                &mut Cli::command(),
                "scribed",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise the level follows the quiet and
/// verbose flags.
fn init_tracing(quiet: bool, verbose: u8) {
    let default_filter = if quiet {
        "scribed=warn"
    } else {
        match verbose {
            0 => "scribed=info",
            1 => "scribed=debug",
            _ => "scribed=trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Load configuration, merging file, environment, and CLI layers.
///
/// Priority order:
/// 1. CLI flags (--listen, --model, ...)
/// 2. Environment variables (SCRIBED_*)
/// 3. Custom config path from CLI (--config), which must exist
/// 4. Default config path (~/.config/scribed/config.toml), which may not
fn load_config(cli: &Cli) -> Result<Config> {
    let config = if let Some(path) = cli.config.as_deref() {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    let mut config = config.with_env_overrides();
    cli.apply_overrides(&mut config);
    Ok(config)
}

/// Run the transcription daemon until shutdown.
async fn run_daemon(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    config.validate()?;

    // The model loads before the listener binds, so a bound socket implies
    // inference readiness.
    let engine = build_engine(&config)?;
    info!(
        model = engine.model_name(),
        backend = scribed::defaults::gpu_backend(),
        ready = engine.is_ready(),
        "speech engine loaded"
    );

    let translator = build_translator(&config)?;
    if let Some(t) = &translator {
        info!(
            service = t.name(),
            target = %config.translation.target_language,
            "translation enabled"
        );
    }

    let settings = SessionSettings::from_config(&config);
    let state = AppState::new(engine, translator, settings);

    match server::run(&config.server.listen, state).await {
        Ok(()) => Ok(()),
        Err(e @ ScribedError::Connection { .. }) => {
            eprintln!("{}", format!("Error: {}", e).red());
            eprintln!(
                "Is another instance already listening on {}?",
                config.server.listen
            );
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

/// Load the whisper model into a shared engine handle.
fn build_engine(config: &Config) -> Result<Arc<dyn SpeechEngine>> {
    let whisper = WhisperConfig {
        model_path: config.model.path.clone(),
        language: config.model.language.clone(),
        threads: config.model.threads,
    };

    match WhisperEngine::new(whisper) {
        Ok(engine) => Ok(Arc::new(engine)),
        Err(ScribedError::ModelNotFound { path }) => {
            eprintln!("{}", format!("Model file not found: {}", path).red());
            eprintln!("Download a ggml whisper model and point --model (or model.path) at it:");
            eprintln!(
                "  curl -Lo ggml-base.bin \
                 https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.bin"
            );
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

/// Build the translation backend when one is configured.
fn build_translator(config: &Config) -> Result<Option<Arc<dyn Translator>>> {
    if !config.translation.enabled() {
        return Ok(None);
    }

    #[cfg(feature = "http-translate")]
    {
        let translator = scribed::translate::HttpTranslator::new(
            &config.translation.endpoint,
            config.translation.api_key.clone(),
            std::time::Duration::from_secs(config.translation.timeout_secs),
        )?;
        Ok(Some(Arc::new(translator)))
    }

    #[cfg(not(feature = "http-translate"))]
    {
        tracing::warn!(
            "translation endpoint configured but this build has no http-translate support"
        );
        Ok(None)
    }
}

/// Handle configuration inspection commands.
fn handle_config_command(action: &ConfigAction, cli: &Cli) -> Result<()> {
    match action {
        ConfigAction::Show => {
            // Effective config after all layers, without validation so a
            // broken file can still be inspected
            let config = load_config(cli)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
        ConfigAction::Dump => {
            print!("{}", Config::default().to_toml()?);
        }
    }
    Ok(())
}
