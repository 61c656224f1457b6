//! CLI entry point for threadcast.

use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use threadcast_core::{EpisodeError, StoreError};
use tracing::debug;

mod cli;
mod commands;
mod config;

use cli::{Args, Command, ConfigCommand};
use config::{LoadedSettings, load_settings};

fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // .env values feed the environment layer of the settings
    dotenvy::dotenv().ok();

    let loaded = match load_settings(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(error) => {
            init_tracing(&args, None);
            eprintln!("Error: {error:#}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&args, Some(&loaded));
    debug!(?args, settings = ?loaded.settings, "Configuration resolved");

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("Error: failed to start runtime: {error}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&args, &loaded)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error:#}");
            if let Some(suggestion) = store_suggestion(&error) {
                eprintln!("  Suggestion: {suggestion}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Advice for database failures anywhere in the error chain.
fn store_suggestion(error: &anyhow::Error) -> Option<&'static str> {
    error
        .chain()
        .find_map(|cause| {
            cause.downcast_ref::<StoreError>().or_else(|| {
                match cause.downcast_ref::<EpisodeError>() {
                    Some(EpisodeError::Store(store)) => Some(store),
                    _ => None,
                }
            })
        })
        .and_then(StoreError::suggestion)
}

/// Priority: `RUST_LOG` > `-q` > `-v`/`-vv` > config `verbosity` > info.
fn init_tracing(args: &Args, loaded: Option<&LoadedSettings>) {
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => loaded.map_or("info", |loaded| loaded.settings.verbosity.filter_level()),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: &Args, loaded: &LoadedSettings) -> Result<()> {
    let settings = &loaded.settings;
    let show_progress = !args.quiet && std::io::stderr().is_terminal();

    match &args.command {
        Command::Fetch(fetch) => commands::run_fetch_command(fetch, settings, show_progress).await,
        Command::Generate(generate) => {
            commands::run_generate_command(generate, settings, show_progress).await
        }
        Command::Clear(clear) => commands::run_clear_command(clear, settings).await,
        Command::Auth { command } => commands::run_auth_command(command, settings).await,
        Command::Subreddit { command } => commands::run_subreddit_command(command, settings).await,
        Command::TestVoices(voices) => {
            commands::run_test_voices_command(voices, settings, show_progress).await
        }
        Command::Config {
            command: ConfigCommand::Show,
        } => commands::run_config_show_command(loaded),
    }
}
