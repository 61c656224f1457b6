//! CLI command handlers.

mod auth;
mod clear;
mod config;
mod fetch;
mod generate;
mod subreddit;
mod voices;

pub use auth::run_auth_command;
pub use clear::run_clear_command;
pub use config::run_config_show_command;
pub use fetch::run_fetch_command;
pub use generate::run_generate_command;
pub use subreddit::run_subreddit_command;
pub use voices::run_test_voices_command;

use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use threadcast_core::db::Database;
use threadcast_core::store::Store;
use threadcast_core::tts::{SpeechBackend, build_default_backend_registry};

use crate::config::Settings;

/// Opens the configured database, running migrations.
pub(crate) async fn open_store(settings: &Settings) -> Result<Store> {
    let db = Database::new(&settings.database_path).await.with_context(|| {
        format!(
            "Failed to open database '{}'",
            settings.database_path.display()
        )
    })?;
    Ok(Store::new(db))
}

/// Builds the named speech backend, or the configured default.
pub(crate) fn build_backend(
    settings: &Settings,
    name: Option<&str>,
) -> Result<Box<dyn SpeechBackend>> {
    let name = name.unwrap_or(&settings.tts_backend);
    let registry = build_default_backend_registry();
    Ok(registry.build(name, &settings.tts_config())?)
}

/// A steady-ticking spinner, hidden when progress output is off.
pub(crate) fn spinner(show_progress: bool) -> ProgressBar {
    if !show_progress {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
