//! Test-voices command handler: render and optionally play a short sample.

use std::path::Path;

use anyhow::{Context, Result, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;
use threadcast_core::transcript::parse_transcript;
use threadcast_core::tts::render;
use tokio::process::Command;
use tracing::{info, warn};

use super::{build_backend, spinner};
use crate::cli::TestVoicesArgs;
use crate::config::Settings;

const SAMPLE_SCRIPT: &str = include_str!("../../assets/voice_test.txt");

/// Players tried in order when `player_command` is not configured.
const PLAYERS: [&str; 3] = ["afplay", "ffplay", "aplay"];

pub async fn run_test_voices_command(
    args: &TestVoicesArgs,
    settings: &Settings,
    show_progress: bool,
) -> Result<()> {
    let backend = build_backend(settings, args.tts.as_deref())?;
    let utterances = parse_transcript(SAMPLE_SCRIPT);
    let path = settings.test_audio_dir.join(format!(
        "{}_test.{}",
        backend.name(),
        settings.audio_format.extension()
    ));
    let mut rng = match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let progress = spinner(show_progress);
    let rendered = render(
        backend.as_ref(),
        &utterances,
        &mut rng,
        &path,
        settings.audio_format,
        &mut |step| progress.set_message(format!("Synthesizing {}/{}", step.done, step.total)),
    )
    .await;
    progress.finish_and_clear();
    let rendered = rendered?;

    println!(
        "Rendered {:.1}s sample with {} to {}",
        rendered.duration_secs,
        backend.model_label(),
        rendered.path.display()
    );

    if args.play {
        play(settings.player_command.as_deref(), &rendered.path).await?;
    }
    Ok(())
}

/// Plays `path`, stopping cleanly on Ctrl+C.
async fn play(player_command: Option<&str>, path: &Path) -> Result<()> {
    let mut words = match player_command {
        Some(command) => command.split_whitespace().map(str::to_string).collect::<Vec<_>>(),
        None => {
            let Some(found) = PLAYERS.iter().find(|name| which::which(name).is_ok()) else {
                bail!(
                    "No audio player found (tried {})\n  Suggestion: set player_command in the config file",
                    PLAYERS.join(", ")
                );
            };
            vec![(*found).to_string()]
        }
    };
    if words.is_empty() {
        bail!("player_command is empty");
    }
    let program = words.remove(0);

    let mut command = Command::new(&program);
    command.args(&words);
    if program == "ffplay" && words.is_empty() {
        command.args(["-nodisp", "-autoexit", "-loglevel", "error"]);
    }
    let mut child = command
        .arg(path)
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start player '{program}'"))?;
    info!(player = %program, "Playing sample");

    tokio::select! {
        status = child.wait() => {
            let status = status?;
            if !status.success() {
                warn!(player = %program, %status, "Player exited with an error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            child.kill().await.ok();
            println!("Playback stopped");
        }
    }
    Ok(())
}
