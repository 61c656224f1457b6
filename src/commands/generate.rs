//! Generate command handler: select posts, write a script, render audio.

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use threadcast_core::episode::content::{DEFAULT_POST_COUNT, estimated_minutes, posts_for_duration};
use threadcast_core::episode::{
    EpisodeGenerator, EpisodeRequest, GenerateEvent, GeneratorPaths, ScriptWriter, SelectionMode,
};
use threadcast_core::fetch::RedditClient;
use threadcast_core::scorer::ContentScorer;
use threadcast_core::store::{GLOBAL_USER, Store, StoreError};
use tracing::{info, warn};

use super::{build_backend, open_store, spinner};
use crate::cli::GenerateArgs;
use crate::config::Settings;

pub async fn run_generate_command(
    args: &GenerateArgs,
    settings: &Settings,
    show_progress: bool,
) -> Result<()> {
    let store = open_store(settings).await?;
    let user = resolve_user(&store, args.user.as_deref()).await?;
    let backend = build_backend(settings, args.tts.as_deref())?;
    let writer = ScriptWriter::new(
        settings
            .model(&settings.transcript_model)
            .context("Transcript model unavailable")?,
    );

    let count = match (args.limit, args.duration) {
        (Some(limit), _) => usize::try_from(limit).unwrap_or(DEFAULT_POST_COUNT),
        (None, Some(minutes)) => posts_for_duration(minutes),
        (None, None) => DEFAULT_POST_COUNT,
    };
    let longform = !args.shortform;
    info!(
        user = %user,
        count,
        estimated_minutes = estimated_minutes(count, longform),
        backend = backend.name(),
        "Generating episode"
    );

    let paths = GeneratorPaths {
        output_dir: args
            .output
            .clone()
            .unwrap_or_else(|| settings.output_dir.clone()),
        transcript_dir: settings.transcript_dir.clone(),
        generation_log: settings.generation_log.clone(),
    };
    let reply_client = RedditClient::new(settings.client_config())?;
    let mut generator = EpisodeGenerator::new(&store, writer, backend.as_ref(), paths);
    if !args.no_smart {
        match settings.model(&settings.scoring_model) {
            Ok(model) => {
                generator = generator
                    .with_scorer(ContentScorer::new(model))
                    .with_reply_client(&reply_client);
            }
            Err(error) => warn!(%error, "Scoring model unavailable; continuing without smart mode"),
        }
    }

    let request = EpisodeRequest {
        user,
        count,
        subreddits: args.subreddits.clone(),
        mode: if args.by_engagement {
            SelectionMode::ByEngagement
        } else {
            SelectionMode::Random
        },
        include_covered: args.include_covered_posts,
        longform,
        smart: !args.no_smart,
        format: args.format.unwrap_or(settings.audio_format),
    };
    let mut rng = match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let progress = spinner(show_progress);
    let generated = generator
        .generate(&request, &mut rng, &mut |event| match event {
            GenerateEvent::Selected { count } => {
                progress.set_message(format!("Selected {count} posts"));
            }
            GenerateEvent::Analyzed {
                title,
                score,
                replies,
            } => {
                let detail = replies.map_or_else(String::new, |n| format!(", {n} replies"));
                progress.println(format!("  [{score}/10{detail}] {title}"));
            }
            GenerateEvent::WritingScript { done, total } => {
                progress.set_message(format!("Writing script {done}/{total}"));
            }
            GenerateEvent::TranscriptSaved { path } => {
                progress.println(format!("Transcript: {}", path.display()));
            }
            GenerateEvent::Synthesizing(step) => {
                progress.set_message(format!("Synthesizing {}/{}", step.done, step.total));
            }
            GenerateEvent::Recorded { episode_id } => {
                progress.set_message(format!("Recorded episode {episode_id}"));
            }
        })
        .await;
    progress.finish_and_clear();
    let generated = generated?;

    let episode = &generated.episode;
    println!("{}", episode.title);
    println!("  audio: {}", episode.audio_path);
    if let Some(seconds) = episode.duration_seconds {
        println!("  duration: {:.1} min", seconds / 60.0);
    }
    println!(
        "  posts: {} ({} with replies)",
        episode.post_count, generated.posts_with_replies
    );
    if !generated.skipped_chunks.is_empty() {
        let skipped: Vec<String> = generated
            .skipped_chunks
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("  skipped chunks: {}", skipped.join(", "));
    }
    Ok(())
}

/// The named user, else the only authenticated one, else the shared pool.
async fn resolve_user(store: &Store, name: Option<&str>) -> Result<String> {
    if let Some(name) = name {
        return Ok(name.to_string());
    }
    match store.current_user(None).await {
        Ok(user) => Ok(user.name),
        Err(StoreError::NoUsers) => Ok(GLOBAL_USER.to_string()),
        Err(error) => Err(error.into()),
    }
}
