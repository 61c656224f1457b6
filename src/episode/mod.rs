//! Episode assembly: post selection, script writing, synthesis and recording.
//!
//! # Overview
//!
//! - [`select_posts`] - Chooses posts from the user's unused pool
//! - [`content`] - Writer input formatting, titles and sizing
//! - [`ScriptWriter`] - Turns formatted posts into a two-host script
//! - [`EpisodeGenerator`] - Runs the whole pipeline and records the episode
//! - [`append_generation_log`] - CSV log of generation runs

pub mod content;
mod gen_log;
mod generator;
mod script;
mod selector;

pub use gen_log::{GenerationRecord, LOG_HEADER, append_generation_log, git_info};
pub use generator::{
    EpisodeGenerator, EpisodeRequest, GenerateEvent, GeneratedEpisode, GeneratorPaths,
};
pub use script::{PODCAST_NAME, PODCAST_TAGLINE, ScriptWriter};
pub use selector::{RANDOM_WINDOW_FACTOR, SelectionMode, select_posts};

use thiserror::Error;

use crate::llm::LlmError;
use crate::store::StoreError;
use crate::tts::TtsError;

/// Errors that abort episode generation.
#[derive(Debug, Error)]
pub enum EpisodeError {
    #[error(
        "no posts available for a new episode\n  Suggestion: run `threadcast fetch` first or pass --include-covered-posts"
    )]
    NoCandidates,

    #[error("no speaker segments found in transcript")]
    NoSegments,

    #[error("transcript generation failed: {0}")]
    Script(#[from] LlmError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tts(#[from] TtsError),
}
