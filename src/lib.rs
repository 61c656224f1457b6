//! Threadcast Core Library
//!
//! Turns forum threads into two-host audio episodes: posts are fetched with
//! a rate-limit-aware client, stored in `SQLite`, optionally scored by a
//! language model, written up as a tagged dialogue script and rendered to
//! audio by a pluggable text-to-speech backend.
//!
//! # Architecture
//!
//! - [`fetch`] - Rate-limited HTTP client and listing/feed adapters
//! - [`ingest`] - Fetch-and-store pipeline for source groups
//! - [`db`] / [`store`] - Database connection and persistence
//! - [`llm`] / [`scorer`] - Language-model providers and post scoring
//! - [`transcript`] - Speaker-turn segmentation and pause timing
//! - [`audio`] / [`tts`] - Clips, chunking, assembly and speech backends
//! - [`episode`] - Post selection, script writing and episode generation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod audio;
pub mod db;
pub mod episode;
pub mod fetch;
pub mod ingest;
pub mod llm;
pub mod scorer;
pub mod store;
pub mod transcript;
pub mod tts;

// Re-export commonly used types
pub use db::Database;
pub use episode::{EpisodeError, EpisodeGenerator, EpisodeRequest};
pub use fetch::{ClientConfig, FetchError, RedditClient};
pub use store::{Store, StoreError};
pub use tts::{SpeechBackend, TtsError};
