use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;
use rand::Rng;
use tracing::{info, instrument, warn};

use super::content::{episode_description, episode_title, format_post, format_post_with_replies};
use super::gen_log::{GenerationRecord, append_generation_log, git_info};
use super::{EpisodeError, ScriptWriter, SelectionMode, select_posts};
use crate::audio::AudioFormat;
use crate::fetch::RedditClient;
use crate::ingest::DEFAULT_COMMENT_LIMIT;
use crate::scorer::ContentScorer;
use crate::store::{CandidateFilter, Episode, NewEpisode, Post, Reply, Store};
use crate::transcript::parse_transcript;
use crate::tts::{SpeechBackend, SynthesisProgress, render};

/// What to generate.
#[derive(Debug, Clone)]
pub struct EpisodeRequest {
    /// Owner of the episode; created when missing.
    pub user: String,
    /// Posts to include.
    pub count: usize,
    /// Restrict selection to these subreddits when non-empty.
    pub subreddits: Vec<String>,
    pub mode: SelectionMode,
    pub include_covered: bool,
    pub longform: bool,
    /// Score posts and pull replies for the ones worth a deep dive.
    pub smart: bool,
    pub format: AudioFormat,
}

/// Where generated files go.
#[derive(Debug, Clone)]
pub struct GeneratorPaths {
    pub output_dir: PathBuf,
    pub transcript_dir: PathBuf,
    /// CSV log of runs; `None` disables logging.
    pub generation_log: Option<PathBuf>,
}

/// Progress notifications emitted while generating.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateEvent {
    Selected {
        count: usize,
    },
    Analyzed {
        title: String,
        score: u8,
        /// Replies quoted for the post, when it was picked for a deep dive.
        replies: Option<usize>,
    },
    WritingScript {
        done: usize,
        total: usize,
    },
    TranscriptSaved {
        path: PathBuf,
    },
    Synthesizing(SynthesisProgress),
    Recorded {
        episode_id: i64,
    },
}

/// A recorded episode with run statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedEpisode {
    pub episode: Episode,
    pub posts_with_replies: usize,
    /// 1-based chunk indices dropped by content moderation.
    pub skipped_chunks: Vec<usize>,
    pub render_seconds: f64,
    pub llm_model: String,
    pub tts_model: String,
}

/// Runs select → enrich → write → synthesize → record for one episode.
pub struct EpisodeGenerator<'a> {
    store: &'a Store,
    writer: ScriptWriter,
    backend: &'a dyn SpeechBackend,
    paths: GeneratorPaths,
    scorer: Option<ContentScorer>,
    reply_client: Option<&'a RedditClient>,
    reply_limit: usize,
}

impl std::fmt::Debug for EpisodeGenerator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpisodeGenerator")
            .field("writer", &self.writer)
            .field("backend", &self.backend.name())
            .field("paths", &self.paths)
            .field("smart", &self.scorer.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> EpisodeGenerator<'a> {
    #[must_use]
    pub fn new(
        store: &'a Store,
        writer: ScriptWriter,
        backend: &'a dyn SpeechBackend,
        paths: GeneratorPaths,
    ) -> Self {
        Self {
            store,
            writer,
            backend,
            paths,
            scorer: None,
            reply_client: None,
            reply_limit: DEFAULT_COMMENT_LIMIT,
        }
    }

    /// Enables post scoring for smart enrichment.
    #[must_use]
    pub fn with_scorer(mut self, scorer: ContentScorer) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Client used to fetch replies for posts stored without any.
    #[must_use]
    pub fn with_reply_client(mut self, client: &'a RedditClient) -> Self {
        self.reply_client = Some(client);
        self
    }

    /// Generates and records one episode.
    ///
    /// # Errors
    ///
    /// - [`EpisodeError::NoCandidates`] when nothing is left to cover
    /// - [`EpisodeError::Script`] when the script cannot be written
    /// - [`EpisodeError::NoSegments`] when the script has no speaker turns
    /// - [`EpisodeError::Tts`] for synthesis or export failures
    /// - [`EpisodeError::Store`] for database failures
    #[instrument(skip(self, rng, on_event), fields(user = %request.user, count = request.count))]
    pub async fn generate<R: Rng + ?Sized>(
        &self,
        request: &EpisodeRequest,
        rng: &mut R,
        on_event: &mut (dyn FnMut(GenerateEvent) + Send),
    ) -> Result<GeneratedEpisode, EpisodeError> {
        let started = Instant::now();
        let user = self.store.get_or_create_user(&request.user).await?;

        let filter = CandidateFilter {
            user_id: user.id,
            include_covered: request.include_covered,
            subreddits: request.subreddits.clone(),
        };
        let posts = select_posts(self.store, &filter, request.mode, request.count, rng).await?;
        on_event(GenerateEvent::Selected { count: posts.len() });

        let (parts, posts_with_replies) = self.prepare_content(&posts, request.smart, on_event).await;
        info!(
            posts = parts.len(),
            with_replies = posts_with_replies,
            "Prepared posts"
        );

        let script = self
            .writer
            .write(&parts, request.longform, &mut |done, total| {
                on_event(GenerateEvent::WritingScript { done, total });
            })
            .await?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let file_stem = format!("{}_{stamp}", user.name);
        let transcript_path = self
            .save_transcript(&file_stem, &script)
            .await
            .map(|path| {
                on_event(GenerateEvent::TranscriptSaved { path: path.clone() });
                path.display().to_string()
            })
            .unwrap_or_default();

        let utterances = parse_transcript(&script);
        if utterances.is_empty() {
            return Err(EpisodeError::NoSegments);
        }

        let audio_path = self
            .paths
            .output_dir
            .join(format!("{file_stem}.{}", request.format.extension()));
        let rendered = render(
            self.backend,
            &utterances,
            rng,
            &audio_path,
            request.format,
            &mut |progress| on_event(GenerateEvent::Synthesizing(progress)),
        )
        .await?;
        let audio_path = absolute(&rendered.path);

        let episode = self
            .store
            .record_episode(&NewEpisode {
                title: episode_title(&request.subreddits, &posts),
                description: episode_description(posts.len()),
                transcript_path,
                audio_path: audio_path.display().to_string(),
                duration_seconds: rendered.duration_secs,
                user_id: user.id,
                post_ids: posts.iter().map(|post| post.id).collect(),
            })
            .await?;
        on_event(GenerateEvent::Recorded {
            episode_id: episode.id,
        });

        let generated = GeneratedEpisode {
            episode,
            posts_with_replies,
            skipped_chunks: rendered.skipped_chunks,
            render_seconds: started.elapsed().as_secs_f64(),
            llm_model: self.writer.model_name(),
            tts_model: self.backend.model_label(),
        };
        self.log_run(&generated, request.longform).await;
        Ok(generated)
    }

    async fn prepare_content(
        &self,
        posts: &[Post],
        smart: bool,
        on_event: &mut (dyn FnMut(GenerateEvent) + Send),
    ) -> (Vec<String>, usize) {
        let Some(scorer) = self.scorer.as_ref().filter(|_| smart) else {
            return (posts.iter().map(format_post).collect(), 0);
        };

        let mut parts = Vec::with_capacity(posts.len());
        let mut with_replies = 0;
        for post in posts {
            let analysis = scorer.analyze(post).await;
            if analysis.should_fetch {
                let replies = self.replies_for(post).await;
                on_event(GenerateEvent::Analyzed {
                    title: post.title.clone(),
                    score: analysis.score,
                    replies: Some(replies.len()),
                });
                parts.push(format_post_with_replies(post, &replies));
                with_replies += 1;
            } else {
                on_event(GenerateEvent::Analyzed {
                    title: post.title.clone(),
                    score: analysis.score,
                    replies: None,
                });
                parts.push(format_post(post));
            }
        }
        (parts, with_replies)
    }

    /// Stored replies, or a live fetch when none were stored.
    async fn replies_for(&self, post: &Post) -> Vec<Reply> {
        if !post.comments.is_empty() {
            return post.comments.clone();
        }
        match self.reply_client {
            Some(client) => client.fetch_comments(&post.url, self.reply_limit).await.replies,
            None => Vec::new(),
        }
    }

    async fn save_transcript(&self, file_stem: &str, script: &str) -> Option<PathBuf> {
        let path = self.paths.transcript_dir.join(format!("{file_stem}.txt"));
        let result = async {
            tokio::fs::create_dir_all(&self.paths.transcript_dir).await?;
            tokio::fs::write(&path, script).await
        }
        .await;
        match result {
            Ok(()) => Some(absolute(&path)),
            Err(error) => {
                warn!(path = %path.display(), %error, "Could not save transcript");
                None
            }
        }
    }

    async fn log_run(&self, generated: &GeneratedEpisode, longform: bool) {
        let Some(log_path) = &self.paths.generation_log else {
            return;
        };
        let (commit_hash, dirty) = git_info().await;
        let record = GenerationRecord {
            commit_hash,
            dirty,
            post_count: usize::try_from(generated.episode.post_count).unwrap_or_default(),
            llm_model: generated.llm_model.clone(),
            tts_model: generated.tts_model.clone(),
            render_seconds: generated.render_seconds,
            longform,
            duration_seconds: generated.episode.duration_seconds,
        };
        if let Err(error) = append_generation_log(log_path, &record) {
            warn!(path = %log_path.display(), %error, "Could not append generation log");
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
