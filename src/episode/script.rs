//! Dialogue script generation through a language model.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::llm::{LanguageModel, LlmError};

pub const PODCAST_NAME: &str = "Reddit Digest";
pub const PODCAST_TAGLINE: &str = "Your Daily Dose of Reddit";

const SHORTFORM_PROMPT: &str = include_str!("../prompts/transcript_shortform.txt");
const LONGFORM_PROMPT: &str = include_str!("../prompts/transcript_longform.txt");

const SHORTFORM_MAX_TOKENS: u32 = 8192;
const SEGMENT_MAX_TOKENS: u32 = 4096;

/// Trailing characters of the running script shown to the next segment.
const CONTEXT_CHARS: usize = 1500;

/// Writes `<Person1>`/`<Person2>` tagged scripts from formatted posts.
#[derive(Clone)]
pub struct ScriptWriter {
    model: Arc<dyn LanguageModel>,
}

impl std::fmt::Debug for ScriptWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptWriter")
            .field("provider", &self.model.provider())
            .field("model", &self.model.model())
            .finish()
    }
}

impl ScriptWriter {
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// `provider/model` of the underlying model.
    #[must_use]
    pub fn model_name(&self) -> String {
        format!("{}/{}", self.model.provider(), self.model.model())
    }

    /// Writes the whole script.
    ///
    /// Shortform sends every post in one request. Longform sends one request
    /// per post, each seeing the tail of the script so far, and joins the
    /// segments in order. `on_segment(done, total)` fires after each request.
    ///
    /// # Errors
    ///
    /// Propagates the first model failure.
    #[instrument(skip(self, posts, on_segment), fields(posts = posts.len(), model = %self.model.model()))]
    pub async fn write(
        &self,
        posts: &[String],
        longform: bool,
        on_segment: &mut (dyn FnMut(usize, usize) + Send),
    ) -> Result<String, LlmError> {
        if !longform || posts.len() <= 1 {
            let content = super::content::join_posts(posts);
            let prompt = fill(SHORTFORM_PROMPT, &[("{content}", content.as_str())]);
            let script = self.model.complete(&prompt, SHORTFORM_MAX_TOKENS).await?;
            on_segment(1, 1);
            info!(chars = script.len(), "Script written");
            return Ok(script.trim().to_string());
        }

        let total = posts.len();
        let mut segments: Vec<String> = Vec::with_capacity(total);
        for (index, post) in posts.iter().enumerate() {
            let previous = segments.last().map_or("(this is the start of the show)", |last| {
                tail_chars(last, CONTEXT_CHARS)
            });
            let part = (index + 1).to_string();
            let total_text = total.to_string();
            let prompt = fill(
                LONGFORM_PROMPT,
                &[
                    ("{part}", part.as_str()),
                    ("{total}", total_text.as_str()),
                    ("{position}", position_instructions(index, total)),
                    ("{previous}", previous),
                    ("{content}", post.as_str()),
                ],
            );
            let segment = self.model.complete(&prompt, SEGMENT_MAX_TOKENS).await?;
            debug!(part = index + 1, chars = segment.len(), "Segment written");
            segments.push(segment.trim().to_string());
            on_segment(index + 1, total);
        }

        let script = segments.join("\n");
        info!(chars = script.len(), segments = total, "Longform script written");
        Ok(script)
    }
}

fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut text = template
        .replace("{podcast_name}", PODCAST_NAME)
        .replace("{podcast_tagline}", PODCAST_TAGLINE);
    for (key, value) in values {
        text = text.replace(key, value);
    }
    text
}

fn position_instructions(index: usize, total: usize) -> &'static str {
    if index == 0 {
        "This is the opening segment: welcome listeners to the show and introduce the first post. Do not say goodbye."
    } else if index + 1 == total {
        "This is the closing segment: continue naturally from the previous segment without greeting listeners again, then wrap up the episode with a short sign-off."
    } else {
        "This is a middle segment: continue naturally from the previous segment without greeting listeners again and without saying goodbye."
    }
}

fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    let start = text
        .char_indices()
        .nth(count - max)
        .map_or(0, |(offset, _)| offset);
    &text[start..]
}
