//! Text fed to the script writer, plus episode titles and sizing.

use std::collections::BTreeSet;

use crate::store::{Post, Reply};

/// Replies quoted per post.
pub const MAX_QUOTED_REPLIES: usize = 5;

/// Reply bodies longer than this many characters are cut.
pub const MAX_REPLY_CHARS: usize = 500;

/// Posts per episode when neither a count nor a duration is given.
pub const DEFAULT_POST_COUNT: usize = 5;

/// Observed audio per post in longform episodes.
pub const SECONDS_PER_POST_LONGFORM: u32 = 180;

/// Observed audio per post in shortform episodes.
pub const SECONDS_PER_POST_SHORTFORM: u32 = 50;

/// Separator between posts in the writer input.
pub const POST_SEPARATOR: &str = "\n---\n\n";

const TITLE_SUBREDDITS: usize = 3;

/// `**title**`, the source line and the body, without replies.
#[must_use]
pub fn format_post(post: &Post) -> String {
    let mut text = format!("**{}**\nFrom r/{} by {}\n", post.title, post.subreddit, post.author);
    if let Some(content) = post.content.as_deref().filter(|c| !c.is_empty()) {
        text.push_str(content);
        text.push('\n');
    }
    text
}

/// A post followed by its top replies.
///
/// At most [`MAX_QUOTED_REPLIES`] replies are quoted and each body is cut to
/// [`MAX_REPLY_CHARS`] characters with `...` appended.
#[must_use]
pub fn format_post_with_replies(post: &Post, replies: &[Reply]) -> String {
    let mut lines = vec![
        format!("**{}**", post.title),
        format!("From r/{} by {}", post.subreddit, post.author),
    ];
    if let Some(content) = post.content.as_deref().filter(|c| !c.is_empty()) {
        lines.push(format!("\n{content}"));
    }
    if !replies.is_empty() {
        lines.push("\n**Top Comments:**".to_string());
        for (index, reply) in replies.iter().take(MAX_QUOTED_REPLIES).enumerate() {
            lines.push(format!(
                "{}. {} ({} points): {}",
                index + 1,
                reply.author,
                reply.score,
                truncate_chars(&reply.body, MAX_REPLY_CHARS)
            ));
        }
    }
    lines.join("\n")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Joins formatted posts into a single writer input.
#[must_use]
pub fn join_posts(parts: &[String]) -> String {
    parts.join(POST_SEPARATOR)
}

/// `Reddit Digest: r/a, r/b`.
///
/// Requested subreddits are listed in full. Otherwise the distinct
/// subreddits of `posts` are used, at most three, in first-seen order, with
/// `and N more` for the rest.
#[must_use]
pub fn episode_title(requested: &[String], posts: &[Post]) -> String {
    if !requested.is_empty() {
        let names: Vec<String> = requested.iter().map(|s| format!("r/{s}")).collect();
        return format!("Reddit Digest: {}", names.join(", "));
    }

    let mut seen = BTreeSet::new();
    let distinct: Vec<&str> = posts
        .iter()
        .map(|post| post.subreddit.as_str())
        .filter(|name| seen.insert(*name))
        .collect();
    let shown: Vec<String> = distinct
        .iter()
        .take(TITLE_SUBREDDITS)
        .map(|s| format!("r/{s}"))
        .collect();
    let mut title = format!("Reddit Digest: {}", shown.join(", "));
    if distinct.len() > TITLE_SUBREDDITS {
        title.push_str(&format!(" and {} more", distinct.len() - TITLE_SUBREDDITS));
    }
    title
}

#[must_use]
pub fn episode_description(post_count: usize) -> String {
    format!("Generated from {post_count} Reddit posts")
}

/// Posts needed for roughly `minutes` of longform audio; never less than one.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn posts_for_duration(minutes: u32) -> usize {
    let posts = (f64::from(minutes) * 60.0 / f64::from(SECONDS_PER_POST_LONGFORM)).round();
    (posts as usize).max(1)
}

/// Expected minutes of audio for `posts` posts.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn estimated_minutes(posts: usize, longform: bool) -> f64 {
    let per_post = if longform {
        SECONDS_PER_POST_LONGFORM
    } else {
        SECONDS_PER_POST_SHORTFORM
    };
    posts as f64 * f64::from(per_post) / 60.0
}
