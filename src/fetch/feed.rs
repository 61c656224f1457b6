//! Atom feed adapter for subreddit feeds.
//!
//! Feeds carry no popularity data, so posts built here always have
//! `score = 0` and `num_comments = 0`.

use std::sync::LazyLock;

use chrono::Utc;
use feed_rs::model::Entry;
use html_escape::decode_html_entities;
use regex::Regex;
use tracing::debug;

use crate::store::NewPost;

/// Author placeholder when a feed entry names nobody.
pub const UNKNOWN_AUTHOR: &str = "[unknown]";

/// Position of the post id in `https://host/r/<sub>/comments/<id>/<slug>/`.
const LINK_ID_SEGMENT: usize = 6;

#[allow(clippy::expect_used)]
static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex is valid"));

#[allow(clippy::expect_used)]
static WHITESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("whitespace regex is valid"));

/// Parses a feed document into posts for `subreddit`.
///
/// Entries without a usable id are skipped.
///
/// # Errors
///
/// Returns the parser's message when the document is not a feed.
pub fn parse_feed(bytes: &[u8], subreddit: &str) -> Result<Vec<NewPost>, String> {
    let feed = feed_rs::parser::parse(bytes).map_err(|e| e.to_string())?;
    let posts: Vec<NewPost> = feed
        .entries
        .into_iter()
        .filter_map(|entry| entry_to_post(entry, subreddit))
        .collect();
    debug!(subreddit, count = posts.len(), "Parsed feed entries");
    Ok(posts)
}

fn entry_to_post(entry: Entry, subreddit: &str) -> Option<NewPost> {
    let link = entry.links.first().map(|link| link.href.clone());
    let reddit_id = link
        .as_deref()
        .and_then(id_from_link)
        .or_else(|| id_from_entry_id(&entry.id))?;

    let title = entry
        .title
        .map(|text| decode_html_entities(&text.content).into_owned())
        .unwrap_or_default();
    let raw_body = entry
        .content
        .and_then(|content| content.body)
        .or_else(|| entry.summary.map(|text| text.content));
    let content = raw_body
        .map(|body| clean_markup(&body))
        .filter(|body| !body.is_empty());
    let author = entry
        .authors
        .first()
        .map(|person| person.name.trim_start_matches("/u/").to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    Some(NewPost {
        url: link.unwrap_or_default(),
        reddit_id,
        subreddit: subreddit.to_string(),
        title,
        content,
        author,
        score: 0,
        num_comments: 0,
        created_utc: entry.published.or(entry.updated).unwrap_or_else(Utc::now),
        comments: Vec::new(),
    })
}

fn id_from_link(link: &str) -> Option<String> {
    link.split('/')
        .nth(LINK_ID_SEGMENT)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

fn id_from_entry_id(entry_id: &str) -> Option<String> {
    entry_id
        .rsplit('_')
        .next()
        .filter(|suffix| !suffix.is_empty())
        .map(str::to_string)
}

/// Strips markup from an entry body and decodes HTML entities.
///
/// The "submitted by ... [link] [comments]" footer that feed bodies end with
/// is dropped.
#[must_use]
pub fn clean_markup(html: &str) -> String {
    let without_tags = TAG_PATTERN.replace_all(html, " ");
    let decoded = decode_html_entities(&without_tags);
    let body = match decoded.rfind("submitted by") {
        Some(index) => &decoded[..index],
        None => &decoded[..],
    };

    body.lines()
        .map(|line| WHITESPACE_PATTERN.replace_all(line.trim(), " ").into_owned())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>rust</title>
  <id>https://www.reddit.com/r/rust/.rss</id>
  <updated>2024-05-01T12:00:00+00:00</updated>
  <entry>
    <author><name>/u/ferris</name></author>
    <content type="html">&lt;div class="md"&gt;&lt;p&gt;Borrow checker &amp;amp; me&lt;/p&gt;&lt;/div&gt; submitted by &lt;a href="x"&gt;/u/ferris&lt;/a&gt;</content>
    <id>t3_abc123</id>
    <link href="https://www.reddit.com/r/rust/comments/abc123/hello_world/" />
    <updated>2024-05-01T12:00:00+00:00</updated>
    <published>2024-05-01T11:00:00+00:00</published>
    <title>Hello &amp;amp; welcome</title>
  </entry>
  <entry>
    <id>t3_zzz999</id>
    <updated>2024-05-01T12:00:00+00:00</updated>
    <title>No link</title>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed_builds_posts() {
        let posts = parse_feed(FEED.as_bytes(), "rust").unwrap();

        assert_eq!(posts.len(), 2);
        let first = &posts[0];
        assert_eq!(first.reddit_id, "abc123");
        assert_eq!(first.author, "ferris");
        assert_eq!(first.title, "Hello & welcome");
        assert_eq!(first.content.as_deref(), Some("Borrow checker & me"));
        assert_eq!(first.score, 0);
        assert_eq!(first.num_comments, 0);
        assert_eq!(first.created_utc.to_rfc3339(), "2024-05-01T11:00:00+00:00");
    }

    #[test]
    fn test_parse_feed_falls_back_to_entry_id_and_unknown_author() {
        let posts = parse_feed(FEED.as_bytes(), "rust").unwrap();

        let second = &posts[1];
        assert_eq!(second.reddit_id, "zzz999");
        assert_eq!(second.author, UNKNOWN_AUTHOR);
        assert_eq!(second.content, None);
    }

    #[test]
    fn test_parse_feed_rejects_garbage() {
        assert!(parse_feed(b"not a feed", "rust").is_err());
    }

    #[test]
    fn test_clean_markup_strips_tags_and_entities() {
        assert_eq!(
            clean_markup("<p>one &lt;two&gt;</p>\n<p>three</p>"),
            "one <two>\nthree"
        );
    }

    #[test]
    fn test_id_from_link_short_link_is_none() {
        assert_eq!(id_from_link("https://www.reddit.com/r/rust/"), None);
    }
}
