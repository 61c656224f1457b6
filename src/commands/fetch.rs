//! Fetch command handler: ingest subreddit listings into the database.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use threadcast_core::fetch::{RateLimitWait, RedditClient, WaitObserver};
use threadcast_core::ingest::{IngestEvent, IngestOptions, Ingestor};
use tracing::info;

use super::{open_store, spinner};
use crate::cli::FetchArgs;
use crate::config::Settings;

pub async fn run_fetch_command(
    args: &FetchArgs,
    settings: &Settings,
    show_progress: bool,
) -> Result<()> {
    let store = open_store(settings).await?;

    let (subreddits, token) = if args.subreddits.is_empty() {
        let user = store.current_user(args.user.as_deref()).await?;
        let followed = store.list_subreddits(user.id).await?;
        if followed.is_empty() {
            bail!(
                "User '{}' follows no subreddits\n  Suggestion: Run `threadcast subreddit add <name>` or pass subreddits to fetch",
                user.name
            );
        }
        (followed, user.access_token)
    } else {
        let token = match args.user.as_deref() {
            Some(name) => store.current_user(Some(name)).await?.access_token,
            None => None,
        };
        (args.subreddits.clone(), token)
    };

    let progress = spinner(show_progress);
    let observer: WaitObserver = {
        let progress = progress.clone();
        Arc::new(move |wait: &RateLimitWait| {
            progress.set_message(format!(
                "Rate limited; retry {}/{} in {}s",
                wait.attempt, wait.max_retries, wait.seconds_left
            ));
        })
    };
    let client = RedditClient::new(settings.client_config())?
        .with_access_token(token)
        .with_wait_observer(observer);

    let options = IngestOptions {
        sort: args.sort,
        time_filter: args.time_filter,
        limit: args.limit,
        comment_limit: args.comments,
        source: args.source,
        comment_delay: Duration::from_millis(settings.comment_delay_ms),
        group_delay: Duration::from_millis(settings.group_delay_ms),
    };
    info!(
        groups = subreddits.len(),
        estimate_secs = options.estimate(subreddits.len()).as_secs(),
        "Fetching"
    );

    let ingestor = Ingestor::new(&client, &store, options);
    let report = ingestor
        .ingest_all(&subreddits, &mut |event| match event {
            IngestEvent::FetchingPosts { subreddit } => {
                progress.set_message(format!("r/{subreddit}: fetching posts"));
            }
            IngestEvent::FetchingComments {
                subreddit,
                index,
                total,
                eta,
            } => progress.set_message(format!(
                "r/{subreddit}: replies {index}/{total} (~{}s left)",
                eta.as_secs()
            )),
            IngestEvent::Saving { subreddit, count } => {
                progress.set_message(format!("r/{subreddit}: saving {count} posts"));
            }
            IngestEvent::GroupDone(group) => progress.println(format!(
                "r/{}: {} new, {} already stored",
                group.subreddit, group.inserted, group.already_stored
            )),
            IngestEvent::GroupFailed { subreddit, error } => {
                progress.println(format!("r/{subreddit}: failed: {error}"));
            }
        })
        .await;
    progress.finish_and_clear();

    println!(
        "Stored {} new posts from {} subreddits",
        report.total_inserted(),
        report.groups.len()
    );
    if report.groups.is_empty() && !report.failures.is_empty() {
        bail!("Every subreddit failed to fetch");
    }
    Ok(())
}
