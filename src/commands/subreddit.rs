//! Subreddit command handlers: a user's followed list.

use anyhow::Result;
use threadcast_core::fetch::normalize_subreddit;

use super::open_store;
use crate::cli::SubredditCommand;
use crate::config::Settings;

pub async fn run_subreddit_command(command: &SubredditCommand, settings: &Settings) -> Result<()> {
    let store = open_store(settings).await?;
    match command {
        SubredditCommand::Add { name, user } => {
            let user = store.current_user(user.as_deref()).await?;
            let name = normalize_subreddit(name);
            if store.add_subreddit(user.id, &name).await? {
                println!("{} now follows r/{name}", user.name);
            } else {
                println!("{} already follows r/{name}", user.name);
            }
        }
        SubredditCommand::List { user } => {
            let user = store.current_user(user.as_deref()).await?;
            let subreddits = store.list_subreddits(user.id).await?;
            if subreddits.is_empty() {
                println!("{} follows no subreddits", user.name);
            }
            for subreddit in subreddits {
                println!("r/{subreddit}");
            }
        }
        SubredditCommand::Remove { name, user } => {
            let user = store.current_user(user.as_deref()).await?;
            let name = normalize_subreddit(name);
            if store.remove_subreddit(user.id, &name).await? {
                println!("{} no longer follows r/{name}", user.name);
            } else {
                println!("{} was not following r/{name}", user.name);
            }
        }
    }
    Ok(())
}
