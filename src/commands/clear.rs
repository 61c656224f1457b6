//! Clear command handler: delete stored posts and episodes.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Result, bail};
use tracing::info;

use super::open_store;
use crate::cli::ClearArgs;
use crate::config::Settings;

pub async fn run_clear_command(args: &ClearArgs, settings: &Settings) -> Result<()> {
    let clear_posts = args.all || args.posts;
    let clear_episodes = args.all || args.episodes;
    if !clear_posts && !clear_episodes {
        bail!("Nothing to clear\n  Suggestion: pass --posts, --episodes or --all");
    }

    let store = open_store(settings).await?;
    let posts = if clear_posts { store.count_posts().await? } else { 0 };
    let episodes = if clear_episodes {
        store.count_episodes().await?
    } else {
        0
    };

    if !args.force && !confirm(&format!("Delete {posts} posts and {episodes} episodes?"))? {
        println!("Aborted");
        return Ok(());
    }

    // Episodes first: their post links go with them.
    if clear_episodes {
        let removed = store.clear_episodes().await?;
        info!(removed, "Cleared episodes");
        println!("Deleted {removed} episodes");
    }
    if clear_posts {
        let removed = store.clear_posts().await?;
        info!(removed, "Cleared posts");
        println!("Deleted {removed} posts");
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        bail!("Refusing to clear without confirmation\n  Suggestion: pass --force");
    }
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
