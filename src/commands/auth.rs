//! Auth command handlers: users and their API tokens.

use anyhow::{Context, Result, bail};
use threadcast_core::fetch::RedditClient;
use tracing::info;

use super::open_store;
use crate::cli::AuthCommand;
use crate::config::Settings;

pub async fn run_auth_command(command: &AuthCommand, settings: &Settings) -> Result<()> {
    let store = open_store(settings).await?;
    match command {
        AuthCommand::Login { name, token } => {
            let name = name.trim();
            if name.is_empty() {
                bail!("User name must not be empty");
            }
            let user = store.get_or_create_user(name).await?;
            if let Some(token) = token {
                let client = RedditClient::new(settings.client_config())?;
                let account = client
                    .verify_token(token)
                    .await
                    .context("Token verification failed")?;
                store.set_access_token(user.id, Some(token)).await?;
                info!(user = %user.name, %account, "Stored verified token");
                println!("Logged in as '{}' (account {account})", user.name);
            } else {
                println!("User '{}' ready (public access)", user.name);
            }
        }
        AuthCommand::Status => {
            let users = store.authenticated_users().await?;
            if users.is_empty() {
                println!("No users. Run `threadcast auth login <name>` to add one.");
            }
            for user in users {
                let subreddits = store.list_subreddits(user.id).await?;
                println!(
                    "{}  token: {}  subreddits: {}",
                    user.name,
                    if user.access_token.is_some() { "yes" } else { "no" },
                    subreddits.len()
                );
            }
        }
        AuthCommand::Logout { name } => {
            if !store.delete_user(name).await? {
                bail!("User not found: {name}");
            }
            println!("Removed user '{name}'");
        }
    }
    Ok(())
}
