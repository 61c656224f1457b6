//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use threadcast_core::audio::AudioFormat;
use threadcast_core::fetch::{Sort, TimeFilter};
use threadcast_core::ingest::{DEFAULT_COMMENT_LIMIT, Source};

/// Turn forum threads into two-host audio episodes.
///
/// Fetch posts from subreddits, then generate a scripted conversation about
/// them and render it to audio with a text-to-speech backend.
#[derive(Parser, Debug)]
#[command(name = "threadcast")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch posts and replies into the local database
    Fetch(FetchArgs),
    /// Generate an episode from stored posts
    Generate(GenerateArgs),
    /// Delete stored posts and/or episodes
    Clear(ClearArgs),
    /// Manage users and their API tokens
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
    /// Manage a user's followed subreddits
    Subreddit {
        #[command(subcommand)]
        command: SubredditCommand,
    },
    /// Render a short sample with the configured voices
    TestVoices(TestVoicesArgs),
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct FetchArgs {
    /// Subreddits to fetch (defaults to the user's followed list)
    pub subreddits: Vec<String>,

    /// Listing sort order
    #[arg(long, value_enum, default_value_t = Sort::Hot)]
    pub sort: Sort,

    /// Time window for top/controversial listings
    #[arg(long = "time", value_enum, default_value_t = TimeFilter::Day)]
    pub time_filter: TimeFilter,

    /// Posts per subreddit (1-1000)
    #[arg(short, long, default_value_t = 25, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub limit: u32,

    /// Replies kept per post
    #[arg(long, default_value_t = DEFAULT_COMMENT_LIMIT)]
    pub comments: usize,

    /// Listing source
    #[arg(long, value_enum, default_value_t = Source::Json)]
    pub source: Source,

    /// User whose followed list and token to use
    #[arg(short, long)]
    pub user: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct GenerateArgs {
    /// Number of posts to include (default 5)
    #[arg(short, long, conflicts_with = "duration", value_parser = clap::value_parser!(u32).range(1..=100))]
    pub limit: Option<u32>,

    /// Target length in minutes; picks the post count to match
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=600))]
    pub duration: Option<u32>,

    /// Only use posts from this subreddit (repeatable)
    #[arg(short, long = "subreddit")]
    pub subreddits: Vec<String>,

    /// Output directory for audio
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// One short script for all posts instead of a segment per post
    #[arg(long)]
    pub shortform: bool,

    /// Pick the most-engaged posts instead of a random sample
    #[arg(long)]
    pub by_engagement: bool,

    /// Speech backend (overrides config `tts_backend`)
    #[arg(long)]
    pub tts: Option<String>,

    /// Allow posts already used in this user's episodes
    #[arg(long)]
    pub include_covered_posts: bool,

    /// User the episode is generated for
    #[arg(short, long)]
    pub user: Option<String>,

    /// Skip post scoring and reply enrichment
    #[arg(long)]
    pub no_smart: bool,

    /// Audio container (overrides config `audio_format`)
    #[arg(long, value_enum)]
    pub format: Option<AudioFormat>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ClearArgs {
    /// Delete stored posts
    #[arg(long)]
    pub posts: bool,

    /// Delete recorded episodes
    #[arg(long)]
    pub episodes: bool,

    /// Delete posts and episodes
    #[arg(long, conflicts_with_all = ["posts", "episodes"])]
    pub all: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AuthCommand {
    /// Create or update a user, optionally storing an API token
    Login {
        name: String,
        /// OAuth bearer token; verified before it is stored
        #[arg(long)]
        token: Option<String>,
    },
    /// List users and whether they have a token
    Status,
    /// Remove a user with their subreddits and episodes
    Logout { name: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubredditCommand {
    /// Follow a subreddit
    Add {
        name: String,
        #[arg(short, long)]
        user: Option<String>,
    },
    /// List followed subreddits
    List {
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Stop following a subreddit
    Remove {
        name: String,
        #[arg(short, long)]
        user: Option<String>,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct TestVoicesArgs {
    /// Play the sample after rendering
    #[arg(long)]
    pub play: bool,

    /// Speech backend (overrides config `tts_backend`)
    #[arg(long)]
    pub tts: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
}
