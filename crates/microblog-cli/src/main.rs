use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use microblog_core::{Core, MicroblogPaths};

mod commands;
mod ui;

#[derive(Parser)]
#[command(name = "microblog")]
#[command(about = "Post, follow, and read your feed.")]
#[command(version)]
struct Cli {
    /// Data directory (defaults to $MICROBLOG_DATA_DIR, then ~/.microblog)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new account
    Register {
        username: String,
        email: String,
    },

    /// Publish a post
    Post {
        /// Author of the post
        username: String,
        body: String,
    },

    /// Start following another user
    Follow {
        follower: String,
        followed: String,
    },

    /// Stop following another user
    Unfollow {
        follower: String,
        followed: String,
    },

    /// Show a user's feed, newest first
    Feed {
        username: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a user's posts, followers and followed accounts
    Profile {
        username: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show record counts
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logs (hidden by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let paths = match cli.data_dir {
        Some(dir) => MicroblogPaths::from_base(dir),
        None => MicroblogPaths::from_env(),
    };
    let core = Core::init(&paths).await?;

    match cli.command {
        Commands::Register { username, email } => {
            commands::account::register(&core, &username, &email).await
        }
        Commands::Post { username, body } => commands::account::post(&core, &username, &body).await,
        Commands::Follow { follower, followed } => {
            commands::follow::follow(&core, &follower, &followed).await
        }
        Commands::Unfollow { follower, followed } => {
            commands::follow::unfollow(&core, &follower, &followed).await
        }
        Commands::Feed { username, json } => commands::feed::run(&core, &username, json).await,
        Commands::Profile { username, json } => {
            commands::profile::run(&core, &username, json).await
        }
        Commands::Stats { json } => commands::profile::stats(&core, json).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_follow() {
        let cli = Cli::try_parse_from(["microblog", "follow", "admin", "susan"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Follow { ref follower, ref followed } if follower == "admin" && followed == "susan"
        ));
        assert!(cli.data_dir.is_none());
    }

    #[test]
    fn test_parse_feed_json_with_data_dir() {
        let cli =
            Cli::try_parse_from(["microblog", "feed", "admin", "--json", "--data-dir", "/tmp/mb"])
                .unwrap();
        assert!(matches!(cli.command, Commands::Feed { json: true, .. }));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/mb")));
    }
}
