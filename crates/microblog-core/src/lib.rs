use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{info, instrument};

pub mod config;

pub use config::{DatabaseSettings, Settings};
pub use microblog_graph::{
    EntityStore, Feed, FeedComposer, FollowGraph, GraphError, NewPost, NewUser, Post, User,
};

#[derive(Debug, Clone)]
pub struct MicroblogPaths {
    pub base_dir: PathBuf,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

impl MicroblogPaths {
    pub fn from_env() -> Self {
        if let Some(dir) = std::env::var_os("MICROBLOG_DATA_DIR") {
            return Self::from_base(PathBuf::from(dir));
        }
        if let Some(home) = std::env::var_os("HOME") {
            return Self::from_base(PathBuf::from(home).join(".microblog"));
        }
        Self::from_base(PathBuf::from(".microblog"))
    }

    pub fn from_base(base_dir: PathBuf) -> Self {
        let db_path = base_dir.join("microblog.db");
        let config_path = base_dir.join("microblog.toml");
        Self {
            base_dir,
            db_path,
            config_path,
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }

    /// Database file after applying `[database] path` from settings.
    pub fn resolve_db_path(&self, settings: &Settings) -> PathBuf {
        match &settings.database.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.base_dir.join(path),
            None => self.db_path.clone(),
        }
    }
}

/// A feed post joined with its author's username, for display.
#[derive(Debug, Clone, Serialize)]
pub struct FeedEntry {
    pub id: i64,
    pub author: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub user: User,
    pub following: Vec<String>,
    pub followers: Vec<String>,
    pub posts: Vec<Post>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub users: i64,
    pub posts: i64,
    pub follows: i64,
}

#[derive(Clone)]
pub struct Core {
    pub store: EntityStore,
    pub settings: Settings,
}

impl Core {
    pub async fn init(paths: &MicroblogPaths) -> Result<Self> {
        info!("Initializing microblog core...");
        paths.ensure_dirs()?;
        let settings = Settings::load(&paths.config_path)?;
        let db_path = paths.resolve_db_path(&settings);
        Self::open(&db_path, settings).await
    }

    /// Open (creating if needed) the database at `db_path`.
    #[instrument(skip(settings))]
    pub async fn open(db_path: &Path, settings: Settings) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::from_str("sqlite:")?
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(settings.database.max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

        if settings.database.wal {
            sqlx::query("PRAGMA journal_mode=WAL;").execute(&pool).await?;
        }
        EntityStore::init_schema(&pool).await?;

        Ok(Self {
            store: EntityStore::new(pool),
            settings,
        })
    }

    async fn user(&self, username: &str) -> Result<User> {
        Ok(self.store.get_user_by_username(username).await?)
    }

    pub async fn register(&self, username: &str, email: &str) -> Result<User> {
        let user = self
            .store
            .create_user(&NewUser::new(username, email))
            .await
            .with_context(|| format!("Failed to register {}", username))?;
        info!("Registered user {} (id {})", user.username, user.id);
        Ok(user)
    }

    pub async fn publish(&self, username: &str, body: &str) -> Result<Post> {
        let author = self.user(username).await?;
        Ok(self.store.create_post(&NewPost::now(author.id, body)).await?)
    }

    /// Returns false if `follower` already followed `followed`.
    pub async fn follow(&self, follower: &str, followed: &str) -> Result<bool> {
        let follower = self.user(follower).await?;
        let followed = self.user(followed).await?;
        Ok(FollowGraph::follow(&self.store, &follower, &followed).await?)
    }

    /// Returns false if `follower` was not following `followed`.
    pub async fn unfollow(&self, follower: &str, followed: &str) -> Result<bool> {
        let follower = self.user(follower).await?;
        let followed = self.user(followed).await?;
        Ok(FollowGraph::unfollow(&self.store, &follower, &followed).await?)
    }

    pub async fn feed(&self, username: &str) -> Result<Feed> {
        let user = self.user(username).await?;
        Ok(FeedComposer::followed_posts(&self.store, &user).await?)
    }

    /// The feed with author usernames resolved.
    pub async fn feed_entries(&self, username: &str) -> Result<Vec<FeedEntry>> {
        let feed = self.feed(username).await?;
        let mut authors: HashMap<i64, String> = HashMap::new();
        let mut entries = Vec::with_capacity(feed.len());

        for post in feed {
            if !authors.contains_key(&post.author_id) {
                let author = self.store.get_user(post.author_id).await?;
                authors.insert(author.id, author.username);
            }
            entries.push(FeedEntry {
                id: post.id,
                author: authors[&post.author_id].clone(),
                body: post.body,
                timestamp: post.timestamp,
            });
        }
        Ok(entries)
    }

    pub async fn profile(&self, username: &str) -> Result<Profile> {
        let user = self.user(username).await?;
        let following = FollowGraph::followed(&self.store, &user)
            .await?
            .into_iter()
            .map(|u| u.username)
            .collect();
        let followers = FollowGraph::followers(&self.store, &user)
            .await?
            .into_iter()
            .map(|u| u.username)
            .collect();
        let mut posts = self.store.posts_by_author(user.id).await?;
        posts.sort_by(microblog_graph::feed::newest_first);

        Ok(Profile {
            user,
            following,
            followers,
            posts,
        })
    }

    pub async fn stats(&self) -> Result<Stats> {
        Ok(Stats {
            users: self.store.user_count().await?,
            posts: self.store.post_count().await?,
            follows: self.store.edge_count().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_core() -> (tempfile::TempDir, Core) {
        let dir = tempfile::tempdir().unwrap();
        let paths = MicroblogPaths::from_base(dir.path().join("data"));
        let core = Core::init(&paths).await.unwrap();
        (dir, core)
    }

    #[test]
    fn test_resolve_db_path() {
        let paths = MicroblogPaths::from_base(PathBuf::from("/srv/microblog"));
        let mut settings = Settings::default();
        assert_eq!(
            paths.resolve_db_path(&settings),
            PathBuf::from("/srv/microblog/microblog.db")
        );

        settings.database.path = Some(PathBuf::from("other.db"));
        assert_eq!(
            paths.resolve_db_path(&settings),
            PathBuf::from("/srv/microblog/other.db")
        );

        settings.database.path = Some(PathBuf::from("/tmp/abs.db"));
        assert_eq!(paths.resolve_db_path(&settings), PathBuf::from("/tmp/abs.db"));
    }

    #[tokio::test]
    async fn test_init_creates_database() {
        let (dir, core) = temp_core().await;
        assert!(dir.path().join("data").join("microblog.db").exists());

        let stats = core.stats().await.unwrap();
        assert_eq!((stats.users, stats.posts, stats.follows), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_feed_through_core() {
        let (_dir, core) = temp_core().await;
        core.register("admin", "admin@example.com").await.unwrap();
        core.register("susan", "susan@example.com").await.unwrap();
        core.register("john", "john@example.com").await.unwrap();

        core.publish("susan", "Beautiful day!").await.unwrap();
        core.publish("john", "Not in admin's feed").await.unwrap();
        core.publish("admin", "Hello").await.unwrap();

        assert!(core.follow("admin", "susan").await.unwrap());
        assert!(!core.follow("admin", "susan").await.unwrap());

        let entries = core.feed_entries("admin").await.unwrap();
        let authors: Vec<_> = entries.iter().map(|e| e.author.as_str()).collect();
        assert_eq!(authors, vec!["admin", "susan"]);

        let profile = core.profile("susan").await.unwrap();
        assert_eq!(profile.followers, vec!["admin"]);
        assert!(profile.following.is_empty());
        assert_eq!(profile.posts.len(), 1);

        assert!(core.unfollow("admin", "susan").await.unwrap());
        assert!(!core.unfollow("admin", "susan").await.unwrap());
        assert_eq!(core.feed("admin").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_errors_surface_to_caller() {
        let (_dir, core) = temp_core().await;
        core.register("admin", "admin@example.com").await.unwrap();

        let err = core.register("admin", "x@example.com").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GraphError>(),
            Some(GraphError::AlreadyExists { field: "username", .. })
        ));

        let err = core.follow("admin", "nobody").await.unwrap_err();
        assert!(err
            .downcast_ref::<GraphError>()
            .is_some_and(GraphError::is_not_found));

        let err = core.follow("admin", "admin").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GraphError>(),
            Some(GraphError::InvalidOperand(_))
        ));
    }
}
