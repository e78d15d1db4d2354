//! Microblog Graph - users, posts and the follow graph between them.
//!
//! This crate provides the core of the microblog:
//!
//! - **Schema**: User and Post records
//! - **Storage**: SQLite-backed entity store with referential integrity
//! - **Follow**: idempotent follow/unfollow and follower queries
//! - **Feed**: per-user feed composition, newest first
//!
//! # Example
//!
//! ```ignore
//! use microblog_graph::{EntityStore, FeedComposer, FollowGraph, NewPost, NewUser};
//!
//! EntityStore::init_schema(&pool).await?;
//! let store = EntityStore::new(pool);
//!
//! let admin = store.create_user(&NewUser::new("admin", "admin@example.com")).await?;
//! let susan = store.create_user(&NewUser::new("susan", "susan@example.com")).await?;
//! store.create_post(&NewPost::now(susan.id, "hello")).await?;
//!
//! FollowGraph::follow(&store, &admin, &susan).await?;
//! let feed = FeedComposer::followed_posts(&store, &admin).await?;
//! ```

pub mod error;
pub mod feed;
pub mod follow;
pub mod schema;
pub mod storage;

pub use error::{GraphError, Result};
pub use feed::{Feed, FeedComposer};
pub use follow::FollowGraph;
pub use schema::{Entity, NewPost, NewUser, Post, User};
pub use storage::EntityStore;

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::sqlite::SqlitePoolOptions;

    use crate::schema::{NewUser, User};
    use crate::storage::EntityStore;

    pub async fn memory_store() -> EntityStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        EntityStore::init_schema(&pool).await.unwrap();
        EntityStore::new(pool)
    }

    pub async fn register(store: &EntityStore, username: &str) -> User {
        store
            .create_user(&NewUser::new(username, format!("{username}@example.com")))
            .await
            .unwrap()
    }
}
