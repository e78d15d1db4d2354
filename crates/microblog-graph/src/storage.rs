//! Entity storage for SQLite.
//!
//! This module provides the `EntityStore` struct which owns every user, post
//! and follow edge. Mutation of the follow graph goes through
//! [`FollowGraph`](crate::follow::FollowGraph); the raw edge operations here
//! only guarantee that duplicate inserts and missing deletes are no-ops.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use crate::error::{GraphError, Result};
use crate::schema::{Entity, NewPost, NewUser, Post, User};

type UserRow = (i64, String, String, Option<String>, String);
type PostRow = (i64, String, String, i64);

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";
const POST_COLUMNS: &str = "id, body, timestamp, user_id";

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn user_from_row((id, username, email, password_hash, created_at): UserRow) -> Result<User> {
    Ok(User {
        id,
        username,
        email,
        password_hash,
        created_at: parse_time(&created_at)?,
    })
}

fn post_from_row((id, body, timestamp, author_id): PostRow) -> Result<Post> {
    Ok(Post {
        id,
        body,
        timestamp: parse_time(&timestamp)?,
        author_id,
    })
}

/// Entity storage backed by SQLite.
#[derive(Clone)]
pub struct EntityStore {
    pool: SqlitePool,
}

impl EntityStore {
    /// Create a new EntityStore with an existing connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the microblog schema (called during DB setup).
    #[instrument(skip_all)]
    pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT,
                created_at TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                body TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                user_id INTEGER NOT NULL REFERENCES users(id)
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS follows (
                follower_id INTEGER NOT NULL REFERENCES users(id),
                followed_id INTEGER NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL,
                PRIMARY KEY (follower_id, followed_id),
                CHECK (follower_id <> followed_id)
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_user ON posts(user_id)")
            .execute(pool)
            .await?;
        // (follower_id, ..) is covered by the primary key
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_follows_followed ON follows(followed_id)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Register a user. Username and email must both be unused.
    #[instrument(skip(self), fields(username = %new_user.username))]
    pub async fn create_user(&self, new_user: &NewUser) -> Result<User> {
        let created_at = Utc::now();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id",
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                // SQLite names the column: "UNIQUE constraint failed: users.email"
                if db.message().contains("users.email") {
                    GraphError::AlreadyExists {
                        field: "email",
                        value: new_user.email.clone(),
                    }
                } else {
                    GraphError::AlreadyExists {
                        field: "username",
                        value: new_user.username.clone(),
                    }
                }
            }
            other => GraphError::Database(other),
        })?;

        Ok(User {
            id,
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            created_at,
        })
    }

    /// Look up a user by id, if present.
    pub async fn find_user(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(user_from_row).transpose()
    }

    /// Get a user by id.
    pub async fn get_user(&self, id: i64) -> Result<User> {
        self.find_user(id)
            .await?
            .ok_or_else(|| GraphError::not_found(Entity::User, id))
    }

    /// Look up a user by username, if present.
    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(user_from_row).transpose()
    }

    /// Get a user by username.
    pub async fn get_user_by_username(&self, username: &str) -> Result<User> {
        self.find_user_by_username(username)
            .await?
            .ok_or_else(|| GraphError::not_found(Entity::User, username))
    }

    /// Store a post. The author must already exist.
    #[instrument(skip(self, new_post), fields(author_id = new_post.author_id))]
    pub async fn create_post(&self, new_post: &NewPost) -> Result<Post> {
        if self.find_user(new_post.author_id).await?.is_none() {
            return Err(GraphError::not_found(Entity::User, new_post.author_id));
        }

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO posts (body, timestamp, user_id)
             VALUES (?1, ?2, ?3)
             RETURNING id",
        )
        .bind(&new_post.body)
        .bind(new_post.timestamp.to_rfc3339())
        .bind(new_post.author_id)
        .fetch_one(&self.pool)
        .await?;

        debug!("Stored post {} for user {}", id, new_post.author_id);

        Ok(Post {
            id,
            body: new_post.body.clone(),
            timestamp: new_post.timestamp,
            author_id: new_post.author_id,
        })
    }

    /// Get a post by id.
    pub async fn get_post(&self, id: i64) -> Result<Post> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => post_from_row(row),
            None => Err(GraphError::not_found(Entity::Post, id)),
        }
    }

    /// All posts written by one user, oldest id first.
    pub async fn posts_by_author(&self, user_id: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE user_id = ?1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(post_from_row).collect()
    }

    /// Posts by `user_id` and by everyone `user_id` follows, oldest id first.
    ///
    /// The author set is resolved inside the statement, so the edges and the
    /// posts are read from one snapshot.
    pub async fn feed_posts(&self, user_id: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE user_id = ?1
                OR user_id IN (SELECT followed_id FROM follows WHERE follower_id = ?1)
             ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(post_from_row).collect()
    }

    /// Check whether the edge follower -> followed exists.
    pub async fn edge_exists(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    /// Insert the edge follower -> followed. Returns false if it already existed.
    #[instrument(skip(self))]
    pub async fn add_edge(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO follows (follower_id, followed_id, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(follower_id, followed_id) DO NOTHING",
        )
        .bind(follower_id)
        .bind(followed_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete the edge follower -> followed. Returns false if it was absent.
    #[instrument(skip(self))]
    pub async fn remove_edge(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2")
            .bind(follower_id)
            .bind(followed_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of users `user_id` follows.
    pub async fn followed_count(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE follower_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Number of users following `user_id`.
    pub async fn follower_count(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE followed_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Users that `user_id` follows, by username.
    pub async fn followed_users(&self, user_id: i64) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT u.id, u.username, u.email, u.password_hash, u.created_at
             FROM follows f JOIN users u ON u.id = f.followed_id
             WHERE f.follower_id = ?1
             ORDER BY u.username",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(user_from_row).collect()
    }

    /// Users following `user_id`, by username.
    pub async fn follower_users(&self, user_id: i64) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT u.id, u.username, u.email, u.password_hash, u.created_at
             FROM follows f JOIN users u ON u.id = f.follower_id
             WHERE f.followed_id = ?1
             ORDER BY u.username",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(user_from_row).collect()
    }

    /// Get total user count.
    pub async fn user_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Get total post count.
    pub async fn post_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Get total follow edge count.
    pub async fn edge_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
