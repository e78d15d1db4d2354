//! Record types for the microblog graph.
//!
//! - `User` / `Post`: rows as stored in the entity store
//! - `NewUser` / `NewPost`: creation parameters handed to the store
//! - `Entity`: which kind of record a lookup referred to

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kinds of records held by the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    User,
    Post,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::User => "user",
            Entity::Post => "post",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered user.
///
/// Followed and follower sets are not carried here; ask
/// [`FollowGraph`](crate::follow::FollowGraph) for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Opaque credential, never interpreted by this crate.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for registering a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
}

impl NewUser {
    /// Create a registration request without a credential.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password_hash: None,
        }
    }

    /// Attach an already-hashed credential.
    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }
}

/// A published post. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Assigned in insertion order, so a larger id was created later.
    pub id: i64,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub author_id: i64,
}

/// Parameters for publishing a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub author_id: i64,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl NewPost {
    pub fn new(author_id: i64, body: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            author_id,
            body: body.into(),
            timestamp,
        }
    }

    /// A post stamped with the current time.
    pub fn now(author_id: i64, body: impl Into<String>) -> Self {
        Self::new(author_id, body, Utc::now())
    }
}
