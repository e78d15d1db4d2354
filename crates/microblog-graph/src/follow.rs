//! Follow graph mutation and queries.
//!
//! Every call takes the store handle explicitly; `FollowGraph` itself holds
//! no state. Both `follow` and `unfollow` are idempotent.

use tracing::{debug, info};

use crate::error::{GraphError, Result};
use crate::schema::User;
use crate::storage::EntityStore;

/// Service for changing and reading who-follows-whom.
pub struct FollowGraph;

impl FollowGraph {
    /// Ensure `follower` follows `followed`.
    ///
    /// Fails with `InvalidOperand` for a self-pair or if either user is not
    /// in the store. Following an already-followed user changes nothing.
    /// Returns whether this call created the edge.
    pub async fn follow(store: &EntityStore, follower: &User, followed: &User) -> Result<bool> {
        Self::check_operands(store, follower, followed).await?;

        let created = store.add_edge(follower.id, followed.id).await?;
        if created {
            info!("{} now follows {}", follower.username, followed.username);
        } else {
            debug!("{} already follows {}", follower.username, followed.username);
        }
        Ok(created)
    }

    /// Ensure `follower` does not follow `followed`.
    ///
    /// Same preconditions as [`FollowGraph::follow`]. Unfollowing a user that
    /// is not followed changes nothing. Returns whether this call removed the
    /// edge.
    pub async fn unfollow(store: &EntityStore, follower: &User, followed: &User) -> Result<bool> {
        Self::check_operands(store, follower, followed).await?;

        let removed = store.remove_edge(follower.id, followed.id).await?;
        if removed {
            info!("{} unfollowed {}", follower.username, followed.username);
        } else {
            debug!("{} was not following {}", follower.username, followed.username);
        }
        Ok(removed)
    }

    /// True iff the edge follower -> followed currently exists.
    pub async fn is_following(store: &EntityStore, follower: &User, followed: &User) -> Result<bool> {
        store.edge_exists(follower.id, followed.id).await
    }

    /// Users that `user` follows, ordered by username.
    pub async fn followed(store: &EntityStore, user: &User) -> Result<Vec<User>> {
        store.followed_users(user.id).await
    }

    /// Users that follow `user`, ordered by username.
    pub async fn followers(store: &EntityStore, user: &User) -> Result<Vec<User>> {
        store.follower_users(user.id).await
    }

    pub async fn followed_count(store: &EntityStore, user: &User) -> Result<i64> {
        store.followed_count(user.id).await
    }

    pub async fn follower_count(store: &EntityStore, user: &User) -> Result<i64> {
        store.follower_count(user.id).await
    }

    async fn check_operands(store: &EntityStore, follower: &User, followed: &User) -> Result<()> {
        if follower.id == followed.id {
            return Err(GraphError::InvalidOperand(format!(
                "{} cannot follow themself",
                follower.username
            )));
        }

        for user in [follower, followed] {
            if store.find_user(user.id).await?.is_none() {
                return Err(GraphError::InvalidOperand(format!(
                    "user {} (id {}) does not exist",
                    user.username, user.id
                )));
            }
        }
        Ok(())
    }
}
