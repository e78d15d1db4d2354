//! Feed composition.
//!
//! A user's feed is their own posts plus every post written by someone they
//! follow, newest first. Posts with the same timestamp are ordered by
//! descending id, so the later insert comes first and the order is total.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::schema::{Post, User};
use crate::storage::EntityStore;

/// An ordered, finite feed. Iterate it as many times as needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feed {
    pub owner_id: i64,
    pub posts: Vec<Post>,
}

impl Feed {
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Post> {
        self.posts.iter()
    }

    /// Post ids in feed order.
    pub fn post_ids(&self) -> Vec<i64> {
        self.posts.iter().map(|p| p.id).collect()
    }

    pub fn into_posts(self) -> Vec<Post> {
        self.posts
    }
}

impl IntoIterator for Feed {
    type Item = Post;
    type IntoIter = std::vec::IntoIter<Post>;

    fn into_iter(self) -> Self::IntoIter {
        self.posts.into_iter()
    }
}

impl<'a> IntoIterator for &'a Feed {
    type Item = &'a Post;
    type IntoIter = std::slice::Iter<'a, Post>;

    fn into_iter(self) -> Self::IntoIter {
        self.posts.iter()
    }
}

/// Newest first; equal timestamps fall back to the larger id.
pub fn newest_first(a: &Post, b: &Post) -> Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| b.id.cmp(&a.id))
}

/// Builds feeds from the entity store. Holds no cached state.
pub struct FeedComposer;

impl FeedComposer {
    /// Compose the feed for `user`.
    ///
    /// Fails with `NotFound` if `user` is not in the store. A user with no
    /// posts in reach gets an empty feed.
    pub async fn followed_posts(store: &EntityStore, user: &User) -> Result<Feed> {
        let start_time = std::time::Instant::now();

        // Reject stale handles
        store.get_user(user.id).await?;

        let mut posts = store.feed_posts(user.id).await?;
        posts.sort_by(newest_first);

        debug!(
            "Composed feed for {}: {} posts in {:?}",
            user.username,
            posts.len(),
            start_time.elapsed()
        );

        Ok(Feed {
            owner_id: user.id,
            posts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::follow::FollowGraph;
    use crate::schema::NewPost;
    use crate::test_support::{memory_store, register};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_follow_posts() {
        let store = memory_store().await;

        let u1 = register(&store, "admin").await;
        let u2 = register(&store, "user").await;
        let u3 = register(&store, "john").await;
        let u4 = register(&store, "susan").await;

        let now = Utc::now();
        let p1 = store
            .create_post(&NewPost::new(u1.id, "Post from admin", now + Duration::seconds(1)))
            .await
            .unwrap();
        let p2 = store
            .create_post(&NewPost::new(u2.id, "Post from user", now + Duration::seconds(4)))
            .await
            .unwrap();
        let p3 = store
            .create_post(&NewPost::new(u3.id, "Post from john", now + Duration::seconds(3)))
            .await
            .unwrap();
        let p4 = store
            .create_post(&NewPost::new(u4.id, "Post from susan", now + Duration::seconds(2)))
            .await
            .unwrap();

        FollowGraph::follow(&store, &u1, &u2).await.unwrap();
        FollowGraph::follow(&store, &u1, &u4).await.unwrap();
        FollowGraph::follow(&store, &u2, &u3).await.unwrap();
        FollowGraph::follow(&store, &u3, &u4).await.unwrap();

        let f1 = FeedComposer::followed_posts(&store, &u1).await.unwrap();
        let f2 = FeedComposer::followed_posts(&store, &u2).await.unwrap();
        let f3 = FeedComposer::followed_posts(&store, &u3).await.unwrap();
        let f4 = FeedComposer::followed_posts(&store, &u4).await.unwrap();

        assert_eq!(f1.into_posts(), vec![p2.clone(), p4.clone(), p1]);
        assert_eq!(f2.into_posts(), vec![p2, p3.clone()]);
        assert_eq!(f3.into_posts(), vec![p3, p4.clone()]);
        assert_eq!(f4.into_posts(), vec![p4]);
    }

    #[tokio::test]
    async fn test_equal_timestamps_newest_insert_first() {
        let store = memory_store().await;
        let admin = register(&store, "admin").await;
        let susan = register(&store, "susan").await;
        FollowGraph::follow(&store, &admin, &susan).await.unwrap();

        let at = Utc::now();
        let mut ids = Vec::new();
        for (author, body) in [(&admin, "a1"), (&susan, "s1"), (&admin, "a2"), (&susan, "s2")] {
            let post = store.create_post(&NewPost::new(author.id, body, at)).await.unwrap();
            ids.push(post.id);
        }
        let older = store
            .create_post(&NewPost::new(susan.id, "older", at - Duration::seconds(1)))
            .await
            .unwrap();

        let feed = FeedComposer::followed_posts(&store, &admin).await.unwrap();
        ids.reverse();
        ids.push(older.id);
        assert_eq!(feed.post_ids(), ids);
    }

    #[tokio::test]
    async fn test_feed_contains_exactly_reachable_posts() {
        let store = memory_store().await;
        let admin = register(&store, "admin").await;
        let user = register(&store, "user").await;
        let john = register(&store, "john").await;

        for author in [&admin, &user, &john] {
            for n in 0..3 {
                store
                    .create_post(&NewPost::now(author.id, format!("{} #{n}", author.username)))
                    .await
                    .unwrap();
            }
        }

        FollowGraph::follow(&store, &admin, &user).await.unwrap();
        // Following is not transitive
        FollowGraph::follow(&store, &user, &john).await.unwrap();

        let feed = FeedComposer::followed_posts(&store, &admin).await.unwrap();
        assert_eq!(feed.len(), 6);
        assert!(feed.iter().all(|p| p.author_id == admin.id || p.author_id == user.id));

        let mut ids = feed.post_ids();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), feed.len());

        for pair in feed.posts.windows(2) {
            assert_ne!(newest_first(&pair[0], &pair[1]), Ordering::Greater);
        }

        FollowGraph::unfollow(&store, &admin, &user).await.unwrap();
        let feed = FeedComposer::followed_posts(&store, &admin).await.unwrap();
        assert_eq!(feed.len(), 3);
        assert!(feed.iter().all(|p| p.author_id == admin.id));
    }

    #[tokio::test]
    async fn test_feed_when_following_many_users() {
        let store = memory_store().await;
        let me = register(&store, "me").await;
        let created_at = Utc::now().to_rfc3339();

        // More followed users than SQLite allows bound parameters
        sqlx::query(
            "INSERT INTO users (username, email, created_at)
             WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 33000)
             SELECT 'u' || n, 'u' || n || '@example.com', ?1 FROM seq",
        )
        .bind(&created_at)
        .execute(store.pool())
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO follows (follower_id, followed_id, created_at)
             SELECT ?1, id, ?2 FROM users WHERE id <> ?1",
        )
        .bind(me.id)
        .bind(&created_at)
        .execute(store.pool())
        .await
        .unwrap();
        assert_eq!(FollowGraph::followed_count(&store, &me).await.unwrap(), 33000);

        let u5 = store.get_user_by_username("u5").await.unwrap();
        let theirs = store
            .create_post(&NewPost::new(u5.id, "from u5", Utc::now() + Duration::seconds(1)))
            .await
            .unwrap();
        let mine = store.create_post(&NewPost::now(me.id, "from me")).await.unwrap();

        let feed = FeedComposer::followed_posts(&store, &me).await.unwrap();
        assert_eq!(feed.post_ids(), vec![theirs.id, mine.id]);
    }

    #[tokio::test]
    async fn test_empty_feed() {
        let store = memory_store().await;
        let admin = register(&store, "admin").await;
        let quiet = register(&store, "quiet").await;
        FollowGraph::follow(&store, &admin, &quiet).await.unwrap();

        let feed = FeedComposer::followed_posts(&store, &admin).await.unwrap();
        assert!(feed.is_empty());
        assert_eq!(feed.owner_id, admin.id);
    }

    #[tokio::test]
    async fn test_feed_for_unknown_user() {
        let store = memory_store().await;
        let mut admin = register(&store, "admin").await;
        admin.id += 100;

        let err = FeedComposer::followed_posts(&store, &admin).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
