use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreatePost {
    pub body: String,
}

/// Feed read model: a post joined with the author fields the feed card needs
/// and its comment count.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PostWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    #[ts(flatten)]
    pub post: Post,
    pub author_username: String,
    pub author_display_name: String,
    pub author_avatar_url: Option<String>,
    pub comment_count: i64,
}

impl std::ops::Deref for PostWithAuthor {
    type Target = Post;
    fn deref(&self) -> &Self::Target {
        &self.post
    }
}

const FEED_SELECT: &str = "SELECT
        p.id, p.author_id, p.body, p.created_at, p.updated_at,
        u.username AS author_username,
        u.display_name AS author_display_name,
        u.avatar_url AS author_avatar_url,
        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
     FROM posts p
     JOIN users u ON u.id = p.author_id";

impl Post {
    pub async fn create(
        pool: &SqlitePool,
        author_id: Uuid,
        data: &CreatePost,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, Post>(
            "INSERT INTO posts (id, author_id, body)
             VALUES ($1, $2, $3)
             RETURNING id, author_id, body, created_at, updated_at",
        )
        .bind(id)
        .bind(author_id)
        .bind(&data.body)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            "SELECT id, author_id, body, created_at, updated_at FROM posts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Newest-first feed page.
    pub async fn feed(
        pool: &SqlitePool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostWithAuthor>, sqlx::Error> {
        sqlx::query_as::<_, PostWithAuthor>(&format!(
            "{FEED_SELECT} ORDER BY p.created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn find_with_author(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<PostWithAuthor>, sqlx::Error> {
        sqlx::query_as::<_, PostWithAuthor>(&format!("{FEED_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::{
            comment::{Comment, CreateComment},
            user::{CreateUser, User},
        },
    };

    async fn seed_user(pool: &SqlitePool, name: &str) -> User {
        User::create(
            pool,
            &CreateUser {
                username: name.to_string(),
                display_name: name.to_string(),
                identity_id: format!("idp_{name}"),
                avatar_url: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn feed_is_newest_first_with_comment_counts() {
        let db = DBService::new_in_memory().await.unwrap();
        let author = seed_user(&db.pool, "ada").await;

        let first = Post::create(&db.pool, author.id, &CreatePost { body: "one".into() })
            .await
            .unwrap();
        let second = Post::create(&db.pool, author.id, &CreatePost { body: "two".into() })
            .await
            .unwrap();

        Comment::create(
            &db.pool,
            author.id,
            first.id,
            &CreateComment { body: "hi".into() },
        )
        .await
        .unwrap();

        let feed = Post::feed(&db.pool, 10, 0).await.unwrap();
        assert_eq!(feed.len(), 2);

        let counts: Vec<i64> = feed.iter().map(|p| p.comment_count).collect();
        let ids: Vec<Uuid> = feed.iter().map(|p| p.id).collect();
        assert!(ids.contains(&first.id) && ids.contains(&second.id));
        assert_eq!(counts.iter().sum::<i64>(), 1);
        assert_eq!(feed[0].author_username, "ada");
    }

    #[tokio::test]
    async fn feed_pagination_slices() {
        let db = DBService::new_in_memory().await.unwrap();
        let author = seed_user(&db.pool, "ada").await;

        for i in 0..5 {
            Post::create(
                &db.pool,
                author.id,
                &CreatePost {
                    body: format!("post {i}"),
                },
            )
            .await
            .unwrap();
        }

        let page = Post::feed(&db.pool, 2, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(Post::count(&db.pool).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn delete_removes_post_and_comments() {
        let db = DBService::new_in_memory().await.unwrap();
        let author = seed_user(&db.pool, "ada").await;
        let post = Post::create(&db.pool, author.id, &CreatePost { body: "x".into() })
            .await
            .unwrap();
        Comment::create(
            &db.pool,
            author.id,
            post.id,
            &CreateComment { body: "y".into() },
        )
        .await
        .unwrap();

        assert_eq!(Post::delete(&db.pool, post.id).await.unwrap(), 1);
        assert!(Post::find_by_id(&db.pool, post.id).await.unwrap().is_none());
        assert!(
            Comment::find_by_post_id(&db.pool, post.id)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
