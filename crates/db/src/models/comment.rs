use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateComment {
    pub body: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct CommentWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    #[ts(flatten)]
    pub comment: Comment,
    pub author_username: String,
    pub author_display_name: String,
    pub author_avatar_url: Option<String>,
}

impl std::ops::Deref for CommentWithAuthor {
    type Target = Comment;
    fn deref(&self) -> &Self::Target {
        &self.comment
    }
}

impl Comment {
    pub async fn create(
        pool: &SqlitePool,
        author_id: Uuid,
        post_id: Uuid,
        data: &CreateComment,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (id, post_id, author_id, body)
             VALUES ($1, $2, $3, $4)
             RETURNING id, post_id, author_id, body, created_at",
        )
        .bind(id)
        .bind(post_id)
        .bind(author_id)
        .bind(&data.body)
        .fetch_one(pool)
        .await
    }

    /// Oldest-first, the order a thread reads in.
    pub async fn find_by_post_id(
        pool: &SqlitePool,
        post_id: Uuid,
    ) -> Result<Vec<CommentWithAuthor>, sqlx::Error> {
        sqlx::query_as::<_, CommentWithAuthor>(
            "SELECT
                c.id, c.post_id, c.author_id, c.body, c.created_at,
                u.username AS author_username,
                u.display_name AS author_display_name,
                u.avatar_url AS author_avatar_url
             FROM comments c
             JOIN users u ON u.id = c.author_id
             WHERE c.post_id = $1
             ORDER BY c.created_at ASC",
        )
        .bind(post_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::{
            post::{CreatePost, Post},
            user::{CreateUser, User},
        },
    };

    #[tokio::test]
    async fn thread_lists_comments_with_authors() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = User::create(
            &db.pool,
            &CreateUser {
                username: "ada".into(),
                display_name: "Ada".into(),
                identity_id: "idp_1".into(),
                avatar_url: None,
            },
        )
        .await
        .unwrap();
        let post = Post::create(&db.pool, user.id, &CreatePost { body: "hello".into() })
            .await
            .unwrap();

        Comment::create(&db.pool, user.id, post.id, &CreateComment { body: "a".into() })
            .await
            .unwrap();
        Comment::create(&db.pool, user.id, post.id, &CreateComment { body: "b".into() })
            .await
            .unwrap();

        let thread = Comment::find_by_post_id(&db.pool, post.id).await.unwrap();
        assert_eq!(thread.len(), 2);
        assert!(thread.iter().all(|c| c.author_display_name == "Ada"));
    }
}
