//! Routes for the feed: posts and their comment threads.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    comment::{Comment, CommentWithAuthor, CreateComment},
    post::{CreatePost, Post, PostWithAuthor},
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::{
    pagination::{Paged, Pagination},
    response::ApiResponse,
};
use uuid::Uuid;

use crate::{AppState, auth::CurrentUser, error::ApiError};

const MAX_POST_LEN: usize = 4_000;
const MAX_COMMENT_LEN: usize = 2_000;

fn validate_body(body: &str, max: usize) -> Result<(), ApiError> {
    if body.trim().is_empty() {
        return Err(ApiError::BadRequest("body must not be empty".to_string()));
    }
    if body.len() > max {
        return Err(ApiError::BadRequest(format!(
            "body exceeds {max} characters"
        )));
    }
    Ok(())
}

/// A post with its full comment thread, as the post page renders it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PostThread {
    pub post: PostWithAuthor,
    pub comments: Vec<CommentWithAuthor>,
}

pub async fn get_feed(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<ResponseJson<ApiResponse<Paged<PostWithAuthor>>>, ApiError> {
    let posts = Post::feed(&state.db().pool, pagination.limit(), pagination.offset()).await?;
    let total = Post::count(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(Paged::new(
        posts, pagination, total,
    ))))
}

pub async fn create_post(
    State(state): State<AppState>,
    current: CurrentUser,
    axum::Json(payload): axum::Json<CreatePost>,
) -> Result<ResponseJson<ApiResponse<Post>>, ApiError> {
    validate_body(&payload.body, MAX_POST_LEN)?;
    let created = Post::create(&state.db().pool, current.user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(created)))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<PostThread>>, ApiError> {
    let post = Post::find_with_author(&state.db().pool, post_id)
        .await?
        .ok_or(ApiError::NotFound("post"))?;
    let comments = Comment::find_by_post_id(&state.db().pool, post_id).await?;

    Ok(ResponseJson(ApiResponse::success(PostThread {
        post,
        comments,
    })))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    current: CurrentUser,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let post = Post::find_by_id(&state.db().pool, post_id)
        .await?
        .ok_or(ApiError::NotFound("post"))?;
    if post.author_id != current.user.id {
        return Err(ApiError::Forbidden(
            "cannot delete another user's post".to_string(),
        ));
    }

    Post::delete(&state.db().pool, post_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    current: CurrentUser,
    axum::Json(payload): axum::Json<CreateComment>,
) -> Result<ResponseJson<ApiResponse<Comment>>, ApiError> {
    validate_body(&payload.body, MAX_COMMENT_LEN)?;

    if Post::find_by_id(&state.db().pool, post_id).await?.is_none() {
        return Err(ApiError::NotFound("post"));
    }

    let created = Comment::create(&state.db().pool, current.user.id, post_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(created)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/posts", get(get_feed).post(create_post))
        .route("/posts/{post_id}", get(get_post).delete(delete_post))
        .route("/posts/{post_id}/comments", post(create_comment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_validation() {
        assert!(validate_body("hello", MAX_POST_LEN).is_ok());
        assert!(validate_body("   ", MAX_POST_LEN).is_err());
        assert!(validate_body(&"x".repeat(MAX_POST_LEN + 1), MAX_POST_LEN).is_err());
    }
}
