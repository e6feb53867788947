//! Routes for GitHub contribution display.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{startup::Startup, user::User};
use services::services::github::{ContributionCalendar, RepoContributor};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// A user's last-year contribution calendar, via their linked GitHub account.
pub async fn get_user_contributions(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<ResponseJson<ApiResponse<ContributionCalendar>>, ApiError> {
    let user = User::find_by_username(&state.db().pool, &username)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    let github_username = user.github_username.as_deref().ok_or_else(|| {
        ApiError::BadRequest("user has no linked GitHub account".to_string())
    })?;

    let calendar = state.github().contribution_calendar(github_username).await?;
    Ok(ResponseJson(ApiResponse::success((*calendar).clone())))
}

/// Contributors of the repository a startup links.
pub async fn get_startup_contributors(
    State(state): State<AppState>,
    Path(startup_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<RepoContributor>>>, ApiError> {
    let startup = Startup::find_by_id(&state.db().pool, startup_id)
        .await?
        .ok_or(ApiError::NotFound("startup"))?;
    let repo = startup.github_repo.as_deref().ok_or_else(|| {
        ApiError::BadRequest("startup has no linked repository".to_string())
    })?;

    let contributors = state.github().repo_contributors(repo).await?;
    Ok(ResponseJson(ApiResponse::success((*contributors).clone())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/users/{username}/contributions",
            get(get_user_contributions),
        )
        .route(
            "/startups/{startup_id}/contributors",
            get(get_startup_contributors),
        )
}
