//! Routes for public profiles and account registration.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::{
    startup::Startup,
    user::{CreateUser, UpdateProfile, User},
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::{
    pagination::{Paged, Pagination},
    response::ApiResponse,
};

use crate::{
    AppState,
    auth::{AuthenticatedIdentity, CurrentUser},
    error::ApiError,
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RegisterRequest {
    pub username: String,
    pub display_name: Option<String>,
}

/// Everything a profile page renders in one response.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UserProfile {
    pub user: User,
    pub startups: Vec<Startup>,
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    let ok = (3..=39).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "username must be 3-39 lowercase letters, digits, '-' or '_'".to_string(),
        ))
    }
}

/// List registered builders, newest first.
pub async fn list_users(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<ResponseJson<ApiResponse<Paged<User>>>, ApiError> {
    let users = User::list(&state.db().pool, pagination.limit(), pagination.offset()).await?;
    let total = User::count(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(Paged::new(
        users, pagination, total,
    ))))
}

/// Register the verified identity as a local account.
pub async fn register_user(
    State(state): State<AppState>,
    AuthenticatedIdentity(session): AuthenticatedIdentity,
    axum::Json(payload): axum::Json<RegisterRequest>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    validate_username(&payload.username)?;

    if let Some(taken) = User::find_by_username(&state.db().pool, &payload.username).await? {
        if taken.identity_id != session.identity_id {
            return Err(ApiError::BadRequest("username already taken".to_string()));
        }
    }

    let display_name = payload
        .display_name
        .or(session.display_name.clone())
        .unwrap_or_else(|| payload.username.clone());

    let user = User::create(
        &state.db().pool,
        &CreateUser {
            username: payload.username,
            display_name,
            identity_id: session.identity_id.clone(),
            avatar_url: session.avatar_url.clone(),
        },
    )
    .await?;

    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<ResponseJson<ApiResponse<UserProfile>>, ApiError> {
    let user = User::find_by_username(&state.db().pool, &username)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    let startups = Startup::find_by_owner_id(&state.db().pool, user.id).await?;

    Ok(ResponseJson(ApiResponse::success(UserProfile {
        user,
        startups,
    })))
}

/// Update the caller's own profile.
pub async fn update_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    current: CurrentUser,
    axum::Json(payload): axum::Json<UpdateProfile>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    if current.user.username != username {
        return Err(ApiError::Forbidden(
            "cannot edit another user's profile".to_string(),
        ));
    }

    let updated = User::update_profile(&state.db().pool, current.user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ImpersonateRequest {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ImpersonateResponse {
    pub actor_token: String,
}

/// Mint an impersonation token for support flows. Admin only.
pub async fn impersonate(
    State(state): State<AppState>,
    current: CurrentUser,
    axum::Json(payload): axum::Json<ImpersonateRequest>,
) -> Result<ResponseJson<ApiResponse<ImpersonateResponse>>, ApiError> {
    if !state.config().is_admin(&current.user.username) {
        return Err(ApiError::Forbidden("admin only".to_string()));
    }

    let subject = User::find_by_username(&state.db().pool, &payload.username)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let actor_token = state
        .identity()
        .create_actor_token(&current.user.identity_id, &subject.identity_id)
        .await?;

    tracing::info!(
        actor = %current.user.username,
        subject = %subject.username,
        "impersonation token issued"
    );

    Ok(ResponseJson(ApiResponse::success(ImpersonateResponse {
        actor_token,
    })))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(register_user))
        .route("/users/{username}", get(get_profile))
        .route("/users/{username}/profile", put(update_profile))
        .route("/auth/impersonate", post(impersonate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(validate_username("ada-lovelace_1").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("Ada").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"a".repeat(40)).is_err());
    }
}
