//! Routes for the startup showcase.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    startup::{CreateStartup, Startup, UpdateStartup},
    user::User,
};
use utils::{
    pagination::{Paged, Pagination},
    response::ApiResponse,
};
use uuid::Uuid;

use crate::{AppState, auth::CurrentUser, error::ApiError};

fn validate_startup_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }
    Ok(())
}

pub async fn list_startups(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<ResponseJson<ApiResponse<Paged<Startup>>>, ApiError> {
    let startups =
        Startup::list(&state.db().pool, pagination.limit(), pagination.offset()).await?;
    let total = Startup::count(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(Paged::new(
        startups, pagination, total,
    ))))
}

pub async fn create_startup(
    State(state): State<AppState>,
    current: CurrentUser,
    axum::Json(payload): axum::Json<CreateStartup>,
) -> Result<ResponseJson<ApiResponse<Startup>>, ApiError> {
    validate_startup_name(&payload.name)?;
    let created = Startup::create(&state.db().pool, current.user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(created)))
}

async fn owned_startup(
    state: &AppState,
    startup_id: Uuid,
    current: &CurrentUser,
) -> Result<Startup, ApiError> {
    let startup = Startup::find_by_id(&state.db().pool, startup_id)
        .await?
        .ok_or(ApiError::NotFound("startup"))?;
    if startup.owner_id != current.user.id {
        return Err(ApiError::Forbidden(
            "cannot modify another user's startup".to_string(),
        ));
    }
    Ok(startup)
}

pub async fn update_startup(
    State(state): State<AppState>,
    Path(startup_id): Path<Uuid>,
    current: CurrentUser,
    axum::Json(payload): axum::Json<UpdateStartup>,
) -> Result<ResponseJson<ApiResponse<Startup>>, ApiError> {
    owned_startup(&state, startup_id, &current).await?;
    let updated = Startup::update(&state.db().pool, startup_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub async fn delete_startup(
    State(state): State<AppState>,
    Path(startup_id): Path<Uuid>,
    current: CurrentUser,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    owned_startup(&state, startup_id, &current).await?;
    Startup::delete(&state.db().pool, startup_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn list_user_startups(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<ResponseJson<ApiResponse<Vec<Startup>>>, ApiError> {
    let user = User::find_by_username(&state.db().pool, &username)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    let startups = Startup::find_by_owner_id(&state.db().pool, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(startups)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/startups", get(list_startups).post(create_startup))
        .route(
            "/startups/{startup_id}",
            axum::routing::put(update_startup).delete(delete_startup),
        )
        .route("/users/{username}/startups", get(list_user_startups))
}
