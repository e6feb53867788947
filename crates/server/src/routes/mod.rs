pub mod contributions;
pub mod favicons;
pub mod posts;
pub mod profiles;
pub mod sponsorships;
pub mod startups;

use axum::{Router, response::Json as ResponseJson, routing::get};
use utils::response::ApiResponse;

use crate::AppState;

async fn health() -> ResponseJson<ApiResponse<&'static str>> {
    ResponseJson(ApiResponse::success("ok"))
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(profiles::router(state))
        .merge(posts::router(state))
        .merge(startups::router(state))
        .merge(contributions::router(state))
        .merge(sponsorships::router(state))
        .merge(favicons::router(state))
}
