//! Route for server-side favicon resolution.
//!
//! Walks the candidate chain with an HTTP prober and records the outcome in
//! the shared cache. A URL already in the cache is answered without probing;
//! the response always includes the candidate list so a client can run its
//! own fallback sequence instead.

use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use serde::{Deserialize, Serialize};
use services::services::favicon::{
    DEFAULT_ICON_SIZE, FaviconCandidates, FaviconLoader, FaviconOutcome,
};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct FaviconQuery {
    pub url: String,
    pub size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct FaviconResolution {
    /// Source that loaded, or the local placeholder after exhaustion.
    pub source: String,
    pub failed: bool,
    /// True when answered from the outcome cache without probing.
    pub cached: bool,
    pub candidates: FaviconCandidates,
}

pub async fn resolve_favicon(
    State(state): State<AppState>,
    Query(query): Query<FaviconQuery>,
) -> Result<ResponseJson<ApiResponse<FaviconResolution>>, ApiError> {
    let size = query.size.filter(|s| *s > 0).unwrap_or(DEFAULT_ICON_SIZE);
    let candidates = FaviconCandidates::resolve(&query.url, size);

    if let Some(outcome) = state.favicon_outcomes().lookup(&query.url) {
        let (source, failed) = match outcome {
            FaviconOutcome::Resolved { source } => (source, false),
            FaviconOutcome::Failed => (candidates.local_fallback.clone(), true),
        };
        return Ok(ResponseJson(ApiResponse::success(FaviconResolution {
            source,
            failed,
            cached: true,
            candidates,
        })));
    }

    let mut loader =
        FaviconLoader::new(state.favicon_outcomes().clone(), query.url.clone(), size);
    let http = state.http().clone();
    loader
        .drive(|source| {
            let http = http.clone();
            async move {
                match http.get(&source).send().await {
                    Ok(res) => res.status().is_success(),
                    Err(_) => false,
                }
            }
        })
        .await;

    Ok(ResponseJson(ApiResponse::success(FaviconResolution {
        source: loader.current_source().to_string(),
        failed: loader.is_failed(),
        cached: false,
        candidates,
    })))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/favicons", get(resolve_favicon))
}
