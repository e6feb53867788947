//! Request extractors for the authenticated caller.

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use db::models::user::User;
use services::services::identity::SessionUser;

use crate::{AppState, error::ApiError};

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// A verified identity-provider session. Used by registration, where a local
/// account may not exist yet.
pub struct AuthenticatedIdentity(pub SessionUser);

impl FromRequestParts<AppState> for AuthenticatedIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
        let session = state.identity().verify_session(token).await?;
        Ok(Self(session))
    }
}

/// A verified session bound to its local account.
pub struct CurrentUser {
    pub user: User,
    pub session: SessionUser,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthenticatedIdentity(session) =
            AuthenticatedIdentity::from_request_parts(parts, state).await?;
        let user = User::find_by_identity_id(&state.db().pool, &session.identity_id)
            .await?
            .ok_or_else(|| {
                ApiError::Unauthorized("no account for this identity".to_string())
            })?;
        Ok(Self { user, session })
    }
}
