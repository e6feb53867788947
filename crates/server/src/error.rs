use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{billing::BillingError, github::GithubError, identity::IdentityError};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Github(#[from] GithubError),
    #[error(transparent)]
    Billing(#[from] BillingError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) | ApiError::Github(GithubError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Unauthorized(_)
            | ApiError::Identity(IdentityError::InvalidSessionToken)
            | ApiError::Billing(BillingError::WebhookRejected(_)) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) | ApiError::Github(GithubError::InvalidRepo(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Github(GithubError::RateLimited)
            | ApiError::Billing(BillingError::RateLimited) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ApiResponse::<()>::error(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_by_error_class() {
        assert_eq!(ApiError::NotFound("user").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Unauthorized("no token".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Identity(IdentityError::InvalidSessionToken).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::BadRequest("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
