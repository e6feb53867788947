//! Identity-provider client: session verification and impersonation tokens.

use std::time::Duration;

use moka::future::Cache;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

const SESSION_CACHE_TTL: Duration = Duration::from_secs(60);
const SESSION_CACHE_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("invalid session token")]
    InvalidSessionToken,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("json error: {0}")]
    Serde(String),
}

/// The provider's view of an authenticated user, narrowed to the fields the
/// application binds accounts to.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SessionUser {
    pub identity_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSessionUser {
    user_id: Option<String>,
    id: Option<String>,
    email: Option<String>,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    image_url: Option<String>,
}

fn narrow_session_user(raw: RawSessionUser) -> Result<SessionUser, IdentityError> {
    let identity_id = raw
        .user_id
        .or(raw.id)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| IdentityError::Serde("session user missing id".to_string()))?;

    let display_name = match (raw.first_name, raw.last_name) {
        (Some(first), Some(last)) => Some(format!("{first} {last}")),
        (Some(first), None) => Some(first),
        (None, Some(last)) => Some(last),
        (None, None) => None,
    };

    Ok(SessionUser {
        identity_id,
        email: raw.email,
        username: raw.username,
        display_name,
        avatar_url: raw.image_url,
    })
}

#[derive(Debug, Deserialize)]
struct RawActorToken {
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ActorTokenRequest<'a> {
    actor_id: &'a str,
    subject_id: &'a str,
    expires_in_seconds: u32,
}

#[derive(Clone)]
pub struct IdentityService {
    http: Client,
    base_url: String,
    secret_key: SecretString,
    sessions: Cache<String, SessionUser>,
}

impl IdentityService {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: String, secret_key: SecretString) -> Result<Self, IdentityError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("lockedin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            secret_key,
            sessions: Cache::builder()
                .max_capacity(SESSION_CACHE_CAPACITY)
                .time_to_live(SESSION_CACHE_TTL)
                .build(),
        })
    }

    /// Resolve a bearer session token to its user. Verified sessions are
    /// cached briefly so a page's worth of requests costs one provider call.
    pub async fn verify_session(&self, token: &str) -> Result<SessionUser, IdentityError> {
        if token.is_empty() {
            return Err(IdentityError::InvalidSessionToken);
        }
        if let Some(cached) = self.sessions.get(token).await {
            return Ok(cached);
        }

        let url = format!("{}/v1/sessions/{token}/user", self.base_url);
        let res = self
            .http
            .get(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let raw: RawSessionUser = match res.status() {
            s if s.is_success() => res
                .json()
                .await
                .map_err(|e| IdentityError::Serde(e.to_string()))?,
            StatusCode::UNAUTHORIZED => return Err(IdentityError::InvalidApiKey),
            StatusCode::NOT_FOUND => return Err(IdentityError::InvalidSessionToken),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                return Err(IdentityError::Http { status, body });
            }
        };

        let user = narrow_session_user(raw)?;
        self.sessions.insert(token.to_string(), user.clone()).await;
        Ok(user)
    }

    /// Mint a short-lived token that lets `actor_id` act as `subject_id`
    /// (admin support flows).
    pub async fn create_actor_token(
        &self,
        actor_id: &str,
        subject_id: &str,
    ) -> Result<String, IdentityError> {
        let url = format!("{}/v1/actor_tokens", self.base_url);
        let res = self
            .http
            .post(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .json(&ActorTokenRequest {
                actor_id,
                subject_id,
                expires_in_seconds: 600,
            })
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let raw: RawActorToken = match res.status() {
            s if s.is_success() => res
                .json()
                .await
                .map_err(|e| IdentityError::Serde(e.to_string()))?,
            StatusCode::UNAUTHORIZED => return Err(IdentityError::InvalidApiKey),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                return Err(IdentityError::Http { status, body });
            }
        };

        raw.token
            .ok_or_else(|| IdentityError::Serde("actor token response missing token".to_string()))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> IdentityError {
    if e.is_timeout() {
        IdentityError::Timeout
    } else {
        IdentityError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_user_narrows_provider_shape() {
        let raw: RawSessionUser = serde_json::from_str(
            r#"{
                "user_id": "user_abc",
                "email": "ada@example.org",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "image_url": "https://img.example/ada.png"
            }"#,
        )
        .unwrap();

        let user = narrow_session_user(raw).unwrap();
        assert_eq!(user.identity_id, "user_abc");
        assert_eq!(user.display_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(user.avatar_url.as_deref(), Some("https://img.example/ada.png"));
    }

    #[test]
    fn id_field_is_accepted_as_fallback() {
        let raw: RawSessionUser = serde_json::from_str(r#"{"id": "user_x"}"#).unwrap();
        let user = narrow_session_user(raw).unwrap();
        assert_eq!(user.identity_id, "user_x");
        assert!(user.display_name.is_none());
    }

    #[test]
    fn missing_id_is_an_error() {
        let raw: RawSessionUser = serde_json::from_str(r#"{"email": "x@y.z"}"#).unwrap();
        assert!(matches!(
            narrow_session_user(raw),
            Err(IdentityError::Serde(_))
        ));

        let raw: RawSessionUser = serde_json::from_str(r#"{"user_id": ""}"#).unwrap();
        assert!(narrow_session_user(raw).is_err());
    }

    #[tokio::test]
    async fn empty_token_is_rejected_locally() {
        let service = IdentityService::new(
            "https://api.clerk.com".to_string(),
            SecretString::from("sk_test".to_string()),
        )
        .unwrap();
        assert!(matches!(
            service.verify_session("").await,
            Err(IdentityError::InvalidSessionToken)
        ));
    }
}
