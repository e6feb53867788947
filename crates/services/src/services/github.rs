//! GitHub API client for contributor lists and contribution calendars.

use std::{sync::Arc, time::Duration};

use backon::{ExponentialBuilder, Retryable};
use moka::future::Cache;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use ts_rs::TS;

const GITHUB_API_URL: &str = "https://api.github.com";
// GitHub's REST API exposes no contribution calendar; this public mirror of
// the profile graph does.
const CONTRIBUTIONS_API_URL: &str = "https://github-contributions-api.jogruber.de/v4";

const CACHE_TTL: Duration = Duration::from_secs(600);
const CACHE_CAPACITY: u64 = 1_000;

#[derive(Debug, Clone, Error)]
pub enum GithubError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("rate limited")]
    RateLimited,
    #[error("not found")]
    NotFound,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("json error: {0}")]
    Serde(String),
    #[error("invalid repository slug: {0}")]
    InvalidRepo(String),
}

impl GithubError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Contributor entry as rendered on a startup page.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RepoContributor {
    pub login: String,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
    pub contributions: i64,
}

/// Raw contributor entry; GitHub omits fields for anonymous contributors.
#[derive(Debug, Deserialize)]
struct RawContributor {
    login: Option<String>,
    avatar_url: Option<String>,
    html_url: Option<String>,
    contributions: Option<i64>,
}

fn narrow_contributors(raw: Vec<RawContributor>) -> Vec<RepoContributor> {
    raw.into_iter()
        .filter_map(|entry| {
            let login = entry.login?;
            Some(RepoContributor {
                login,
                avatar_url: entry.avatar_url,
                html_url: entry.html_url,
                contributions: entry.contributions.unwrap_or(0),
            })
        })
        .collect()
}

/// One day of the contribution graph. `level` is the 0-4 intensity bucket
/// the graph colors by.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ContributionDay {
    pub date: String,
    pub count: i64,
    pub level: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ContributionCalendar {
    pub total: i64,
    pub days: Vec<ContributionDay>,
}

#[derive(Debug, Deserialize)]
struct RawCalendar {
    #[serde(default)]
    total: std::collections::HashMap<String, i64>,
    #[serde(default)]
    contributions: Vec<RawContributionDay>,
}

#[derive(Debug, Deserialize)]
struct RawContributionDay {
    date: Option<String>,
    count: Option<i64>,
    level: Option<u8>,
}

fn narrow_calendar(raw: RawCalendar) -> ContributionCalendar {
    let days: Vec<ContributionDay> = raw
        .contributions
        .into_iter()
        .filter_map(|day| {
            let date = day.date?;
            Some(ContributionDay {
                date,
                count: day.count.unwrap_or(0).max(0),
                level: day.level.unwrap_or(0).min(4),
            })
        })
        .collect();
    ContributionCalendar {
        total: raw.total.values().sum(),
        days,
    }
}

/// GitHub read client with a TTL response cache.
#[derive(Clone)]
pub struct GithubService {
    http: Client,
    token: Option<String>,
    contributors: Cache<String, Arc<Vec<RepoContributor>>>,
    calendars: Cache<String, Arc<ContributionCalendar>>,
}

impl GithubService {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(token: Option<String>) -> Result<Self, GithubError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("lockedin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GithubError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            token,
            contributors: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
            calendars: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        })
    }

    /// Contributors of `owner/name`, most contributions first (GitHub's own
    /// ordering), anonymous entries dropped.
    pub async fn repo_contributors(
        &self,
        repo: &str,
    ) -> Result<Arc<Vec<RepoContributor>>, GithubError> {
        let (owner, name) = repo
            .split_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
            .ok_or_else(|| GithubError::InvalidRepo(repo.to_string()))?;

        if let Some(cached) = self.contributors.get(repo).await {
            return Ok(cached);
        }

        let url = format!("{GITHUB_API_URL}/repos/{owner}/{name}/contributors?per_page=30");
        let raw: Vec<RawContributor> = self.get_json(&url).await?;
        let contributors = Arc::new(narrow_contributors(raw));

        self.contributors
            .insert(repo.to_string(), contributors.clone())
            .await;
        Ok(contributors)
    }

    /// Last year of a user's contribution calendar.
    pub async fn contribution_calendar(
        &self,
        username: &str,
    ) -> Result<Arc<ContributionCalendar>, GithubError> {
        if let Some(cached) = self.calendars.get(username).await {
            return Ok(cached);
        }

        let url = format!("{CONTRIBUTIONS_API_URL}/{username}?y=last");
        let raw: RawCalendar = self.get_json(&url).await?;
        let calendar = Arc::new(narrow_calendar(raw));

        self.calendars
            .insert(username.to_string(), calendar.clone())
            .await;
        Ok(calendar)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, GithubError> {
        (|| async { self.send_request(url).await })
            .retry(
                &ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(500))
                    .with_max_delay(Duration::from_secs(10))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &GithubError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "GitHub request failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await?
            .json::<T>()
            .await
            .map_err(|e| GithubError::Serde(e.to_string()))
    }

    async fn send_request(&self, url: &str) -> Result<reqwest::Response, GithubError> {
        let mut request = self
            .http
            .get(url)
            .header(header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let res = request.send().await.map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => Ok(res),
            StatusCode::NOT_FOUND => Err(GithubError::NotFound),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => Err(GithubError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(GithubError::Http { status, body })
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> GithubError {
    if e.is_timeout() {
        GithubError::Timeout
    } else {
        GithubError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_contributors_are_dropped() {
        let raw: Vec<RawContributor> = serde_json::from_str(
            r#"[
                {"login": "ada", "avatar_url": "https://a.png", "contributions": 12},
                {"contributions": 3},
                {"login": "grace"}
            ]"#,
        )
        .unwrap();

        let narrowed = narrow_contributors(raw);
        assert_eq!(narrowed.len(), 2);
        assert_eq!(narrowed[0].login, "ada");
        assert_eq!(narrowed[0].contributions, 12);
        assert_eq!(narrowed[1].login, "grace");
        assert_eq!(narrowed[1].contributions, 0);
    }

    #[test]
    fn calendar_narrowing_defaults_and_clamps() {
        let raw: RawCalendar = serde_json::from_str(
            r#"{
                "total": {"lastYear": 321},
                "contributions": [
                    {"date": "2026-01-01", "count": 5, "level": 2},
                    {"count": 9, "level": 1},
                    {"date": "2026-01-02", "level": 9}
                ]
            }"#,
        )
        .unwrap();

        let calendar = narrow_calendar(raw);
        assert_eq!(calendar.total, 321);
        assert_eq!(calendar.days.len(), 2);
        assert_eq!(calendar.days[0].count, 5);
        assert_eq!(calendar.days[1].count, 0);
        assert_eq!(calendar.days[1].level, 4);
    }

    #[test]
    fn empty_payloads_narrow_to_empty_shapes() {
        let raw: RawCalendar = serde_json::from_str("{}").unwrap();
        let calendar = narrow_calendar(raw);
        assert_eq!(calendar.total, 0);
        assert!(calendar.days.is_empty());
    }

    #[tokio::test]
    async fn repo_slug_is_validated() {
        let service = GithubService::new(None).unwrap();
        let err = service.repo_contributors("no-slash").await;
        assert!(matches!(err, Err(GithubError::InvalidRepo(_))));

        let err = service.repo_contributors("/name").await;
        assert!(matches!(err, Err(GithubError::InvalidRepo(_))));
    }
}
