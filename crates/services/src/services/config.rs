//! Environment-backed configuration. Every value has a default so a dev
//! checkout starts without any setup; missing secrets are warned about at
//! startup and fail at the provider, not here.

use std::{env, fmt::Display, str::FromStr};

use secrecy::SecretString;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Public origin of the deployed app, used for checkout/portal redirect
    /// URLs.
    pub app_base_url: String,
    /// Optional token for the GitHub API; unauthenticated requests work but
    /// are rate-limited aggressively.
    pub github_token: Option<String>,
    pub billing_api_url: String,
    pub billing_secret_key: SecretString,
    pub billing_webhook_secret: SecretString,
    pub identity_api_url: String,
    pub identity_secret_key: SecretString,
    /// Usernames allowed to mint impersonation tokens.
    pub admin_usernames: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: load_or("HOST", "0.0.0.0"),
            port: load_or("PORT", "3000"),
            database_url: load_or("DATABASE_URL", "sqlite:lockedin.db"),
            app_base_url: load_or("APP_BASE_URL", "http://localhost:3000"),
            github_token: env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            billing_api_url: load_or("BILLING_API_URL", "https://api.stripe.com"),
            billing_secret_key: load_secret("BILLING_SECRET_KEY"),
            billing_webhook_secret: load_secret("BILLING_WEBHOOK_SECRET"),
            identity_api_url: load_or("IDENTITY_API_URL", "https://api.clerk.com"),
            identity_secret_key: load_secret("IDENTITY_SECRET_KEY"),
            admin_usernames: env::var("ADMIN_USERNAMES")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn is_admin(&self, username: &str) -> bool {
        self.admin_usernames.iter().any(|admin| admin == username)
    }
}

fn load_or<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    match raw.parse() {
        Ok(value) => value,
        Err(e) => {
            warn!("invalid {key} value ({e}), using default {default}");
            default
                .parse()
                .unwrap_or_else(|e| panic!("default for {key} must parse: {e}"))
        }
    }
}

fn load_secret(key: &str) -> SecretString {
    match env::var(key) {
        Ok(value) if !value.is_empty() => SecretString::from(value),
        _ => {
            warn!("{key} not set; requests to this provider will be rejected");
            SecretString::from(String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_list_matches_exactly() {
        let mut config = Config::from_env();
        config.admin_usernames = vec!["root".to_string(), "ops".to_string()];
        assert!(config.is_admin("root"));
        assert!(!config.is_admin("roo"));
        assert!(!config.is_admin(""));
    }
}
