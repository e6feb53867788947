pub mod auth;
pub mod error;
pub mod routes;

use std::{sync::Arc, time::Duration};

use axum::{Router, http::Method, http::header::{AUTHORIZATION, CONTENT_TYPE}};
use db::DBService;
use services::services::{
    billing::BillingService, config::Config, favicon::FaviconOutcomeCache, github::GithubService,
    identity::IdentityService,
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Clone)]
pub struct AppState {
    db: DBService,
    config: Arc<Config>,
    github: GithubService,
    billing: BillingService,
    identity: IdentityService,
    favicon_outcomes: Arc<FaviconOutcomeCache>,
    http: reqwest::Client,
}

impl AppState {
    pub fn new(db: DBService, config: Config) -> anyhow::Result<Self> {
        let github = GithubService::new(config.github_token.clone())?;
        let billing = BillingService::new(
            config.billing_api_url.clone(),
            config.billing_secret_key.clone(),
            config.billing_webhook_secret.clone(),
        )?;
        let identity = IdentityService::new(
            config.identity_api_url.clone(),
            config.identity_secret_key.clone(),
        )?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("lockedin/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            db,
            config: Arc::new(config),
            github,
            billing,
            identity,
            favicon_outcomes: Arc::new(FaviconOutcomeCache::new()),
            http,
        })
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn github(&self) -> &GithubService {
        &self.github
    }

    pub fn billing(&self) -> &BillingService {
        &self.billing
    }

    pub fn identity(&self) -> &IdentityService {
        &self.identity
    }

    pub fn favicon_outcomes(&self) -> &Arc<FaviconOutcomeCache> {
        &self.favicon_outcomes
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .nest("/api", routes::router(&state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    let db = DBService::new(&config.database_url).await?;

    let address = format!("{}:{}", config.host, config.port);
    let state = AppState::new(db, config)?;
    let app = app(state);

    let listener = TcpListener::bind(&address).await?;
    info!("listening on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
        info!("received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
