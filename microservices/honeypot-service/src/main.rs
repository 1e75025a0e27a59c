mod auth;
mod callback;
mod config;
mod engagement;
mod error;
mod extractor;
mod handlers;
mod models;
mod quality;
mod risk;
mod routes;
mod session;

use config::Config;
use engagement::EngagementController;
use extractor::IntelligenceStore;
use quality::QualityTracker;
use risk::RiskAccumulator;
use session::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionStore,
    pub risk: Arc<RiskAccumulator>,
    pub intel_store: Arc<IntelligenceStore>,
    pub quality: Arc<QualityTracker>,
    pub engagement: Arc<EngagementController>,
    pub http_client: reqwest::Client,
    pub version: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .json()
        .init();

    let config = Config::from_env()?;
    let bind_addr = config.bind_address();

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()?;

    let state = AppState {
        config: Arc::new(config),
        sessions: SessionStore::new(),
        risk: Arc::new(RiskAccumulator::new()),
        intel_store: Arc::new(IntelligenceStore::new()),
        quality: Arc::new(QualityTracker::new()),
        engagement: Arc::new(EngagementController::new()),
        http_client,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let app = routes::create_router(state);

    tracing::info!(%bind_addr, "honeypot-service listening");
    let listener = TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
