mod handlers;
mod routes;
mod state;

use std::env;
use std::time::Duration;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use bulletin_service_cli::{
    catalog::Catalog,
    config::{FeedConfig, SummaryConfig},
    scraper::Scraper,
    summarize::Summarizer,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use routes::bulletins::bulletin_routes;
use state::AppState;

const DEFAULT_JOB_TTL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let job_ttl = env::var("JOB_TTL_SECS")
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_JOB_TTL);

    let scraper = Scraper::new(&FeedConfig::from_env())?;
    let summary_config = SummaryConfig::from_env();
    let summarizer = match Summarizer::gemini(&summary_config) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!(error = %e, "summaries disabled");
            None
        }
    };

    // loaded once, reused for every request
    let catalog = Catalog::load(&scraper).await;
    info!(count = catalog.len(), "catalog loaded");

    let state = AppState::new(catalog, scraper, summarizer);
    state.spawn_job_sweeper(job_ttl);

    let mut app = Router::new().nest("/api", bulletin_routes(state));

    if let Ok(client_url) = env::var("CLIENT_URL") {
        let cors = CorsLayer::new()
            .allow_origin(
                client_url
                    .parse::<HeaderValue>()
                    .context("CLIENT_URL is not a valid origin")?,
            )
            .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]);
        app = app.layer(cors);
    }

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
