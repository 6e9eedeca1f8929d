//! Example relying party.
//!
//! Signs users in at an OAuth2/OIDC authorization server with the
//! authorization code flow and shows the verified identity token claims.

use anyhow::{Context, Result};
use rp_identity_oidc::RelyingParty;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod render;
mod routes;

use config::AppConfig;
use render::Renderer;
use routes::AppState;

const STATE_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rp_example_client=debug,rp_identity_oidc=debug,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    info!("Starting example client");

    let relying_party = RelyingParty::new(config.relying_party_config())
        .context("Failed to configure relying party")?;
    let renderer = Arc::new(Renderer::new()?);

    let cleanup = relying_party.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATE_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            cleanup.cleanup_expired_states().await;
        }
    });

    let app = routes::router(AppState {
        relying_party,
        renderer,
    });

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!("Example client is running on http://{}", bind_addr);
    info!("OAuth2 redirect URI: {}", config.redirect_uri);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
