//! Bitrix24 Mock Server
//!
//! Serves an in-memory Bitrix24 webhook for manual testing.

use anyhow::Context;
use bitrix24_mock::{AppState, create_router};
use bitrix24_mock::state::DEFAULT_TOKEN;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get host, port and token from environment or use defaults
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .context("PORT must be a valid number")?;
    let token = std::env::var("BITRIX24_TOKEN").unwrap_or_else(|_| DEFAULT_TOKEN.to_string());

    let state = Arc::new(AppState::new(token));
    let app = create_router(state).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("Bitrix24 mock listening on {}", addr);
    info!("Webhook URL: http://{}/rest/1/<token>", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
