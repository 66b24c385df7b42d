//! Integration test helpers for the Bitrix24 deals client.
//!
//! Every test spawns its own in-memory mock server, so tests run in parallel
//! without sharing deals.

use bitrix24_deals::{Bitrix24Config, DealsClient, HttpClient, HttpConfig};
use bitrix24_mock::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// A running mock server.
#[derive(Debug, Clone)]
pub struct MockServer {
    /// Server state, for scripting replies and inspecting calls.
    pub state: Arc<AppState>,
    /// Bound address.
    pub addr: SocketAddr,
}

impl MockServer {
    /// Base URL of the server, e.g. `http://127.0.0.1:40123`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Webhook URL accepted by the server.
    #[must_use]
    pub fn webhook_url(&self) -> String {
        format!("{}/rest/1/{}", self.base_url(), self.state.token)
    }

    /// Client configuration pointing at the webhook.
    #[must_use]
    pub fn config(&self) -> Bitrix24Config {
        Bitrix24Config::new(self.webhook_url()).with_timeout(Duration::from_secs(10))
    }
}

/// Starts a mock server on an ephemeral port.
///
/// # Panics
/// Panics if the listener cannot be bound.
pub async fn spawn_mock() -> MockServer {
    let state = Arc::new(AppState::default());
    let addr = bitrix24_mock::spawn(Arc::clone(&state))
        .await
        .expect("Failed to start mock server");
    MockServer { state, addr }
}

/// Creates a started deals client for `server`.
///
/// # Errors
/// Returns error if client creation fails.
pub fn create_test_client(server: &MockServer) -> Result<DealsClient, bitrix24_deals::Error> {
    let mut client = DealsClient::new(server.config())?;
    client.start()?;
    Ok(client)
}

/// Creates a started HTTP client whose base URL is the server root.
///
/// # Errors
/// Returns error if client creation fails.
pub fn create_http_client(
    server: &MockServer,
    headers: &[(&str, &str)],
) -> Result<HttpClient, bitrix24_deals::Error> {
    let mut client = HttpClient::new(HttpConfig {
        base_url: Some(server.base_url()),
        headers: headers
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        timeout: Some(Duration::from_secs(10)),
    })?;
    client.start()?;
    Ok(client)
}

/// Generates a unique deal title to avoid conflicts between tests.
#[must_use]
pub fn unique_title(prefix: &str) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("{} {}-{}", prefix, ts, counter)
}
