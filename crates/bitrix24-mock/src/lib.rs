//! # Bitrix24 Mock Server
//!
//! An in-memory stand-in for a Bitrix24 incoming webhook, used by the
//! integration tests of `bitrix24-deals`.
//!
//! ## Routes
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | POST | `/rest/{user_id}/{token}/{method}` | `crm.deal.*` REST methods |
//! | ANY | `/echo` | Reflects method, headers, query and body |
//! | GET | `/slow/{ms}` | Replies after `ms` milliseconds |
//! | ANY | `/redirect` | `302` to `/echo` |
//! | ANY | `/status/{code}` | Replies with the given status |
//!
//! ## Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | REST error envelope |
//! | [`handlers`] | Route handlers |
//! | [`routes`] | Router configuration |
//! | [`state`] | Deal storage, scripted replies and call log |
//! | [`store`] | List filtering, ordering and paging |

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod store;

pub use routes::create_router;
pub use state::{AppState, RecordedCall, ScriptedReply};

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Serves `state` on an ephemeral localhost port in a background task.
///
/// # Errors
/// Returns error if the listener cannot be bound.
pub async fn spawn(state: Arc<AppState>) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = create_router(state);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Mock server stopped: {}", e);
        }
    });

    info!("Mock server listening on {}", addr);
    Ok(addr)
}
