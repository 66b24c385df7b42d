//! # Bitrix24 Deals - Async HTTP and CRM Client
//!
//! An asynchronous client for the deals section of the
//! [Bitrix24](https://www.bitrix24.com) CRM, built on a small general-purpose
//! HTTP client with an explicit session lifecycle.
//!
//! ## Key Features
//!
//! - **Session lifecycle**: Clients are started and closed explicitly, or
//!   scoped with a [`SessionGuard`] that closes them on drop.
//!
//! - **Single request path**: Every HTTP verb goes through
//!   [`HttpClient::request`], which merges default and per-call headers and
//!   timeouts.
//!
//! - **Deal CRUD**: Create, read, update, delete and list deals through an
//!   incoming webhook with [`DealsClient`].
//!
//! - **Typed wire model**: [`Deal`] normalizes the loosely typed values the
//!   portal returns (string amounts, `Y`/`N` flags, `null`s).
//!
//! - **Query builders**: [`DealFilter`], [`DealOrder`] and [`ListParams`]
//!   express the list filter convention without hand-written key prefixes.
//!
//! ## Architecture
//!
//! ```text
//! DealsClient ── call_method ──► HttpClient::request ──► reqwest
//!      │                                 │
//!      └── Envelope::parse ◄── status + body text
//! ```
//!
//! ## Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | TOML configuration and validation |
//! | [`deals`] | Bitrix24 deals client and one-shot helpers |
//! | [`envelope`] | Reply envelope parsing and error classification |
//! | [`error`] | Error types |
//! | [`http`] | Generic async HTTP client |
//! | [`models`] | Deal value object, field sets and enums |
//! | [`query`] | List filters, ordering and paging |
//! | [`session`] | Session lifecycle trait and guard |
//!
//! ## REST Methods
//!
//! | Operation | Method |
//! |-----------|--------|
//! | `create_deal` | `crm.deal.add` |
//! | `get_deal` | `crm.deal.get` |
//! | `update_deal`, `close_deal` | `crm.deal.update` |
//! | `delete_deal` | `crm.deal.delete` |
//! | `list_deals`, `search_deals`, `deals_by_*`, `open_deals`, `closed_deals` | `crm.deal.list` |
//!
//! ## Example Usage
//!
//! ```no_run
//! use bitrix24_deals::{Bitrix24Config, DealFields, DealStage, DealsClient};
//! use rust_decimal::Decimal;
//!
//! # async fn run() -> Result<(), bitrix24_deals::Error> {
//! let config = Bitrix24Config::new("https://portal.bitrix24.ru/rest/1/secret")
//!     .with_default_assignee("1");
//!
//! let mut client = DealsClient::new(config)?;
//! let session = client.session()?;
//!
//! let deal = session
//!     .create_deal(
//!         DealFields::new()
//!             .title("Website redesign")
//!             .amount(Decimal::new(150_000, 0))
//!             .stage(DealStage::New),
//!     )
//!     .await?;
//!
//! if let Some(id) = &deal.id {
//!     session.close_deal(id, None).await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```toml
//! [bitrix24]
//! webhook_url = "https://portal.bitrix24.ru/rest/1/secret"
//! timeout_ms = 30000
//! default_assignee = "1"
//! ```
//!
//! ## Dependencies
//!
//! - **reqwest** (0.13): HTTP transport
//! - **serde** / **serde_json** (1.0): Serialization/deserialization
//! - **serde_urlencoded** (0.7): Query strings and form bodies
//! - **rust_decimal** (1.40): Deal amounts
//! - **toml** (0.9): Configuration files
//! - **thiserror** (2.0): Error types
//! - **tracing** (0.1): Structured logging

pub mod config;
pub mod deals;
pub mod envelope;
pub mod error;
pub mod http;
pub mod models;
pub mod query;
pub mod session;

pub use config::{Bitrix24Config, Config, ConfigError};
pub use deals::{DealsClient, create_quick_deal, get_deal_info};
pub use envelope::Envelope;
pub use error::{Error, ErrorKind, Result};
pub use http::{HttpClient, HttpConfig, RequestOptions, merge_headers};
pub use models::{Currency, Deal, DealFields, DealStage, SortOrder};
pub use query::{DealFilter, DealOrder, DealPage, FilterOp, ListParams, MAX_PAGE_SIZE};
pub use session::{Lifecycle, SessionGuard};
