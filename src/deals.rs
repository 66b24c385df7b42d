//! Bitrix24 CRM deals client.
//!
//! [`DealsClient`] maps deal operations onto the `crm.deal.*` REST methods of
//! an incoming webhook. Every call is a JSON `POST` to `{webhook}/{method}`
//! whose reply is parsed by [`Envelope::parse`].

use crate::config::Bitrix24Config;
use crate::envelope::{Envelope, is_truthy};
use crate::error::Error;
use crate::http::{HttpClient, HttpConfig, RequestOptions};
use crate::models::{Deal, DealFields, DealStage};
use crate::query::{DEFAULT_LIMIT, DEFAULT_SEARCH_LIMIT, DealFilter, DealOrder, DealPage, ListParams};
use crate::session::{Lifecycle, SessionGuard};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt::Display;
use tracing::{debug, info, warn};

#[cfg(test)]
mod tests;

/// `crm.deal.add`
pub const METHOD_ADD: &str = "crm.deal.add";
/// `crm.deal.get`
pub const METHOD_GET: &str = "crm.deal.get";
/// `crm.deal.update`
pub const METHOD_UPDATE: &str = "crm.deal.update";
/// `crm.deal.delete`
pub const METHOD_DELETE: &str = "crm.deal.delete";
/// `crm.deal.list`
pub const METHOD_LIST: &str = "crm.deal.list";

/// Client for Bitrix24 CRM deals.
#[derive(Debug)]
pub struct DealsClient {
    http: HttpClient,
    default_assignee: Option<String>,
}

impl DealsClient {
    /// Creates a new, not yet started client.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or carries a malformed
    /// header.
    pub fn new(config: Bitrix24Config) -> Result<Self, Error> {
        config.validate()?;

        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        headers.extend(config.headers.clone());

        let http = HttpClient::new(HttpConfig {
            base_url: Some(config.webhook_url.clone()),
            headers,
            timeout: Some(config.timeout()),
        })?;

        Ok(Self {
            http,
            default_assignee: config.default_assignee,
        })
    }

    /// Returns the underlying HTTP client.
    #[must_use]
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Returns the assignee injected into new deals.
    #[must_use]
    pub fn default_assignee(&self) -> Option<&str> {
        self.default_assignee.as_deref()
    }

    /// Opens the HTTP session.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyStarted`] if the session is active.
    pub fn start(&mut self) -> Result<(), Error> {
        self.http.start()
    }

    /// Closes the HTTP session. Idempotent.
    pub fn close(&mut self) {
        self.http.close();
    }

    /// Returns true while the session is open.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.http.is_started()
    }

    /// Starts the session and returns a guard that closes it on drop.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyStarted`] if the session is already open.
    pub fn session(&mut self) -> Result<SessionGuard<'_, Self>, Error> {
        SessionGuard::open(self)
    }

    // ========================================================================
    // Low-level call
    // ========================================================================

    /// Calls a REST method and returns its parsed envelope.
    ///
    /// # Errors
    /// Returns [`Error::NotStarted`] without a session, the transport error,
    /// or the error decoded from the reply.
    pub async fn call_method<T: Serialize + ?Sized>(
        &self,
        method: &str,
        payload: &T,
    ) -> Result<Envelope, Error> {
        debug!("Calling {}", method);

        let resp = self
            .http
            .post(method, RequestOptions::new().json(payload))
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;

        Envelope::parse(status, &body).inspect_err(|e| {
            warn!("{} failed: {}", method, e);
        })
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    /// Creates a deal and returns it as stored by the remote.
    ///
    /// The default assignee is added when configured and `ASSIGNED_BY_ID` is
    /// not set.
    ///
    /// # Errors
    /// Returns [`Error::Creation`] if the remote returns no identifier or the
    /// new deal cannot be read back.
    pub async fn create_deal(&self, fields: DealFields) -> Result<Deal, Error> {
        let mut fields = fields;
        if let Some(assignee) = &self.default_assignee
            && !fields.contains("ASSIGNED_BY_ID")
        {
            fields.insert("ASSIGNED_BY_ID", assignee.clone());
        }

        let envelope = self
            .call_method(METHOD_ADD, &json!({ "fields": fields }))
            .await?;
        let id = id_from_result(&envelope.result).ok_or_else(|| {
            Error::Creation(format!("no deal id in result {}", envelope.result))
        })?;
        info!("Created deal {}", id);

        self.get_deal(&id)
            .await?
            .ok_or_else(|| Error::Creation(format!("deal {} not readable after creation", id)))
    }

    /// Returns a deal, or `None` if it does not exist.
    ///
    /// # Errors
    /// Returns error on transport failure or any remote error other than
    /// not-found.
    pub async fn get_deal(&self, id: impl Display) -> Result<Option<Deal>, Error> {
        let id = id.to_string();
        match self.call_method(METHOD_GET, &json!({ "id": id })).await {
            Ok(envelope) => deal_from_result(envelope.result),
            Err(e) if e.is_not_found() => {
                debug!("Deal {} not found", id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Updates a deal and returns the refreshed record.
    ///
    /// # Errors
    /// Returns [`Error::Update`] if the remote reports failure, or
    /// [`Error::NotFound`] if the deal is missing afterwards.
    pub async fn update_deal(&self, id: impl Display, fields: DealFields) -> Result<Deal, Error> {
        let id = id.to_string();
        let envelope = self
            .call_method(METHOD_UPDATE, &json!({ "id": id, "fields": fields }))
            .await?;
        if !is_truthy(&envelope.result) {
            return Err(Error::Update(format!(
                "deal {} rejected with result {}",
                id, envelope.result
            )));
        }
        info!("Updated deal {}", id);

        self.get_deal(&id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("deal {} after update", id)))
    }

    /// Deletes a deal. Returns `false` if it did not exist.
    ///
    /// # Errors
    /// Returns error on transport failure or any remote error other than
    /// not-found.
    pub async fn delete_deal(&self, id: impl Display) -> Result<bool, Error> {
        let id = id.to_string();
        match self.call_method(METHOD_DELETE, &json!({ "id": id })).await {
            Ok(envelope) => {
                let deleted = is_truthy(&envelope.result);
                if deleted {
                    info!("Deleted deal {}", id);
                }
                Ok(deleted)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Listing
    // ========================================================================

    /// Fetches one page of deals with paging metadata.
    ///
    /// # Errors
    /// Returns error on transport failure, a remote error, or an undecodable
    /// record.
    pub async fn list_deals_page(&self, params: &ListParams) -> Result<DealPage, Error> {
        let envelope = self.call_method(METHOD_LIST, &params.payload()).await?;
        let deals = deals_from_result(envelope.result)?;
        debug!("Listed {} deals", deals.len());

        Ok(DealPage {
            deals,
            total: envelope.total,
            next: envelope.next,
        })
    }

    /// Fetches one page of deals.
    ///
    /// # Errors
    /// See [`DealsClient::list_deals_page`].
    pub async fn list_deals(&self, params: &ListParams) -> Result<Vec<Deal>, Error> {
        Ok(self.list_deals_page(params).await?.deals)
    }

    /// Deals whose title contains `query`, most recently modified first.
    ///
    /// # Errors
    /// See [`DealsClient::list_deals_page`].
    pub async fn search_deals(&self, query: &str, limit: Option<u32>) -> Result<Vec<Deal>, Error> {
        let params = ListParams::new()
            .filter(DealFilter::new().like("TITLE", query))
            .order(DealOrder::new().desc("DATE_MODIFY"))
            .limit(limit.unwrap_or(DEFAULT_SEARCH_LIMIT));
        self.list_deals(&params).await
    }

    /// Deals in `stage`, most recently modified first.
    ///
    /// # Errors
    /// See [`DealsClient::list_deals_page`].
    pub async fn deals_by_stage(
        &self,
        stage: impl Display,
        limit: Option<u32>,
    ) -> Result<Vec<Deal>, Error> {
        self.filtered("STAGE_ID", stage.to_string(), "DATE_MODIFY", limit)
            .await
    }

    /// Deals linked to a contact, newest first.
    ///
    /// # Errors
    /// See [`DealsClient::list_deals_page`].
    pub async fn deals_by_contact(
        &self,
        contact_id: impl Display,
        limit: Option<u32>,
    ) -> Result<Vec<Deal>, Error> {
        self.filtered("CONTACT_ID", contact_id.to_string(), "DATE_CREATE", limit)
            .await
    }

    /// Deals linked to a company, newest first.
    ///
    /// # Errors
    /// See [`DealsClient::list_deals_page`].
    pub async fn deals_by_company(
        &self,
        company_id: impl Display,
        limit: Option<u32>,
    ) -> Result<Vec<Deal>, Error> {
        self.filtered("COMPANY_ID", company_id.to_string(), "DATE_CREATE", limit)
            .await
    }

    /// Deals not yet closed.
    ///
    /// # Errors
    /// See [`DealsClient::list_deals_page`].
    pub async fn open_deals(&self, limit: Option<u32>) -> Result<Vec<Deal>, Error> {
        self.filtered("CLOSED", "N".to_string(), "DATE_MODIFY", limit)
            .await
    }

    /// Closed deals.
    ///
    /// # Errors
    /// See [`DealsClient::list_deals_page`].
    pub async fn closed_deals(&self, limit: Option<u32>) -> Result<Vec<Deal>, Error> {
        self.filtered("CLOSED", "Y".to_string(), "DATE_MODIFY", limit)
            .await
    }

    /// Moves a deal to its final stage (`WON` unless given) and closes it.
    ///
    /// # Errors
    /// See [`DealsClient::update_deal`].
    pub async fn close_deal(&self, id: impl Display, final_stage: Option<&str>) -> Result<Deal, Error> {
        let fields = DealFields::new()
            .stage(final_stage.unwrap_or(DealStage::Won.as_str()))
            .closed(true);
        self.update_deal(id, fields).await
    }

    async fn filtered(
        &self,
        field: &str,
        value: String,
        newest_by: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Deal>, Error> {
        let params = ListParams::new()
            .filter(DealFilter::new().eq(field, value))
            .order(DealOrder::new().desc(newest_by))
            .limit(limit.unwrap_or(DEFAULT_LIMIT));
        self.list_deals(&params).await
    }
}

impl Lifecycle for DealsClient {
    fn start(&mut self) -> Result<(), Error> {
        DealsClient::start(self)
    }

    fn close(&mut self) {
        DealsClient::close(self);
    }

    fn is_started(&self) -> bool {
        DealsClient::is_started(self)
    }
}

// ============================================================================
// One-shot helpers
// ============================================================================

/// Creates a deal in a one-off session.
///
/// `extra` fields are applied last and override `title`, `amount` and
/// `stage` (default `NEW`).
///
/// # Errors
/// See [`DealsClient::create_deal`].
pub async fn create_quick_deal(
    config: Bitrix24Config,
    title: &str,
    amount: Decimal,
    stage: Option<&str>,
    extra: DealFields,
) -> Result<Deal, Error> {
    let fields = quick_deal_fields(title, amount, stage, extra);

    let mut client = DealsClient::new(config)?;
    let session = client.session()?;
    session.create_deal(fields).await
}

/// Reads a deal in a one-off session.
///
/// # Errors
/// See [`DealsClient::get_deal`].
pub async fn get_deal_info(config: Bitrix24Config, id: impl Display) -> Result<Option<Deal>, Error> {
    let mut client = DealsClient::new(config)?;
    let session = client.session()?;
    session.get_deal(id).await
}

fn quick_deal_fields(title: &str, amount: Decimal, stage: Option<&str>, extra: DealFields) -> DealFields {
    let mut fields = DealFields::new()
        .title(title)
        .amount(amount)
        .stage(stage.unwrap_or(DealStage::New.as_str()));
    for (key, value) in extra.into_map() {
        fields.insert(key, value);
    }
    fields
}

// ============================================================================
// Result decoding
// ============================================================================

/// Identifier returned by `crm.deal.add`: a positive number or a non-empty
/// numeric string.
fn id_from_result(result: &Value) -> Option<String> {
    if !is_truthy(result) {
        return None;
    }
    match result {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn deal_from_result(result: Value) -> Result<Option<Deal>, Error> {
    match result {
        Value::Object(map) if map.is_empty() => Ok(None),
        Value::Object(map) => Deal::from_fields(map).map(Some),
        Value::Null | Value::Bool(false) => Ok(None),
        Value::Array(items) if items.is_empty() => Ok(None),
        other => Err(Error::InvalidResponse(format!(
            "expected a deal record, got {}",
            other
        ))),
    }
}

fn deals_from_result(result: Value) -> Result<Vec<Deal>, Error> {
    match result {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Deal::from_fields(map),
                other => Err(Error::InvalidResponse(format!(
                    "expected a deal record, got {}",
                    other
                ))),
            })
            .collect(),
        other => Err(Error::InvalidResponse(format!(
            "expected a list of deals, got {}",
            other
        ))),
    }
}
