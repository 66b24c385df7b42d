//! Route handlers.

use crate::error::RestError;
use crate::state::AppState;
use crate::store::{self, ListQuery};
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Wraps a result in the success envelope.
fn reply(result: Value) -> Json<Value> {
    let now = Utc::now();
    Json(json!({
        "result": result,
        "time": {
            "start": now.timestamp_millis() as f64 / 1000.0,
            "finish": now.timestamp_millis() as f64 / 1000.0,
            "duration": 0.0,
            "date_start": now.to_rfc3339(),
        }
    }))
}

fn parse_payload(body: &[u8]) -> Result<Value, RestError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body).map_err(|e| RestError::Argument(format!("Invalid JSON body: {}", e)))
}

fn parse_id(payload: &Value) -> Result<u64, RestError> {
    let id = match payload.get("id") {
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(Value::Number(n)) => n.as_u64(),
        _ => None,
    };
    id.filter(|id| *id > 0)
        .ok_or_else(|| RestError::Argument("ID is not defined or invalid".to_string()))
}

fn parse_fields(payload: &Value) -> Result<&Map<String, Value>, RestError> {
    payload
        .get("fields")
        .and_then(Value::as_object)
        .ok_or_else(|| RestError::Argument("Parameter 'fields' is required".to_string()))
}

// ============================================================================
// REST Methods
// ============================================================================

/// Entry point for `POST /rest/{user_id}/{token}/{method}`.
pub async fn rest_method(
    State(state): State<Arc<AppState>>,
    Path((user_id, token, method)): Path<(String, String, String)>,
    body: Bytes,
) -> Response {
    let payload = match parse_payload(&body) {
        Ok(payload) => payload,
        Err(e) => return e.into_response(),
    };
    debug!("{} {}", method, payload);
    state.record(&method, payload.clone());

    if token != state.token {
        warn!("Rejected call to {} with invalid token", method);
        return RestError::InvalidCredentials.into_response();
    }

    if let Some(scripted) = state.scripted(&method) {
        let status = StatusCode::from_u16(scripted.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            scripted.body,
        )
            .into_response();
    }

    match dispatch(&state, &user_id, &method, &payload) {
        Ok(body) => body.into_response(),
        Err(e) => e.into_response(),
    }
}

fn dispatch(
    state: &AppState,
    user_id: &str,
    method: &str,
    payload: &Value,
) -> Result<Json<Value>, RestError> {
    match method {
        "crm.deal.add" => {
            let fields = parse_fields(payload)?;
            let id = state.insert_deal(user_id, fields);
            Ok(reply(json!(id)))
        }
        "crm.deal.get" => {
            let id = parse_id(payload)?;
            let record = state.get_deal(id).ok_or(RestError::NotFound)?;
            Ok(reply(Value::Object(record)))
        }
        "crm.deal.update" => {
            let id = parse_id(payload)?;
            let fields = parse_fields(payload)?;
            if !state.update_deal(id, fields) {
                return Err(RestError::NotFound);
            }
            Ok(reply(json!(true)))
        }
        "crm.deal.delete" => {
            let id = parse_id(payload)?;
            if !state.delete_deal(id) {
                return Err(RestError::NotFound);
            }
            Ok(reply(json!(true)))
        }
        "crm.deal.list" => {
            let query: ListQuery = serde_json::from_value(payload.clone())
                .map_err(|e| RestError::Argument(format!("Invalid list parameters: {}", e)))?;
            let outcome = store::list(state.snapshot(), &query);

            let Json(mut body) = reply(Value::Array(
                outcome.items.into_iter().map(Value::Object).collect(),
            ));
            body["total"] = json!(outcome.total);
            if let Some(next) = outcome.next {
                body["next"] = json!(next);
            }
            Ok(Json(body))
        }
        other => Err(RestError::MethodNotFound(other.to_string())),
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Reflects the request back as JSON.
pub async fn echo(
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Json<Value> {
    let mut reflected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in &headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        reflected
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    Json(json!({
        "method": method.as_str(),
        "headers": reflected,
        "query": query.unwrap_or_default(),
        "body": String::from_utf8_lossy(&body),
    }))
}

/// Replies after a delay.
pub async fn slow(Path(ms): Path<u64>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(json!({ "slept_ms": ms }))
}

/// Redirects to `/echo` with `302 Found`.
pub async fn redirect() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/echo")])
}

/// Replies with the requested status code.
pub async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, Json(json!({ "status": code }))).into_response(),
        Err(_) => RestError::Argument(format!("Invalid status code {}", code)).into_response(),
    }
}
