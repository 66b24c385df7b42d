//! Mock server state.

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Webhook token accepted by [`AppState::default`].
pub const DEFAULT_TOKEN: &str = "test-token";

/// A stored deal in wire format: upper-case keys, scalar values as strings.
pub type Record = Map<String, Value>;

/// Fields the server manages; client values are ignored.
const MANAGED_FIELDS: [&str; 4] = ["ID", "CREATED_BY_ID", "DATE_CREATE", "DATE_MODIFY"];

/// Canned reply returned instead of running a REST method.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedReply {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: String,
}

/// A REST call as received by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// REST method name, e.g. `crm.deal.add`.
    pub method: String,
    /// Parsed JSON payload.
    pub payload: Value,
}

/// State shared across all handlers.
#[derive(Debug)]
pub struct AppState {
    /// Accepted webhook token.
    pub token: String,
    deals: DashMap<u64, Record>,
    next_id: AtomicU64,
    scripts: DashMap<String, ScriptedReply>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN)
    }
}

impl AppState {
    /// Creates an empty state accepting `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            deals: DashMap::new(),
            next_id: AtomicU64::new(1),
            scripts: DashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    // ========================================================================
    // Scripted replies
    // ========================================================================

    /// Makes every call to `method` answer with `status` and `body`.
    pub fn script(&self, method: &str, status: u16, body: impl Into<String>) {
        self.scripts.insert(
            method.to_string(),
            ScriptedReply {
                status,
                body: body.into(),
            },
        );
    }

    /// Removes the scripted reply for `method`.
    pub fn clear_script(&self, method: &str) {
        self.scripts.remove(method);
    }

    /// Returns the scripted reply for `method`, if any.
    #[must_use]
    pub fn scripted(&self, method: &str) -> Option<ScriptedReply> {
        self.scripts.get(method).map(|reply| reply.value().clone())
    }

    // ========================================================================
    // Call log
    // ========================================================================

    /// Appends a call to the log.
    pub fn record(&self, method: &str, payload: Value) {
        self.calls.lock().push(RecordedCall {
            method: method.to_string(),
            payload,
        });
    }

    /// Returns every recorded call in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the recorded calls of one method.
    #[must_use]
    pub fn calls_for(&self, method: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    // ========================================================================
    // Deals
    // ========================================================================

    /// Stores a new deal created by `user_id` and returns its id.
    pub fn insert_deal(&self, user_id: &str, fields: &Map<String, Value>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = timestamp();

        let mut record = Record::new();
        record.insert("ID".to_string(), Value::String(id.to_string()));
        record.insert("TITLE".to_string(), Value::String(String::new()));
        record.insert("STAGE_ID".to_string(), Value::String("NEW".to_string()));
        record.insert("OPPORTUNITY".to_string(), Value::String("0.00".to_string()));
        record.insert("CURRENCY_ID".to_string(), Value::String("RUB".to_string()));
        record.insert("ASSIGNED_BY_ID".to_string(), Value::String(user_id.to_string()));
        record.insert("CREATED_BY_ID".to_string(), Value::String(user_id.to_string()));
        record.insert("OPENED".to_string(), Value::String("Y".to_string()));
        record.insert("CLOSED".to_string(), Value::String("N".to_string()));
        record.insert("DATE_CREATE".to_string(), Value::String(now.clone()));
        record.insert("DATE_MODIFY".to_string(), Value::String(now));
        apply_fields(&mut record, fields);

        self.deals.insert(id, record);
        debug!("Stored deal {}", id);
        id
    }

    /// Returns a copy of a stored deal.
    #[must_use]
    pub fn get_deal(&self, id: u64) -> Option<Record> {
        self.deals.get(&id).map(|entry| entry.value().clone())
    }

    /// Applies `fields` to a stored deal. Returns false if it does not exist.
    pub fn update_deal(&self, id: u64, fields: &Map<String, Value>) -> bool {
        match self.deals.get_mut(&id) {
            Some(mut entry) => {
                let record = entry.value_mut();
                apply_fields(record, fields);
                record.insert("DATE_MODIFY".to_string(), Value::String(timestamp()));
                true
            }
            None => false,
        }
    }

    /// Removes a deal. Returns false if it does not exist.
    pub fn delete_deal(&self, id: u64) -> bool {
        self.deals.remove(&id).is_some()
    }

    /// Number of stored deals.
    #[must_use]
    pub fn deal_count(&self) -> usize {
        self.deals.len()
    }

    /// Copies of all stored deals, ordered by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Record> {
        let mut entries: Vec<(u64, Record)> = self
            .deals
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries.into_iter().map(|(_, record)| record).collect()
    }
}

/// Writes client fields into a record in wire format; `null` clears a field.
fn apply_fields(record: &mut Record, fields: &Map<String, Value>) {
    for (key, value) in fields {
        if MANAGED_FIELDS.contains(&key.as_str()) {
            continue;
        }
        match to_wire(value) {
            Some(value) => {
                record.insert(key.clone(), value);
            }
            None => {
                record.remove(key);
            }
        }
    }
}

/// Portal representation of a client value.
#[must_use]
pub fn to_wire(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(if *b { "Y" } else { "N" }.to_string())),
        other => Some(other.clone()),
    }
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S+00:00").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    #[test]
    fn test_insert_applies_defaults() {
        let state = AppState::default();

        let id = state.insert_deal("1", &fields(json!({"TITLE": "Lead"})));
        let record = state.get_deal(id).unwrap();

        assert_eq!(record["ID"], json!(id.to_string()));
        assert_eq!(record["TITLE"], json!("Lead"));
        assert_eq!(record["STAGE_ID"], json!("NEW"));
        assert_eq!(record["CURRENCY_ID"], json!("RUB"));
        assert_eq!(record["ASSIGNED_BY_ID"], json!("1"));
        assert_eq!(record["OPENED"], json!("Y"));
        assert_eq!(record["CLOSED"], json!("N"));
        assert!(record.contains_key("DATE_CREATE"));
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let state = AppState::default();

        let first = state.insert_deal("1", &Map::new());
        let second = state.insert_deal("1", &Map::new());

        assert!(second > first);
        assert_eq!(state.deal_count(), 2);
    }

    #[test]
    fn test_values_are_stored_as_wire_strings() {
        let state = AppState::default();

        let id = state.insert_deal(
            "1",
            &fields(json!({"OPPORTUNITY": 1500.5, "CONTACT_ID": 7, "CLOSED": true})),
        );
        let record = state.get_deal(id).unwrap();

        assert_eq!(record["OPPORTUNITY"], json!("1500.5"));
        assert_eq!(record["CONTACT_ID"], json!("7"));
        assert_eq!(record["CLOSED"], json!("Y"));
    }

    #[test]
    fn test_managed_fields_are_ignored() {
        let state = AppState::default();

        let id = state.insert_deal("1", &fields(json!({"ID": "999", "CREATED_BY_ID": "5"})));
        let record = state.get_deal(id).unwrap();

        assert_eq!(record["ID"], json!(id.to_string()));
        assert_eq!(record["CREATED_BY_ID"], json!("1"));
    }

    #[test]
    fn test_update_and_delete() {
        let state = AppState::default();
        let id = state.insert_deal("1", &fields(json!({"COMMENTS": "x"})));

        assert!(state.update_deal(id, &fields(json!({"STAGE_ID": "WON", "COMMENTS": null}))));
        let record = state.get_deal(id).unwrap();
        assert_eq!(record["STAGE_ID"], json!("WON"));
        assert!(!record.contains_key("COMMENTS"));

        assert!(state.delete_deal(id));
        assert!(!state.delete_deal(id));
        assert!(!state.update_deal(id, &Map::new()));
        assert!(state.get_deal(id).is_none());
    }

    #[test]
    fn test_snapshot_is_ordered_by_id() {
        let state = AppState::default();
        for title in ["a", "b", "c"] {
            state.insert_deal("1", &fields(json!({"TITLE": title})));
        }

        let titles: Vec<_> = state
            .snapshot()
            .into_iter()
            .map(|record| record["TITLE"].clone())
            .collect();
        assert_eq!(titles, vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn test_scripts_and_call_log() {
        let state = AppState::default();
        state.script("crm.deal.add", 500, "boom");

        assert_eq!(
            state.scripted("crm.deal.add"),
            Some(ScriptedReply {
                status: 500,
                body: "boom".to_string()
            })
        );
        state.clear_script("crm.deal.add");
        assert!(state.scripted("crm.deal.add").is_none());

        state.record("crm.deal.get", json!({"id": "1"}));
        state.record("crm.deal.list", json!({}));
        assert_eq!(state.calls().len(), 2);
        assert_eq!(state.calls_for("crm.deal.get")[0].payload, json!({"id": "1"}));
    }
}
