//! Unit tests for deals module.

use super::*;
use crate::error::ErrorKind;
use rust_decimal_macros::dec;
use std::time::Duration;

fn config() -> Bitrix24Config {
    Bitrix24Config::new("https://example.bitrix24.ru/rest/1/secret")
}

// ============================================================================
// Construction Tests
// ============================================================================

#[test]
fn test_new_sets_json_headers_and_timeout() {
    let client = DealsClient::new(config().with_timeout(Duration::from_secs(5))).unwrap();

    let headers = client.http().default_headers();
    assert_eq!(headers.get("content-type").unwrap(), "application/json");
    assert_eq!(headers.get("accept").unwrap(), "application/json");
    assert_eq!(client.http().timeout(), Some(Duration::from_secs(5)));
    assert_eq!(
        client.http().base_url(),
        Some("https://example.bitrix24.ru/rest/1/secret")
    );
    assert!(!client.is_started());
}

#[test]
fn test_new_keeps_sub_second_timeout() {
    let client = DealsClient::new(config().with_timeout(Duration::from_millis(750))).unwrap();

    assert_eq!(client.http().timeout(), Some(Duration::from_millis(750)));
}

#[test]
fn test_new_adds_configured_headers() {
    let mut config = config();
    config
        .headers
        .insert("X-Request-Source".to_string(), "crm-sync".to_string());

    let client = DealsClient::new(config).unwrap();

    assert_eq!(
        client.http().default_headers().get("x-request-source").unwrap(),
        "crm-sync"
    );
}

#[test]
fn test_new_keeps_default_assignee() {
    let client = DealsClient::new(config().with_default_assignee("7")).unwrap();

    assert_eq!(client.default_assignee(), Some("7"));
}

#[test]
fn test_new_rejects_invalid_webhook() {
    let err = DealsClient::new(Bitrix24Config::new("not a url")).unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert_eq!(err.kind(), ErrorKind::Data);
}

#[test]
fn test_new_rejects_invalid_header() {
    let mut config = config();
    config
        .headers
        .insert("Bad Header".to_string(), "x".to_string());

    let err = DealsClient::new(config).unwrap_err();

    assert!(matches!(err, Error::InvalidHeader(_)));
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[test]
fn test_session_guard_closes_client() {
    let mut client = DealsClient::new(config()).unwrap();

    {
        let session = client.session().unwrap();
        assert!(session.is_started());
    }

    assert!(!client.is_started());
}

#[test]
fn test_double_start_fails() {
    let mut client = DealsClient::new(config()).unwrap();

    client.start().unwrap();
    assert!(matches!(client.start(), Err(Error::AlreadyStarted)));

    client.close();
    client.close();
    assert!(!client.is_started());
}

#[tokio::test]
async fn test_call_before_start_fails() {
    let client = DealsClient::new(config()).unwrap();

    let err = client.get_deal(1).await.unwrap_err();

    assert!(matches!(err, Error::NotStarted));
    assert_eq!(err.kind(), ErrorKind::SessionLifecycle);
}

// ============================================================================
// Result Decoding Tests
// ============================================================================

#[test]
fn test_id_from_result() {
    assert_eq!(id_from_result(&json!(42)), Some("42".to_string()));
    assert_eq!(id_from_result(&json!("42")), Some("42".to_string()));
    assert_eq!(id_from_result(&json!(0)), None);
    assert_eq!(id_from_result(&json!(false)), None);
    assert_eq!(id_from_result(&Value::Null), None);
    assert_eq!(id_from_result(&json!({"ID": 1})), None);
}

#[test]
fn test_deal_from_result_object() {
    let deal = deal_from_result(json!({"ID": "5", "TITLE": "Lead"}))
        .unwrap()
        .unwrap();

    assert_eq!(deal.id.as_deref(), Some("5"));
    assert_eq!(deal.title, "Lead");
}

#[test]
fn test_deal_from_result_empty_values() {
    assert!(deal_from_result(Value::Null).unwrap().is_none());
    assert!(deal_from_result(json!(false)).unwrap().is_none());
    assert!(deal_from_result(json!({})).unwrap().is_none());
    assert!(deal_from_result(json!([])).unwrap().is_none());
}

#[test]
fn test_deal_from_result_rejects_scalar() {
    let err = deal_from_result(json!("5")).unwrap_err();

    assert!(matches!(err, Error::InvalidResponse(_)));
}

#[test]
fn test_deals_from_result() {
    let deals = deals_from_result(json!([
        {"ID": "1", "OPPORTUNITY": "10"},
        {"ID": "2", "OPPORTUNITY": 20}
    ]))
    .unwrap();

    assert_eq!(deals.len(), 2);
    assert_eq!(deals[1].opportunity, dec!(20));
    assert!(deals_from_result(Value::Null).unwrap().is_empty());
}

#[test]
fn test_deals_from_result_rejects_non_records() {
    assert!(matches!(
        deals_from_result(json!([1, 2])),
        Err(Error::InvalidResponse(_))
    ));
    assert!(matches!(
        deals_from_result(json!({"ID": "1"})),
        Err(Error::InvalidResponse(_))
    ));
}

// ============================================================================
// Quick Deal Tests
// ============================================================================

#[test]
fn test_quick_deal_fields_defaults() {
    let fields = quick_deal_fields("Website", dec!(1500), None, DealFields::new());

    assert_eq!(fields.get("TITLE"), Some(&json!("Website")));
    assert_eq!(fields.get("OPPORTUNITY"), Some(&json!("1500")));
    assert_eq!(fields.get("STAGE_ID"), Some(&json!("NEW")));
}

#[test]
fn test_quick_deal_fields_extra_overrides() {
    let extra = DealFields::new()
        .stage(DealStage::Executing)
        .currency("USD")
        .set("UF_CRM_SOURCE", "web");

    let fields = quick_deal_fields("Website", dec!(1500), Some("PREPARATION"), extra);

    assert_eq!(fields.get("STAGE_ID"), Some(&json!("EXECUTING")));
    assert_eq!(fields.get("CURRENCY_ID"), Some(&json!("USD")));
    assert_eq!(fields.get("UF_CRM_SOURCE"), Some(&json!("web")));
}

#[tokio::test]
async fn test_get_deal_info_rejects_invalid_config() {
    let err = get_deal_info(Bitrix24Config::new("ftp://example.com/rest"), 1)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Config(_)));
}
