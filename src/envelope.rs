//! Bitrix24 reply envelope.
//!
//! Every REST method answers with a JSON object holding either `result`
//! (plus optional `total`/`next` paging fields) or an `error` code with an
//! optional `error_description`.

use crate::error::Error;
use serde_json::{Map, Value};

/// Vendor error codes that mean "no such record".
const NOT_FOUND_CODES: [&str; 2] = ["NOT_FOUND", "ERROR_NOT_FOUND"];

/// Description fragments the portal uses for missing records. The portal
/// answers `crm.deal.get` with an empty code and a localized text, so the
/// text is the only signal there. Only consulted when the code is empty.
const NOT_FOUND_PHRASES: [&str; 2] = ["not found", "не найден"];

/// Successful reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// The `result` value; `Null` when absent.
    pub result: Value,
    /// Total number of records for list methods.
    pub total: Option<u64>,
    /// Offset of the next page for list methods.
    pub next: Option<u64>,
}

impl Envelope {
    /// Parses a raw reply.
    ///
    /// An `error` key wins over the status code, so 4xx replies carrying an
    /// envelope surface as application errors; other non-200 replies are
    /// transport errors.
    ///
    /// # Errors
    /// Returns [`Error::Api`], [`Error::NotFound`], [`Error::Transport`],
    /// [`Error::Json`] or [`Error::InvalidResponse`].
    pub fn parse(status: u16, body: &str) -> Result<Self, Error> {
        let parsed = serde_json::from_str::<Value>(body);

        if let Ok(Value::Object(obj)) = &parsed
            && obj.contains_key("error")
        {
            return Err(application_error(status, obj));
        }

        if status != 200 {
            return Err(Error::Transport {
                status,
                body: body.to_string(),
            });
        }

        match parsed? {
            Value::Object(mut obj) => Ok(Self {
                result: obj.remove("result").unwrap_or(Value::Null),
                total: obj.get("total").and_then(as_u64),
                next: obj.get("next").and_then(as_u64),
            }),
            other => Err(Error::InvalidResponse(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }
}

fn application_error(status: u16, obj: &Map<String, Value>) -> Error {
    let code = match obj.get("error") {
        Some(Value::String(code)) => code.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    let description = obj
        .get("error_description")
        .and_then(Value::as_str)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            if code.is_empty() {
                "Unknown error".to_string()
            } else {
                code.clone()
            }
        });

    if is_not_found(&code, &description) {
        Error::NotFound(description)
    } else {
        Error::Api {
            status,
            code,
            description,
        }
    }
}

/// Structured codes first; the description match is a locale-dependent
/// fallback for replies without a code.
fn is_not_found(code: &str, description: &str) -> bool {
    if NOT_FOUND_CODES.contains(&code) {
        return true;
    }
    if !code.is_empty() {
        return false;
    }
    let description = description.to_lowercase();
    NOT_FOUND_PHRASES
        .iter()
        .any(|phrase| description.contains(phrase))
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Bitrix24 truthiness for scalar results (`true`, non-zero ids, non-empty
/// strings and collections).
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_parse_success() {
        let envelope = Envelope::parse(200, r#"{"result": 17, "time": {"start": 1.0}}"#).unwrap();

        assert_eq!(envelope.result, json!(17));
        assert!(envelope.total.is_none());
        assert!(envelope.next.is_none());
    }

    #[test]
    fn test_parse_list_paging() {
        let envelope = Envelope::parse(200, r#"{"result": [], "total": 120, "next": 50}"#).unwrap();

        assert_eq!(envelope.total, Some(120));
        assert_eq!(envelope.next, Some(50));
    }

    #[test]
    fn test_parse_missing_result_is_null() {
        let envelope = Envelope::parse(200, r#"{"total": 0}"#).unwrap();

        assert_eq!(envelope.result, Value::Null);
    }

    #[test]
    fn test_parse_error_uses_description() {
        let err = Envelope::parse(200, r#"{"error": "x", "error_description": "y"}"#).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Application);
        assert!(err.to_string().contains('y'));
        match err {
            Error::Api {
                status,
                code,
                description,
            } => {
                assert_eq!(status, 200);
                assert_eq!(code, "x");
                assert_eq!(description, "y");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_without_description_uses_code() {
        let err = Envelope::parse(401, r#"{"error": "INVALID_CREDENTIALS"}"#).unwrap_err();

        match err {
            Error::Api {
                status,
                description,
                ..
            } => {
                assert_eq!(status, 401);
                assert_eq!(description, "INVALID_CREDENTIALS");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_empty_code_and_description() {
        let err = Envelope::parse(400, r#"{"error": ""}"#).unwrap_err();

        assert!(err.to_string().contains("Unknown error"));
    }

    #[test]
    fn test_parse_not_found_by_description() {
        let err = Envelope::parse(400, r#"{"error": "", "error_description": "Not found"}"#)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(ref d) if d == "Not found"));

        let err = Envelope::parse(400, r#"{"error": "", "error_description": "Сделка не найдена"}"#)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_parse_not_found_by_code() {
        let err = Envelope::parse(400, r#"{"error": "ERROR_NOT_FOUND", "error_description": "Missing"}"#)
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[test]
    fn test_parse_other_code_with_not_found_text_is_api() {
        let err = Envelope::parse(
            400,
            r#"{"error": "ERROR_METHOD_NOT_FOUND", "error_description": "Method not found!"}"#,
        )
        .unwrap_err();

        assert!(!err.is_not_found());
        assert!(matches!(err, Error::Api { ref code, .. } if code == "ERROR_METHOD_NOT_FOUND"));
    }

    #[test]
    fn test_parse_non_200_without_envelope_is_transport() {
        let err = Envelope::parse(503, "Service Unavailable").unwrap_err();

        assert!(matches!(err, Error::Transport { status: 503, ref body } if body == "Service Unavailable"));
    }

    #[test]
    fn test_parse_non_200_with_result_is_transport() {
        let err = Envelope::parse(500, r#"{"result": true}"#).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = Envelope::parse(200, "<html>").unwrap_err();

        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_parse_non_object() {
        let err = Envelope::parse(200, "[1, 2]").unwrap_err();

        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(12)));
        assert!(is_truthy(&json!("12")));
        assert!(is_truthy(&json!({"ID": "1"})));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!("0")));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&Value::Null));
    }
}
