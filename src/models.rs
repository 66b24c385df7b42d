//! Deal value object and wire-format field types.
//!
//! Bitrix24 sends deal records as objects keyed by upper-case field names
//! with loosely typed values: identifiers and amounts arrive as strings or
//! numbers, flags as `"Y"`/`"N"`, and missing values as `null`. [`Deal`]
//! normalizes those values on deserialization and writes them back in the
//! same wire shape.

use crate::error::Error;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;


/// Currency applied when the remote omits `CURRENCY_ID`.
pub const DEFAULT_CURRENCY: &str = "RUB";

/// Fields the remote manages itself; never sent in update bodies.
const READ_ONLY_FIELDS: [&str; 4] = ["ID", "CREATED_BY_ID", "DATE_CREATE", "DATE_MODIFY"];

/// A Bitrix24 CRM deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Deal {
    /// Vendor-assigned identifier.
    #[serde(default, deserialize_with = "wire::opt_string")]
    pub id: Option<String>,
    /// Deal title.
    #[serde(default, deserialize_with = "wire::string")]
    pub title: String,
    /// Pipeline stage identifier.
    #[serde(default, deserialize_with = "wire::string")]
    pub stage_id: String,
    /// Deal amount.
    #[serde(
        default,
        deserialize_with = "wire::amount",
        serialize_with = "wire::serialize_amount"
    )]
    pub opportunity: Decimal,
    /// Three-letter currency code.
    #[serde(default = "default_currency", deserialize_with = "wire::currency")]
    pub currency_id: String,
    /// Linked contact.
    #[serde(default, deserialize_with = "wire::opt_string")]
    pub contact_id: Option<String>,
    /// Linked company.
    #[serde(default, deserialize_with = "wire::opt_string")]
    pub company_id: Option<String>,
    /// Responsible user.
    #[serde(default, deserialize_with = "wire::opt_string")]
    pub assigned_by_id: Option<String>,
    /// User who created the deal.
    #[serde(default, deserialize_with = "wire::opt_string")]
    pub created_by_id: Option<String>,
    /// Creation timestamp in vendor format.
    #[serde(default, deserialize_with = "wire::opt_string")]
    pub date_create: Option<String>,
    /// Last modification timestamp in vendor format.
    #[serde(default, deserialize_with = "wire::opt_string")]
    pub date_modify: Option<String>,
    /// `OPENED` flag.
    #[serde(default, with = "wire::flag")]
    pub opened: bool,
    /// `CLOSED` flag. Not reconciled with `opened`.
    #[serde(default, with = "wire::flag")]
    pub closed: bool,
    /// Free-text comments.
    #[serde(default, deserialize_with = "wire::string")]
    pub comments: String,
    /// Free-text additional info.
    #[serde(default, deserialize_with = "wire::string")]
    pub additional_info: String,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl Default for Deal {
    fn default() -> Self {
        Self {
            id: None,
            title: String::new(),
            stage_id: String::new(),
            opportunity: Decimal::ZERO,
            currency_id: default_currency(),
            contact_id: None,
            company_id: None,
            assigned_by_id: None,
            created_by_id: None,
            date_create: None,
            date_modify: None,
            opened: false,
            closed: false,
            comments: String::new(),
            additional_info: String::new(),
        }
    }
}

impl Deal {
    /// Builds a deal from a raw wire-format record.
    ///
    /// # Errors
    /// Returns error if a value cannot be coerced, e.g. a non-numeric amount.
    pub fn from_fields(fields: Map<String, Value>) -> Result<Self, Error> {
        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    /// Converts the deal back into its wire-format record.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_fields(&self) -> Result<DealFields, Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(DealFields(map)),
            other => Err(Error::Encode(format!("deal serialized to {}", other))),
        }
    }

    /// Converts the deal into an update body, dropping remote-managed fields.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_update_fields(&self) -> Result<DealFields, Error> {
        let mut fields = self.to_fields()?;
        for key in READ_ONLY_FIELDS {
            fields.remove(key);
        }
        Ok(fields)
    }
}

impl fmt::Display for Deal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Deal(ID={}, title='{}', opportunity={} {})",
            self.id.as_deref().unwrap_or("-"),
            self.title,
            self.opportunity,
            self.currency_id
        )
    }
}

/// A partial deal record keyed by wire field names.
///
/// Used as create and update input. Typed setters cover the standard fields;
/// [`DealFields::set`] covers anything else, such as `UF_CRM_*` user fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DealFields(Map<String, Value>);

impl DealFields {
    /// Creates an empty field set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a raw field.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets `TITLE`.
    #[must_use]
    pub fn title(self, title: impl Into<String>) -> Self {
        self.set("TITLE", title.into())
    }

    /// Sets `STAGE_ID`.
    #[must_use]
    pub fn stage(self, stage: impl Into<String>) -> Self {
        self.set("STAGE_ID", stage.into())
    }

    /// Sets `OPPORTUNITY`.
    #[must_use]
    pub fn amount(self, amount: Decimal) -> Self {
        self.set("OPPORTUNITY", amount.to_string())
    }

    /// Sets `CURRENCY_ID`.
    #[must_use]
    pub fn currency(self, currency: impl Into<String>) -> Self {
        self.set("CURRENCY_ID", currency.into())
    }

    /// Sets `CONTACT_ID`.
    #[must_use]
    pub fn contact(self, contact_id: impl fmt::Display) -> Self {
        self.set("CONTACT_ID", contact_id.to_string())
    }

    /// Sets `COMPANY_ID`.
    #[must_use]
    pub fn company(self, company_id: impl fmt::Display) -> Self {
        self.set("COMPANY_ID", company_id.to_string())
    }

    /// Sets `ASSIGNED_BY_ID`.
    #[must_use]
    pub fn assignee(self, user_id: impl fmt::Display) -> Self {
        self.set("ASSIGNED_BY_ID", user_id.to_string())
    }

    /// Sets `COMMENTS`.
    #[must_use]
    pub fn comments(self, comments: impl Into<String>) -> Self {
        self.set("COMMENTS", comments.into())
    }

    /// Sets `ADDITIONAL_INFO`.
    #[must_use]
    pub fn additional_info(self, info: impl Into<String>) -> Self {
        self.set("ADDITIONAL_INFO", info.into())
    }

    /// Sets `OPENED`.
    #[must_use]
    pub fn opened(self, opened: bool) -> Self {
        self.set("OPENED", wire::encode_flag(opened))
    }

    /// Sets `CLOSED`.
    #[must_use]
    pub fn closed(self, closed: bool) -> Self {
        self.set("CLOSED", wire::encode_flag(closed))
    }

    /// Inserts a raw field in place, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes a field.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns true if the field is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the field set and returns the underlying map.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for DealFields {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Standard deal stages of the default pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealStage {
    /// Newly created.
    New,
    /// Preparing documents.
    Preparation,
    /// Prepayment invoice issued.
    PrepaymentInvoice,
    /// In progress.
    Executing,
    /// Final invoice issued.
    FinalInvoice,
    /// Closed as won.
    Won,
    /// Closed as lost.
    Lose,
}

impl DealStage {
    /// Wire identifier of the stage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Preparation => "PREPARATION",
            Self::PrepaymentInvoice => "PREPAYMENT_INVOICE",
            Self::Executing => "EXECUTING",
            Self::FinalInvoice => "FINAL_INVOICE",
            Self::Won => "WON",
            Self::Lose => "LOSE",
        }
    }
}

impl fmt::Display for DealStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DealStage> for String {
    fn from(stage: DealStage) -> Self {
        stage.as_str().to_string()
    }
}

/// Currencies available on a default portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Russian ruble.
    Rub,
    /// US dollar.
    Usd,
    /// Euro.
    Eur,
}

impl Currency {
    /// ISO 4217 code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rub => "RUB",
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.as_str().to_string()
    }
}

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "ASC"),
            Self::Desc => write!(f, "DESC"),
        }
    }
}

/// Lenient wire-value coercions.
mod wire {
    use super::DEFAULT_CURRENCY;
    use rust_decimal::Decimal;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    fn scalar_to_string(value: Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => Some(other.to_string()),
        }
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(scalar_to_string(Value::deserialize(d)?))
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(scalar_to_string(Value::deserialize(d)?).unwrap_or_default())
    }

    pub fn currency<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(scalar_to_string(Value::deserialize(d)?)
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()))
    }

    pub fn parse_amount(raw: &str) -> Option<Decimal> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Some(Decimal::ZERO);
        }
        raw.parse::<Decimal>()
            .ok()
            .or_else(|| Decimal::from_scientific(raw).ok())
    }

    pub fn amount<'de, D: Deserializer<'de>>(d: D) -> Result<Decimal, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(Decimal::ZERO),
            Value::Number(n) => parse_amount(&n.to_string())
                .ok_or_else(|| D::Error::custom(format!("invalid OPPORTUNITY {}", n))),
            Value::String(s) => parse_amount(&s)
                .ok_or_else(|| D::Error::custom(format!("invalid OPPORTUNITY '{}'", s))),
            other => Err(D::Error::custom(format!("invalid OPPORTUNITY {}", other))),
        }
    }

    pub fn serialize_amount<S: Serializer>(amount: &Decimal, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&amount.to_string())
    }

    pub fn encode_flag(value: bool) -> &'static str {
        if value { "Y" } else { "N" }
    }

    pub mod flag {
        use super::*;

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
            Ok(match Value::deserialize(d)? {
                Value::String(s) => s == "Y",
                Value::Bool(b) => b,
                _ => false,
            })
        }

        pub fn serialize<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(encode_flag(*value))
        }
    }
}
