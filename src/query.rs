//! List query building: filters, ordering and paging.

use crate::models::{Deal, SortOrder};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};


/// Largest page the remote returns for a list call.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Default number of records requested by list calls.
pub const DEFAULT_LIMIT: u32 = 50;

/// Default number of records requested by title search.
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// Comparison operators of the filter convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Exact match, no prefix.
    Eq,
    /// Negated match, `!`.
    Not,
    /// Substring match, `%`.
    Like,
    /// Greater than, `>`.
    Gt,
    /// Less than, `<`.
    Lt,
    /// Greater than or equal, `>=`.
    Gte,
    /// Less than or equal, `<=`.
    Lte,
}

impl FilterOp {
    /// Key prefix for this operator.
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Eq => "",
            Self::Not => "!",
            Self::Like => "%",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
        }
    }

    /// Filter key for `field` under this operator.
    #[must_use]
    pub fn key(&self, field: &str) -> String {
        format!("{}{}", self.prefix(), field)
    }
}

/// Builder for the `filter` object of a list call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DealFilter(Map<String, Value>);

impl DealFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition.
    #[must_use]
    pub fn with(mut self, op: FilterOp, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(op.key(field), value.into());
        self
    }

    /// `field` equals `value`.
    #[must_use]
    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(FilterOp::Eq, field, value)
    }

    /// `field` differs from `value`.
    #[must_use]
    pub fn not(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(FilterOp::Not, field, value)
    }

    /// `field` contains `value`.
    #[must_use]
    pub fn like(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(FilterOp::Like, field, value)
    }

    /// `field` is greater than `value`.
    #[must_use]
    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(FilterOp::Gt, field, value)
    }

    /// `field` is less than `value`.
    #[must_use]
    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(FilterOp::Lt, field, value)
    }

    /// `field` is at least `value`.
    #[must_use]
    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(FilterOp::Gte, field, value)
    }

    /// `field` is at most `value`.
    #[must_use]
    pub fn lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(FilterOp::Lte, field, value)
    }

    /// Returns true if no condition is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the raw condition map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for DealFilter {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Sort keys, applied in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DealOrder(Vec<(String, SortOrder)>);

impl DealOrder {
    /// Creates an empty ordering.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorts by `field` ascending.
    #[must_use]
    pub fn asc(self, field: &str) -> Self {
        self.by(field, SortOrder::Asc)
    }

    /// Sorts by `field` descending.
    #[must_use]
    pub fn desc(self, field: &str) -> Self {
        self.by(field, SortOrder::Desc)
    }

    /// Sorts by `field` in `order`. Re-adding a field replaces its direction.
    #[must_use]
    pub fn by(mut self, field: &str, order: SortOrder) -> Self {
        match self.0.iter_mut().find(|(name, _)| name == field) {
            Some(entry) => entry.1 = order,
            None => self.0.push((field.to_string(), order)),
        }
        self
    }

    /// Returns true if no sort key is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over sort keys in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, SortOrder)> {
        self.0.iter().map(|(name, order)| (name.as_str(), *order))
    }
}

impl Serialize for DealOrder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, order) in &self.0 {
            map.serialize_entry(field, order)?;
        }
        map.end()
    }
}

/// Parameters of a `crm.deal.list` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    /// Filter conditions.
    pub filter: DealFilter,
    /// Fields to return; empty means the remote default.
    pub select: Vec<String>,
    /// Sort keys.
    pub order: DealOrder,
    /// Offset of the first record.
    pub start: u32,
    /// Requested page size; clamped to [`MAX_PAGE_SIZE`].
    pub limit: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            filter: DealFilter::new(),
            select: Vec::new(),
            order: DealOrder::new(),
            start: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ListParams {
    /// Creates default parameters (first page, 50 records).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter.
    #[must_use]
    pub fn filter(mut self, filter: DealFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the returned fields.
    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub fn order(mut self, order: DealOrder) -> Self {
        self.order = order;
        self
    }

    /// Sets the offset.
    #[must_use]
    pub fn start(mut self, start: u32) -> Self {
        self.start = start;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Page size actually requested.
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit.min(MAX_PAGE_SIZE)
    }

    /// Request body for the list call.
    #[must_use]
    pub fn payload(&self) -> ListPayload<'_> {
        ListPayload {
            start: self.start,
            limit: self.effective_limit(),
            filter: (!self.filter.is_empty()).then_some(&self.filter),
            select: (!self.select.is_empty()).then_some(self.select.as_slice()),
            order: (!self.order.is_empty()).then_some(&self.order),
        }
    }
}

/// Serialized body of a `crm.deal.list` call.
#[derive(Debug, Serialize)]
pub struct ListPayload<'a> {
    start: u32,
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a DealFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    select: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<&'a DealOrder>,
}

/// One page of a list call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DealPage {
    /// Deals on this page, in remote order.
    pub deals: Vec<Deal>,
    /// Total number of matching records, when reported.
    pub total: Option<u64>,
    /// Offset of the next page, absent on the last page.
    pub next: Option<u64>,
}

impl DealPage {
    /// Returns true if the remote reported a further page.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }
}
