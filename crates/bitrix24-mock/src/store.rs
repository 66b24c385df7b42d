//! `crm.deal.list` evaluation: filter, order, select and paging.

use crate::state::Record;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Largest page returned by a list call.
pub const PAGE_SIZE: u64 = 50;

/// Parameters of a list call.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Conditions keyed by optionally prefixed field names.
    #[serde(default)]
    pub filter: Map<String, Value>,
    /// Returned fields; empty or `*` returns everything.
    #[serde(default)]
    pub select: Vec<String>,
    /// Sort keys in priority order, `ASC` or `DESC`.
    #[serde(default)]
    pub order: Map<String, Value>,
    /// Offset of the first record.
    #[serde(default)]
    pub start: u64,
    /// Requested page size, capped at [`PAGE_SIZE`].
    #[serde(default)]
    pub limit: Option<u64>,
}

/// One evaluated page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListOutcome {
    /// Records on the page.
    pub items: Vec<Record>,
    /// Number of records matching the filter.
    pub total: u64,
    /// Offset of the next page, absent on the last page.
    pub next: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Not,
    Like,
    Gt,
    Lt,
    Gte,
    Lte,
}

/// Splits a filter key into operator and field name.
fn split_key(key: &str) -> (Op, &str) {
    const PREFIXES: [(&str, Op); 9] = [
        (">=", Op::Gte),
        ("<=", Op::Lte),
        ("!=", Op::Not),
        (">", Op::Gt),
        ("<", Op::Lt),
        ("!", Op::Not),
        ("%", Op::Like),
        ("=", Op::Eq),
        ("", Op::Eq),
    ];
    for (prefix, op) in PREFIXES {
        if let Some(field) = key.strip_prefix(prefix) {
            return (op, field);
        }
    }
    (Op::Eq, key)
}

fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Numeric comparison when both sides are numbers, text otherwise.
fn compare(left: &str, right: &str) -> Ordering {
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(l), Ok(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        _ => left.cmp(right),
    }
}

fn matches_condition(record: &Record, key: &str, expected: &Value) -> bool {
    let (op, field) = split_key(key);
    let actual = text(record.get(field));

    if let Value::Array(options) = expected {
        let any = options
            .iter()
            .any(|option| compare(&actual, &text(Some(option))) == Ordering::Equal);
        return match op {
            Op::Not => !any,
            _ => any,
        };
    }

    let expected = text(Some(expected));
    match op {
        Op::Eq => compare(&actual, &expected) == Ordering::Equal,
        Op::Not => compare(&actual, &expected) != Ordering::Equal,
        Op::Like => actual.to_lowercase().contains(&expected.to_lowercase()),
        Op::Gt => compare(&actual, &expected) == Ordering::Greater,
        Op::Lt => compare(&actual, &expected) == Ordering::Less,
        Op::Gte => compare(&actual, &expected) != Ordering::Less,
        Op::Lte => compare(&actual, &expected) != Ordering::Greater,
    }
}

/// Returns true if `record` satisfies every condition of `filter`.
#[must_use]
pub fn matches(record: &Record, filter: &Map<String, Value>) -> bool {
    filter
        .iter()
        .all(|(key, expected)| matches_condition(record, key, expected))
}

/// Sorts records by `order`; ties keep their incoming order.
pub fn sort(records: &mut [Record], order: &Map<String, Value>) {
    if order.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        for (field, direction) in order {
            let ordering = compare(&text(a.get(field)), &text(b.get(field)));
            let descending = direction
                .as_str()
                .is_some_and(|d| d.eq_ignore_ascii_case("DESC"));
            let ordering = if descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Keeps `ID` and the selected fields.
#[must_use]
pub fn project(record: Record, select: &[String]) -> Record {
    if select.is_empty() || select.iter().any(|field| field == "*") {
        return record;
    }
    record
        .into_iter()
        .filter(|(key, _)| key == "ID" || select.contains(key))
        .collect()
}

/// Evaluates a list call over `records`, which arrive ordered by id.
#[must_use]
pub fn list(records: Vec<Record>, query: &ListQuery) -> ListOutcome {
    let mut matching: Vec<Record> = records
        .into_iter()
        .filter(|record| matches(record, &query.filter))
        .collect();
    sort(&mut matching, &query.order);

    let total = matching.len() as u64;
    let page_size = query
        .limit
        .filter(|limit| *limit > 0)
        .unwrap_or(PAGE_SIZE)
        .min(PAGE_SIZE);

    let items: Vec<Record> = matching
        .into_iter()
        .skip(query.start as usize)
        .take(page_size as usize)
        .map(|record| project(record, &query.select))
        .collect();

    let end = query.start.saturating_add(items.len() as u64);
    let next = (end < total && !items.is_empty()).then_some(end);

    ListOutcome { items, total, next }
}
