//! Compile pushed-down predicates into the API's `where` filter string.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilterCondition {
    pub column: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Timestamp(DateTime<Utc>),
    String(String),
}

/// Operators accepted on plain string columns.
pub const STRING_OPS: &[FilterOp] = &[FilterOp::Eq, FilterOp::Neq];

/// Operators accepted on timestamp columns.
pub const RANGE_OPS: &[FilterOp] = &[
    FilterOp::Eq,
    FilterOp::Neq,
    FilterOp::Gt,
    FilterOp::Gte,
    FilterOp::Lt,
    FilterOp::Lte,
];

/// A column the remote API accepts in its `where` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterColumn {
    pub name: &'static str,
    pub operators: &'static [FilterOp],
}

impl FilterColumn {
    pub const fn string(name: &'static str) -> Self {
        Self {
            name,
            operators: STRING_OPS,
        }
    }

    pub const fn range(name: &'static str) -> Self {
        Self {
            name,
            operators: RANGE_OPS,
        }
    }
}

impl FilterOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Neq => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
        }
    }

    /// The operator with its operands swapped (`5 > x` is `x < 5`).
    pub fn flip(&self) -> Self {
        match self {
            FilterOp::Gt => FilterOp::Lt,
            FilterOp::Gte => FilterOp::Lte,
            FilterOp::Lt => FilterOp::Gt,
            FilterOp::Lte => FilterOp::Gte,
            other => *other,
        }
    }
}

fn escape_literal(s: &str) -> String {
    s.replace('\'', "''")
}

/// `2023-01-01 00:00:00.00000`: UTC, five fractional digits.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    let fraction = (ts.timestamp_subsec_nanos() / 10_000).min(99_999);
    format!("{}.{:05}", ts.format("%Y-%m-%d %H:%M:%S"), fraction)
}

impl FilterValue {
    /// Literal text as it appears between the quotes.
    pub fn to_literal(&self) -> String {
        match self {
            FilterValue::String(v) => escape_literal(v),
            FilterValue::Timestamp(ts) => format_timestamp(ts),
            FilterValue::Int(n) => n.to_string(),
            FilterValue::Bool(b) => b.to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FilterValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl FilterCondition {
    pub fn new(column: impl Into<String>, op: FilterOp, value: FilterValue) -> Self {
        Self {
            column: column.into(),
            op,
            value,
        }
    }

    pub fn to_filter_clause(&self) -> String {
        format!("{} {} '{}'", self.column, self.op.as_sql(), self.value.to_literal())
    }
}

/// Build the `where` string for a list call.
///
/// Only conditions on `columns` with an operator the column supports are
/// rendered, in the order the columns are declared. A non-empty `query_where`
/// is appended verbatim.
pub fn compile_filter(
    conditions: &[FilterCondition],
    columns: &[FilterColumn],
    query_where: Option<&str>,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    for column in columns {
        for condition in conditions.iter().filter(|c| c.column == column.name) {
            if column.operators.contains(&condition.op) {
                parts.push(condition.to_filter_clause());
            }
        }
    }

    if let Some(raw) = query_where.map(str::trim).filter(|q| !q.is_empty()) {
        parts.push(raw.to_string());
    }

    parts.join(" and ")
}
