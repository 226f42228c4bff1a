//! Host contract: what a query asks for and where rows go.

use serde_json::{Map, Value};

use crate::filter::{FilterCondition, FilterOp, FilterValue};
use crate::identity::IdentityRef;
use crate::lister::{Budget, RowBudget};

/// A result row keyed by column name.
pub type Row = Map<String, Value>;

/// Qualifiers and limit handed down by the query host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryContext {
    pub quals: Vec<FilterCondition>,
    pub limit: Option<u64>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_qual(mut self, column: &str, op: FilterOp, value: FilterValue) -> Self {
        self.quals.push(FilterCondition::new(column, op, value));
        self
    }

    /// Shorthand for an equality qualifier on a string column.
    pub fn with_eq(self, column: &str, value: &str) -> Self {
        self.with_qual(column, FilterOp::Eq, FilterValue::String(value.to_string()))
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Value of the first non-empty `column = '...'` qualifier.
    pub fn equals_str(&self, column: &str) -> Option<&str> {
        self.quals
            .iter()
            .filter(|q| q.column == column && q.op == FilterOp::Eq)
            .find_map(|q| q.value.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn identity_ref(&self) -> IdentityRef {
        IdentityRef::new(self.equals_str("identity_handle"), self.equals_str("identity_id"))
    }
}

/// Collects rows for the host and tracks how many more it wants.
#[derive(Debug, Default)]
pub struct RowSink {
    rows: Vec<Row>,
    budget: RowBudget,
}

impl RowSink {
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            rows: Vec::new(),
            budget: RowBudget::from_limit(limit),
        }
    }

    pub fn stream_row(&mut self, row: Row) {
        if self.budget.is_exhausted() {
            return;
        }
        self.rows.push(row);
        self.budget.consume();
    }

    /// `None` when the host set no limit.
    pub fn rows_remaining(&self) -> Option<u64> {
        self.budget.remaining()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl Budget for RowSink {
    fn is_exhausted(&self) -> bool {
        self.budget.is_exhausted()
    }

    fn remaining(&self) -> Option<u64> {
        self.budget.remaining()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: &str) -> Row {
        let mut r = Row::new();
        r.insert("id".to_string(), json!(id));
        r
    }

    #[test]
    fn test_equals_str_ignores_other_operators_and_empty() {
        let ctx = QueryContext::new()
            .with_qual("handle", FilterOp::Neq, FilterValue::String("a".into()))
            .with_eq("identity_id", "")
            .with_eq("handle", "dev");
        assert_eq!(ctx.equals_str("handle"), Some("dev"));
        assert_eq!(ctx.equals_str("identity_id"), None);
        assert_eq!(ctx.identity_ref(), IdentityRef::default());
    }

    #[test]
    fn test_sink_stops_at_limit() {
        let mut sink = RowSink::new(Some(2));
        sink.stream_row(row("a"));
        assert_eq!(sink.rows_remaining(), Some(1));
        sink.stream_row(row("b"));
        sink.stream_row(row("c"));
        assert!(sink.is_exhausted());
        assert_eq!(sink.into_rows().len(), 2);
    }

    #[test]
    fn test_unlimited_sink() {
        let mut sink = RowSink::new(None);
        for i in 0..250 {
            sink.stream_row(row(&i.to_string()));
        }
        assert_eq!(sink.rows_remaining(), None);
        assert_eq!(sink.len(), 250);
    }
}
