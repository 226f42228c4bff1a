//! Table and column definitions, and projection of API items into rows.

use serde::Serialize;
use serde_json::Value;

use crate::error::TableError;
use crate::filter::{FilterColumn, FilterOp};
use crate::query::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Int,
    Bool,
    Timestamp,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub description: &'static str,
    /// Dotted path into the API item; defaults to `name`.
    pub source: Option<&'static str>,
}

impl Column {
    const fn new(name: &'static str, column_type: ColumnType, description: &'static str) -> Self {
        Self {
            name,
            column_type,
            description,
            source: None,
        }
    }

    pub const fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ColumnType::String, description)
    }

    pub const fn int(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ColumnType::Int, description)
    }

    pub const fn bool(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ColumnType::Bool, description)
    }

    pub const fn timestamp(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ColumnType::Timestamp, description)
    }

    pub const fn json(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ColumnType::Json, description)
    }

    pub const fn from_path(mut self, source: &'static str) -> Self {
        self.source = Some(source);
        self
    }
}

/// A qualifier the list or get callback understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyColumn {
    pub name: &'static str,
    pub operators: &'static [FilterOp],
    pub required: bool,
}

impl KeyColumn {
    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            operators: &[FilterOp::Eq],
            required: false,
        }
    }

    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            operators: &[FilterOp::Eq],
            required: true,
        }
    }

    pub const fn with_operators(name: &'static str, operators: &'static [FilterOp]) -> Self {
        Self {
            name,
            operators,
            required: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: &'static str,
    pub description: &'static str,
    pub columns: Vec<Column>,
    pub list_keys: Vec<KeyColumn>,
    /// Columns compiled into the API `where` parameter.
    pub filter_columns: &'static [FilterColumn],
    /// All must have equality qualifiers for the get callback to run.
    pub get_keys: &'static [&'static str],
}

impl TableDef {
    pub fn new(name: &'static str, description: &'static str, columns: Vec<Column>) -> Self {
        Self {
            name,
            description,
            columns,
            list_keys: Vec::new(),
            filter_columns: &[],
            get_keys: &[],
        }
    }

    pub fn list_keys(mut self, keys: Vec<KeyColumn>) -> Self {
        self.list_keys = keys;
        self
    }

    pub fn filter_columns(mut self, columns: &'static [FilterColumn]) -> Self {
        self.filter_columns = columns;
        self
    }

    pub fn get_keys(mut self, keys: &'static [&'static str]) -> Self {
        self.get_keys = keys;
        self
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether a `column op value` qualifier is worth handing to this table.
    pub fn accepts_qual(&self, column: &str, op: FilterOp) -> bool {
        self.list_keys
            .iter()
            .any(|k| k.name == column && k.operators.contains(&op))
            || self
                .filter_columns
                .iter()
                .any(|f| f.name == column && f.operators.contains(&op))
            || (op == FilterOp::Eq && self.get_keys.contains(&column))
    }

    /// Turn an API item into a row with every declared column present.
    /// `extras` override values taken from the item.
    pub fn project<T: Serialize>(&self, item: &T, extras: &[(&str, Value)]) -> Result<Row, TableError> {
        let value = serde_json::to_value(item)?;
        let mut row = Row::new();
        for column in &self.columns {
            let projected = match extras.iter().find(|(name, _)| *name == column.name) {
                Some((_, v)) => v.clone(),
                None => lookup(&value, column.source.unwrap_or(column.name)),
            };
            row.insert(column.name.to_string(), projected);
        }
        Ok(row)
    }
}

fn lookup(value: &Value, path: &str) -> Value {
    path.split('.')
        .try_fold(value, |current, key| current.get(key))
        .cloned()
        .unwrap_or(Value::Null)
}
