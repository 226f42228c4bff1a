//! Arrow schema and record batches from table definitions and JSON rows.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Int64Array, RecordBatch, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use chrono::DateTime;
use serde_json::Value;
use spcloud_tables::{ColumnType, Row, TableDef};
use tracing::debug;

const UTC: &str = "UTC";

fn arrow_type(column_type: ColumnType) -> DataType {
    match column_type {
        ColumnType::String | ColumnType::Json => DataType::Utf8,
        ColumnType::Int => DataType::Int64,
        ColumnType::Bool => DataType::Boolean,
        ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, Some(UTC.into())),
    }
}

/// One nullable field per declared column, in declaration order.
pub fn arrow_schema(def: &TableDef) -> SchemaRef {
    let fields: Vec<Field> = def
        .columns
        .iter()
        .map(|c| Field::new(c.name, arrow_type(c.column_type), true))
        .collect();
    Arc::new(Schema::new(fields))
}

fn string_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn timestamp_micros(column: &str, value: &Value) -> Option<i64> {
    let raw = value.as_str()?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.timestamp_micros()),
        Err(e) => {
            debug!("{}: unparsable timestamp '{}': {}", column, raw, e);
            None
        }
    }
}

/// Convert rows into a single batch laid out as `def`'s columns.
pub fn rows_to_record_batch(def: &TableDef, rows: &[Row]) -> anyhow::Result<RecordBatch> {
    let schema = arrow_schema(def);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(def.columns.len());

    for column in &def.columns {
        let values = rows.iter().map(|row| row.get(column.name).unwrap_or(&Value::Null));
        let array: ArrayRef = match column.column_type {
            ColumnType::Int => {
                let values: Vec<Option<i64>> = values.map(Value::as_i64).collect();
                Arc::new(Int64Array::from(values))
            }
            ColumnType::Bool => {
                let values: Vec<Option<bool>> = values.map(Value::as_bool).collect();
                Arc::new(BooleanArray::from(values))
            }
            ColumnType::Timestamp => {
                let values: Vec<Option<i64>> = values.map(|v| timestamp_micros(column.name, v)).collect();
                Arc::new(TimestampMicrosecondArray::from(values).with_timezone(UTC))
            }
            ColumnType::String | ColumnType::Json => {
                let values: Vec<Option<String>> = values.map(string_value).collect();
                Arc::new(StringArray::from(values))
            }
        };
        columns.push(array);
    }

    Ok(RecordBatch::try_new(schema, columns)?)
}
