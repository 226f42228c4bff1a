//! Translate DataFusion predicates into plugin qualifiers.

use chrono::{DateTime, Utc};
use datafusion::logical_expr::{BinaryExpr, Operator};
use datafusion::prelude::Expr;
use datafusion::scalar::ScalarValue;
use spcloud_tables::{FilterCondition, FilterOp, FilterValue};

fn filter_op(op: &Operator) -> Option<FilterOp> {
    match op {
        Operator::Eq => Some(FilterOp::Eq),
        Operator::NotEq => Some(FilterOp::Neq),
        Operator::Gt => Some(FilterOp::Gt),
        Operator::GtEq => Some(FilterOp::Gte),
        Operator::Lt => Some(FilterOp::Lt),
        Operator::LtEq => Some(FilterOp::Lte),
        _ => None,
    }
}

fn filter_value(value: &ScalarValue) -> Option<FilterValue> {
    let timestamp = |ts: Option<DateTime<Utc>>| ts.map(FilterValue::Timestamp);
    match value {
        ScalarValue::Utf8(Some(s)) | ScalarValue::LargeUtf8(Some(s)) | ScalarValue::Utf8View(Some(s)) => {
            Some(FilterValue::String(s.clone()))
        }
        ScalarValue::Boolean(Some(b)) => Some(FilterValue::Bool(*b)),
        ScalarValue::Int8(Some(n)) => Some(FilterValue::Int(i64::from(*n))),
        ScalarValue::Int16(Some(n)) => Some(FilterValue::Int(i64::from(*n))),
        ScalarValue::Int32(Some(n)) => Some(FilterValue::Int(i64::from(*n))),
        ScalarValue::Int64(Some(n)) => Some(FilterValue::Int(*n)),
        ScalarValue::UInt8(Some(n)) => Some(FilterValue::Int(i64::from(*n))),
        ScalarValue::UInt16(Some(n)) => Some(FilterValue::Int(i64::from(*n))),
        ScalarValue::UInt32(Some(n)) => Some(FilterValue::Int(i64::from(*n))),
        ScalarValue::UInt64(Some(n)) => i64::try_from(*n).ok().map(FilterValue::Int),
        ScalarValue::TimestampSecond(Some(s), _) => timestamp(DateTime::from_timestamp(*s, 0)),
        ScalarValue::TimestampMillisecond(Some(ms), _) => timestamp(DateTime::from_timestamp_millis(*ms)),
        ScalarValue::TimestampMicrosecond(Some(us), _) => timestamp(DateTime::from_timestamp_micros(*us)),
        ScalarValue::TimestampNanosecond(Some(ns), _) => timestamp(Some(DateTime::from_timestamp_nanos(*ns))),
        _ => None,
    }
}

/// `column <op> literal` or `literal <op> column`; anything else is `None`.
pub fn expr_to_condition(expr: &Expr) -> Option<FilterCondition> {
    let Expr::BinaryExpr(BinaryExpr { left, op, right }) = expr else {
        return None;
    };
    let op = filter_op(op)?;
    match (left.as_ref(), right.as_ref()) {
        (Expr::Column(column), Expr::Literal(value)) => {
            Some(FilterCondition::new(column.name.as_str(), op, filter_value(value)?))
        }
        (Expr::Literal(value), Expr::Column(column)) => {
            Some(FilterCondition::new(column.name.as_str(), op.flip(), filter_value(value)?))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use datafusion::prelude::{col, lit};

    #[test]
    fn test_column_op_literal() {
        let cond = expr_to_condition(&col("handle").eq(lit("dev"))).unwrap();
        assert_eq!(cond, FilterCondition::new("handle", FilterOp::Eq, FilterValue::String("dev".into())));

        let cond = expr_to_condition(&col("version_id").not_eq(lit(3i32))).unwrap();
        assert_eq!(cond.op, FilterOp::Neq);
        assert_eq!(cond.value, FilterValue::Int(3));
    }

    #[test]
    fn test_reversed_operands_flip_operator() {
        let cond = expr_to_condition(&lit(5i64).gt(col("duration"))).unwrap();
        assert_eq!(cond.column, "duration");
        assert_eq!(cond.op, FilterOp::Lt);
    }

    #[test]
    fn test_timestamp_literal() {
        let micros = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap().timestamp_micros();
        let literal = Expr::Literal(ScalarValue::TimestampMicrosecond(Some(micros), Some("UTC".into())));
        let cond = expr_to_condition(&col("created_at").gt_eq(literal)).unwrap();
        assert_eq!(cond.op, FilterOp::Gte);
        assert_eq!(
            cond.value,
            FilterValue::Timestamp(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_unsupported_shapes() {
        assert!(expr_to_condition(&col("handle").like(lit("d%"))).is_none());
        assert!(expr_to_condition(&col("a").eq(col("b"))).is_none());
        assert!(expr_to_condition(&col("handle").eq(lit(ScalarValue::Utf8(None)))).is_none());
        assert!(expr_to_condition(&col("handle").is_null()).is_none());
    }
}
