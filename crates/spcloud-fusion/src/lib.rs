//! DataFusion host for Steampipe Cloud tables
//!
//! Every table is registered as a `TableProvider`. Simple `column <op> literal`
//! predicates and `LIMIT` are handed to the plugin; DataFusion re-applies all
//! predicates on the returned rows.

pub mod arrow_rows;
pub mod logging;
pub mod provider;
pub mod pushdown;

pub use arrow_rows::{arrow_schema, rows_to_record_batch};
pub use logging::init_tracing;
pub use provider::{register_tables, session_context, CloudTableProvider, PartialScanExec};
pub use pushdown::expr_to_condition;
