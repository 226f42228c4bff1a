//! Steampipe Cloud tables
//!
//! This crate maps SQL-style queries onto the Steampipe Cloud API:
//! - `identity`: user/org endpoint dispatch and the per-session actor cache
//! - `lister`: cursor pagination with a row budget and rate-limit retry
//! - `filter`: pushed-down predicates compiled into the API `where` string
//! - `tables`: one binding per exposed relation

pub mod error;
pub mod filter;
pub mod identity;
pub mod lister;
pub mod plugin;
pub mod query;
pub mod schema;
pub mod session;
pub mod tables;

pub use error::TableError;
pub use filter::{compile_filter, FilterColumn, FilterCondition, FilterOp, FilterValue};
pub use identity::{
    resolve_identity, resolve_workspace_details, ActorCache, IdentityRef, IdentityWorkspaceDetails,
    ResolvedIdentity, WorkspaceOrigin,
};
pub use lister::{list_pages, page_size, RowBudget};
pub use plugin::Plugin;
pub use query::{QueryContext, Row, RowSink};
pub use schema::{Column, ColumnType, KeyColumn, TableDef};
pub use session::Session;
pub use tables::Table;
