//! Steampipe Cloud API client
//!
//! This crate resolves connection settings and talks to the REST API:
//! - `config`: token/host resolution with environment fallback
//! - `client`: authenticated reqwest client returning typed pages
//! - `retry`: Fibonacci backoff on HTTP 429

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod paths;
pub mod retry;

pub use client::{connect, ApiClient};
pub use config::{ConnectionConfig, ResolvedConnection};
pub use error::ApiError;
pub use metrics::ApiMetrics;
pub use models::{
    IdentitySummary, ListParams, Org, OrgMembership, Page, Resource, User, Workspace, WorkspaceMod,
};
pub use paths::{ApiPath, Scope};
pub use retry::RetryPolicy;
