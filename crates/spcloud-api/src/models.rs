//! Response models.
//!
//! Only the fields the plugin reasons about are typed. Everything else the API
//! returns is kept in a flattened map so table definitions can project it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One page of a list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<T>,
    #[serde(default)]
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// Cursor for the following page; an empty string means there is none.
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_token.as_deref().filter(|t| !t.is_empty())
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Query parameters accepted by list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub limit: Option<u32>,
    pub next_token: Option<String>,
    pub where_clause: Option<String>,
}

impl ListParams {
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn with_where(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        self.where_clause = if filter.is_empty() { None } else { Some(filter) };
        self
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(token) = &self.next_token {
            pairs.push(("next_token", token.clone()));
        }
        if let Some(filter) = &self.where_clause {
            pairs.push(("where", filter.clone()));
        }
        pairs
    }
}

/// A user record; `GET actor` returns the caller's own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub handle: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Org {
    pub id: String,
    pub handle: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An entry of `user/{handle}/org`: the user's membership plus the embedded org.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgMembership {
    pub org: Org,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Owner summary embedded in workspace responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentitySummary {
    pub id: String,
    pub handle: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub handle: String,
    pub identity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentitySummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceMod {
    pub id: String,
    pub identity_id: String,
    pub workspace_id: String,
    pub alias: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Any other resource, kept as the raw object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Resource {
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}
