//! Typed errors surfaced to the query host.

use spcloud_api::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    /// An API call failed; `operation` names the table callback that issued it.
    #[error("{operation}: {source}")]
    Api {
        operation: String,
        #[source]
        source: ApiError,
    },

    #[error("identity_handle '{handle}' ({handle_scope}) conflicts with identity_id '{id}' ({id_scope})")]
    ConflictingIdentity {
        handle: String,
        id: String,
        handle_scope: String,
        id_scope: String,
    },

    #[error("{table}: missing required qualifier '{column}'")]
    MissingQual { table: String, column: String },

    #[error("invalid value for '{column}': {message}")]
    InvalidQual { column: String, message: String },

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("failed to build row: {0}")]
    Row(#[from] serde_json::Error),
}

impl TableError {
    pub fn invalid_qual(column: &str, message: impl Into<String>) -> Self {
        TableError::InvalidQual {
            column: column.to_string(),
            message: message.into(),
        }
    }

    /// The API error underneath, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            TableError::Api { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Attach an operation name to API failures.
pub trait WithOperation<T> {
    fn with_operation(self, operation: &str) -> Result<T, TableError>;
}

impl<T> WithOperation<T> for Result<T, ApiError> {
    fn with_operation(self, operation: &str) -> Result<T, TableError> {
        self.map_err(|source| TableError::Api {
            operation: operation.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_is_prefixed() {
        let result: Result<(), ApiError> = Err(ApiError::NotFound("actor".to_string()));
        let err = result.with_operation("listWorkspace").unwrap_err();
        assert_eq!(err.to_string(), "listWorkspace: resource not found: actor");
        assert!(err.api_error().is_some_and(ApiError::is_not_found));
    }
}
