//! Data API access.
//!
//! [`DataStore`] is the seam between handlers and the hosted data API. Every
//! call names its table through the [`Table`](crate::schema::Table) registry
//! and says whose credentials it runs with ([`Access`]); row-level security
//! is enforced by the backend, so reading with [`Access::User`] only ever
//! returns rows that user may see.

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod rest;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryDataStore;
pub use rest::RestDataStore;

use crate::schema::{Projection, Table};
use dbr_web::AppError;
use serde_json::Value;
use std::future::Future;
use thiserror::Error;

/// Result type for data-store operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Data-store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataError {
    /// The data API could not be reached, timed out or failed with a 5xx.
    #[error("Data service unavailable: {0}")]
    Unavailable(String),

    /// The credentials do not permit the operation.
    #[error("Access to {table} was denied")]
    Forbidden {
        /// Table involved
        table: &'static str,
    },

    /// The data API refused the request (constraint violation, bad filter).
    #[error("{0}")]
    Rejected(String),

    /// A response could not be understood.
    #[error("Invalid response from data service: {0}")]
    InvalidResponse(String),
}

impl DataError {
    /// Message safe to show to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unavailable(_) | Self::InvalidResponse(_) => {
                "The service is temporarily unavailable. Please try again.".to_string()
            }
            Self::Forbidden { .. } => "You do not have permission to do that.".to_string(),
            Self::Rejected(message) => message.clone(),
        }
    }
}

impl From<DataError> for AppError {
    fn from(err: DataError) -> Self {
        let message = err.user_message();
        match err {
            DataError::Forbidden { .. } => Self::forbidden(message),
            DataError::Rejected(_) => Self::bad_request(message),
            DataError::Unavailable(_) | DataError::InvalidResponse(_) => {
                Self::unavailable(message).with_source(anyhow::Error::new(err))
            }
        }
    }
}

/// Credentials a data-store call runs with.
#[derive(Clone, PartialEq, Eq)]
pub enum Access {
    /// The signed-in user's access token; row-level security applies.
    User(String),
    /// The service-role key; bypasses row-level security.
    ServiceRole,
}

impl Access {
    /// Access as the user holding `access_token`.
    #[must_use]
    pub fn user(access_token: impl Into<String>) -> Self {
        Self::User(access_token.into())
    }

    /// Label used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::ServiceRole => "service_role",
        }
    }
}

impl std::fmt::Debug for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

/// Row filter, ordering and limit for a read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Equality filters, all of which must hold.
    pub filters: Vec<(String, Value)>,
    /// Sort column and direction.
    pub order: Option<(String, Direction)>,
    /// Maximum number of rows.
    pub limit: Option<usize>,
}

impl Query {
    /// Every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep rows whose `column` equals `value`.
    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    /// Sort by `column`, largest first.
    #[must_use]
    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order = Some((column.into(), Direction::Descending));
        self
    }

    /// Sort by `column`, smallest first.
    #[must_use]
    pub fn order_asc(mut self, column: impl Into<String>) -> Self {
        self.order = Some((column.into(), Direction::Ascending));
        self
    }

    /// Return at most `limit` rows.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Typed access to the data API.
pub trait DataStore: Send + Sync + 'static {
    /// Read the rows of `T` matching `query`, shaped as `P`.
    fn select<T, P>(&self, access: &Access, query: &Query) -> impl Future<Output = Result<Vec<P>>> + Send
    where
        T: Table,
        P: Projection<T>;

    /// Read at most one row of `T` matching `query`.
    ///
    /// Returns `Ok(None)` when nothing matches.
    fn select_one<T, P>(&self, access: &Access, query: &Query) -> impl Future<Output = Result<Option<P>>> + Send
    where
        T: Table,
        P: Projection<T>;

    /// Count the rows of `T` matching `query`.
    fn count<T: Table>(&self, access: &Access, query: &Query) -> impl Future<Output = Result<u64>> + Send;

    /// Insert one row into `T`, returning it as stored.
    fn insert<T: Table>(&self, access: &Access, row: &T::Insert) -> impl Future<Output = Result<T::Row>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_access_debug_hides_token() {
        assert_eq!(format!("{:?}", Access::user("secret-token")), "user");
    }

    #[test]
    fn test_query_builder() {
        let query = Query::new().eq("id", "abc").order_desc("created_at").limit(10);
        assert_eq!(query.filters, vec![("id".to_string(), Value::from("abc"))]);
        assert_eq!(query.order, Some(("created_at".to_string(), Direction::Descending)));
        assert_eq!(query.limit, Some(10));
    }

    #[test]
    fn test_error_status_mapping() {
        let unavailable: AppError = DataError::Unavailable("timeout".into()).into();
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!unavailable.message().contains("timeout"));

        let rejected: AppError = DataError::Rejected("duplicate key".into()).into();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        assert_eq!(rejected.message(), "duplicate key");

        let forbidden: AppError = DataError::Forbidden { table: "clients" }.into();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    }
}
