//! HTTP client for a PostgREST-compatible data API.
//!
//! Tables live under `{base_url}/rest/v1/<table>`. Every request carries the
//! project's public key in `apikey`; the bearer token is the user's access
//! token for [`Access::User`] or the service-role key for
//! [`Access::ServiceRole`].
//!
//! # Status mapping
//!
//! | Reply | Result |
//! |-------|--------|
//! | transport error, timeout, 5xx | [`DataError::Unavailable`] |
//! | 401, 403 | [`DataError::Forbidden`] |
//! | other 4xx | [`DataError::Rejected`] with the service's message |
//! | undecodable 2xx body | [`DataError::InvalidResponse`] |

use super::{Access, DataError, DataStore, Direction, Query, Result};
use crate::schema::{Projection, Table};
use reqwest::header::{HeaderValue, CONTENT_RANGE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Data API client configuration.
#[derive(Debug, Clone)]
pub struct DataApiConfig {
    /// Project URL (the API lives under `/rest/v1`)
    pub base_url: Url,
    /// Public (anon) key
    pub anon_key: String,
    /// Service-role key
    pub service_role_key: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

/// Data API client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct RestDataStore {
    http_client: Client,
    endpoint: String,
    anon_key: String,
    service_role_key: String,
}

impl std::fmt::Debug for RestDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestDataStore")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl RestDataStore {
    /// Create a client for the given project.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Unavailable`] if the HTTP client cannot be built.
    pub fn new(config: &DataApiConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DataError::Unavailable(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/rest/v1", config.base_url.as_str().trim_end_matches('/')),
            anon_key: config.anon_key.clone(),
            service_role_key: config.service_role_key.clone(),
        })
    }

    fn request<T: Table>(&self, method: Method, access: &Access) -> RequestBuilder {
        let (apikey, bearer) = match access {
            Access::User(token) => (&self.anon_key, token),
            Access::ServiceRole => (&self.service_role_key, &self.service_role_key),
        };
        self.http_client
            .request(method, format!("{}/{}", self.endpoint, T::NAME))
            .header("apikey", apikey)
            .bearer_auth(bearer)
    }

    async fn fetch<T: Table, P: Projection<T>>(&self, access: &Access, query: &Query) -> Result<Vec<P>> {
        let mut params = vec![("select".to_string(), P::COLUMNS.to_string())];
        params.extend(query_params(query));

        let response = self
            .request::<T>(Method::GET, access)
            .query(&params)
            .send()
            .await
            .map_err(transport_error)?;

        decode::<T, _>(response).await
    }
}

impl DataStore for RestDataStore {
    async fn select<T, P>(&self, access: &Access, query: &Query) -> Result<Vec<P>>
    where
        T: Table,
        P: Projection<T>,
    {
        self.fetch::<T, P>(access, query).await
    }

    async fn select_one<T, P>(&self, access: &Access, query: &Query) -> Result<Option<P>>
    where
        T: Table,
        P: Projection<T>,
    {
        let query = query.clone().limit(1);
        let rows = self.fetch::<T, P>(access, &query).await?;
        Ok(rows.into_iter().next())
    }

    async fn count<T: Table>(&self, access: &Access, query: &Query) -> Result<u64> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(query_params(&Query {
            filters: query.filters.clone(),
            ..Query::default()
        }));

        let response = self
            .request::<T>(Method::HEAD, access)
            .query(&params)
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(rejection::<T>(response).await);
        }
        response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(parse_content_range_total)
            .ok_or_else(|| DataError::InvalidResponse(format!("No row count for {}", T::NAME)))
    }

    async fn insert<T: Table>(&self, access: &Access, row: &T::Insert) -> Result<T::Row> {
        let response = self
            .request::<T>(Method::POST, access)
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await
            .map_err(transport_error)?;

        let rows: Vec<T::Row> = decode::<T, _>(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DataError::InvalidResponse(format!("Insert into {} returned no row", T::NAME)))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Query encoding
// ═══════════════════════════════════════════════════════════════════════

fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = query
        .filters
        .iter()
        .map(|(column, value)| (column.clone(), filter_value(value)))
        .collect();

    if let Some((column, direction)) = &query.order {
        let direction = match direction {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        };
        params.push(("order".to_string(), format!("{column}.{direction}")));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

fn filter_value(value: &Value) -> String {
    match value {
        Value::Null => "is.null".to_string(),
        Value::String(s) => format!("eq.{s}"),
        other => format!("eq.{other}"),
    }
}

/// Total from a `Content-Range` header such as `0-9/42` or `*/0`.
fn parse_content_range_total(header: &HeaderValue) -> Option<u64> {
    header.to_str().ok()?.rsplit_once('/')?.1.parse().ok()
}

// ═══════════════════════════════════════════════════════════════════════
// Response handling
// ═══════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    details: Option<String>,
}

fn transport_error(e: reqwest::Error) -> DataError {
    if e.is_timeout() {
        DataError::Unavailable("Data service timed out".to_string())
    } else {
        DataError::Unavailable(e.to_string())
    }
}

async fn rejection<T: Table>(response: Response) -> DataError {
    let status = response.status();
    if status.is_server_error() {
        return DataError::Unavailable(format!("Data service returned {status}"));
    }
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return DataError::Forbidden { table: T::NAME };
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|body| body.message.or(body.details))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request rejected").to_string());

    tracing::debug!(table = T::NAME, status = status.as_u16(), %message, "Data service rejected request");
    DataError::Rejected(message)
}

async fn decode<T: Table, R: DeserializeOwned>(response: Response) -> Result<R> {
    if !response.status().is_success() {
        return Err(rejection::<T>(response).await);
    }
    response
        .json()
        .await
        .map_err(|e| DataError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_encoding() {
        let query = Query::new()
            .eq("id", "6f1d4c52-6a43-4b8e-9b35-1f6f2f0a4c11")
            .eq("is_super_admin", true)
            .order_desc("created_at")
            .limit(10);
        assert_eq!(
            query_params(&query),
            vec![
                ("id".to_string(), "eq.6f1d4c52-6a43-4b8e-9b35-1f6f2f0a4c11".to_string()),
                ("is_super_admin".to_string(), "eq.true".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_null_filter() {
        assert_eq!(filter_value(&Value::Null), "is.null");
    }

    #[test]
    fn test_content_range_total() {
        assert_eq!(parse_content_range_total(&HeaderValue::from_static("0-9/42")), Some(42));
        assert_eq!(parse_content_range_total(&HeaderValue::from_static("*/0")), Some(0));
        assert_eq!(parse_content_range_total(&HeaderValue::from_static("0-9/*")), None);
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let store = RestDataStore::new(&DataApiConfig {
            base_url: Url::parse("https://abcd.supabase.co/").unwrap(),
            anon_key: "anon".to_string(),
            service_role_key: "service".to_string(),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap();
        assert_eq!(store.endpoint, "https://abcd.supabase.co/rest/v1");
        assert!(!format!("{store:?}").contains("service"));
    }
}
