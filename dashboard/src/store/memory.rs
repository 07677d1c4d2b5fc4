//! In-memory data store for tests.
//!
//! Rows are kept as JSON objects per table, so projections deserialize from
//! full rows exactly as they would from the data API. Row-level security is
//! not modelled; [`MemoryDataStore::forbid_user_access`] stands in for a
//! policy that refuses user tokens on a table.

use super::{Access, DataError, DataStore, Direction, Query, Result};
use crate::schema::{Projection, Table};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Kind of data-store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `select` or `select_one`
    Select,
    /// `count`
    Count,
    /// `insert`
    Insert,
}

/// A call the store received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    /// What was asked.
    pub operation: Operation,
    /// Table name.
    pub table: &'static str,
    /// Credentials used.
    pub access: Access,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<&'static str, Vec<Value>>,
    failing: HashSet<&'static str>,
    user_forbidden: HashSet<&'static str>,
    calls: Vec<StoreCall>,
}

/// In-memory [`DataStore`].
///
/// Clones share state, so a test can keep one handle while the application
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataStore {
    state: Arc<Mutex<MemoryState>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryDataStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a row directly, bypassing access checks.
    ///
    /// Missing columns are filled from [`Table::column_defaults`].
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Rejected`] if the row is not a JSON object.
    pub fn seed<T: Table>(&self, row: Value) -> Result<()> {
        let row = with_defaults::<T>(row)?;
        self.lock().tables.entry(T::NAME).or_default().push(row);
        Ok(())
    }

    /// All rows of `T` as stored.
    #[must_use]
    pub fn rows<T: Table>(&self) -> Vec<Value> {
        self.lock().tables.get(T::NAME).cloned().unwrap_or_default()
    }

    /// Simulate an outage (every call fails with `Unavailable`).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every call touching `T` fail with `Unavailable`.
    pub fn fail_table<T: Table>(&self) {
        self.lock().failing.insert(T::NAME);
    }

    /// Refuse user-token calls on `T`, as a row-level security policy would.
    pub fn forbid_user_access<T: Table>(&self) {
        self.lock().user_forbidden.insert(T::NAME);
    }

    /// Calls received so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    fn begin<T: Table>(&self, operation: Operation, access: &Access) -> Result<MutexGuard<'_, MemoryState>> {
        let mut state = self.lock();
        state.calls.push(StoreCall {
            operation,
            table: T::NAME,
            access: access.clone(),
        });

        if self.unavailable.load(Ordering::SeqCst) || state.failing.contains(T::NAME) {
            return Err(DataError::Unavailable("Memory data store is down".to_string()));
        }
        if matches!(access, Access::User(_)) && state.user_forbidden.contains(T::NAME) {
            return Err(DataError::Forbidden { table: T::NAME });
        }
        Ok(state)
    }

    fn matching<T: Table, P: Projection<T>>(&self, access: &Access, query: &Query) -> Result<Vec<P>> {
        let state = self.begin::<T>(Operation::Select, access)?;
        let mut rows: Vec<Value> = state
            .tables
            .get(T::NAME)
            .map(|rows| rows.iter().filter(|row| matches_filters(row, query)).cloned().collect())
            .unwrap_or_default();
        drop(state);

        if let Some((column, direction)) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare(a.get(column), b.get(column));
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        rows.into_iter().map(from_row).collect()
    }
}

impl DataStore for MemoryDataStore {
    async fn select<T, P>(&self, access: &Access, query: &Query) -> Result<Vec<P>>
    where
        T: Table,
        P: Projection<T>,
    {
        self.matching::<T, P>(access, query)
    }

    async fn select_one<T, P>(&self, access: &Access, query: &Query) -> Result<Option<P>>
    where
        T: Table,
        P: Projection<T>,
    {
        let rows = self.matching::<T, P>(access, &query.clone().limit(1))?;
        Ok(rows.into_iter().next())
    }

    async fn count<T: Table>(&self, access: &Access, query: &Query) -> Result<u64> {
        let state = self.begin::<T>(Operation::Count, access)?;
        let count = state
            .tables
            .get(T::NAME)
            .map_or(0, |rows| rows.iter().filter(|row| matches_filters(row, query)).count());
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn insert<T: Table>(&self, access: &Access, row: &T::Insert) -> Result<T::Row> {
        let value = serde_json::to_value(row).map_err(|e| DataError::Rejected(e.to_string()))?;
        let value = with_defaults::<T>(value)?;
        let stored: T::Row = from_row(value.clone())?;

        let mut state = self.begin::<T>(Operation::Insert, access)?;
        let rows = state.tables.entry(T::NAME).or_default();
        let duplicate = value
            .get("id")
            .is_some_and(|id| rows.iter().any(|existing| existing.get("id") == Some(id)));
        if duplicate {
            return Err(DataError::Rejected(format!(
                "duplicate key value violates unique constraint \"{}_pkey\"",
                T::NAME
            )));
        }
        rows.push(value);
        Ok(stored)
    }
}

fn with_defaults<T: Table>(row: Value) -> Result<Value> {
    let Value::Object(mut row) = row else {
        return Err(DataError::Rejected("Row must be a JSON object".to_string()));
    };
    let defaults: Map<String, Value> = T::column_defaults();
    for (column, value) in defaults {
        row.entry(column).or_insert(value);
    }
    Ok(Value::Object(row))
}

fn from_row<R: DeserializeOwned>(row: Value) -> Result<R> {
    serde_json::from_value(row).map_err(|e| DataError::InvalidResponse(e.to_string()))
}

fn matches_filters(row: &Value, query: &Query) -> bool {
    query
        .filters
        .iter()
        .all(|(column, expected)| row.get(column).unwrap_or(&Value::Null) == expected)
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None | Some(Value::Null), Some(_)) => CmpOrdering::Less,
        (Some(_), None | Some(Value::Null)) => CmpOrdering::Greater,
        _ => CmpOrdering::Equal,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::schema::{
        ClientRow, ClientSettings, ClientSummary, Clients, Industry, NewClient, NewUserProfile, Role, Users,
    };
    use serde_json::json;

    fn new_client(name: &str) -> NewClient {
        NewClient {
            company_name: name.to_string(),
            company_email: None,
            company_phone: None,
            industry: Industry::Solar,
            settings: ClientSettings::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_fills_defaults_and_returns_row() {
        let store = MemoryDataStore::new();
        let row: ClientRow = store
            .insert::<Clients>(&Access::user("token"), &new_client("Acme"))
            .await
            .unwrap();

        assert_eq!(row.company_name, "Acme");
        assert_eq!(row.industry, Industry::Solar);
        assert_eq!(store.rows::<Clients>().len(), 1);
    }

    #[tokio::test]
    async fn test_select_orders_and_limits() {
        let store = MemoryDataStore::new();
        for (name, created) in [("old", "2024-01-01T00:00:00Z"), ("new", "2024-03-01T00:00:00Z"), ("mid", "2024-02-01T00:00:00Z")] {
            store
                .seed::<Clients>(json!({ "company_name": name, "created_at": created }))
                .unwrap();
        }

        let rows: Vec<ClientSummary> = store
            .select::<Clients, ClientSummary>(
                &Access::ServiceRole,
                &Query::new().order_desc("created_at").limit(2),
            )
            .await
            .unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.company_name.as_str()).collect();
        assert_eq!(names, ["new", "mid"]);
    }

    #[tokio::test]
    async fn test_count_with_filter() {
        let store = MemoryDataStore::new();
        store.seed::<Clients>(json!({ "company_name": "a", "plan": "pro" })).unwrap();
        store.seed::<Clients>(json!({ "company_name": "b" })).unwrap();

        let access = Access::ServiceRole;
        assert_eq!(store.count::<Clients>(&access, &Query::new()).await.unwrap(), 2);
        assert_eq!(
            store.count::<Clients>(&access, &Query::new().eq("plan", "pro")).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_switches() {
        let store = MemoryDataStore::new();
        store.forbid_user_access::<Clients>();
        assert_eq!(
            store.count::<Clients>(&Access::user("t"), &Query::new()).await.unwrap_err(),
            DataError::Forbidden { table: "clients" }
        );
        assert!(store.count::<Clients>(&Access::ServiceRole, &Query::new()).await.is_ok());

        store.set_unavailable(true);
        assert!(matches!(
            store.count::<Clients>(&Access::ServiceRole, &Query::new()).await.unwrap_err(),
            DataError::Unavailable(_)
        ));
        assert_eq!(store.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let store = MemoryDataStore::new();
        let profile = NewUserProfile {
            id: uuid::Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            full_name: None,
            role: Role::User,
        };

        store.insert::<Users>(&Access::ServiceRole, &profile).await.unwrap();
        let err = store.insert::<Users>(&Access::ServiceRole, &profile).await.unwrap_err();
        assert!(matches!(err, DataError::Rejected(message) if message.contains("users_pkey")));
        assert_eq!(store.rows::<Users>().len(), 1);
    }
}
