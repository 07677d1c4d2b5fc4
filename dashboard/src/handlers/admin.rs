//! Super-admin platform overview.
//!
//! Reads run with the service-role credential so they see every tenant. A
//! failed count reads as zero and a failed list as empty; neither fails the
//! page. Query results are not logged.

use crate::profile::{authorize_admin, AdminAccess};
use crate::schema::{ClientSummary, Clients, Users};
use crate::server::AppState;
use crate::store::{Access, DataStore, Query};
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use dbr_auth::constants::DEFAULT_LANDING_PATH;
use dbr_auth::{IdentityProvider, SessionContext};
use serde::Serialize;

/// Number of companies listed on the overview.
pub const RECENT_COMPANIES_LIMIT: usize = 10;

/// Admin overview body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminOverview {
    /// Rows in `clients`
    pub total_companies: u64,
    /// Rows in `users`
    pub total_users: u64,
    /// Newest companies first
    pub recent_companies: Vec<ClientSummary>,
}

/// `GET /admin`
///
/// Anyone who is not a super admin is sent back to `/dashboard`.
pub async fn overview<I, D>(
    State(state): State<AppState<I, D>>,
    Extension(context): Extension<SessionContext>,
) -> Response
where
    I: IdentityProvider,
    D: DataStore,
{
    let AdminAccess::Granted(admin) = authorize_admin(state.store.as_ref(), &context).await else {
        return Redirect::to(DEFAULT_LANDING_PATH).into_response();
    };

    let store = state.store.as_ref();
    let access = Access::ServiceRole;
    let everything = Query::new();
    let recent = Query::new()
        .order_desc(Clients::CREATED_AT)
        .limit(RECENT_COMPANIES_LIMIT);

    let (companies, users, recent_companies) = tokio::join!(
        store.count::<Clients>(&access, &everything),
        store.count::<Users>(&access, &everything),
        store.select::<Clients, ClientSummary>(&access, &recent),
    );

    let overview = AdminOverview {
        total_companies: companies.unwrap_or_else(|error| {
            tracing::warn!(%error, "Failed to count companies");
            0
        }),
        total_users: users.unwrap_or_else(|error| {
            tracing::warn!(%error, "Failed to count users");
            0
        }),
        recent_companies: recent_companies.unwrap_or_else(|error| {
            tracing::warn!(%error, "Failed to load recent companies");
            Vec::new()
        }),
    };

    tracing::debug!(admin_id = %admin.id, "Admin overview served");
    Json(overview).into_response()
}
