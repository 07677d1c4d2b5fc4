//! Dashboard home.

use crate::profile::{current_user, UserHeader};
use crate::server::AppState;
use crate::store::DataStore;
use axum::extract::State;
use axum::{Extension, Json};
use dbr_auth::{IdentityProvider, SessionContext};
use dbr_web::WebResult;

/// `GET /dashboard`
///
/// # Errors
///
/// `503` if the profile lookup fails.
pub async fn home<I, D>(
    State(state): State<AppState<I, D>>,
    Extension(context): Extension<SessionContext>,
) -> WebResult<Json<UserHeader>>
where
    I: IdentityProvider,
    D: DataStore,
{
    let user = current_user(state.store.as_ref(), &context).await?;
    Ok(Json(user.header()))
}
