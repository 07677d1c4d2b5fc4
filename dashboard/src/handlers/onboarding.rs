//! Company onboarding submission.

use crate::server::AppState;
use crate::store::DataStore;
use crate::tenants::{create_tenant, OnboardingForm};
use axum::extract::State;
use axum::response::Redirect;
use axum::{Extension, Form};
use dbr_auth::constants::DEFAULT_LANDING_PATH;
use dbr_auth::{IdentityProvider, SessionContext};
use dbr_web::WebResult;

/// `POST /onboarding`
///
/// # Errors
///
/// `422` with the first form problem, or the store's error if the insert
/// fails.
pub async fn submit<I, D>(
    State(state): State<AppState<I, D>>,
    Extension(context): Extension<SessionContext>,
    Form(form): Form<OnboardingForm>,
) -> WebResult<Redirect>
where
    I: IdentityProvider,
    D: DataStore,
{
    create_tenant(state.store.as_ref(), &context, &form).await?;
    Ok(Redirect::to(DEFAULT_LANDING_PATH))
}
