//! Tenant creation.
//!
//! A new user registers their company through the onboarding form. The form
//! is validated in full before the data API is called; the `clients` insert
//! runs with the user's own access token.

use crate::schema::{ClientRow, ClientSettings, Clients, Industry, NewClient};
use crate::store::{Access, DataError, DataStore};
use dbr_auth::SessionContext;
use dbr_web::AppError;
use serde::Deserialize;
use thiserror::Error;

/// Longest accepted company name, in characters.
pub const MAX_COMPANY_NAME_LEN: usize = 200;

/// Tenant-creation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TenantError {
    /// The company name is empty.
    #[error("Company name is required")]
    MissingCompanyName,

    /// The company name is longer than [`MAX_COMPANY_NAME_LEN`].
    #[error("Company name must be at most {MAX_COMPANY_NAME_LEN} characters")]
    CompanyNameTooLong,

    /// No industry was selected.
    #[error("Please select an industry")]
    MissingIndustry,

    /// The industry is not one of the offered options.
    #[error("Unknown industry: {0}")]
    UnknownIndustry(String),

    /// The company email does not look like an address.
    #[error("Please enter a valid company email")]
    InvalidEmail,

    /// The insert failed.
    #[error(transparent)]
    Store(#[from] DataError),
}

impl TenantError {
    /// Returns `true` for problems with the submitted form.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        !matches!(self, Self::Store(_))
    }

    /// Message safe to show to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Store(DataError::Rejected(_)) => "Failed to create company profile".to_string(),
            Self::Store(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

impl From<TenantError> for AppError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::Store(data) => match data {
                DataError::Rejected(_) => {
                    Self::bad_request("Failed to create company profile").with_source(anyhow::Error::new(data))
                }
                other => other.into(),
            },
            validation => Self::validation(validation.user_message()),
        }
    }
}

/// Onboarding form as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingForm {
    /// Company name (required)
    #[serde(default)]
    pub company_name: String,
    /// Industry value (required)
    #[serde(default)]
    pub industry: String,
    /// Contact email (optional)
    #[serde(default)]
    pub company_email: Option<String>,
    /// Contact phone (optional)
    #[serde(default)]
    pub company_phone: Option<String>,
}

impl OnboardingForm {
    /// Trim and check the form, producing the row to insert.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, in form order.
    pub fn validate(&self) -> Result<NewClient, TenantError> {
        let company_name = self.company_name.trim();
        if company_name.is_empty() {
            return Err(TenantError::MissingCompanyName);
        }
        if company_name.chars().count() > MAX_COMPANY_NAME_LEN {
            return Err(TenantError::CompanyNameTooLong);
        }

        let industry = self.industry.trim();
        if industry.is_empty() {
            return Err(TenantError::MissingIndustry);
        }
        let industry: Industry = industry
            .parse()
            .map_err(|_| TenantError::UnknownIndustry(industry.to_string()))?;

        let company_email = optional(self.company_email.as_deref());
        if company_email.as_deref().is_some_and(|email| !looks_like_email(email)) {
            return Err(TenantError::InvalidEmail);
        }

        Ok(NewClient {
            company_name: company_name.to_string(),
            company_email,
            company_phone: optional(self.company_phone.as_deref()),
            industry,
            settings: ClientSettings::new(),
        })
    }
}

fn optional(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// `local@domain.tld` with no whitespace.
fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Register a company for the signed-in user.
///
/// # Errors
///
/// Returns a validation [`TenantError`] before touching the store, or
/// [`TenantError::Store`] if the insert fails.
pub async fn create_tenant<D: DataStore>(
    store: &D,
    context: &SessionContext,
    form: &OnboardingForm,
) -> Result<ClientRow, TenantError> {
    let new_client = form.validate()?;

    let row = store
        .insert::<Clients>(&Access::user(context.access_token()), &new_client)
        .await
        .inspect_err(|error| {
            tracing::error!(user_id = %context.user.id, %error, "Failed to create tenant");
        })?;

    tracing::info!(
        user_id = %context.user.id,
        client_id = %row.id,
        industry = %row.industry,
        "Tenant created"
    );
    metrics::counter!("dbr_tenants_created_total", "industry" => row.industry.as_str()).increment(1);
    Ok(row)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::MemoryDataStore;
    use axum::http::StatusCode;
    use chrono::Utc;
    use dbr_auth::{AuthUser, Session, UserId};

    fn form(name: &str, industry: &str) -> OnboardingForm {
        OnboardingForm {
            company_name: name.to_string(),
            industry: industry.to_string(),
            company_email: None,
            company_phone: None,
        }
    }

    fn context() -> SessionContext {
        SessionContext {
            user: AuthUser {
                id: UserId::new(),
                email: Some("ada@example.com".to_string()),
                full_name: None,
            },
            session: Session::new("access".into(), "refresh".into(), Utc::now()),
        }
    }

    #[test]
    fn test_validate_trims_and_drops_empty_optionals() {
        let mut submitted = form("  Cold Lava Solar ", "solar");
        submitted.company_email = Some("   ".to_string());
        submitted.company_phone = Some(" +44 20 1234 5678 ".to_string());

        let row = submitted.validate().unwrap();
        assert_eq!(row.company_name, "Cold Lava Solar");
        assert_eq!(row.company_email, None);
        assert_eq!(row.company_phone.as_deref(), Some("+44 20 1234 5678"));
        assert_eq!(row.industry, Industry::Solar);
    }

    #[test]
    fn test_validate_errors_in_form_order() {
        assert_eq!(form("  ", "").validate().unwrap_err(), TenantError::MissingCompanyName);
        assert_eq!(form("Acme", "").validate().unwrap_err(), TenantError::MissingIndustry);
        assert_eq!(
            form("Acme", "aerospace").validate().unwrap_err(),
            TenantError::UnknownIndustry("aerospace".to_string())
        );
        assert_eq!(
            form(&"x".repeat(MAX_COMPANY_NAME_LEN + 1), "solar").validate().unwrap_err(),
            TenantError::CompanyNameTooLong
        );
    }

    #[test]
    fn test_email_check() {
        for good in ["contact@acme.com", "a.b+c@sub.example.co.uk"] {
            assert!(looks_like_email(good), "{good}");
        }
        for bad in ["acme.com", "@acme.com", "a@acme", "a@.com", "a b@acme.com", "a@b@c.com", "a@acme."] {
            assert!(!looks_like_email(bad), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_create_tenant_inserts_with_user_token() {
        let store = MemoryDataStore::new();
        let ctx = context();

        let row = create_tenant(&store, &ctx, &form("Acme", "hvac")).await.unwrap();

        assert_eq!(row.company_name, "Acme");
        assert_eq!(row.industry, Industry::Hvac);
        let calls = store.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].access, Access::user("access"));
    }

    #[tokio::test]
    async fn test_invalid_form_never_reaches_store() {
        let store = MemoryDataStore::new();
        let err = create_tenant(&store, &context(), &form("", "solar")).await.unwrap_err();
        assert!(err.is_validation());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let store = MemoryDataStore::new();
        store.forbid_user_access::<Clients>();

        let err = create_tenant(&store, &context(), &form("Acme", "solar")).await.unwrap_err();
        assert_eq!(err, TenantError::Store(DataError::Forbidden { table: "clients" }));
        assert_eq!(AppError::from(err).status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_validation_maps_to_422() {
        let err: AppError = TenantError::MissingIndustry.into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.message(), "Please select an industry");
    }
}
