//! Profile loading and admin authorization.
//!
//! The identity service knows who the user is; the `users` table knows what
//! they may do. Both lookups run with the user's own access token.

use crate::schema::{Role, UserProfile, Users};
use crate::store::{Access, DataStore, Query, Result};
use dbr_auth::{AuthUser, SessionContext};
use serde::Serialize;

/// The signed-in identity plus its dashboard profile, if one exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    /// Identity-service user
    pub user: AuthUser,
    /// `users` row; `None` until sign-up bookkeeping has run
    pub profile: Option<UserProfile>,
}

impl CurrentUser {
    /// Name to greet the user with: the full name if known, otherwise the
    /// email address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.profile
            .as_ref()
            .and_then(|p| p.full_name.as_deref())
            .or(self.user.full_name.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.email())
    }

    /// Email address.
    #[must_use]
    pub fn email(&self) -> &str {
        self.user
            .email
            .as_deref()
            .or_else(|| self.profile.as_ref().map(|p| p.email.as_str()))
            .unwrap_or_default()
    }

    /// Tenant role; `user` when there is no profile.
    #[must_use]
    pub fn role(&self) -> Role {
        self.profile.as_ref().map_or(Role::User, |p| p.role)
    }

    /// Returns `true` if the profile carries the super-admin flag.
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.profile.as_ref().is_some_and(|p| p.is_super_admin)
    }

    /// Header data for the dashboard.
    #[must_use]
    pub fn header(&self) -> UserHeader {
        UserHeader {
            display_name: self.display_name().to_string(),
            email: self.email().to_string(),
            role: self.role(),
        }
    }
}

/// What the dashboard header shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserHeader {
    /// Full name or email
    pub display_name: String,
    /// Email
    pub email: String,
    /// Tenant role
    pub role: Role,
}

/// Load the profile of the signed-in user.
///
/// # Errors
///
/// Returns the store's error if the `users` lookup fails. A missing row is
/// not an error.
pub async fn current_user<D: DataStore>(store: &D, context: &SessionContext) -> Result<CurrentUser> {
    let profile = store
        .select_one::<Users, UserProfile>(
            &Access::user(context.access_token()),
            &Query::new().eq(Users::ID, context.user.id.to_string()),
        )
        .await?;

    Ok(CurrentUser {
        user: context.user.clone(),
        profile,
    })
}

/// Outcome of an admin check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminAccess {
    /// The user is a super admin.
    Granted(UserProfile),
    /// The user is not, or it could not be established that they are.
    Denied,
}

/// Check whether the signed-in user is a super admin.
///
/// Fails closed: a missing profile, a false flag and a lookup error all
/// deny.
pub async fn authorize_admin<D: DataStore>(store: &D, context: &SessionContext) -> AdminAccess {
    match current_user(store, context).await {
        Ok(CurrentUser {
            profile: Some(profile),
            ..
        }) if profile.is_super_admin => AdminAccess::Granted(profile),
        Ok(_) => {
            tracing::info!(user_id = %context.user.id, "Admin access denied");
            AdminAccess::Denied
        }
        Err(error) => {
            tracing::warn!(user_id = %context.user.id, %error, "Profile lookup failed, denying admin access");
            AdminAccess::Denied
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::MemoryDataStore;
    use chrono::Utc;
    use dbr_auth::{Session, UserId};
    use serde_json::json;

    fn context(email: &str, full_name: Option<&str>) -> SessionContext {
        SessionContext {
            user: AuthUser {
                id: UserId::new(),
                email: Some(email.to_string()),
                full_name: full_name.map(str::to_string),
            },
            session: Session::new("access".into(), "refresh".into(), Utc::now()),
        }
    }

    fn seed_profile(store: &MemoryDataStore, context: &SessionContext, super_admin: bool) {
        store
            .seed::<Users>(json!({
                "id": context.user.id,
                "email": context.user.email,
                "full_name": null,
                "role": "admin",
                "is_super_admin": super_admin,
            }))
            .unwrap();
    }

    #[tokio::test]
    async fn test_current_user_without_profile() {
        let store = MemoryDataStore::new();
        let ctx = context("ada@example.com", None);

        let user = current_user(&store, &ctx).await.unwrap();
        assert_eq!(user.profile, None);
        assert_eq!(user.display_name(), "ada@example.com");
        assert_eq!(user.role(), Role::User);
    }

    #[tokio::test]
    async fn test_current_user_reads_with_user_token() {
        let store = MemoryDataStore::new();
        let ctx = context("ada@example.com", Some("Ada Lovelace"));
        seed_profile(&store, &ctx, false);

        let user = current_user(&store, &ctx).await.unwrap();
        assert_eq!(user.role(), Role::Admin);
        assert_eq!(user.display_name(), "Ada Lovelace");
        assert_eq!(store.calls()[0].access, Access::user("access"));
    }

    #[tokio::test]
    async fn test_admin_granted_only_with_flag() {
        let store = MemoryDataStore::new();
        let admin = context("root@example.com", None);
        let member = context("ada@example.com", None);
        seed_profile(&store, &admin, true);
        seed_profile(&store, &member, false);

        assert!(matches!(authorize_admin(&store, &admin).await, AdminAccess::Granted(_)));
        assert_eq!(authorize_admin(&store, &member).await, AdminAccess::Denied);
        assert_eq!(
            authorize_admin(&store, &context("new@example.com", None)).await,
            AdminAccess::Denied
        );
    }

    #[tokio::test]
    async fn test_admin_check_fails_closed_on_error() {
        let store = MemoryDataStore::new();
        let admin = context("root@example.com", None);
        seed_profile(&store, &admin, true);
        store.fail_table::<Users>();

        assert_eq!(authorize_admin(&store, &admin).await, AdminAccess::Denied);
    }

    #[test]
    fn test_header_serialization() {
        let user = CurrentUser {
            user: context("ada@example.com", None).user,
            profile: None,
        };
        assert_eq!(
            serde_json::to_value(user.header()).unwrap(),
            json!({ "display_name": "ada@example.com", "email": "ada@example.com", "role": "user" })
        );
    }
}
