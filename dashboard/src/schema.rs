//! Typed table registry.
//!
//! Each table the dashboard touches is a zero-sized type implementing
//! [`Table`], which fixes its name and the shapes of its rows and inserts at
//! compile time. Narrower reads go through a [`Projection`], which names the
//! column list its type deserializes from.
//!
//! | Table     | Row             | Insert             | Projections       |
//! |-----------|-----------------|--------------------|-------------------|
//! | `clients` | [`ClientRow`]   | [`NewClient`]      | [`ClientSummary`] |
//! | `users`   | [`UserProfile`] | [`NewUserProfile`] |                   |

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// A table reachable through the data API.
pub trait Table: Send + Sync + 'static {
    /// Table name in the data API (`/rest/v1/<NAME>`).
    const NAME: &'static str;

    /// Full row as returned by `select=*`.
    type Row: DeserializeOwned + Send + 'static;

    /// Body of an insert.
    type Insert: Serialize + Send + Sync;

    /// Column values the database fills in when an insert omits them.
    ///
    /// Only the in-memory store uses this; the hosted database applies its
    /// own column defaults.
    #[must_use]
    fn column_defaults() -> Map<String, Value> {
        Map::new()
    }
}

/// A read shape for rows of `T`.
pub trait Projection<T: Table>: DeserializeOwned + Send + 'static {
    /// Value of the `select` query parameter.
    const COLUMNS: &'static str;
}

// ═══════════════════════════════════════════════════════════════════════
// Enums
// ═══════════════════════════════════════════════════════════════════════

/// Shown for a value that is not one of the fixed variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: {value}")]
pub struct UnknownVariant {
    /// What was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Industry of a tenant company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Industry {
    /// Solar energy installers
    Solar,
    /// Construction
    Construction,
    /// Real estate
    RealEstate,
    /// Heating, ventilation and air conditioning
    Hvac,
    /// Automotive
    Automotive,
    /// Home improvement
    HomeImprovement,
    /// Healthcare
    Healthcare,
    /// Technology
    Technology,
    /// Anything else, including values stored by older schemas
    #[serde(other)]
    Other,
}

impl Industry {
    /// Every selectable industry, in form order.
    pub const ALL: [Self; 9] = [
        Self::Solar,
        Self::Construction,
        Self::RealEstate,
        Self::Hvac,
        Self::Automotive,
        Self::HomeImprovement,
        Self::Healthcare,
        Self::Technology,
        Self::Other,
    ];

    /// Stored value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Solar => "solar",
            Self::Construction => "construction",
            Self::RealEstate => "real-estate",
            Self::Hvac => "hvac",
            Self::Automotive => "automotive",
            Self::HomeImprovement => "home-improvement",
            Self::Healthcare => "healthcare",
            Self::Technology => "technology",
            Self::Other => "other",
        }
    }

    /// Display label for the onboarding form.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Solar => "Solar Energy",
            Self::Construction => "Construction",
            Self::RealEstate => "Real Estate",
            Self::Hvac => "HVAC",
            Self::Automotive => "Automotive",
            Self::HomeImprovement => "Home Improvement",
            Self::Healthcare => "Healthcare",
            Self::Technology => "Technology",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Industry {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|industry| industry.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "industry",
                value: s.to_string(),
            })
    }
}

/// Role of a dashboard user.
///
/// Super-admin access is a separate flag ([`UserProfile::is_super_admin`]),
/// not a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Tenant administrator
    Admin,
    /// Regular member of a tenant
    #[default]
    #[serde(other)]
    User,
}

impl Role {
    /// Stored value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Client settings
// ═══════════════════════════════════════════════════════════════════════

/// Most keys a settings document may hold.
pub const MAX_SETTINGS_KEYS: usize = 64;

/// Longest permitted settings key, in characters.
pub const MAX_SETTINGS_KEY_LEN: usize = 64;

/// Why a settings document was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// The document is not a JSON object.
    #[error("Settings must be a JSON object")]
    NotAnObject,
    /// Too many keys.
    #[error("Settings may hold at most {MAX_SETTINGS_KEYS} keys")]
    TooManyKeys,
    /// A key is empty or too long.
    #[error("Settings key {0:?} must be 1 to {MAX_SETTINGS_KEY_LEN} characters")]
    InvalidKey(String),
}

/// Free-form per-tenant settings (`clients.settings`).
///
/// The dashboard does not interpret the values. Keys are checked whenever a
/// document is built or deserialized, so an invalid one never reaches the
/// data API.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ClientSettings(Map<String, Value>);

impl ClientSettings {
    /// An empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a JSON value as a settings document.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if `value` is not an object, has more than
    /// [`MAX_SETTINGS_KEYS`] keys, or has an empty or overlong key.
    pub fn from_value(value: Value) -> Result<Self, SettingsError> {
        let Value::Object(map) = value else {
            return Err(SettingsError::NotAnObject);
        };
        if map.len() > MAX_SETTINGS_KEYS {
            return Err(SettingsError::TooManyKeys);
        }
        if let Some(key) = map
            .keys()
            .find(|key| key.is_empty() || key.chars().count() > MAX_SETTINGS_KEY_LEN)
        {
            return Err(SettingsError::InvalidKey(key.clone()));
        }
        Ok(Self(map))
    }

    /// Look up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for ClientSettings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        // Rows written before the column had a default may hold null.
        if value.is_null() {
            return Ok(Self::new());
        }
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// clients
// ═══════════════════════════════════════════════════════════════════════

/// The `clients` table: one row per tenant company.
#[derive(Debug, Clone, Copy)]
pub struct Clients;

impl Clients {
    /// Primary key.
    pub const ID: &'static str = "id";
    /// Insertion time, used to list the newest companies.
    pub const CREATED_AT: &'static str = "created_at";
}

/// Row of `clients`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ClientRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub company_name: String,
    pub company_email: Option<String>,
    pub company_phone: Option<String>,
    pub company_website: Option<String>,
    pub industry: Industry,
    pub logo_url: Option<String>,
    pub primary_color: String,
    pub n8n_workflow_id: Option<String>,
    pub n8n_webhook_url: Option<String>,
    pub twilio_phone_number: Option<String>,
    pub status: String,
    pub plan: String,
    pub timezone: String,
    #[serde(default)]
    pub settings: ClientSettings,
}

/// Insert into `clients`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewClient {
    /// Company name (required, trimmed)
    pub company_name: String,
    /// Contact email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_email: Option<String>,
    /// Contact phone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_phone: Option<String>,
    /// Industry
    pub industry: Industry,
    /// Initial settings
    #[serde(skip_serializing_if = "ClientSettings::is_empty")]
    pub settings: ClientSettings,
}

/// Columns shown on the admin overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ClientSummary {
    pub id: Uuid,
    pub company_name: String,
    pub industry: Industry,
    pub status: String,
    pub plan: String,
    pub created_at: DateTime<Utc>,
}

impl Table for Clients {
    const NAME: &'static str = "clients";
    type Row = ClientRow;
    type Insert = NewClient;

    fn column_defaults() -> Map<String, Value> {
        let now = Value::String(Utc::now().to_rfc3339());
        let mut defaults = Map::new();
        defaults.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        defaults.insert("created_at".into(), now.clone());
        defaults.insert("updated_at".into(), now);
        defaults.insert("company_email".into(), Value::Null);
        defaults.insert("company_phone".into(), Value::Null);
        defaults.insert("company_website".into(), Value::Null);
        defaults.insert("industry".into(), Value::String(Industry::Other.as_str().into()));
        defaults.insert("logo_url".into(), Value::Null);
        defaults.insert("primary_color".into(), Value::String("#3b82f6".into()));
        defaults.insert("n8n_workflow_id".into(), Value::Null);
        defaults.insert("n8n_webhook_url".into(), Value::Null);
        defaults.insert("twilio_phone_number".into(), Value::Null);
        defaults.insert("status".into(), Value::String("active".into()));
        defaults.insert("plan".into(), Value::String("starter".into()));
        defaults.insert("timezone".into(), Value::String("Europe/London".into()));
        defaults.insert("settings".into(), Value::Object(Map::new()));
        defaults
    }
}

impl Projection<Clients> for ClientRow {
    const COLUMNS: &'static str = "*";
}

impl Projection<Clients> for ClientSummary {
    const COLUMNS: &'static str = "id,company_name,industry,status,plan,created_at";
}

// ═══════════════════════════════════════════════════════════════════════
// users
// ═══════════════════════════════════════════════════════════════════════

/// The `users` table: dashboard profile of each identity.
#[derive(Debug, Clone, Copy)]
pub struct Users;

impl Users {
    /// Primary key, shared with the identity-service user.
    pub const ID: &'static str = "id";
}

/// Row of `users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Same ID as the identity-service user
    pub id: Uuid,
    /// Email at sign-up
    pub email: String,
    /// Full name, if given
    pub full_name: Option<String>,
    /// Tenant role
    #[serde(default)]
    pub role: Role,
    /// Platform-wide administrator flag
    #[serde(default)]
    pub is_super_admin: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// Insert into `users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewUserProfile {
    /// Identity-service user ID
    pub id: Uuid,
    /// Email
    pub email: String,
    /// Full name
    pub full_name: Option<String>,
    /// Initial role
    pub role: Role,
}

impl Table for Users {
    const NAME: &'static str = "users";
    type Row = UserProfile;
    type Insert = NewUserProfile;

    fn column_defaults() -> Map<String, Value> {
        let now = Value::String(Utc::now().to_rfc3339());
        let mut defaults = Map::new();
        defaults.insert("role".into(), Value::String(Role::User.as_str().into()));
        defaults.insert("is_super_admin".into(), Value::Bool(false));
        defaults.insert("created_at".into(), now.clone());
        defaults.insert("updated_at".into(), now);
        defaults
    }
}

impl Projection<Users> for UserProfile {
    const COLUMNS: &'static str = "*";
}
