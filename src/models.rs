use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{collections::BTreeSet, fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Access Schemas (Mapped to Database) ---

/// User
///
/// Canonical identity record from `public.profiles`, resolved during authentication.
/// `current_role` holds the user-switchable business role as text.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    // Primary Key, also the Foreign Key to the external auth.users table.
    pub id: Uuid,
    pub email: String,
    pub current_role: Option<String>,
}

/// PrimaryRole
///
/// The business-facing role a user works under. Exactly one may be active at a time,
/// and the user may switch between them freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PrimaryRole {
    Creator,
    Advertiser,
}

impl PrimaryRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimaryRole::Creator => "creator",
            PrimaryRole::Advertiser => "advertiser",
        }
    }
}

impl FromStr for PrimaryRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "creator" => Ok(PrimaryRole::Creator),
            "advertiser" => Ok(PrimaryRole::Advertiser),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for PrimaryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability
///
/// Coarse access-control flags from `public.user_roles`. These are granted by
/// operators only and are independent of the primary role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Capability {
    Admin,
    SuperAdmin,
    BoardMember,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Admin => "admin",
            Capability::SuperAdmin => "super_admin",
            Capability::BoardMember => "board_member",
        }
    }
}

impl FromStr for Capability {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Capability::Admin),
            "super_admin" => Ok(Capability::SuperAdmin),
            "board_member" => Ok(Capability::BoardMember),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role string read from storage or a request is not part of the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// Permission
///
/// An action-level grant such as `studio.record` or `billing.manage`.
/// The vocabulary is open; permissions are compared by exact string value.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(transparent)]
#[ts(export)]
pub struct Permission(pub String);

impl Permission {
    pub fn new(name: impl Into<String>) -> Self {
        Permission(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// RoleAssignment
///
/// Everything the gates need to know about who the user is. The default value is the
/// "no access" assignment used for anonymous sessions and failed lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RoleAssignment {
    pub primary_role: Option<PrimaryRole>,
    pub capabilities: BTreeSet<Capability>,
    pub permissions: BTreeSet<Permission>,
}

impl RoleAssignment {
    /// Whether the capability is held. `super_admin` implies `admin`.
    pub fn has(&self, capability: Capability) -> bool {
        if self.capabilities.contains(&capability) {
            return true;
        }
        capability == Capability::Admin && self.capabilities.contains(&Capability::SuperAdmin)
    }

    pub fn is_admin(&self) -> bool {
        self.has(Capability::Admin)
    }

    pub fn is_board_member(&self) -> bool {
        self.has(Capability::BoardMember)
    }

    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }
}

/// CapabilityRow
///
/// Raw `public.user_roles` row.
#[derive(Debug, Clone, FromRow)]
pub struct CapabilityRow {
    pub user_id: Uuid,
    pub role: String,
}

/// BoardViewRow
///
/// Raw `public.user_preferences` row holding the board preview opt-in.
#[derive(Debug, Clone, FromRow)]
pub struct BoardViewRow {
    pub user_id: Uuid,
    pub board_view_enabled: bool,
}

// --- Request Payloads (Input Schemas) ---

/// EvaluateRequest
///
/// Sent by the web client on every navigation (POST /gate/evaluate).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct EvaluateRequest {
    /// The path being navigated to, e.g. `/studio/video`.
    pub path: String,
    /// The browser hostname; used for white-labeled verticals.
    #[serde(default)]
    pub hostname: Option<String>,
    /// True when the navigation state carries the "arrived from onboarding" marker.
    #[serde(default)]
    pub from_onboarding: bool,
    /// Tour token held by the client for this browser session, if any.
    #[serde(default)]
    pub tour_token: Option<String>,
    /// Identifies the mounted route consumer so notices and redirects are de-duplicated.
    #[serde(default)]
    pub mount_id: Option<Uuid>,
    /// Monotonic navigation counter for the mount; older evaluations are superseded.
    #[serde(default)]
    pub seq: u64,
}

/// SwitchRoleRequest
///
/// Input for PUT /me/role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SwitchRoleRequest {
    pub role: PrimaryRole,
}

/// BoardViewRequest
///
/// Input for PUT /me/board-view.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BoardViewRequest {
    pub enabled: bool,
}

// --- Output Schemas ---

/// AccessSnapshot
///
/// The resolved view of a user's access, as returned by GET /me/access and the admin
/// inspection endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AccessSnapshot {
    pub user_id: Option<Uuid>,
    pub roles: RoleAssignment,
    pub board_view_enabled: bool,
}

/// TourStatus
///
/// Tour mode as seen by the client after an evaluation or an explicit exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TourStatus {
    pub active: bool,
    /// A freshly issued token the client should store for the rest of the browser session.
    pub token: Option<String>,
    /// True when the client must drop any stored tour token.
    pub cleared: bool,
}
