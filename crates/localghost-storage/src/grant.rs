//! Grant, audit, and grant-kind data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use localghost_core::ClientIdentity;

/// The duration class of a permission grant.
///
/// Each kind maps to a distinct expiry rule, applied by
/// [`crate::PermissionStore::grant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrantKind {
    /// Expires 5 minutes after issuance.
    Temporary,
    /// Lives until the process restarts. Stored without an `expires_at`,
    /// so the store alone cannot tell a live `SESSION` grant from one left
    /// behind by a previous process instance; the admission middleware
    /// re-validates the grant's own `token` before honoring it, and the
    /// token's minting epoch (see `localghost-crypto`'s
    /// `TokenManager::boot_epoch`) is what actually fails it closed after
    /// a restart.
    Session,
    /// Expires `duration_hours` after issuance.
    Timed,
    /// No expiry; persists until an explicit revoke.
    Permanent,
}

impl GrantKind {
    /// The column value this kind is persisted as.
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Temporary => "TEMPORARY",
            Self::Session => "SESSION",
            Self::Timed => "TIMED",
            Self::Permanent => "PERMANENT",
        }
    }

    /// Parse a persisted column value back into a [`GrantKind`].
    #[must_use]
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "TEMPORARY" => Some(Self::Temporary),
            "SESSION" => Some(Self::Session),
            "TIMED" => Some(Self::Timed),
            "PERMANENT" => Some(Self::Permanent),
            _ => None,
        }
    }
}

/// A durable permission grant for one `(client_id, endpoint)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    /// Row identifier.
    pub id: i64,
    /// The client this grant belongs to.
    pub client_id: ClientIdentity,
    /// Display name advertised by the client at grant time, if any.
    pub client_name: Option<String>,
    /// Full endpoint path the grant covers.
    pub endpoint_path: String,
    /// Permissions covered by this grant.
    pub permissions: Vec<String>,
    /// Duration class of the grant.
    pub kind: GrantKind,
    /// When the grant was created (or last re-granted).
    pub granted_at: DateTime<Utc>,
    /// When the grant expires. `None` means no expiry (`SESSION`/`PERMANENT`).
    pub expires_at: Option<DateTime<Utc>>,
    /// The bearer token minted alongside this grant.
    pub token: String,
}

/// The action recorded by an [`AuditEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A grant was created or re-granted.
    Grant,
    /// A single `(client_id, endpoint)` grant was revoked.
    Revoke,
    /// All grants for a client were revoked.
    RevokeAll,
}

impl AuditAction {
    /// The column value this action is persisted as.
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Revoke => "revoke",
            Self::RevokeAll => "revoke_all",
        }
    }

    /// Parse a persisted column value back into an [`AuditAction`].
    #[must_use]
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "grant" => Some(Self::Grant),
            "revoke" => Some(Self::Revoke),
            "revoke_all" => Some(Self::RevokeAll),
            _ => None,
        }
    }
}

/// A single append-only audit log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Row identifier.
    pub id: i64,
    /// When the action occurred.
    pub timestamp: DateTime<Utc>,
    /// The client the action concerns.
    pub client_id: ClientIdentity,
    /// The endpoint the action concerns. `"*"` for `revoke_all`.
    pub endpoint: String,
    /// What happened.
    pub action: AuditAction,
    /// Free-form structured context (e.g. permissions granted, grant kind).
    pub details: serde_json::Value,
}
