//! The durable permission store: `permissions` + `audit_log` tables.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use localghost_core::{Clock, ClientIdentity, SystemClock};

use crate::error::{StorageError, StorageResult};
use crate::grant::{AuditAction, AuditEntry, Grant, GrantKind};

const TEMPORARY_MINUTES: i64 = 5;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS permissions (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id   TEXT NOT NULL,
    client_name TEXT,
    endpoint    TEXT NOT NULL,
    permissions TEXT NOT NULL,
    grant_type  TEXT NOT NULL,
    granted_at  TEXT NOT NULL,
    expires_at  TEXT,
    token       TEXT NOT NULL,
    UNIQUE(client_id, endpoint)
);

CREATE TABLE IF NOT EXISTS audit_log (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    client_id TEXT NOT NULL,
    endpoint  TEXT NOT NULL,
    action    TEXT NOT NULL,
    details   TEXT NOT NULL
);
";

/// Durable storage for permission grants and the audit log.
///
/// All operations are logically serialized through a single connection
/// guarded by a mutex: SQLite itself only allows one writer at a time, and
/// the spec's concurrency model treats the store as the exclusive writer
/// for every mutating operation, so there is nothing to gain from a
/// connection pool here.
pub struct PermissionStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl PermissionStore {
    /// Open (creating if necessary) the database at `path` and ensure its
    /// schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CreateDataDir`] if the parent directory
    /// cannot be created, or [`StorageError::Init`] if the connection or
    /// schema creation fails. A schema mismatch (an existing database with
    /// an incompatible table definition) is treated as fatal, consistent
    /// with startup-time failures elsewhere in the kernel.
    pub fn init(path: &Path) -> StorageResult<Self> {
        Self::init_with_clock(path, Arc::new(SystemClock))
    }

    /// Like [`Self::init`], but comparing and stamping timestamps against
    /// `clock` instead of the real wall clock — lets a caller (tests,
    /// mainly) advance time past a grant's expiry without sleeping.
    ///
    /// # Errors
    ///
    /// See [`Self::init`].
    pub fn init_with_clock(path: &Path, clock: Arc<dyn Clock>) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDataDir {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(|source| StorageError::Init {
            path: path.display().to_string(),
            source,
        })?;

        conn.execute_batch(SCHEMA).map_err(|source| StorageError::Init {
            path: path.display().to_string(),
            source,
        })?;

        tracing::info!(path = %path.display(), "permission store ready");
        Ok(Self { conn: Mutex::new(conn), clock })
    }

    /// Open an in-memory store. Used by tests and by callers that opt out
    /// of persistence entirely.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Init`] if the schema cannot be created.
    pub fn in_memory() -> StorageResult<Self> {
        Self::in_memory_with_clock(Arc::new(SystemClock))
    }

    /// Like [`Self::in_memory`], but comparing and stamping timestamps
    /// against `clock` instead of the real wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Init`] if the schema cannot be created.
    pub fn in_memory_with_clock(clock: Arc<dyn Clock>) -> StorageResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StorageError::Init {
            path: ":memory:".to_string(),
            source,
        })?;
        conn.execute_batch(SCHEMA).map_err(|source| StorageError::Init {
            path: ":memory:".to_string(),
            source,
        })?;
        Ok(Self { conn: Mutex::new(conn), clock })
    }

    /// Compute `expires_at` for a freshly-issued grant of this `kind`.
    fn expires_at(kind: GrantKind, granted_at: DateTime<Utc>, duration_hours: Option<f64>) -> Option<DateTime<Utc>> {
        match kind {
            GrantKind::Temporary => Some(granted_at + Duration::minutes(TEMPORARY_MINUTES)),
            GrantKind::Timed => {
                let hours = duration_hours.unwrap_or(0.0);
                let millis = (hours * 3_600_000.0).round() as i64;
                Some(granted_at + Duration::milliseconds(millis))
            }
            GrantKind::Session | GrantKind::Permanent => None,
        }
    }

    /// Create or upsert a grant for `(client_id, endpoint)`, minting its
    /// expiry from `kind`, and append a `grant` audit entry — all within a
    /// single transaction.
    ///
    /// Re-granting an existing `(client_id, endpoint)` pair overwrites the
    /// permissions, kind, expiry, and token; it does not create a second
    /// row.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] if the write fails; the transaction
    /// is rolled back, so no partial state (a permission row without its
    /// audit entry, or vice versa) is ever left behind.
    #[allow(clippy::too_many_arguments)]
    pub fn grant(
        &self,
        client_id: &ClientIdentity,
        client_name: Option<&str>,
        endpoint: &str,
        permissions: &[String],
        kind: GrantKind,
        token: &str,
        duration_hours: Option<f64>,
    ) -> StorageResult<()> {
        let granted_at = self.clock.now();
        let expires_at = Self::expires_at(kind, granted_at, duration_hours);
        let permissions_json = serde_json::to_string(permissions)
            .map_err(|e| StorageError::MalformedPermissions(e.to_string()))?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO permissions (client_id, client_name, endpoint, permissions, grant_type, granted_at, expires_at, token)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(client_id, endpoint) DO UPDATE SET
                client_name = excluded.client_name,
                permissions = excluded.permissions,
                grant_type = excluded.grant_type,
                granted_at = excluded.granted_at,
                expires_at = excluded.expires_at,
                token = excluded.token",
            params![
                client_id.as_str(),
                client_name,
                endpoint,
                permissions_json,
                kind.as_db_str(),
                granted_at.to_rfc3339(),
                expires_at.map(|t| t.to_rfc3339()),
                token,
            ],
        )?;

        let details = serde_json::json!({
            "permissions": permissions,
            "kind": kind.as_db_str(),
        });
        self.append_audit(&tx, client_id, endpoint, AuditAction::Grant, &details)?;

        tx.commit()?;
        Ok(())
    }

    /// Look up the grant for `(client_id, endpoint)`.
    ///
    /// If a matching row exists but has expired, it is deleted (lazy
    /// eviction) and `None` is returned; no audit entry is written for the
    /// eviction, since it is not a user-initiated revoke.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] if the read or eviction delete
    /// fails, or [`StorageError::MalformedPermissions`] if the stored
    /// `permissions` column is not valid JSON.
    pub fn check(&self, client_id: &ClientIdentity, endpoint: &str) -> StorageResult<Option<Grant>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, client_id, client_name, endpoint, permissions, grant_type, granted_at, expires_at, token
                 FROM permissions WHERE client_id = ?1 AND endpoint = ?2",
                params![client_id.as_str(), endpoint],
                Self::row_to_grant,
            )
            .optional()?;

        let Some(grant) = row else {
            return Ok(None);
        };

        if let Some(expires_at) = grant.expires_at {
            if self.clock.now() >= expires_at {
                conn.execute(
                    "DELETE FROM permissions WHERE id = ?1",
                    params![grant.id],
                )?;
                return Ok(None);
            }
        }

        Ok(Some(grant))
    }

    /// Delete the grant for `(client_id, endpoint)` with no audit entry.
    ///
    /// For lazy eviction of a grant that is no longer valid through no
    /// action of the client or operator (an expired `TEMPORARY`/`TIMED`
    /// row, or a `SESSION` row surviving a process restart) — the same
    /// kind of housekeeping delete [`Self::check`] already performs
    /// internally for time-based expiry, exposed here so callers with
    /// their own notion of staleness (e.g. the admission middleware's
    /// boot-epoch check on `SESSION` grants) can evict without going
    /// through the audited [`Self::revoke`].
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] if the delete fails.
    pub fn evict(&self, client_id: &ClientIdentity, endpoint: &str) -> StorageResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM permissions WHERE client_id = ?1 AND endpoint = ?2",
            params![client_id.as_str(), endpoint],
        )?;
        Ok(())
    }

    /// Delete the grant for `(client_id, endpoint)` and append a `revoke`
    /// audit entry, whether or not a row matched.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] if the delete or audit write fails.
    pub fn revoke(&self, client_id: &ClientIdentity, endpoint: &str) -> StorageResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM permissions WHERE client_id = ?1 AND endpoint = ?2",
            params![client_id.as_str(), endpoint],
        )?;

        self.append_audit(&tx, client_id, endpoint, AuditAction::Revoke, &serde_json::json!({}))?;
        tx.commit()?;
        Ok(())
    }

    /// Delete every grant for `client_id` and append a single
    /// `revoke_all` entry with `endpoint = "*"`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] if the delete or audit write fails.
    pub fn revoke_all(&self, client_id: &ClientIdentity) -> StorageResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let removed = tx.execute(
            "DELETE FROM permissions WHERE client_id = ?1",
            params![client_id.as_str()],
        )?;

        self.append_audit(
            &tx,
            client_id,
            "*",
            AuditAction::RevokeAll,
            &serde_json::json!({ "removed": removed }),
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Every grant, ordered by `granted_at` descending, with no expiry
    /// filtering.
    ///
    /// Callers that present these rows to a human or another service must
    /// account for staleness themselves; only [`Self::check`] guarantees
    /// a non-expired result.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] if the read fails, or
    /// [`StorageError::MalformedPermissions`] if a stored `permissions`
    /// column is not valid JSON.
    pub fn list_all(&self) -> StorageResult<Vec<Grant>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, client_id, client_name, endpoint, permissions, grant_type, granted_at, expires_at, token
             FROM permissions ORDER BY granted_at DESC",
        )?;
        let rows = stmt
            .query_map([], Self::row_to_grant)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every audit entry, ordered by `timestamp` descending.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] if the read fails, or
    /// [`StorageError::MalformedDetails`] if a stored `details` column is
    /// not valid JSON.
    pub fn list_audit_log(&self) -> StorageResult<Vec<AuditEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, client_id, endpoint, action, details
             FROM audit_log ORDER BY timestamp DESC",
        )?;
        let rows = stmt
            .query_map([], Self::row_to_audit_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Release the underlying connection.
    ///
    /// `Connection` closes on drop, so this exists mainly to give callers
    /// an explicit, documented point to shut the store down rather than
    /// relying on scope exit.
    pub fn close(self) {
        drop(self.conn);
    }

    fn append_audit(
        &self,
        tx: &rusqlite::Transaction<'_>,
        client_id: &ClientIdentity,
        endpoint: &str,
        action: AuditAction,
        details: &serde_json::Value,
    ) -> StorageResult<()> {
        tx.execute(
            "INSERT INTO audit_log (timestamp, client_id, endpoint, action, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.clock.now().to_rfc3339(),
                client_id.as_str(),
                endpoint,
                action.as_db_str(),
                details.to_string(),
            ],
        )?;
        Ok(())
    }

    fn row_to_grant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Grant> {
        let permissions_json: String = row.get(4)?;
        let permissions: Vec<String> = serde_json::from_str(&permissions_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let grant_type: String = row.get(5)?;
        let kind = GrantKind::from_db_str(&grant_type).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(5, "grant_type".into(), rusqlite::types::Type::Text)
        })?;

        let granted_at: String = row.get(6)?;
        let granted_at = parse_rfc3339(&granted_at, 6)?;

        let expires_at: Option<String> = row.get(7)?;
        let expires_at = expires_at.map(|s| parse_rfc3339(&s, 7)).transpose()?;

        let client_id_str: String = row.get(1)?;

        Ok(Grant {
            id: row.get(0)?,
            client_id: ClientIdentity::from_explicit(client_id_str),
            client_name: row.get(2)?,
            endpoint_path: row.get(3)?,
            permissions,
            kind,
            granted_at,
            expires_at,
            token: row.get(8)?,
        })
    }

    fn row_to_audit_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
        let timestamp: String = row.get(1)?;
        let timestamp = parse_rfc3339(&timestamp, 1)?;

        let client_id_str: String = row.get(2)?;

        let action: String = row.get(4)?;
        let action = AuditAction::from_db_str(&action).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(4, "action".into(), rusqlite::types::Type::Text)
        })?;

        let details_json: String = row.get(5)?;
        let details: serde_json::Value = serde_json::from_str(&details_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(AuditEntry {
            id: row.get(0)?,
            timestamp,
            client_id: ClientIdentity::from_explicit(client_id_str),
            endpoint: row.get(3)?,
            action,
            details,
        })
    }
}

fn parse_rfc3339(s: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        })
}

impl std::fmt::Debug for PermissionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(id: &str) -> ClientIdentity {
        ClientIdentity::from_explicit(id)
    }

    #[test]
    fn grant_then_check_round_trips() {
        let store = PermissionStore::in_memory().unwrap();
        let id = client("abc123");
        store
            .grant(&id, Some("demo"), "/plugin/info", &["access".to_string()], GrantKind::Permanent, "tok", None)
            .unwrap();

        let grant = store.check(&id, "/plugin/info").unwrap().expect("grant present");
        assert_eq!(grant.client_id, id);
        assert_eq!(grant.permissions, vec!["access".to_string()]);
        assert_eq!(grant.kind, GrantKind::Permanent);
        assert!(grant.expires_at.is_none());
    }

    #[test]
    fn re_granting_upserts_rather_than_duplicating() {
        let store = PermissionStore::in_memory().unwrap();
        let id = client("abc123");
        store
            .grant(&id, None, "/p", &["a".to_string()], GrantKind::Permanent, "tok1", None)
            .unwrap();
        store
            .grant(&id, None, "/p", &["a".to_string(), "b".to_string()], GrantKind::Permanent, "tok2", None)
            .unwrap();

        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].token, "tok2");
        assert_eq!(all[0].permissions.len(), 2);
    }

    #[test]
    fn check_on_missing_grant_returns_none() {
        let store = PermissionStore::in_memory().unwrap();
        let id = client("nope");
        assert!(store.check(&id, "/p").unwrap().is_none());
    }

    #[test]
    fn expired_temporary_grant_is_evicted_lazily() {
        let store = PermissionStore::in_memory().unwrap();
        let id = client("abc123");
        // Insert directly with an already-past expiry to avoid sleeping.
        {
            let conn = store.conn.lock();
            conn.execute(
                "INSERT INTO permissions (client_id, client_name, endpoint, permissions, grant_type, granted_at, expires_at, token)
                 VALUES (?1, NULL, ?2, '[]', 'TEMPORARY', ?3, ?4, 'tok')",
                params![
                    id.as_str(),
                    "/p",
                    (Utc::now() - Duration::minutes(10)).to_rfc3339(),
                    (Utc::now() - Duration::minutes(5)).to_rfc3339(),
                ],
            )
            .unwrap();
        }

        assert!(store.check(&id, "/p").unwrap().is_none());
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn evict_removes_the_row_and_writes_no_audit_entry() {
        let store = PermissionStore::in_memory().unwrap();
        let id = client("abc123");
        store.grant(&id, None, "/p", &["a".to_string()], GrantKind::Session, "tok", None).unwrap();

        store.evict(&id, "/p").unwrap();

        assert!(store.check(&id, "/p").unwrap().is_none());
        let log = store.list_audit_log().unwrap();
        assert_eq!(log.iter().filter(|e| e.action != AuditAction::Grant).count(), 0);
    }

    #[test]
    fn revoke_writes_an_audit_entry_even_when_nothing_matched() {
        let store = PermissionStore::in_memory().unwrap();
        let id = client("ghost");
        store.revoke(&id, "/never/granted").unwrap();

        let log = store.list_audit_log().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, AuditAction::Revoke);
    }

    #[test]
    fn revoke_all_removes_every_row_for_the_client_and_logs_once() {
        let store = PermissionStore::in_memory().unwrap();
        let id = client("abc123");
        store.grant(&id, None, "/a", &[], GrantKind::Permanent, "t1", None).unwrap();
        store.grant(&id, None, "/b", &[], GrantKind::Permanent, "t2", None).unwrap();

        store.revoke_all(&id).unwrap();

        assert!(store.list_all().unwrap().is_empty());
        let log = store.list_audit_log().unwrap();
        let revoke_all_entries: Vec<_> = log.iter().filter(|e| e.action == AuditAction::RevokeAll).collect();
        assert_eq!(revoke_all_entries.len(), 1);
        assert_eq!(revoke_all_entries[0].endpoint, "*");
    }

    #[test]
    fn list_all_does_not_filter_expired_rows() {
        let store = PermissionStore::in_memory().unwrap();
        let id = client("abc123");
        {
            let conn = store.conn.lock();
            conn.execute(
                "INSERT INTO permissions (client_id, client_name, endpoint, permissions, grant_type, granted_at, expires_at, token)
                 VALUES (?1, NULL, ?2, '[]', 'TEMPORARY', ?3, ?4, 'tok')",
                params![
                    id.as_str(),
                    "/stale",
                    (Utc::now() - Duration::minutes(10)).to_rfc3339(),
                    (Utc::now() - Duration::minutes(5)).to_rfc3339(),
                ],
            )
            .unwrap();
        }

        // list_all surfaces the stale row unfiltered; only check() evicts it.
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn timed_grant_expiry_matches_duration_hours() {
        let store = PermissionStore::in_memory().unwrap();
        let id = client("abc123");
        store
            .grant(&id, None, "/p", &[], GrantKind::Timed, "tok", Some(8.0))
            .unwrap();

        let grant = store.check(&id, "/p").unwrap().unwrap();
        let expires_at = grant.expires_at.expect("timed grant has an expiry");
        let delta = expires_at - grant.granted_at;
        assert_eq!(delta.num_hours(), 8);
    }

    #[test]
    fn injected_clock_drives_expiry_without_seeding_a_past_timestamp() {
        use localghost_core::TestClock;

        let clock = Arc::new(TestClock::now());
        let store = PermissionStore::in_memory_with_clock(clock.clone()).unwrap();
        let id = client("abc123");
        store.grant(&id, None, "/p", &[], GrantKind::Temporary, "tok", None).unwrap();

        // Still fresh by the injected clock's notion of time.
        assert!(store.check(&id, "/p").unwrap().is_some());

        clock.advance(Duration::minutes(TEMPORARY_MINUTES) + Duration::seconds(1));
        assert!(store.check(&id, "/p").unwrap().is_none());
    }

    #[test]
    fn init_creates_parent_directory_and_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("localghost.db");

        {
            let store = PermissionStore::init(&path).unwrap();
            let id = client("abc123");
            store.grant(&id, None, "/p", &[], GrantKind::Permanent, "tok", None).unwrap();
        }

        let store = PermissionStore::init(&path).unwrap();
        assert_eq!(store.list_all().unwrap().len(), 1);
    }
}
