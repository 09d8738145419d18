//! LocalGhost Storage - durable grants and the append-only audit log.
//!
//! This crate provides [`PermissionStore`], a SQLite-backed store over two
//! tables: `permissions` (the current grant per `(client_id, endpoint)`)
//! and `audit_log` (an append-only history of grant/revoke actions). It is
//! the single writer for durable authorization state; everything else in
//! the kernel reads and mutates state exclusively through its operations.
//!
//! # Example
//!
//! ```
//! use localghost_storage::{GrantKind, PermissionStore};
//! use localghost_core::ClientIdentity;
//!
//! let store = PermissionStore::in_memory().unwrap();
//! let client_id = ClientIdentity::derive("demo-app", Some(42));
//!
//! store
//!     .grant(&client_id, Some("demo-app"), "/demo/info", &["access".to_string()], GrantKind::Permanent, "token", None)
//!     .unwrap();
//!
//! let grant = store.check(&client_id, "/demo/info").unwrap();
//! assert!(grant.is_some());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod grant;
mod store;

pub use error::{StorageError, StorageResult};
pub use grant::{AuditAction, AuditEntry, Grant, GrantKind};
pub use store::PermissionStore;
