//! Consent prompt data and the backend abstraction that shows it.

use serde::{Deserialize, Serialize};

use localghost_core::ClientIdentity;

/// What the user decided when shown a [`ConsentPrompt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentResult {
    /// The user refused, dismissed the dialog, or the prompt timed out.
    Denied,
    /// Allow this single request; the resulting grant is `TEMPORARY`.
    AllowOnce,
    /// Allow for the life of this process; the resulting grant is `SESSION`.
    AllowSession,
    /// Allow for a configured duration; the resulting grant is `TIMED`.
    AllowTimed,
    /// Allow indefinitely; the resulting grant is `PERMANENT`.
    AllowPermanent,
}

/// The inputs shown to the user in a consent dialog.
#[derive(Debug, Clone)]
pub struct ConsentPrompt {
    /// The requesting client's derived identity.
    pub client_id: ClientIdentity,
    /// The requesting client's advertised display name.
    pub client_name: String,
    /// The endpoint being requested.
    pub endpoint: String,
    /// The permissions being requested.
    pub permissions: Vec<String>,
    /// How long to wait for a user response before treating this as denied.
    pub timeout_seconds: u64,
}

/// Presents a [`ConsentPrompt`] to the local user and returns their
/// decision.
///
/// Implementations may block the calling task while the dialog is on
/// screen; callers are expected to run this from a context where blocking
/// (or a long-lived await) is acceptable, and to enforce
/// [`ConsentPrompt::timeout_seconds`] themselves if the backend cannot
/// reliably enforce its own.
///
/// Different backends (native OS dialog, a scripted backend for tests)
/// implement this trait; which one runs must not change what the returned
/// [`ConsentResult`] variants mean to the rest of the kernel.
#[async_trait::async_trait]
pub trait ConsentPrompter: Send + Sync {
    /// Show the prompt and wait for a decision. Returns `None` if the
    /// backend itself failed to present anything (e.g. no dialog tool
    /// available) — the caller treats this the same as a timeout.
    async fn prompt(&self, prompt: &ConsentPrompt) -> Option<ConsentResult>;
}
