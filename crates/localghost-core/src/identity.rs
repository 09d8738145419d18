//! Client identity derivation.
//!
//! A [`ClientIdentity`] is not a trust claim — local clients can lie about
//! their advertised name and PID. It exists so the user's consent decisions
//! are recorded under a stable handle they can recognize across requests
//! from the same program.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of hex characters kept from the SHA-256 digest.
const IDENTITY_LEN: usize = 16;

/// An opaque, 16-hex-character client handle.
///
/// Derivation: `sha256(name ":" pid)[:16]` lowercase hex, or
/// `sha256(name)[:16]` when no PID was advertised.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Derive a client identity from an advertised process name and
    /// optional PID.
    #[must_use]
    pub fn derive(name: &str, pid: Option<u32>) -> Self {
        let mut hasher = Sha256::new();
        match pid {
            Some(pid) => hasher.update(format!("{name}:{pid}").as_bytes()),
            None => hasher.update(name.as_bytes()),
        }
        let digest = hasher.finalize();
        let full_hex = hex::encode(digest);
        Self(full_hex[..IDENTITY_LEN].to_string())
    }

    /// Wrap an explicit, caller-supplied identity verbatim (e.g. from the
    /// `X-Client-ID` header). No hashing is applied — the header value is
    /// already the identity the client chose to present.
    #[must_use]
    pub fn from_explicit(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the identity as a plain string (for storage keys, headers, …).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ClientIdentity> for String {
    fn from(id: ClientIdentity) -> Self {
        id.0
    }
}
