//! Authenticated-encryption bearer tokens.

use aes_gcm_siv::aead::{Aead, KeyInit};
use aes_gcm_siv::{Aes256GcmSiv, Key, Nonce};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use zeroize::Zeroizing;

use localghost_core::ClientIdentity;

use crate::error::{CryptoError, CryptoResult};

/// Length, in bytes, of the AES-256-GCM-SIV key used to seal tokens.
pub const SECRET_KEY_LEN: usize = 32;

/// Length, in bytes, of the random nonce prepended to every ciphertext.
const NONCE_LEN: usize = 12;

/// The claims embedded in a bearer token.
///
/// `validate(mint(x)) == x` for any non-expired token: minting and
/// validating a token is meant to be a lossless round trip of this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// The client the token was minted for.
    pub client_id: ClientIdentity,
    /// Full path of the endpoint this token authorizes.
    pub endpoint: String,
    /// Permissions granted by this token.
    pub permissions: Vec<String>,
    /// When the token was minted.
    pub issued_at: DateTime<Utc>,
    /// When the token stops being valid. `None` means no expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Set only for `SESSION` grants: the minting process's boot epoch.
    ///
    /// `validate` refuses a token whose `session_epoch` does not match the
    /// validating process's current boot epoch, so a SESSION token minted
    /// by a previous process instance reads as invalid even though the
    /// persisted secret key would still decrypt it (see the module-level
    /// note on SESSION grants).
    pub session_epoch: Option<DateTime<Utc>>,
}

impl TokenClaims {
    /// Encode the claims as a canonical, key-sorted JSON object.
    ///
    /// Sorting keys (rather than relying on struct declaration order) keeps
    /// the encoding stable across refactors that reorder fields, which
    /// matters because the encoded bytes are what gets encrypted — any
    /// change to the byte layout invalidates every outstanding token anyway,
    /// but it should only happen on purpose.
    fn to_canonical_bytes(&self) -> CryptoResult<Vec<u8>> {
        let value = serde_json::to_value(self).map_err(|e| CryptoError::Encode(e.to_string()))?;
        let serde_json::Value::Object(map) = value else {
            return Err(CryptoError::Encode("claims did not serialize to an object".into()));
        };
        let sorted: BTreeMap<String, serde_json::Value> = map.into_iter().collect();
        serde_json::to_vec(&sorted).map_err(|e| CryptoError::Encode(e.to_string()))
    }

    fn from_canonical_bytes(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok()
    }
}

/// Mints and validates bearer tokens under a single process-wide secret key.
///
/// There is no key identifier embedded in a token: validating under a
/// different key than the one a token was minted with always fails closed,
/// which is what makes secret rotation (delete `.secret`, restart) a total
/// invalidation of every outstanding grant's token.
pub struct TokenManager {
    cipher: Aes256GcmSiv,
    /// Boot epoch, used to scope `SESSION` grants to this process lifetime
    /// even though the secret key itself is persisted across restarts (see
    /// the module-level note on SESSION grants).
    boot_epoch: DateTime<Utc>,
}

impl TokenManager {
    /// Construct a manager from an existing secret key.
    ///
    /// # Panics
    ///
    /// Panics if `secret` is not exactly [`SECRET_KEY_LEN`] bytes. Callers
    /// that read the key from disk should validate the length themselves
    /// (see [`crate::SecretKeeper`]) and surface a proper error instead of
    /// hitting this.
    #[must_use]
    pub fn new(secret: [u8; SECRET_KEY_LEN]) -> Self {
        let key = Key::<Aes256GcmSiv>::from_slice(&secret);
        Self {
            cipher: Aes256GcmSiv::new(key),
            boot_epoch: Utc::now(),
        }
    }

    /// Generate a fresh random secret key, for first-boot initialization.
    #[must_use]
    pub fn generate_secret() -> [u8; SECRET_KEY_LEN] {
        let mut key = Zeroizing::new([0u8; SECRET_KEY_LEN]);
        rand::thread_rng().fill_bytes(&mut *key);
        *key
    }

    /// The instant this manager (and therefore this process) booted.
    ///
    /// `SESSION` grants are only honored by the middleware when their
    /// `issued_at` is at or after this epoch — a SESSION token minted by a
    /// previous process instance reads as stale even though the persisted
    /// secret key would still decrypt it.
    #[must_use]
    pub fn boot_epoch(&self) -> DateTime<Utc> {
        self.boot_epoch
    }

    /// Derive a client identity from an advertised name and optional PID.
    #[must_use]
    pub fn derive_client_id(&self, name: &str, pid: Option<u32>) -> ClientIdentity {
        ClientIdentity::derive(name, pid)
    }

    /// Mint a bearer token for `client_id` granting `permissions` on
    /// `endpoint`.
    ///
    /// `expires_in_hours = None` mints a token with no expiry (used for
    /// `PERMANENT` grants and the session epoch bound on `SESSION` grants).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encode`] if the claims cannot be canonically
    /// serialized — this should not happen for well-formed inputs.
    pub fn mint(
        &self,
        client_id: &ClientIdentity,
        endpoint: &str,
        permissions: Vec<String>,
        expires_in_hours: Option<f64>,
    ) -> CryptoResult<String> {
        let issued_at = Utc::now();
        let expires_at = expires_in_hours.map(|hours| {
            let millis = (hours * 3_600_000.0).round() as i64;
            issued_at + Duration::milliseconds(millis)
        });

        let claims = TokenClaims {
            client_id: client_id.clone(),
            endpoint: endpoint.to_string(),
            permissions,
            issued_at,
            expires_at,
            session_epoch: None,
        };

        self.seal(&claims)
    }

    /// Mint a `SESSION`-scoped bearer token.
    ///
    /// The claims carry no `expires_at` of their own; instead they are
    /// bound to this process's boot epoch and refused by [`Self::validate`]
    /// the moment the process restarts, which is what lets a `SESSION`
    /// grant behave as "lives until the process restarts" even though the
    /// secret key backing the encryption survives that restart.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encode`] if the claims cannot be canonically
    /// serialized.
    pub fn mint_session(
        &self,
        client_id: &ClientIdentity,
        endpoint: &str,
        permissions: Vec<String>,
    ) -> CryptoResult<String> {
        let claims = TokenClaims {
            client_id: client_id.clone(),
            endpoint: endpoint.to_string(),
            permissions,
            issued_at: Utc::now(),
            expires_at: None,
            session_epoch: Some(self.boot_epoch),
        };

        self.seal(&claims)
    }

    fn seal(&self, claims: &TokenClaims) -> CryptoResult<String> {
        let plaintext = claims.to_canonical_bytes()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        // `encrypt` binds the key to the nonce and rejects tampering on
        // decrypt (a forged or bit-flipped ciphertext fails the MAC check
        // inside `validate`, never panics or silently returns garbage).
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_ref())
            .map_err(|e| CryptoError::Encode(e.to_string()))?;

        let mut wire = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        wire.extend_from_slice(&nonce_bytes);
        wire.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(wire))
    }

    /// Decrypt, verify, and deserialize a bearer token.
    ///
    /// Returns `None` on any of: malformed base64, a ciphertext too short
    /// to contain a nonce, a MAC failure (tampering or the wrong key), a
    /// malformed plaintext payload, or an expired token. Every failure mode
    /// collapses to the same `None` so a caller can never distinguish "this
    /// token is forged" from "this token expired" by timing or shape alone.
    #[must_use]
    pub fn validate(&self, token: &str) -> Option<TokenClaims> {
        let wire = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .ok()?;
        if wire.len() < NONCE_LEN {
            return None;
        }
        let (nonce_bytes, ciphertext) = wire.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self.cipher.decrypt(nonce, ciphertext).ok()?;
        let claims = TokenClaims::from_canonical_bytes(&plaintext)?;

        if let Some(expires_at) = claims.expires_at {
            if Utc::now() >= expires_at {
                return None;
            }
        }

        if let Some(session_epoch) = claims.session_epoch {
            if session_epoch != self.boot_epoch {
                return None;
            }
        }

        Some(claims)
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> TokenManager {
        TokenManager::new(TokenManager::generate_secret())
    }

    #[test]
    fn round_trips_non_expiring_claims() {
        let manager = manager();
        let client_id = ClientIdentity::derive("app", Some(1));
        let token = manager
            .mint(&client_id, "/demo/info", vec!["access".to_string()], None)
            .unwrap();

        let claims = manager.validate(&token).expect("should validate");
        assert_eq!(claims.client_id, client_id);
        assert_eq!(claims.endpoint, "/demo/info");
        assert_eq!(claims.permissions, vec!["access".to_string()]);
        assert!(claims.expires_at.is_none());
    }

    #[test]
    fn round_trips_with_expiry() {
        let manager = manager();
        let client_id = ClientIdentity::derive("app", None);
        let token = manager
            .mint(&client_id, "/e", vec![], Some(24.0))
            .unwrap();
        let claims = manager.validate(&token).unwrap();
        assert!(claims.expires_at.is_some());
        assert!(claims.expires_at.unwrap() > claims.issued_at);
    }

    #[test]
    fn expired_token_does_not_validate() {
        let manager = manager();
        let client_id = ClientIdentity::derive("app", None);
        // A negative duration immediately places expires_at in the past.
        let token = manager
            .mint(&client_id, "/e", vec![], Some(-1.0))
            .unwrap();
        assert!(manager.validate(&token).is_none());
    }

    #[test]
    fn forged_token_under_a_different_key_is_rejected() {
        let manager_a = manager();
        let manager_b = manager();
        let client_id = ClientIdentity::derive("app", Some(7));
        let token = manager_a
            .mint(&client_id, "/e", vec!["access".into()], None)
            .unwrap();
        assert!(manager_b.validate(&token).is_none());
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let manager = manager();
        let client_id = ClientIdentity::derive("app", Some(7));
        let mut token = manager
            .mint(&client_id, "/e", vec!["access".into()], None)
            .unwrap();
        // Flip the last base64 character; still decodes as valid base64 but
        // the MAC check inside decrypt must now fail.
        let last = token.pop().unwrap();
        token.push(if last == 'A' { 'B' } else { 'A' });
        assert!(manager.validate(&token).is_none());
    }

    #[test]
    fn malformed_token_is_rejected() {
        let manager = manager();
        assert!(manager.validate("not-a-real-token").is_none());
        assert!(manager.validate("").is_none());
    }

    #[test]
    fn derive_client_id_matches_core_derivation() {
        let manager = manager();
        assert_eq!(
            manager.derive_client_id("app", Some(1)),
            ClientIdentity::derive("app", Some(1))
        );
    }

    #[test]
    fn generated_secrets_are_the_expected_length() {
        let secret = TokenManager::generate_secret();
        assert_eq!(secret.len(), SECRET_KEY_LEN);
    }

    #[test]
    fn session_token_validates_within_the_same_boot() {
        let manager = manager();
        let client_id = ClientIdentity::derive("app", Some(1));
        let token = manager
            .mint_session(&client_id, "/e", vec!["access".into()])
            .unwrap();

        let claims = manager.validate(&token).expect("should validate in the same process");
        assert!(claims.expires_at.is_none());
    }

    #[test]
    fn session_token_does_not_survive_a_simulated_restart() {
        // Same secret key as if `.secret` had been reloaded after a
        // restart, but each `TokenManager::new` call gets a fresh boot
        // epoch, simulating two instances of the same process.
        let secret = TokenManager::generate_secret();
        let client_id = ClientIdentity::derive("app", Some(1));

        let manager_before_restart = TokenManager::new(secret);
        let token = manager_before_restart
            .mint_session(&client_id, "/e", vec!["access".into()])
            .unwrap();

        let manager_after_restart = TokenManager::new(secret);
        assert!(manager_after_restart.validate(&token).is_none());
    }

    #[test]
    fn plain_mint_never_carries_a_session_epoch() {
        let manager = manager();
        let client_id = ClientIdentity::derive("app", Some(1));
        let token = manager.mint(&client_id, "/e", vec![], None).unwrap();
        let claims = manager.validate(&token).unwrap();
        assert!(claims.session_epoch.is_none());
    }
}
