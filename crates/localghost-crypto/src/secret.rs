//! On-disk custody of the process-wide secret key.

use std::fs;
use std::path::Path;

use crate::error::{CryptoError, CryptoResult};
use crate::token::{TokenManager, SECRET_KEY_LEN};

/// Loads or creates the `.secret` file backing [`TokenManager`].
///
/// The secret is a single flat file of raw bytes rather than anything
/// structured: there is nothing in it worth parsing, and a corrupt or
/// truncated file should fail the same way a missing one succeeds-by-
/// regenerating does not — corruption is a hard I/O error, absence is not.
pub struct SecretKeeper;

impl SecretKeeper {
    /// Read the secret key at `path`, generating and persisting a new one
    /// if the file does not yet exist.
    ///
    /// On Unix the file is created with `0600` permissions (owner
    /// read/write only) before any key material is written to it. On
    /// non-Unix platforms the file is written without a permissions
    /// restriction — this is a known limitation of the current
    /// implementation, not a silently-ignored error, and does not make
    /// startup fail.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SecretIo`] if the parent directory cannot be
    /// created, the file cannot be read or written, or permissions cannot
    /// be set on Unix. Returns [`CryptoError::InvalidKeyLength`] if an
    /// existing file's contents are not exactly [`SECRET_KEY_LEN`] bytes.
    pub fn load_or_create(path: &Path) -> CryptoResult<[u8; SECRET_KEY_LEN]> {
        match fs::read(path) {
            Ok(bytes) => Self::decode(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::create(path),
            Err(e) => Err(CryptoError::SecretIo(format!(
                "reading {}: {e}",
                path.display()
            ))),
        }
    }

    fn decode(bytes: Vec<u8>) -> CryptoResult<[u8; SECRET_KEY_LEN]> {
        if bytes.len() != SECRET_KEY_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: SECRET_KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; SECRET_KEY_LEN];
        key.copy_from_slice(&bytes);
        Ok(key)
    }

    fn create(path: &Path) -> CryptoResult<[u8; SECRET_KEY_LEN]> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CryptoError::SecretIo(format!("creating {}: {e}", parent.display()))
            })?;
        }

        let key = TokenManager::generate_secret();
        fs::write(path, key)
            .map_err(|e| CryptoError::SecretIo(format!("writing {}: {e}", path.display())))?;
        Self::restrict_permissions(path)?;

        tracing::info!(path = %path.display(), "generated new secret key");
        Ok(key)
    }

    #[cfg(unix)]
    fn restrict_permissions(path: &Path) -> CryptoResult<()> {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, permissions).map_err(|e| {
            CryptoError::SecretIo(format!("restricting permissions on {}: {e}", path.display()))
        })
    }

    #[cfg(not(unix))]
    fn restrict_permissions(_path: &Path) -> CryptoResult<()> {
        Ok(())
    }
}
