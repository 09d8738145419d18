//! LocalGhost Crypto - bearer tokens and secret-key custody.
//!
//! This crate provides:
//! - [`TokenManager`], minting and validating authenticated-encryption
//!   bearer tokens that embed their own claims
//! - [`SecretKeeper`], loading or creating the process-wide encryption key
//!   and persisting it with restrictive file permissions
//!
//! # Security Philosophy
//!
//! **Authentication comes from possession of a correctly-encrypted token,
//! not from a client's self-reported identity.** A bearer token only ever
//! validates under the key it was minted with; there is no key identifier
//! embedded in the ciphertext, so rotating the secret (deleting `.secret`
//! and restarting) invalidates every outstanding token at once.
//!
//! # Example
//!
//! ```
//! use localghost_crypto::TokenManager;
//!
//! let manager = TokenManager::new(TokenManager::generate_secret());
//! let client_id = localghost_core::ClientIdentity::derive("demo-app", Some(42));
//! let token = manager
//!     .mint(&client_id, "/demo/system-info", vec!["access".into()], Some(24.0))
//!     .expect("mint");
//!
//! let claims = manager.validate(&token).expect("token should validate");
//! assert_eq!(claims.client_id, client_id);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod secret;
mod token;

pub use error::{CryptoError, CryptoResult};
pub use secret::SecretKeeper;
pub use token::{TokenClaims, TokenManager, SECRET_KEY_LEN};
