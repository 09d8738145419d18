//! LocalGhost Consent - interactive consent prompting and grant coordination.
//!
//! This crate provides:
//! - [`ConsentPrompter`], the trait a dialog backend implements, plus a
//!   [`NativePrompter`] that dispatches to the local OS's native dialog
//!   tool
//! - [`ConsentCoordinator`], the single entry point that turns a consent
//!   decision into a minted token and a durable grant
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use localghost_consent::{ConsentCoordinator, HeadlessPrompter};
//! use localghost_core::ClientIdentity;
//! use localghost_crypto::TokenManager;
//! use localghost_storage::PermissionStore;
//!
//! # async fn run() {
//! let coordinator = ConsentCoordinator::new(
//!     Arc::new(HeadlessPrompter),
//!     Arc::new(TokenManager::new(TokenManager::generate_secret())),
//!     Arc::new(PermissionStore::in_memory().unwrap()),
//!     24.0,
//!     8.0,
//! );
//!
//! let client_id = ClientIdentity::derive("demo-app", Some(42));
//! let decision = coordinator
//!     .coordinate(&client_id, "demo-app", "/demo/info", vec!["access".into()], 5)
//!     .await
//!     .unwrap();
//! assert!(!decision.approved); // HeadlessPrompter always denies
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod coordinator;
mod error;
mod native;
mod prompt;

pub use coordinator::{ConsentCoordinator, Decision};
pub use error::{ConsentError, CoordinatorResult};
pub use native::{prompt_with_timeout, HeadlessPrompter, NativePrompter};
pub use prompt::{ConsentPrompt, ConsentPrompter, ConsentResult};
