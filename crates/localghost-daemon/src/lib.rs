//! LocalGhost Daemon - the broker's HTTP/WebSocket adapter.
//!
//! Thin axum wiring over [`localghost_kernel::Kernel`]: this crate owns no
//! authorization logic of its own. It builds the route table, applies
//! [`localghost_kernel::authorize_layer`], and serves.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod cli;
pub mod demo_plugin;
pub mod handlers;
pub mod router;

/// This crate's version, reported by `/health` and `/capabilities`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use router::build_router;
