//! LocalGhost Core - shared types and traits for the authorization kernel.
//!
//! This crate provides:
//! - [`ClientIdentity`] derivation, the opaque handle requests are tracked under
//! - [`Settings`], the broker's environment-driven configuration
//! - [`Clock`], a seam for deterministic time in tests
//! - Shared error plumbing reused by the other kernel crates
//!
//! # Design
//!
//! This crate has no dependency on any other `localghost-*` crate. Everything
//! here is a plain value type or a trait other crates implement against.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod clock;
pub mod error;
pub mod identity;
pub mod settings;

pub use clock::{Clock, SystemClock, TestClock};
pub use error::{CoreError, CoreResult};
pub use identity::ClientIdentity;
pub use settings::Settings;
