//! LocalGhost Kernel - request admission and kernel assembly.
//!
//! This crate provides:
//! - [`Kernel`], the single owned graph of every component (token
//!   manager, permission store, plugin registry, consent coordinator),
//!   constructed once at startup
//! - [`middleware::admit`] and [`middleware::authorize_layer`], the
//!   authorization middleware's admission state machine and its axum
//!   wiring
//!
//! # Design
//!
//! The admission decision never raises: every branch of
//! [`middleware::Admission`] is a value, not an error, and a failure deep
//! in the store or the consent coordinator collapses to `Deny` rather
//! than propagating as a 5xx from here. Only the kernel's own assembly
//! (`Kernel::bootstrap*`) can fail outright, because a broker that cannot
//! load its secret key or open its database has nothing safe to serve.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod kernel;
pub mod middleware;

pub use error::{KernelError, KernelResult};
pub use kernel::Kernel;
pub use middleware::{admit, authorize_layer, Admission, AuthorizedClient};
