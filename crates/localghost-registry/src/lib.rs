//! LocalGhost Registry - plugin and endpoint bookkeeping.
//!
//! Plugins contribute [`Endpoint`]s under their own name as a path
//! namespace; the [`PluginRegistry`] tracks which paths are public and
//! which are protected, and surfaces a `/capabilities`-shaped snapshot of
//! everything currently installed.
//!
//! The registry itself never makes an authorization decision — it only
//! classifies a path as public or protected. The admission decision lives
//! in the authorization middleware, one layer up.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod endpoint;
mod registry;

pub use endpoint::{Endpoint, EndpointKind, EndpointSpec, HttpMethod, Plugin};
pub use registry::{CapabilityEndpoint, PluginCapabilities, PluginRegistry};
