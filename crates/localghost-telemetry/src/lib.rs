//! LocalGhost Telemetry - logging setup and request-scoped tracing context.
//!
//! This crate provides:
//! - Configurable logging setup over `tracing-subscriber`
//! - [`RequestContext`], a correlation context attached to each inbound
//!   request as it passes through the kernel
//!
//! # Example
//!
//! ```rust,no_run
//! use localghost_telemetry::{LogConfig, LogFormat, setup_logging, RequestContext};
//!
//! # fn main() -> Result<(), localghost_telemetry::TelemetryError> {
//! let config = LogConfig::new("info").with_format(LogFormat::Pretty);
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("middleware").with_operation("admit");
//! let _guard = ctx.enter();
//! tracing::info!("admitting request");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::{RequestContext, RequestGuard};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{setup_default_logging, setup_logging, LogConfig, LogFormat, LogTarget};
