//! Commonly used types, for `use localghost_telemetry::prelude::*;`.

pub use crate::{LogConfig, LogFormat, LogTarget};
pub use crate::{RequestContext, RequestGuard};
pub use crate::{setup_default_logging, setup_logging};
pub use crate::{TelemetryError, TelemetryResult};
