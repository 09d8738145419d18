//! Endpoint and plugin types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// HTTP method an endpoint responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// PATCH
    Patch,
}

impl HttpMethod {
    /// The method name as it appears on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility class of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    /// No authorization required.
    Public,
    /// Subject to the authorization middleware.
    Protected,
}

/// A single route exposed by a plugin, as seen by the registry.
///
/// `path` here is the plugin-local path (e.g. `/info`); the registry
/// combines it with the owning plugin's name to form the full route
/// (`/{plugin_name}{path}`) at registration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSpec {
    /// Plugin-local path, always starting with `/`.
    pub path: String,
    /// HTTP method this endpoint responds to.
    pub method: HttpMethod,
    /// Public or protected.
    pub kind: EndpointKind,
    /// Human-readable summary, shown in `/capabilities` and `/docs`.
    pub description: String,
    /// Permissions a caller must hold (or be granted) to invoke this
    /// endpoint once it is classified protected.
    pub permissions: BTreeSet<String>,
}

/// A fully-namespaced endpoint as held by the registry's path index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    /// Full route, `/{plugin_name}{local_path}`.
    pub path: String,
    /// HTTP method this endpoint responds to.
    pub method: HttpMethod,
    /// Public or protected.
    pub kind: EndpointKind,
    /// Human-readable summary.
    pub description: String,
    /// Permissions required to invoke this endpoint.
    pub permissions: BTreeSet<String>,
    /// Name of the plugin that owns this endpoint.
    pub plugin_name: String,
}

/// A plugin contributing one or more endpoints to the kernel.
///
/// Mirrors the lifecycle of the broker's original plugin base class:
/// `on_load`/`on_unload` bracket registration so a plugin can acquire or
/// release its own resources (file handles, background tasks) in step
/// with the registry, rather than eagerly in its constructor.
#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
    /// Unique plugin name, used both as the route namespace and the
    /// registry key.
    fn name(&self) -> &str;

    /// Plugin version, surfaced in `/capabilities`.
    fn version(&self) -> &str;

    /// Human-readable plugin summary. Defaults to empty.
    fn description(&self) -> &str {
        ""
    }

    /// The endpoints this plugin contributes, with plugin-local paths.
    fn endpoints(&self) -> Vec<EndpointSpec>;

    /// Called once, after the registry records this plugin and before any
    /// of its endpoints are reachable.
    async fn on_load(&self) {}

    /// Called once, after the registry removes this plugin's endpoints
    /// but while the plugin instance is still alive.
    async fn on_unload(&self) {}
}
