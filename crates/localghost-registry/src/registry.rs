//! The plugin/endpoint registry.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::endpoint::{Endpoint, EndpointKind, Plugin};

const PUBLIC_PREFIX: &str = "/public/";

/// A snapshot of one plugin's advertised capabilities.
#[derive(Debug, Clone, Serialize)]
pub struct PluginCapabilities {
    /// Plugin version.
    pub version: String,
    /// Plugin description.
    pub description: String,
    /// Endpoints this plugin exposes.
    pub endpoints: Vec<CapabilityEndpoint>,
}

/// One endpoint entry within a [`PluginCapabilities`] snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityEndpoint {
    /// Full route.
    pub path: String,
    /// HTTP method.
    pub method: String,
    /// `"public"` or `"protected"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable description.
    pub description: String,
}

struct Inner {
    plugins: BTreeMap<String, Arc<dyn Plugin>>,
    endpoints: BTreeMap<String, Endpoint>,
}

/// Holds every registered plugin and an index from full route to
/// [`Endpoint`].
///
/// The registry is the only place path-to-visibility decisions are made;
/// the authorization middleware consults [`Self::is_public`] rather than
/// re-deriving visibility itself. Registration is idempotent per plugin
/// name: registering the same name twice is a warned no-op, not an error,
/// matching the broker's tolerance for a plugin being loaded twice during
/// startup retries.
pub struct PluginRegistry {
    inner: RwLock<Inner>,
}

impl PluginRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                plugins: BTreeMap::new(),
                endpoints: BTreeMap::new(),
            }),
        }
    }

    /// Register `plugin` and install its endpoints into the path index.
    ///
    /// If a plugin with the same `name()` is already registered, this is a
    /// no-op (after logging a warning) — `on_load` is not called again and
    /// the existing endpoints are left untouched.
    pub async fn register(&self, plugin: Arc<dyn Plugin>) {
        let name = plugin.name().to_string();
        {
            let inner = self.inner.read();
            if inner.plugins.contains_key(&name) {
                tracing::warn!(plugin = %name, "plugin already registered, skipping");
                return;
            }
        }

        plugin.on_load().await;

        let mut inner = self.inner.write();
        // Re-check under the write lock in case of a concurrent register
        // race; last-writer-loses keeps the idempotence guarantee honest
        // even when two registrations of the same name race each other.
        if inner.plugins.contains_key(&name) {
            tracing::warn!(plugin = %name, "plugin already registered, skipping");
            return;
        }

        let specs = plugin.endpoints();
        let endpoint_count = specs.len();
        for spec in specs {
            let full_path = format!("/{name}{}", spec.path);
            inner.endpoints.insert(
                full_path.clone(),
                Endpoint {
                    path: full_path,
                    method: spec.method,
                    kind: spec.kind,
                    description: spec.description,
                    permissions: spec.permissions,
                    plugin_name: name.clone(),
                },
            );
        }

        inner.plugins.insert(name.clone(), plugin);
        tracing::info!(plugin = %name, endpoints = endpoint_count, "plugin registered");
    }

    /// Remove `plugin_name` and all of its endpoints.
    ///
    /// A no-op if the plugin was never registered (or already
    /// unregistered).
    pub async fn unregister(&self, plugin_name: &str) {
        let plugin = {
            let mut inner = self.inner.write();
            let Some(plugin) = inner.plugins.remove(plugin_name) else {
                return;
            };
            inner.endpoints.retain(|_, e| e.plugin_name != plugin_name);
            plugin
        };

        plugin.on_unload().await;
        tracing::info!(plugin = %plugin_name, "plugin unregistered");
    }

    /// Install a built-in route directly into the path index, bypassing
    /// the plugin-name-prefixing `register` normally applies.
    ///
    /// Used for the daemon's own routes (`/health`, `/capabilities`,
    /// `/permissions`, `/ws`, ...) — they are not contributed by any
    /// [`Plugin`] but still need the registry to be the single source of
    /// truth for [`Self::is_public`], rather than duplicating visibility
    /// rules in the HTTP layer. Built-ins never appear in
    /// [`Self::capabilities`], which only enumerates registered plugins.
    pub fn register_builtin(&self, path: &str, method: crate::endpoint::HttpMethod, kind: EndpointKind, description: &str) {
        let mut inner = self.inner.write();
        inner.endpoints.insert(
            path.to_string(),
            Endpoint {
                path: path.to_string(),
                method,
                kind,
                description: description.to_string(),
                permissions: BTreeSet::new(),
                plugin_name: "core".to_string(),
            },
        );
    }

    /// Look up the endpoint registered at `path`, if any.
    #[must_use]
    pub fn get_endpoint(&self, path: &str) -> Option<Endpoint> {
        self.inner.read().endpoints.get(path).cloned()
    }

    /// Whether `path` requires no authorization.
    ///
    /// A registered endpoint's own [`EndpointKind`] wins; an unregistered
    /// path is public iff it falls under the `/public/` prefix (e.g. a
    /// static asset no plugin explicitly declared).
    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        if let Some(endpoint) = self.get_endpoint(path) {
            return endpoint.kind == EndpointKind::Public;
        }
        path.starts_with(PUBLIC_PREFIX)
    }

    /// A snapshot of every registered plugin's capabilities, keyed by
    /// plugin name.
    #[must_use]
    pub fn capabilities(&self) -> BTreeMap<String, PluginCapabilities> {
        let inner = self.inner.read();
        inner
            .plugins
            .iter()
            .map(|(name, plugin)| {
                let endpoints = inner
                    .endpoints
                    .values()
                    .filter(|e| &e.plugin_name == name)
                    .map(|e| CapabilityEndpoint {
                        path: e.path.clone(),
                        method: e.method.to_string(),
                        kind: match e.kind {
                            EndpointKind::Public => "public".to_string(),
                            EndpointKind::Protected => "protected".to_string(),
                        },
                        description: e.description.clone(),
                    })
                    .collect();
                (
                    name.clone(),
                    PluginCapabilities {
                        version: plugin.version().to_string(),
                        description: plugin.description().to_string(),
                        endpoints,
                    },
                )
            })
            .collect()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("PluginRegistry")
            .field("plugins", &inner.plugins.len())
            .field("endpoints", &inner.endpoints.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{EndpointSpec, HttpMethod};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestPlugin {
        plugin_name: &'static str,
        load_count: AtomicUsize,
    }

    impl TestPlugin {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self { plugin_name: name, load_count: AtomicUsize::new(0) })
        }
    }

    #[async_trait::async_trait]
    impl Plugin for TestPlugin {
        fn name(&self) -> &str {
            self.plugin_name
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn endpoints(&self) -> Vec<EndpointSpec> {
            vec![
                EndpointSpec {
                    path: "/info".to_string(),
                    method: HttpMethod::Get,
                    kind: EndpointKind::Public,
                    description: "info".to_string(),
                    permissions: BTreeSet::new(),
                },
                EndpointSpec {
                    path: "/act".to_string(),
                    method: HttpMethod::Post,
                    kind: EndpointKind::Protected,
                    description: "act".to_string(),
                    permissions: BTreeSet::from(["act".to_string()]),
                },
            ]
        }

        async fn on_load(&self) {
            self.load_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn register_installs_namespaced_endpoints() {
        let registry = PluginRegistry::new();
        registry.register(TestPlugin::new("demo")).await;

        assert!(registry.is_public("/demo/info"));
        assert!(!registry.is_public("/demo/act"));
        assert!(registry.get_endpoint("/demo/act").is_some());
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_noop() {
        let registry = PluginRegistry::new();
        let plugin = TestPlugin::new("demo");
        registry.register(plugin.clone()).await;
        registry.register(plugin.clone()).await;

        assert_eq!(plugin.load_count.load(Ordering::SeqCst), 1);
        assert_eq!(registry.capabilities().len(), 1);
    }

    #[tokio::test]
    async fn unregister_removes_plugin_and_its_endpoints() {
        let registry = PluginRegistry::new();
        registry.register(TestPlugin::new("demo")).await;
        registry.unregister("demo").await;

        assert!(registry.get_endpoint("/demo/info").is_none());
        assert!(registry.capabilities().is_empty());
    }

    #[tokio::test]
    async fn unregistering_unknown_plugin_is_a_noop() {
        let registry = PluginRegistry::new();
        registry.unregister("never-registered").await;
        assert!(registry.capabilities().is_empty());
    }

    #[tokio::test]
    async fn unregistered_public_prefixed_path_is_public() {
        let registry = PluginRegistry::new();
        assert!(registry.is_public("/public/assets/logo.png"));
        assert!(!registry.is_public("/unknown/path"));
    }

    #[test]
    fn builtin_routes_are_classified_without_a_plugin_name_prefix() {
        let registry = PluginRegistry::new();
        registry.register_builtin("/health", HttpMethod::Get, EndpointKind::Public, "health check");
        registry.register_builtin("/permissions", HttpMethod::Get, EndpointKind::Protected, "list grants");

        assert!(registry.is_public("/health"));
        assert!(!registry.is_public("/permissions"));
        assert!(registry.get_endpoint("/permissions").is_some());
    }

    #[tokio::test]
    async fn builtin_routes_never_appear_in_the_plugin_capabilities_snapshot() {
        let registry = PluginRegistry::new();
        registry.register_builtin("/health", HttpMethod::Get, EndpointKind::Public, "health check");
        registry.register(TestPlugin::new("demo")).await;

        assert!(registry.capabilities().get("core").is_none());
        assert_eq!(registry.capabilities().len(), 1);
    }

    #[tokio::test]
    async fn capabilities_snapshot_matches_registered_endpoints() {
        let registry = PluginRegistry::new();
        registry.register(TestPlugin::new("demo")).await;

        let caps = registry.capabilities();
        let demo = caps.get("demo").expect("demo registered");
        assert_eq!(demo.version, "1.0.0");
        assert_eq!(demo.endpoints.len(), 2);
    }
}
