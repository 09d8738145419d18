//! Kernel assembly: the single owned graph of every component.

use std::sync::Arc;

use localghost_consent::{ConsentCoordinator, ConsentPrompter, HeadlessPrompter, NativePrompter};
use localghost_core::Settings;
use localghost_crypto::{SecretKeeper, TokenManager};
use localghost_registry::{EndpointKind, HttpMethod, PluginRegistry};
use localghost_storage::PermissionStore;

use crate::error::KernelResult;

/// Classify the broker's own built-in routes into the registry, so
/// [`PluginRegistry::is_public`] stays the single source of truth for
/// what an HTTP adapter must authorize, independent of how that adapter
/// happens to wire its own route table.
///
/// Only the public four need an explicit entry: an unregistered path is
/// protected by default, which is already the right answer for
/// `/permissions`, `/audit-log`, and `/ws`.
fn register_builtin_routes(registry: &PluginRegistry) {
    registry.register_builtin("/health", HttpMethod::Get, EndpointKind::Public, "health check");
    registry.register_builtin("/capabilities", HttpMethod::Get, EndpointKind::Public, "list registered plugins and endpoints");
    registry.register_builtin("/docs", HttpMethod::Get, EndpointKind::Public, "interactive API documentation");
    registry.register_builtin("/openapi.json", HttpMethod::Get, EndpointKind::Public, "OpenAPI document");
}

/// The authorization broker's owned state, constructed once at startup.
///
/// Replaces the module-level globals the broker this was modeled on keeps
/// for its token manager, permission store, and registry: every other
/// component here holds an `Arc` into a single `Kernel`, threaded through
/// request handling via axum's `State` extractor rather than reached for
/// through free functions.
pub struct Kernel {
    settings: Settings,
    token_manager: Arc<TokenManager>,
    store: Arc<PermissionStore>,
    registry: Arc<PluginRegistry>,
    consent: Option<Arc<ConsentCoordinator>>,
}

impl Kernel {
    /// Assemble a kernel from `settings`, wiring consent prompts through
    /// `prompter`.
    ///
    /// Bootstrap order: load or create the secret key, build the token
    /// manager over it, open the permission store, build an empty plugin
    /// registry, and wrap `prompter` in a [`ConsentCoordinator`]. Plugins
    /// are registered separately, after construction, by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`crate::KernelError::Secret`] if the secret key cannot be
    /// loaded or created, or [`crate::KernelError::Store`] if the
    /// permission store cannot be opened.
    pub fn bootstrap(settings: Settings, prompter: Arc<dyn ConsentPrompter>) -> KernelResult<Self> {
        let secret = SecretKeeper::load_or_create(&settings.secret_path())?;
        let token_manager = Arc::new(TokenManager::new(secret));
        let store = Arc::new(PermissionStore::init(&settings.db_path())?);
        let registry = Arc::new(PluginRegistry::new());
        register_builtin_routes(&registry);
        let consent = Arc::new(ConsentCoordinator::new(
            prompter,
            token_manager.clone(),
            store.clone(),
            settings.token_expiry_hours,
            settings.default_grant_duration_hours,
        ));

        Ok(Self {
            settings,
            token_manager,
            store,
            registry,
            consent: Some(consent),
        })
    }

    /// Bootstrap with the platform-native dialog backend.
    ///
    /// # Errors
    ///
    /// See [`Self::bootstrap`].
    pub fn bootstrap_native(settings: Settings) -> KernelResult<Self> {
        Self::bootstrap(settings, Arc::new(NativePrompter))
    }

    /// Bootstrap with consent prompting disabled: every protected request
    /// without a matching token or grant falls straight to `DENY` rather
    /// than invoking any dialog.
    ///
    /// # Errors
    ///
    /// See [`Self::bootstrap`].
    pub fn bootstrap_headless(settings: Settings) -> KernelResult<Self> {
        let mut kernel = Self::bootstrap(settings, Arc::new(HeadlessPrompter))?;
        kernel.consent = None;
        Ok(kernel)
    }

    /// The resolved runtime settings this kernel was assembled from.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The token manager minting and validating bearer tokens.
    #[must_use]
    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.token_manager
    }

    /// The durable permission store.
    #[must_use]
    pub fn store(&self) -> &Arc<PermissionStore> {
        &self.store
    }

    /// The plugin and endpoint registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// The consent coordinator, if one was installed.
    ///
    /// `None` only for a kernel built with [`Self::bootstrap_headless`]
    /// that has had its handler explicitly removed; the middleware treats
    /// an absent coordinator as the `DENY`-no-handler branch of admission.
    #[must_use]
    pub fn consent(&self) -> Option<&Arc<ConsentCoordinator>> {
        self.consent.as_ref()
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("host", &self.settings.host)
            .field("port", &self.settings.port)
            .field("consent_installed", &self.consent.is_some())
            .finish_non_exhaustive()
    }
}
