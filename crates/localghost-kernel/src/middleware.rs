//! The authorization middleware: C6's admission state machine.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::Instrument;

use localghost_core::ClientIdentity;
use localghost_storage::GrantKind;

use crate::kernel::Kernel;

const DENY_MESSAGE: &str = "Access requires authorization. Use system tray to approve.";

/// The outcome of [`admit`], carrying whatever permissions (or claims) the
/// matched state resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// The path requires no authorization.
    PublicPass,
    /// A bearer token validated for the derived client.
    TokenPass {
        /// The derived client identity.
        client_id: ClientIdentity,
        /// Permissions carried by the token's claims.
        permissions: Vec<String>,
    },
    /// No usable token, but the store holds a live grant.
    StorePass {
        /// The derived client identity.
        client_id: ClientIdentity,
        /// Permissions carried by the stored grant.
        permissions: Vec<String>,
    },
    /// Neither a token nor a grant, but the user approved a fresh consent
    /// prompt.
    ConsentPass {
        /// The derived client identity.
        client_id: ClientIdentity,
        /// Permissions approved by the user.
        permissions: Vec<String>,
    },
    /// No pass condition matched; the request must be refused.
    Deny {
        /// The derived client identity, computed even on denial so the
        /// 401 body can report it.
        client_id: ClientIdentity,
    },
}

/// Derive the client identity for a request from its headers.
///
/// Prefers `X-Client-ID` verbatim; otherwise derives from `X-Process-Name`
/// (default `"unknown"`) and an optional `X-Process-PID`.
#[must_use]
pub fn identity_from_headers(headers: &HeaderMap) -> ClientIdentity {
    if let Some(explicit) = headers.get("X-Client-ID").and_then(|v| v.to_str().ok()) {
        return ClientIdentity::from_explicit(explicit);
    }

    let name = headers
        .get("X-Process-Name")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    let pid = headers
        .get("X-Process-PID")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u32>().ok());

    ClientIdentity::derive(name, pid)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim())
    } else {
        None
    }
}

/// Required permissions for `path`, per the registry's endpoint spec, or
/// an empty list for an unregistered protected path (e.g. a plugin route
/// not yet declared, or a `/public/` asset treated as protected by
/// mistake).
fn required_permissions(kernel: &Kernel, path: &str) -> Vec<String> {
    kernel
        .registry()
        .get_endpoint(path)
        .map(|endpoint| endpoint.permissions.into_iter().collect())
        .unwrap_or_default()
}

/// Run the admission state machine for one request against `path`.
///
/// Evaluated in order, first match wins, per the authorization
/// middleware's state machine: `PUBLIC_PASS` → `TOKEN_PASS` →
/// `STORE_PASS` → `CONSENT_PASS` → `DENY`.
pub async fn admit(kernel: &Kernel, path: &str, headers: &HeaderMap) -> Admission {
    if kernel.registry().is_public(path) {
        return Admission::PublicPass;
    }

    let client_id = identity_from_headers(headers);

    // A bearer token whose client_id does not match the derived one is
    // ignored, not an error: this is what stops token theft from
    // escalating across identities, and it falls through to the store
    // check rather than denying outright.
    if let Some(token) = bearer_token(headers) {
        if let Some(claims) = kernel.token_manager().validate(token) {
            if claims.client_id == client_id {
                return Admission::TokenPass { client_id, permissions: claims.permissions };
            }
        }
    }

    match kernel.store().check(&client_id, path) {
        Ok(Some(grant)) if grant.kind == GrantKind::Session => {
            // A SESSION grant has no `expires_at`, so the store alone can't
            // tell a live one from one left behind by a prior process: its
            // token carries the minting process's boot epoch, and
            // `validate` already refuses a token stamped with any epoch but
            // this process's own. Re-checking it here is what makes a
            // SESSION grant actually die at restart via the store path,
            // not just the bearer-token path above.
            if kernel.token_manager().validate(&grant.token).is_some() {
                return Admission::StorePass { client_id, permissions: grant.permissions };
            }
            tracing::info!(client_id = %client_id, %path, "evicting session grant from a prior boot");
            if let Err(error) = kernel.store().evict(&client_id, path) {
                tracing::error!(%error, client_id = %client_id, %path, "failed to evict stale session grant");
            }
        }
        Ok(Some(grant)) => {
            return Admission::StorePass { client_id, permissions: grant.permissions };
        }
        Ok(None) => {}
        Err(error) => {
            tracing::error!(%error, client_id = %client_id, %path, "permission store check failed");
            return Admission::Deny { client_id };
        }
    }

    let Some(consent) = kernel.consent() else {
        return Admission::Deny { client_id };
    };

    let client_name = headers
        .get("X-Process-Name")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    let permissions = required_permissions(kernel, path);
    let timeout_seconds = kernel.settings().consent_timeout_seconds;

    match consent.coordinate(&client_id, client_name, path, permissions, timeout_seconds).await {
        Ok(decision) if decision.approved => Admission::ConsentPass { client_id, permissions: decision.permissions },
        Ok(_) => Admission::Deny { client_id },
        Err(error) => {
            tracing::error!(%error, client_id = %client_id, %path, "consent coordination failed");
            Admission::Deny { client_id }
        }
    }
}

/// Per-request identity and permission set, attached to request extensions
/// by [`authorize_layer`] on any `*Pass` admission outcome.
#[derive(Debug, Clone)]
pub struct AuthorizedClient {
    /// The derived (or explicit) client identity for this request.
    pub client_id: ClientIdentity,
    /// The permissions this request's admission resolved.
    pub permissions: Vec<String>,
}

#[derive(Serialize)]
struct DenyBody<'a> {
    error: &'static str,
    message: &'static str,
    client_id: &'a str,
    endpoint: &'a str,
}

fn unauthorized_response(client_id: &ClientIdentity, path: &str) -> Response {
    let body = DenyBody {
        error: "unauthorized",
        message: DENY_MESSAGE,
        client_id: client_id.as_str(),
        endpoint: path,
    };
    (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
}

/// Axum middleware enforcing C6 on every request.
///
/// Runs [`admit`], attaches an [`AuthorizedClient`] extension on any pass
/// outcome, and calls through to `next`; on `Deny`, returns the 401 body
/// directly without ever reaching the wrapped handler.
pub async fn authorize_layer(
    State(kernel): State<Arc<Kernel>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let ctx = localghost_telemetry::RequestContext::new("middleware").with_operation("admit");
    let span = ctx.span();

    async move {
        let admission = admit(&kernel, &path, request.headers()).await;

        match admission {
            Admission::PublicPass => next.run(request).await,
            Admission::TokenPass { client_id, permissions }
            | Admission::StorePass { client_id, permissions }
            | Admission::ConsentPass { client_id, permissions } => {
                request.extensions_mut().insert(AuthorizedClient { client_id, permissions });
                next.run(request).await
            }
            Admission::Deny { client_id } => unauthorized_response(&client_id, &path),
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use localghost_consent::{ConsentPrompt, ConsentPrompter, ConsentResult};
    use localghost_core::Settings;
    use localghost_registry::{EndpointKind, EndpointSpec, HttpMethod, Plugin};
    use std::collections::BTreeSet;

    struct ScriptedPrompter(ConsentResult);

    #[async_trait]
    impl ConsentPrompter for ScriptedPrompter {
        async fn prompt(&self, _prompt: &ConsentPrompt) -> Option<ConsentResult> {
            Some(self.0)
        }
    }

    struct DemoPlugin;

    #[async_trait]
    impl Plugin for DemoPlugin {
        fn name(&self) -> &str {
            "demo"
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn endpoints(&self) -> Vec<EndpointSpec> {
            vec![EndpointSpec {
                path: "/system-info".to_string(),
                method: HttpMethod::Get,
                kind: EndpointKind::Protected,
                description: "system info".to_string(),
                permissions: BTreeSet::from(["read:system".to_string()]),
            }]
        }
    }

    async fn kernel_with_prompter(dir: &std::path::Path, result: ConsentResult) -> Kernel {
        let settings = Settings { data_dir: dir.to_path_buf(), ..Settings::default() };
        let kernel = Kernel::bootstrap(settings, Arc::new(ScriptedPrompter(result))).unwrap();
        kernel.registry().register(Arc::new(DemoPlugin)).await;
        kernel
    }

    fn headers_for(name: &str, pid: u32) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("X-Process-Name", HeaderValue::from_str(name).unwrap());
        headers.insert("X-Process-PID", HeaderValue::from_str(&pid.to_string()).unwrap());
        headers
    }

    #[tokio::test]
    async fn public_path_passes_without_headers() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = kernel_with_prompter(dir.path(), ConsentResult::Denied).await;

        let admission = admit(&kernel, "/health", &HeaderMap::new()).await;
        assert_eq!(admission, Admission::PublicPass);
    }

    #[tokio::test]
    async fn first_request_consents_then_passes() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = kernel_with_prompter(dir.path(), ConsentResult::AllowPermanent).await;
        let headers = headers_for("app", 42);

        let admission = admit(&kernel, "/demo/system-info", &headers).await;
        assert!(matches!(admission, Admission::ConsentPass { .. }));
    }

    #[tokio::test]
    async fn second_request_hits_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = kernel_with_prompter(dir.path(), ConsentResult::AllowPermanent).await;
        let headers = headers_for("app", 42);

        admit(&kernel, "/demo/system-info", &headers).await;
        let admission = admit(&kernel, "/demo/system-info", &headers).await;
        assert!(matches!(admission, Admission::StorePass { .. }));
    }

    #[tokio::test]
    async fn denial_produces_no_grant() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = kernel_with_prompter(dir.path(), ConsentResult::Denied).await;
        let headers = headers_for("app", 42);

        let admission = admit(&kernel, "/demo/system-info", &headers).await;
        assert!(matches!(admission, Admission::Deny { .. }));
        assert!(kernel.store().list_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn headless_kernel_denies_without_prompting() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings { data_dir: dir.path().to_path_buf(), ..Settings::default() };
        let kernel = Kernel::bootstrap_headless(settings).unwrap();
        kernel.registry().register(Arc::new(DemoPlugin)).await;

        let admission = admit(&kernel, "/demo/system-info", &headers_for("app", 42)).await;
        assert!(matches!(admission, Admission::Deny { .. }));
    }

    #[tokio::test]
    async fn token_for_a_different_client_falls_through_to_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = kernel_with_prompter(dir.path(), ConsentResult::Denied).await;

        let wrong_client = ClientIdentity::derive("other-app", Some(99));
        let token = kernel
            .token_manager()
            .mint(&wrong_client, "/demo/system-info", vec!["read:system".into()], Some(24.0))
            .unwrap();

        let mut headers = headers_for("app", 42);
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );

        let admission = admit(&kernel, "/demo/system-info", &headers).await;
        // Mismatched token is ignored, not an error: falls through to the
        // store (empty) and then consent (denies).
        assert!(matches!(admission, Admission::Deny { .. }));
    }

    #[tokio::test]
    async fn session_grant_does_not_survive_a_restart_via_the_store_path() {
        use localghost_crypto::TokenManager;
        use localghost_storage::PermissionStore;

        let dir = tempfile::tempdir().unwrap();
        let settings = Settings { data_dir: dir.path().to_path_buf(), ..Settings::default() };
        let client_id = identity_from_headers(&headers_for("app", 42));

        // A SESSION grant approved before the (simulated) restart: the
        // grant row and its epoch-bound token both land in the store under
        // this boot's `TokenManager`.
        let store = Arc::new(PermissionStore::init(&settings.db_path()).unwrap());
        let token_manager_before = Arc::new(TokenManager::new(TokenManager::generate_secret()));
        let token = token_manager_before
            .mint_session(&client_id, "/demo/system-info", vec!["read:system".into()])
            .unwrap();
        store
            .grant(&client_id, Some("app"), "/demo/system-info", &["read:system".to_string()], GrantKind::Session, &token, None)
            .unwrap();
        drop(store);

        // A fresh kernel over the same data directory simulates the
        // process restarting: a new `TokenManager` with a new boot epoch,
        // but the same persisted permission store row.
        let kernel = kernel_with_prompter(dir.path(), ConsentResult::Denied).await;

        let admission = admit(&kernel, "/demo/system-info", &headers_for("app", 42)).await;
        assert!(matches!(admission, Admission::Deny { .. }), "stale session grant must not admit: {admission:?}");
        assert!(kernel.store().check(&client_id, "/demo/system-info").unwrap().is_none());
    }

    #[tokio::test]
    async fn matching_bearer_token_short_circuits_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = kernel_with_prompter(dir.path(), ConsentResult::Denied).await;

        let client_id = identity_from_headers(&headers_for("app", 42));
        let token = kernel
            .token_manager()
            .mint(&client_id, "/demo/system-info", vec!["read:system".into()], Some(24.0))
            .unwrap();

        let mut headers = headers_for("app", 42);
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );

        let admission = admit(&kernel, "/demo/system-info", &headers).await;
        assert!(matches!(admission, Admission::TokenPass { .. }));
    }
}
