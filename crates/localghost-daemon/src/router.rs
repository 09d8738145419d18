//! Route table assembly.

use std::sync::Arc;

use axum::middleware as axum_middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use localghost_kernel::Kernel;

use crate::{demo_plugin, handlers};

/// Build the daemon's axum [`Router`] over an assembled [`Kernel`].
///
/// Every route — public or protected — passes through
/// [`localghost_kernel::authorize_layer`] first; the layer itself decides
/// which paths require nothing further, using visibility classifications
/// [`Kernel::bootstrap`] already installed for the built-in routes below.
/// CORS is wide open (`Any` origin/method/header), matching the broker's
/// original development-time CORS policy: this is a localhost-bound
/// broker for a single user's own clients, not a multi-tenant service.
#[must_use]
pub fn build_router(kernel: Arc<Kernel>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/capabilities", get(handlers::capabilities))
        .route("/docs", get(handlers::docs))
        .route("/openapi.json", get(handlers::openapi))
        .route("/permissions", get(handlers::permissions))
        .route("/audit-log", get(handlers::audit_log))
        .route("/ws", get(handlers::ws_handler))
        .route("/demo/ping", get(demo_plugin::ping))
        .route("/demo/echo", post(demo_plugin::echo))
        .route("/demo/time", get(demo_plugin::time))
        .route("/demo/system-info", get(demo_plugin::system_info))
        .route("/demo/execute", post(demo_plugin::execute))
        .layer(axum_middleware::from_fn_with_state(kernel.clone(), localghost_kernel::authorize_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(kernel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use localghost_consent::HeadlessPrompter;
    use localghost_core::Settings;
    use tower::ServiceExt;

    async fn kernel_in(dir: &std::path::Path) -> Arc<Kernel> {
        let settings = Settings { data_dir: dir.to_path_buf(), ..Settings::default() };
        let kernel = Kernel::bootstrap(settings, Arc::new(HeadlessPrompter)).unwrap();
        kernel.registry().register(Arc::new(crate::demo_plugin::DemoPlugin)).await;
        Arc::new(kernel)
    }

    #[tokio::test]
    async fn health_is_public() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(kernel_in(dir.path()).await);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn demo_system_info_requires_authorization() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(kernel_in(dir.path()).await);

        let response = app
            .oneshot(Request::builder().uri("/demo/system-info").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn demo_ping_is_public() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(kernel_in(dir.path()).await);

        let response = app
            .oneshot(Request::builder().uri("/demo/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
