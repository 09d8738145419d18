//! Built-in, non-plugin routes: health, capabilities, admin, docs, and the
//! WebSocket echo endpoint.

use std::sync::Arc;

use axum::extract::{Extension, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Json};
use serde_json::{json, Value};

use localghost_kernel::{AuthorizedClient, Kernel};

use crate::VERSION;

/// `GET /health`.
pub async fn health(State(_kernel): State<Arc<Kernel>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": VERSION,
        "service": "localghost",
    }))
}

/// `GET /capabilities`.
pub async fn capabilities(State(kernel): State<Arc<Kernel>>) -> Json<Value> {
    Json(json!({
        "version": VERSION,
        "plugins": kernel.registry().capabilities(),
    }))
}

/// `GET /permissions` (protected, admin). Returns every stored grant
/// verbatim, including expired rows — `check` is the authoritative,
/// eviction-aware accessor; this endpoint is a raw dump for operators.
pub async fn permissions(State(kernel): State<Arc<Kernel>>) -> impl IntoResponse {
    match kernel.store().list_all() {
        Ok(grants) => Json(json!({ "permissions": grants })).into_response(),
        Err(error) => {
            tracing::error!(%error, "failed to list permissions");
            (axum::http::StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "store unavailable" })))
                .into_response()
        }
    }
}

/// `GET /audit-log` (protected, admin).
pub async fn audit_log(State(kernel): State<Arc<Kernel>>) -> impl IntoResponse {
    match kernel.store().list_audit_log() {
        Ok(entries) => Json(json!({ "entries": entries })).into_response(),
        Err(error) => {
            tracing::error!(%error, "failed to list audit log");
            (axum::http::StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "store unavailable" })))
                .into_response()
        }
    }
}

/// `GET /docs`. A minimal static page embedding a CDN-hosted Swagger UI
/// pointed at `/openapi.json`; not authoritative for plugin-contributed
/// routes, which only `/capabilities` fully describes.
pub async fn docs() -> Html<&'static str> {
    Html(include_str!("../static/docs.html"))
}

/// `GET /openapi.json`. A hand-maintained document describing only the
/// built-in public/admin/demo routes.
pub async fn openapi() -> Json<Value> {
    Json(serde_json::from_str(include_str!("../static/openapi.json")).unwrap_or_else(|_| json!({})))
}

/// `GET /ws`. Upgrades to a WebSocket that echoes received JSON back
/// wrapped as `{"type": "ack", "client_id", "received"}`.
///
/// The handshake request passes through [`localghost_kernel::authorize_layer`]
/// like any other request; per-frame authorization is out of scope.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    authorized: Option<Extension<AuthorizedClient>>,
) -> impl IntoResponse {
    let client_id = authorized
        .map(|Extension(client)| client.client_id.to_string())
        .unwrap_or_else(|| {
            headers
                .get("X-Client-ID")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string()
        });

    ws.on_upgrade(move |socket| handle_socket(socket, client_id))
}

async fn handle_socket(mut socket: axum::extract::ws::WebSocket, client_id: String) {
    use axum::extract::ws::Message;

    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else { continue };
        let received: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) => continue,
        };

        let ack = json!({ "type": "ack", "client_id": client_id, "received": received });
        if socket.send(Message::Text(ack.to_string())).await.is_err() {
            break;
        }
    }

    tracing::debug!(%client_id, "websocket client disconnected");
}
