//! The built-in demo plugin: ping/echo/time plus a couple of protected
//! endpoints showing what a real plugin's authorization story looks like.

use std::collections::BTreeSet;

use async_trait::async_trait;
use axum::response::{IntoResponse, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use localghost_registry::{EndpointKind, EndpointSpec, HttpMethod, Plugin};

/// Commands the `/demo/execute` endpoint is willing to run.
///
/// Mirrors the broker's original allow-list, but the Rust port never hands
/// the command line to a shell: [`run_execute`] splits it into an argument
/// vector and execs the binary directly, so there is no shell-metacharacter
/// injection surface left for an allowed command name with an attacker-
/// controlled tail.
const ALLOWED_COMMANDS: &[&str] = &["echo", "date", "whoami", "pwd", "hostname"];

/// The demo plugin, registered once at startup via the plugin registry.
#[derive(Debug, Default)]
pub struct DemoPlugin;

#[async_trait]
impl Plugin for DemoPlugin {
    fn name(&self) -> &str {
        "demo"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "Built-in demo plugin for testing and documentation"
    }

    fn endpoints(&self) -> Vec<EndpointSpec> {
        vec![
            EndpointSpec {
                path: "/ping".to_string(),
                method: HttpMethod::Get,
                kind: EndpointKind::Public,
                description: "Simple ping endpoint".to_string(),
                permissions: BTreeSet::new(),
            },
            EndpointSpec {
                path: "/echo".to_string(),
                method: HttpMethod::Post,
                kind: EndpointKind::Public,
                description: "Echo back the request body".to_string(),
                permissions: BTreeSet::new(),
            },
            EndpointSpec {
                path: "/time".to_string(),
                method: HttpMethod::Get,
                kind: EndpointKind::Public,
                description: "Get current server time".to_string(),
                permissions: BTreeSet::new(),
            },
            EndpointSpec {
                path: "/system-info".to_string(),
                method: HttpMethod::Get,
                kind: EndpointKind::Protected,
                description: "Get system information (protected)".to_string(),
                permissions: BTreeSet::from(["read:system".to_string()]),
            },
            EndpointSpec {
                path: "/execute".to_string(),
                method: HttpMethod::Post,
                kind: EndpointKind::Protected,
                description: "Execute a simple command (protected)".to_string(),
                permissions: BTreeSet::from(["execute".to_string()]),
            },
        ]
    }
}

/// `GET /demo/ping`.
pub async fn ping() -> Json<Value> {
    Json(json!({ "pong": true, "timestamp": Utc::now().to_rfc3339() }))
}

/// `POST /demo/echo`.
pub async fn echo(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "echoed": body }))
}

/// `GET /demo/time`.
pub async fn time() -> Json<Value> {
    let now = Utc::now();
    Json(json!({
        "iso": now.to_rfc3339(),
        "unix": now.timestamp(),
        "formatted": now.format("%Y-%m-%d %H:%M:%S").to_string(),
    }))
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// `GET /demo/system-info`.
pub async fn system_info() -> Json<Value> {
    Json(json!({
        "platform": std::env::consts::OS,
        "architecture": std::env::consts::ARCH,
        "family": std::env::consts::FAMILY,
        "hostname": hostname(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default = "default_command")]
    pub command: String,
}

fn default_command() -> String {
    "echo hello".to_string()
}

#[derive(Debug, Serialize)]
struct ExecuteResponse {
    command: String,
    stdout: String,
    stderr: String,
    returncode: Option<i32>,
}

#[derive(Debug, Serialize)]
struct ExecuteDenied {
    error: String,
    status: &'static str,
}

/// `POST /demo/execute`.
///
/// Splits `command` into an argument vector with [`shell_words::split`] and
/// runs it through [`tokio::process::Command`] directly — never through a
/// shell — so only the allow-listed binary name is ever interpreted, with
/// every following argument passed verbatim.
pub async fn execute(Json(request): Json<ExecuteRequest>) -> axum::response::Response {
    let argv = match shell_words::split(&request.command) {
        Ok(argv) if !argv.is_empty() => argv,
        _ => {
            return Json(ExecuteDenied {
                error: format!("could not parse command {:?}", request.command),
                status: "denied",
            })
            .into_response();
        }
    };

    if !ALLOWED_COMMANDS.contains(&argv[0].as_str()) {
        return Json(ExecuteDenied {
            error: format!("command '{}' not allowed. Allowed: {ALLOWED_COMMANDS:?}", argv[0]),
            status: "denied",
        })
        .into_response();
    }

    let output = tokio::process::Command::new(&argv[0]).args(&argv[1..]).output().await;

    match output {
        Ok(output) => Json(ExecuteResponse {
            command: request.command,
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            returncode: output.status.code(),
        })
        .into_response(),
        Err(error) => {
            tracing::warn!(%error, command = %request.command, "demo execute failed to spawn");
            Json(ExecuteDenied { error: error.to_string(), status: "denied" }).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ping_reports_pong() {
        let Json(body) = ping().await;
        assert_eq!(body["pong"], true);
    }

    #[tokio::test]
    async fn echo_wraps_the_body_verbatim() {
        let Json(body) = echo(Json(json!({"a": 1}))).await;
        assert_eq!(body["echoed"]["a"], 1);
    }

    #[test]
    fn disallowed_command_name_is_rejected_before_spawning() {
        assert!(!ALLOWED_COMMANDS.contains(&"rm"));
    }
}
