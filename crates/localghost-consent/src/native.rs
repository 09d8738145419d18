//! Native, OS-specific consent dialog backends.
//!
//! Mirrors the broker's original platform dispatch: a per-OS dialog tool is
//! tried first, and anything that can't run it (missing binary, subprocess
//! failure) falls through to the next candidate. The final fallback is a
//! [`HeadlessPrompter`] that always denies — there is no portable GUI
//! toolkit in this dependency tree, so an environment with none of
//! `osascript`/`powershell`/`zenity`/`kdialog` on `PATH` degrades to
//! deny-by-default rather than ever guessing `ALLOW_PERMANENT` for the
//! user.
//!
//! **Binary-choice fallback mapping.** `zenity --question` and
//! `kdialog --yesno` only have two buttons: a "yes" maps to
//! [`ConsentResult::AllowPermanent`] and a "no" (or any failure) maps to
//! [`ConsentResult::Denied`]. The macOS dialog has three buttons and maps
//! its richer choice directly; Windows gets a Yes/No/Cancel box with the
//! same two-button convention (Yes → permanent, anything else → denied).

use std::time::Duration;

use tokio::process::Command;

use crate::prompt::{ConsentPrompt, ConsentPrompter, ConsentResult};

fn message(prompt: &ConsentPrompt) -> String {
    format!(
        "The application '{}' wants to access:\n\n{}\n\nPermissions: {}",
        prompt.client_name,
        prompt.endpoint,
        prompt.permissions.join(", "),
    )
}

/// Dispatches to the platform-appropriate native dialog tool, falling back
/// to [`HeadlessPrompter`] if nothing usable is found.
#[derive(Debug, Default)]
pub struct NativePrompter;

#[async_trait::async_trait]
impl ConsentPrompter for NativePrompter {
    async fn prompt(&self, prompt: &ConsentPrompt) -> Option<ConsentResult> {
        let result = if cfg!(target_os = "macos") {
            macos_dialog(prompt).await
        } else if cfg!(target_os = "windows") {
            windows_dialog(prompt).await
        } else {
            linux_dialog(prompt).await
        };

        match result {
            Some(result) => Some(result),
            None => {
                tracing::warn!("no native dialog backend available, denying by default");
                HeadlessPrompter.prompt(prompt).await
            }
        }
    }
}

async fn macos_dialog(prompt: &ConsentPrompt) -> Option<ConsentResult> {
    let script = format!(
        r#"display dialog "{}" buttons {{"Deny", "Allow Once", "Allow Always"}} default button "Deny" with title "LocalGhost Authorization" giving up after {}
        set theButton to button returned of result
        return theButton"#,
        message(prompt).replace('"', "'"),
        prompt.timeout_seconds,
    );

    let output = Command::new("osascript").arg("-e").arg(script).output().await.ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Some(match stdout.trim() {
        "Allow Always" => ConsentResult::AllowPermanent,
        "Allow Once" => ConsentResult::AllowOnce,
        _ => ConsentResult::Denied,
    })
}

async fn windows_dialog(prompt: &ConsentPrompt) -> Option<ConsentResult> {
    let script = format!(
        r#"Add-Type -AssemblyName System.Windows.Forms
        $result = [System.Windows.Forms.MessageBox]::Show("{}", "LocalGhost Authorization", [System.Windows.Forms.MessageBoxButtons]::YesNoCancel, [System.Windows.Forms.MessageBoxIcon]::Question)
        Write-Output $result"#,
        message(prompt).replace('"', "'"),
    );

    let output = Command::new("powershell")
        .arg("-Command")
        .arg(script)
        .output()
        .await
        .ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Some(match stdout.trim() {
        "Yes" => ConsentResult::AllowPermanent,
        "No" => ConsentResult::AllowOnce,
        _ => ConsentResult::Denied,
    })
}

async fn linux_dialog(prompt: &ConsentPrompt) -> Option<ConsentResult> {
    let text = message(prompt);

    if let Ok(status) = Command::new("zenity")
        .arg("--question")
        .arg("--title=LocalGhost Authorization")
        .arg(format!("--text={text}"))
        .arg("--ok-label=Allow")
        .arg("--cancel-label=Deny")
        .arg(format!("--timeout={}", prompt.timeout_seconds))
        .status()
        .await
    {
        return Some(if status.success() { ConsentResult::AllowPermanent } else { ConsentResult::Denied });
    }

    if let Ok(status) = Command::new("kdialog")
        .arg("--yesno")
        .arg(&text)
        .arg("--title=LocalGhost Authorization")
        .status()
        .await
    {
        return Some(if status.success() { ConsentResult::AllowPermanent } else { ConsentResult::Denied });
    }

    None
}

/// Denies every prompt without presenting anything.
///
/// The terminal fallback when no native dialog tool is reachable, and a
/// convenient backend for headless/CI environments that should never
/// block on interactive input.
#[derive(Debug, Default)]
pub struct HeadlessPrompter;

#[async_trait::async_trait]
impl ConsentPrompter for HeadlessPrompter {
    async fn prompt(&self, _prompt: &ConsentPrompt) -> Option<ConsentResult> {
        Some(ConsentResult::Denied)
    }
}

/// Enforces [`ConsentPrompt::timeout_seconds`] around any backend,
/// independent of whether that backend can reliably enforce its own
/// timeout (`kdialog` notably cannot).
pub async fn prompt_with_timeout(
    backend: &dyn ConsentPrompter,
    prompt: &ConsentPrompt,
) -> ConsentResult {
    let timeout = Duration::from_secs(prompt.timeout_seconds);
    match tokio::time::timeout(timeout, backend.prompt(prompt)).await {
        Ok(Some(result)) => result,
        Ok(None) | Err(_) => ConsentResult::Denied,
    }
}
