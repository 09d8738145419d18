//! Orchestrates a single consent decision end to end.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;

use localghost_core::ClientIdentity;
use localghost_crypto::TokenManager;
use localghost_storage::{GrantKind, PermissionStore};

use crate::error::CoordinatorResult;
use crate::native::prompt_with_timeout;
use crate::prompt::{ConsentPrompt, ConsentPrompter, ConsentResult};

/// The outcome of [`ConsentCoordinator::coordinate`].
#[derive(Debug, Clone)]
pub struct Decision {
    /// Whether the user approved the request.
    pub approved: bool,
    /// The permissions granted, when approved.
    pub permissions: Vec<String>,
    /// The bearer token minted for the grant, when approved.
    pub token: Option<String>,
}

impl Decision {
    fn denied() -> Self {
        Self { approved: false, permissions: Vec::new(), token: None }
    }
}

fn grant_kind_for(result: ConsentResult) -> Option<GrantKind> {
    match result {
        ConsentResult::Denied => None,
        ConsentResult::AllowOnce => Some(GrantKind::Temporary),
        ConsentResult::AllowSession => Some(GrantKind::Session),
        ConsentResult::AllowTimed => Some(GrantKind::Timed),
        ConsentResult::AllowPermanent => Some(GrantKind::Permanent),
    }
}

/// Single entry point for turning a consent request into a durable grant.
///
/// Concurrent requests for the same `(client_id, endpoint)` must not
/// produce two dialogs: the coordinator keeps an in-memory map of
/// in-flight requests, and a second arrival for a pair already being
/// decided awaits the first's outcome instead of prompting again. This
/// closes a race the broker this was modeled on tolerates — two requests
/// arriving back to back could otherwise pop two dialogs for the same
/// grant.
pub struct ConsentCoordinator {
    prompter: Arc<dyn ConsentPrompter>,
    token_manager: Arc<TokenManager>,
    store: Arc<PermissionStore>,
    token_expiry_hours: f64,
    default_grant_duration_hours: f64,
    pending: parking_lot::Mutex<HashMap<(ClientIdentity, String), broadcast::Sender<Decision>>>,
}

impl ConsentCoordinator {
    /// Build a coordinator over the given prompter backend, token manager,
    /// and store.
    #[must_use]
    pub fn new(
        prompter: Arc<dyn ConsentPrompter>,
        token_manager: Arc<TokenManager>,
        store: Arc<PermissionStore>,
        token_expiry_hours: f64,
        default_grant_duration_hours: f64,
    ) -> Self {
        Self {
            prompter,
            token_manager,
            store,
            token_expiry_hours,
            default_grant_duration_hours,
            pending: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a consent request for `client_id` against `endpoint`,
    /// prompting the user if no decision for this pair is already in
    /// flight.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::ConsentError`] if minting the token or
    /// persisting the resulting grant fails. A denial never produces an
    /// error — it is a successful [`Decision`] with `approved: false`.
    pub async fn coordinate(
        &self,
        client_id: &ClientIdentity,
        client_name: &str,
        endpoint: &str,
        requested_permissions: Vec<String>,
        timeout_seconds: u64,
    ) -> CoordinatorResult<Decision> {
        let key = (client_id.clone(), endpoint.to_string());

        // Join an in-flight decision for this pair rather than prompting
        // again.
        let mut receiver = {
            let mut pending = self.pending.lock();
            if let Some(sender) = pending.get(&key) {
                Some(sender.subscribe())
            } else {
                let (sender, _) = broadcast::channel(1);
                pending.insert(key.clone(), sender);
                None
            }
        };

        if let Some(receiver) = receiver.as_mut() {
            return Ok(receiver.recv().await.unwrap_or_else(|_| Decision::denied()));
        }

        let decision = self
            .run_flow(client_id, client_name, endpoint, requested_permissions, timeout_seconds)
            .await;

        let sender = {
            let mut pending = self.pending.lock();
            pending.remove(&key)
        };
        if let Some(sender) = sender {
            if let Ok(ref decision) = decision {
                let _ = sender.send(decision.clone());
            }
        }

        decision
    }

    async fn run_flow(
        &self,
        client_id: &ClientIdentity,
        client_name: &str,
        endpoint: &str,
        requested_permissions: Vec<String>,
        timeout_seconds: u64,
    ) -> CoordinatorResult<Decision> {
        let prompt = ConsentPrompt {
            client_id: client_id.clone(),
            client_name: client_name.to_string(),
            endpoint: endpoint.to_string(),
            permissions: requested_permissions.clone(),
            timeout_seconds,
        };

        tracing::info!(client_id = %client_id, %endpoint, "requesting consent");
        let result = prompt_with_timeout(self.prompter.as_ref(), &prompt).await;
        tracing::info!(client_id = %client_id, %endpoint, ?result, "consent decided");

        let Some(kind) = grant_kind_for(result) else {
            return Ok(Decision::denied());
        };

        // SESSION grants carry no expiry of their own: the token is bound
        // to this process's boot epoch instead (see `TokenManager::mint_session`),
        // so the stored grant records no `expires_at` either.
        let (token, duration_hours) = match kind {
            GrantKind::Timed => {
                let hours = self.default_grant_duration_hours;
                (self.token_manager.mint(client_id, endpoint, requested_permissions.clone(), Some(hours))?, Some(hours))
            }
            GrantKind::Permanent => {
                (self.token_manager.mint(client_id, endpoint, requested_permissions.clone(), None)?, None)
            }
            GrantKind::Temporary => {
                let hours = self.token_expiry_hours;
                (self.token_manager.mint(client_id, endpoint, requested_permissions.clone(), Some(hours))?, Some(hours))
            }
            GrantKind::Session => {
                (self.token_manager.mint_session(client_id, endpoint, requested_permissions.clone())?, None)
            }
        };

        self.store.grant(
            client_id,
            Some(client_name),
            endpoint,
            &requested_permissions,
            kind,
            &token,
            duration_hours,
        )?;

        Ok(Decision { approved: true, permissions: requested_permissions, token: Some(token) })
    }
}

impl std::fmt::Debug for ConsentCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsentCoordinator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ConsentPrompter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedPrompter {
        result: ConsentResult,
        calls: AtomicUsize,
        delay: Option<std::time::Duration>,
    }

    impl ScriptedPrompter {
        fn new(result: ConsentResult) -> Self {
            Self { result, calls: AtomicUsize::new(0), delay: None }
        }

        fn with_delay(result: ConsentResult, delay: std::time::Duration) -> Self {
            Self { result, calls: AtomicUsize::new(0), delay: Some(delay) }
        }
    }

    #[async_trait::async_trait]
    impl ConsentPrompter for ScriptedPrompter {
        async fn prompt(&self, _prompt: &ConsentPrompt) -> Option<ConsentResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Some(self.result)
        }
    }

    fn coordinator(prompter: Arc<dyn ConsentPrompter>) -> ConsentCoordinator {
        ConsentCoordinator::new(
            prompter,
            Arc::new(TokenManager::new(TokenManager::generate_secret())),
            Arc::new(PermissionStore::in_memory().unwrap()),
            24.0,
            8.0,
        )
    }

    #[tokio::test]
    async fn denied_produces_no_grant_and_no_token() {
        let coordinator = coordinator(Arc::new(ScriptedPrompter::new(ConsentResult::Denied)));
        let client_id = ClientIdentity::derive("app", Some(1));

        let decision = coordinator
            .coordinate(&client_id, "app", "/e", vec!["access".into()], 5)
            .await
            .unwrap();

        assert!(!decision.approved);
        assert!(decision.token.is_none());
        assert!(coordinator.store.list_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn allow_once_grants_a_temporary_token() {
        let coordinator = coordinator(Arc::new(ScriptedPrompter::new(ConsentResult::AllowOnce)));
        let client_id = ClientIdentity::derive("app", Some(1));

        let decision = coordinator
            .coordinate(&client_id, "app", "/e", vec!["access".into()], 5)
            .await
            .unwrap();

        assert!(decision.approved);
        assert!(decision.token.is_some());
        let grant = coordinator.store.check(&client_id, "/e").unwrap().unwrap();
        assert_eq!(grant.kind, GrantKind::Temporary);
    }

    #[tokio::test]
    async fn allow_permanent_grants_no_expiry() {
        let coordinator = coordinator(Arc::new(ScriptedPrompter::new(ConsentResult::AllowPermanent)));
        let client_id = ClientIdentity::derive("app", Some(1));

        coordinator.coordinate(&client_id, "app", "/e", vec!["access".into()], 5).await.unwrap();

        let grant = coordinator.store.check(&client_id, "/e").unwrap().unwrap();
        assert_eq!(grant.kind, GrantKind::Permanent);
        assert!(grant.expires_at.is_none());
    }

    #[tokio::test]
    async fn allow_session_grants_no_expiry_and_an_epoch_bound_token() {
        let secret = TokenManager::generate_secret();
        let token_manager = Arc::new(TokenManager::new(secret));
        let coordinator = ConsentCoordinator::new(
            Arc::new(ScriptedPrompter::new(ConsentResult::AllowSession)),
            token_manager.clone(),
            Arc::new(PermissionStore::in_memory().unwrap()),
            24.0,
            8.0,
        );
        let client_id = ClientIdentity::derive("app", Some(1));

        let decision = coordinator
            .coordinate(&client_id, "app", "/e", vec!["access".into()], 5)
            .await
            .unwrap();

        assert!(decision.approved);
        let token = decision.token.unwrap();
        assert!(token_manager.validate(&token).is_some());

        let grant = coordinator.store.check(&client_id, "/e").unwrap().unwrap();
        assert_eq!(grant.kind, GrantKind::Session);
        assert!(grant.expires_at.is_none());

        // A fresh manager over the same secret simulates a process restart:
        // the epoch no longer matches, so the session token is refused even
        // though the stored grant itself carries no expiry.
        let restarted = TokenManager::new(secret);
        assert!(restarted.validate(&token).is_none());
    }

    #[tokio::test]
    async fn concurrent_requests_for_the_same_pair_prompt_only_once() {
        let prompter = Arc::new(ScriptedPrompter::with_delay(
            ConsentResult::AllowOnce,
            std::time::Duration::from_millis(50),
        ));
        let coordinator = Arc::new(coordinator(prompter.clone()));
        let client_id = ClientIdentity::derive("app", Some(1));

        let c1 = coordinator.clone();
        let id1 = client_id.clone();
        let first = tokio::spawn(async move {
            c1.coordinate(&id1, "app", "/e", vec!["access".into()], 5).await.unwrap()
        });

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let c2 = coordinator.clone();
        let id2 = client_id.clone();
        let second = tokio::spawn(async move {
            c2.coordinate(&id2, "app", "/e", vec!["access".into()], 5).await.unwrap()
        });

        let (d1, d2) = tokio::join!(first, second);
        let d1 = d1.unwrap();
        let d2 = d2.unwrap();

        assert!(d1.approved && d2.approved);
        assert_eq!(prompter.calls.load(Ordering::SeqCst), 1);
    }
}
