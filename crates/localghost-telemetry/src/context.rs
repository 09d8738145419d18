//! Request-scoped tracing context.

use tracing::Span;
use uuid::Uuid;

/// A correlation context attached to one inbound request as it passes
/// through the kernel.
///
/// Every admission decision, consent prompt, and store operation logged
/// for a single request shares the same `request_id`, making it possible
/// to follow one client's round trip through `tracing`'s structured
/// output even when many requests are in flight concurrently.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    component: String,
    operation: Option<String>,
    client_id: Option<String>,
}

impl RequestContext {
    /// Start a context for `component` (e.g. `"middleware"`,
    /// `"consent_coordinator"`).
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            component: component.into(),
            operation: None,
            client_id: None,
        }
    }

    /// Attach the operation name within the component (e.g. `"check"`,
    /// `"coordinate"`).
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Attach the derived client identity, once known.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// The correlation ID for this request.
    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// A `tracing` span carrying this context's fields, ready to be
    /// entered around the work it describes.
    #[must_use]
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "request",
            request_id = %self.request_id,
            component = %self.component,
            operation = self.operation.as_deref().unwrap_or(""),
            client_id = self.client_id.as_deref().unwrap_or(""),
        )
    }

    /// Enter this context's span for the remainder of the current scope.
    #[must_use]
    pub fn enter(&self) -> RequestGuard {
        RequestGuard { _entered: self.span().entered() }
    }
}

/// RAII guard keeping a [`RequestContext`]'s span entered.
pub struct RequestGuard {
    _entered: tracing::span::EnteredSpan,
}
