//! Per-invocation execution context.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tool_primitives::{RequestId, ToolName};
use tracing::{Span, info_span};

/// Deadline offset used when the configured timeout overflows the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Per-invocation context handed to a handler.
///
/// Cloning is cheap; clones share the cancellation token.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    tool_name: ToolName,
    request_id: RequestId,
    started_at: DateTime<Utc>,
    start: Instant,
    deadline: Instant,
    cancellation: CancellationToken,
}

impl InvocationContext {
    /// Creates a context for `tool_name` that expires after `timeout`.
    #[must_use]
    pub fn new(tool_name: ToolName, timeout: Duration) -> Self {
        Self::with_request_id(tool_name, RequestId::random(), timeout)
    }

    /// Creates a context with a caller-supplied request identifier.
    ///
    /// A timeout too large to add to the current instant, such as
    /// [`Duration::MAX`], is treated as roughly thirty years.
    #[must_use]
    pub fn with_request_id(tool_name: ToolName, request_id: RequestId, timeout: Duration) -> Self {
        let start = Instant::now();
        Self {
            tool_name,
            request_id,
            started_at: Utc::now(),
            start,
            deadline: start
                .checked_add(timeout)
                .unwrap_or_else(|| start + FAR_FUTURE),
            cancellation: CancellationToken::new(),
        }
    }

    /// Name of the tool being invoked.
    #[must_use]
    pub const fn tool_name(&self) -> &ToolName {
        &self.tool_name
    }

    /// Identifier of this invocation.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Wall-clock start time.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time since the invocation started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Instant at which the invocation times out.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Total time budget granted to the invocation.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.deadline.duration_since(self.start)
    }

    /// Time left before the deadline, zero once it has passed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether the invocation has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once the invocation is cancelled.
    ///
    /// Long-running handlers should `select!` on this to stop early after a
    /// timeout.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    /// Token shared by every clone of this context.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub(crate) fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Span carrying the tool name and request identifier.
    #[must_use]
    pub fn span(&self) -> Span {
        info_span!("tool_call", tool = %self.tool_name, request_id = %self.request_id)
    }
}
