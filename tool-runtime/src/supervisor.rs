//! Guarded execution of typed handlers.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{Instrument, Span, debug, error, warn};

use crate::binder::bind;
use crate::config::SupervisorConfig;
use crate::context::InvocationContext;
use crate::error::ToolError;
use crate::handler::TypedHandler;
use crate::record::ToolRecord;
use crate::response::{ToolResponse, compose_error, compose_output};
use crate::validate::validate;

/// Field named in errors about the payload as a whole.
const INPUT_FIELD: &str = "input";

/// Runs handlers behind pre-flight checks, a deadline and panic isolation.
#[derive(Debug, Clone, Default)]
pub struct Supervisor {
    config: SupervisorConfig,
}

impl Supervisor {
    /// Creates a supervisor with the given configuration.
    #[must_use]
    pub const fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Creates a fresh invocation context bounded by the configured timeout.
    #[must_use]
    pub fn context(&self, tool_name: tool_primitives::ToolName) -> InvocationContext {
        InvocationContext::new(tool_name, self.config.timeout())
    }

    /// Executes `handler` against an untyped payload.
    ///
    /// Never fails: every outcome, including limit violations, bind failures,
    /// panics and timeouts, is rendered as a [`ToolResponse`].
    pub async fn execute<In, Out, H>(
        &self,
        ctx: InvocationContext,
        handler: &Arc<H>,
        payload: &Value,
    ) -> ToolResponse
    where
        In: ToolRecord,
        Out: Serialize + Send + 'static,
        H: TypedHandler<In, Out>,
    {
        let span = ctx.span();
        match self.run(ctx, handler, payload).instrument(span).await {
            Ok(output) => compose_output(&output),
            Err(err) => compose_error(&err),
        }
    }

    async fn run<In, Out, H>(
        &self,
        ctx: InvocationContext,
        handler: &Arc<H>,
        payload: &Value,
    ) -> Result<Out, ToolError>
    where
        In: ToolRecord,
        Out: Serialize + Send + 'static,
        H: TypedHandler<In, Out>,
    {
        let object = match payload {
            Value::Object(object) => object,
            Value::Null => {
                warn!("rejected call without input");
                return Err(ToolError::invalid_input(INPUT_FIELD, "input is required"));
            }
            _ => {
                warn!("rejected non-object input");
                return Err(ToolError::invalid_input(
                    INPUT_FIELD,
                    "input must be a JSON object",
                ));
            }
        };

        if let Err(violation) = self.config.limits().check(object) {
            warn!(%violation, "input rejected by execution limits");
            return Err(ToolError::invalid_input(INPUT_FIELD, violation.to_string()));
        }

        let input: In = bind(payload).map_err(|err| {
            debug!(path = %err.path(), error = %err, "failed to bind input");
            ToolError::invalid_input(INPUT_FIELD, "failed to parse input")
        })?;

        if let Err(err) = validate(&input) {
            debug!(error = %err, "input failed validation");
            return Err(err);
        }

        let task = {
            let handler = Arc::clone(handler);
            let ctx = ctx.clone();
            tokio::spawn(async move { handler.call(ctx, input).await }.instrument(Span::current()))
        };

        match tokio::time::timeout_at(ctx.deadline(), task).await {
            Ok(Ok(result)) => {
                if let Err(err) = &result {
                    debug!(error = %err, "tool handler returned an error");
                }
                result
            }
            Ok(Err(join_error)) if join_error.is_panic() => {
                error!("tool handler panicked");
                Err(ToolError::internal("tool handler failed unexpectedly"))
            }
            Ok(Err(join_error)) => {
                error!(error = %join_error, "tool handler task was cancelled");
                Err(ToolError::internal("tool handler failed unexpectedly"))
            }
            Err(_) => {
                ctx.cancel();
                let timeout = ctx.timeout();
                warn!(
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "tool handler timed out"
                );
                Err(ToolError::timeout(timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;

    use crate::ToolRecord;

    #[derive(Debug, ToolRecord)]
    struct Greeting {
        #[tool("required,minLength=1")]
        name: String,
        times: Option<u8>,
    }

    fn supervisor(timeout: Duration) -> Supervisor {
        Supervisor::new(SupervisorConfig::default().with_timeout(timeout))
    }

    async fn greet(ctx: InvocationContext, input: Greeting) -> Result<String, ToolError> {
        let times = usize::from(input.times.unwrap_or(1));
        assert_eq!(ctx.tool_name().as_str(), "greet");
        Ok(format!("hello {}", input.name).repeat(times))
    }

    async fn run(supervisor: &Supervisor, handler: impl TypedHandler<Greeting, String>, payload: Value) -> ToolResponse {
        let ctx = supervisor.context("greet".parse().unwrap());
        supervisor.execute(ctx, &Arc::new(handler), &payload).await
    }

    #[tokio::test]
    async fn successful_call_renders_output() {
        let response = run(&Supervisor::default(), greet, json!({"name": "ada"})).await;
        assert!(!response.is_error());
        assert_eq!(response.first_text(), Some("hello ada"));
    }

    #[tokio::test]
    async fn maximal_timeout_still_runs_the_handler() {
        let response = run(&supervisor(Duration::MAX), greet, json!({"name": "ada"})).await;
        assert!(!response.is_error());
        assert_eq!(response.first_text(), Some("hello ada"));
    }

    #[tokio::test]
    async fn rejects_missing_and_non_object_input() {
        let response = run(&Supervisor::default(), greet, Value::Null).await;
        assert_eq!(
            response.first_text(),
            Some("Invalid input for field 'input': input is required")
        );
        let response = run(&Supervisor::default(), greet, json!([1])).await;
        assert_eq!(
            response.first_text(),
            Some("Invalid input for field 'input': input must be a JSON object")
        );
    }

    #[tokio::test]
    async fn bind_failures_are_generic() {
        let response = run(&Supervisor::default(), greet, json!({"name": "a", "times": 300})).await;
        assert!(response.is_error());
        assert_eq!(
            response.first_text(),
            Some("Invalid input for field 'input': failed to parse input")
        );
    }

    #[tokio::test]
    async fn validation_runs_before_handler() {
        let handler = |_ctx: InvocationContext, _input: Greeting| async move {
            Err::<String, _>(ToolError::failed("handler ran"))
        };
        let response = run(&Supervisor::default(), handler, json!({"name": ""})).await;
        assert_eq!(
            response.first_text(),
            Some("Invalid input for field 'name': is required")
        );
    }

    #[tokio::test]
    async fn limits_are_checked_first() {
        let config = SupervisorConfig::default().with_limits(crate::ExecutionLimits {
            max_string_len: 3,
            ..crate::ExecutionLimits::default()
        });
        let response = run(&Supervisor::new(config), greet, json!({"name": "abcdef"})).await;
        assert!(response.is_error());
        assert!(response.first_text().unwrap().starts_with("Invalid input for field 'input':"));
    }

    #[tokio::test]
    async fn panics_become_internal_errors() {
        let handler = |_ctx: InvocationContext, input: Greeting| async move {
            if input.name == "boom" {
                panic!("secret at /home/user/app.rs:12");
            }
            Ok::<String, ToolError>(input.name)
        };
        let response = run(&Supervisor::default(), handler, json!({"name": "boom"})).await;
        assert!(response.is_error());
        assert_eq!(response.first_text(), Some("tool handler failed unexpectedly"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handlers_time_out_and_are_cancelled() {
        let (observed_tx, observed_rx) = tokio::sync::oneshot::channel();
        let observed_tx = std::sync::Mutex::new(Some(observed_tx));
        let handler = move |ctx: InvocationContext, _input: Greeting| {
            let sender = observed_tx.lock().unwrap().take();
            async move {
                ctx.cancelled().await;
                if let Some(sender) = sender {
                    let _ = sender.send(());
                }
                Ok::<String, ToolError>(String::new())
            }
        };

        let response = run(&supervisor(Duration::from_millis(50)), handler, json!({"name": "x"})).await;
        assert!(response.is_error());
        assert_eq!(response.first_text(), Some("tool execution timed out after 50ms"));
        observed_rx.await.unwrap();
    }

    #[tokio::test]
    async fn handler_errors_are_sanitized() {
        let handler = |_ctx: InvocationContext, _input: Greeting| async move {
            Err::<String, _>(ToolError::failed("upstream refused").with_cause("dial 10.0.0.1"))
        };
        let response = run(&Supervisor::default(), handler, json!({"name": "x"})).await;
        assert_eq!(
            response.first_text(),
            Some("upstream refused: internal error occurred")
        );
    }
}
