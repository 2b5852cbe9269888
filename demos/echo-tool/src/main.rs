//! Line-oriented demo server for the typed tool runtime.
//!
//! Reads one JSON call per line from stdin, `{"tool": "echo", "arguments": {...}}`,
//! and writes one JSON response per line to stdout.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tool_runtime::{InvocationContext, SupervisorConfig, ToolError, ToolRecord, ToolRegistry};
use tracing::info;

#[derive(Debug, Parser)]
#[command(about = "Serve demo tools over stdin/stdout")]
struct Args {
    /// Print the tool catalog as JSON and exit.
    #[arg(long)]
    list: bool,

    /// Override the per-call timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Debug, ToolRecord)]
struct EchoInput {
    #[tool("required,minLength=1,description=Message to echo back")]
    message: String,
    #[tool("description=Return the message in upper case")]
    uppercase: Option<bool>,
}

#[derive(Debug, Serialize)]
struct EchoOutput {
    message: String,
    length: usize,
}

#[derive(Debug, ToolRecord)]
struct AddInput {
    #[tool("description=First addend")]
    a: f64,
    #[tool("description=Second addend")]
    b: f64,
}

#[derive(Debug, ToolRecord)]
struct SlowInput {
    #[tool("required,minimum=1,maximum=60000,description=How long to wait in milliseconds")]
    millis: u64,
}

#[derive(Debug, Deserialize)]
struct Call {
    tool: String,
    #[serde(default)]
    arguments: Value,
}

async fn echo(_ctx: InvocationContext, input: EchoInput) -> Result<EchoOutput, ToolError> {
    let message = if input.uppercase.unwrap_or(false) {
        input.message.to_uppercase()
    } else {
        input.message
    };
    Ok(EchoOutput {
        length: message.chars().count(),
        message,
    })
}

async fn add(_ctx: InvocationContext, input: AddInput) -> Result<f64, ToolError> {
    let sum = input.a + input.b;
    if sum.is_finite() {
        Ok(sum)
    } else {
        Err(ToolError::failed("sum is not a finite number"))
    }
}

async fn slow(ctx: InvocationContext, input: SlowInput) -> Result<String, ToolError> {
    tokio::select! {
        () = tokio::time::sleep(Duration::from_millis(input.millis)) => {
            Ok(format!("waited {}ms", input.millis))
        }
        () = ctx.cancelled() => Err(ToolError::failed("cancelled")),
    }
}

fn build_registry(config: SupervisorConfig) -> Result<ToolRegistry> {
    let registry = ToolRegistry::with_config(config);
    registry.register("echo", "Echo a message", echo)?;
    registry.register("add", "Add two numbers", add)?;
    registry.register("slow", "Wait for a while, honouring cancellation", slow)?;
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<()> {
    tool_telemetry::init_tracing();
    let args = Args::parse();

    let mut config = SupervisorConfig::from_env().context("reading supervisor configuration")?;
    if let Some(millis) = args.timeout_ms {
        config = config.with_timeout(Duration::from_millis(millis));
    }
    let registry = build_registry(config)?;

    let mut stdout = tokio::io::stdout();

    if args.list {
        let catalog = serde_json::to_string_pretty(&registry.list())?;
        stdout.write_all(catalog.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        return Ok(());
    }

    info!(tools = ?registry.names(), "serving tools on stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Call>(&line) {
            Ok(call) => registry.execute(&call.tool, &call.arguments).await,
            Err(err) => {
                tracing::warn!(error = %err, "malformed call");
                tool_runtime::ToolResponse::error("Malformed call: expected {\"tool\", \"arguments\"}")
            }
        };
        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        build_registry(SupervisorConfig::default().with_timeout(Duration::from_millis(100))).unwrap()
    }

    #[tokio::test]
    async fn echo_returns_structured_output() {
        let response = registry()
            .execute("echo", &json!({"message": "hi", "uppercase": true}))
            .await;
        assert_eq!(
            response.structured_content(),
            Some(&json!({"message": "HI", "length": 2}))
        );
    }

    #[tokio::test]
    async fn add_returns_text() {
        let response = registry().execute("add", &json!({"a": 1.5, "b": 2})).await;
        assert_eq!(response.first_text(), Some("3.5"));
    }

    #[tokio::test]
    async fn slow_times_out() {
        let response = registry().execute("slow", &json!({"millis": 5000})).await;
        assert!(response.is_error());
        assert_eq!(response.first_text(), Some("tool execution timed out after 100ms"));
    }

    #[test]
    fn catalog_lists_every_tool() {
        let names: Vec<_> = registry().list().iter().map(|t| t.name().to_owned()).collect();
        assert_eq!(names, ["add", "echo", "slow"]);
    }
}
