use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tool_runtime::{InvocationContext, SupervisorConfig, ToolError, ToolRecord, ToolRegistry};

#[derive(Debug, ToolRecord)]
struct EchoInput {
    #[tool("required,minLength=1,description=Message to echo")]
    message: String,
}

#[derive(Debug, Serialize)]
struct EchoOutput {
    message: String,
}

#[derive(Debug, ToolRecord)]
struct SleepInput {
    #[tool("minimum=0")]
    millis: u64,
}

async fn echo(_ctx: InvocationContext, input: EchoInput) -> Result<EchoOutput, ToolError> {
    Ok(EchoOutput {
        message: input.message,
    })
}

fn echo_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register("echo", "Echo a message", echo).unwrap();
    registry
}

#[tokio::test]
async fn echo_round_trip() {
    let registry = echo_registry();

    let response = registry.execute("echo", &json!({"message": "hi"})).await;
    assert!(!response.is_error());
    assert_eq!(response.structured_content(), Some(&json!({"message": "hi"})));

    let schema = serde_json::to_value(registry.lookup("echo").unwrap().input_schema()).unwrap();
    assert_eq!(schema["required"], json!(["message"]));
    assert_eq!(schema["properties"]["message"]["minLength"], 1);
}

#[tokio::test]
async fn missing_required_field_is_a_validation_error() {
    let registry = echo_registry();

    let response = registry.execute("echo", &json!({})).await;
    assert!(response.is_error());
    assert_eq!(
        response.first_text(),
        Some("Invalid input for field 'message': is required")
    );

    let response = registry.execute("echo", &json!({"message": ""})).await;
    assert!(response.is_error());
    assert_eq!(
        response.first_text(),
        Some("Invalid input for field 'message': must be at least 1 characters")
    );
}

#[tokio::test(start_paused = true)]
async fn slow_handlers_time_out_promptly() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);

    let registry = ToolRegistry::with_config(
        SupervisorConfig::default().with_timeout(Duration::from_millis(50)),
    );
    registry
        .register(
            "sleepy",
            "Sleeps for a while",
            move |_ctx: InvocationContext, input: SleepInput| {
                let flag = Arc::clone(&flag);
                async move {
                    tokio::time::sleep(Duration::from_millis(input.millis)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok::<_, ToolError>("done")
                }
            },
        )
        .unwrap();

    let started = Instant::now();
    let response = registry.execute("sleepy", &json!({"millis": 10_000})).await;

    assert!(response.is_error());
    assert_eq!(
        response.first_text(),
        Some("tool execution timed out after 50ms")
    );
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn fast_handlers_beat_the_deadline() {
    let registry = ToolRegistry::with_config(
        SupervisorConfig::default().with_timeout(Duration::from_secs(5)),
    );
    registry
        .register(
            "quick",
            "Returns immediately",
            |_ctx: InvocationContext, input: SleepInput| async move { Ok::<_, ToolError>(input.millis) },
        )
        .unwrap();

    let response = registry.execute("quick", &json!({"millis": 7})).await;
    assert!(!response.is_error());
    assert_eq!(response.first_text(), Some("7"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registration_and_lookup() {
    let registry = Arc::new(ToolRegistry::new());
    let mut tasks = JoinSet::new();

    for index in 0..100 {
        let registry = Arc::clone(&registry);
        tasks.spawn(async move {
            let name = format!("tool_{index}");
            registry
                .register(name.clone(), format!("Tool number {index}"), echo)
                .unwrap();
            assert!(registry.lookup(&name).is_some());
            let response = registry
                .execute(&name, &json!({"message": format!("from {index}")}))
                .await;
            assert!(!response.is_error());
        });
    }

    while let Some(joined) = tasks.join_next().await {
        joined.unwrap();
    }

    assert_eq!(registry.len(), 100);
    let names = registry.names();
    assert_eq!(names.first().map(String::as_str), Some("tool_0"));
    assert!((0..100).all(|index| registry.contains(&format!("tool_{index}"))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_registration_admits_one() {
    let registry = Arc::new(ToolRegistry::new());
    let mut tasks = JoinSet::new();

    for _ in 0..16 {
        let registry = Arc::clone(&registry);
        tasks.spawn(async move { registry.register("shared", "Contended", echo).is_ok() });
    }

    let mut admitted = 0;
    while let Some(joined) = tasks.join_next().await {
        if joined.unwrap() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 1);
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn unknown_tools_are_reported() {
    let registry = echo_registry();
    let response = registry.execute("missing", &json!({})).await;
    assert!(response.is_error());
    assert_eq!(response.first_text(), Some("Tool 'missing' not found"));
}

#[tokio::test]
async fn unbounded_timeout_does_not_fault_the_caller() {
    let registry = ToolRegistry::with_config(SupervisorConfig::default().with_timeout(Duration::MAX));
    registry.register("echo", "Echo a message", echo).unwrap();

    let response = registry.execute("echo", &json!({"message": "hi"})).await;
    assert!(!response.is_error());
    assert_eq!(response.structured_content(), Some(&json!({"message": "hi"})));
}
