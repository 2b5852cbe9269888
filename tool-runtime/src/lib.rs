//! Typed tool runtime.
//!
//! Tools are plain async functions over `#[derive(ToolRecord)]` input structs.
//! The runtime generates an input schema from the struct, binds and validates
//! untyped JSON payloads before any handler code runs, supervises execution
//! with a deadline and panic isolation, and renders every outcome as a
//! caller-safe [`ToolResponse`].
//!
//! ```ignore
//! use tool_runtime::{InvocationContext, ToolError, ToolRecord, ToolRegistry};
//!
//! #[derive(ToolRecord)]
//! struct EchoInput {
//!     #[tool("required,minLength=1,description=Message to echo")]
//!     message: String,
//! }
//!
//! let registry = ToolRegistry::new();
//! registry.register("echo", "Echo a message", |_ctx: InvocationContext, input: EchoInput| async move {
//!     Ok::<_, ToolError>(input.message)
//! })?;
//! ```

#![warn(missing_docs, clippy::pedantic)]

extern crate self as tool_runtime;

pub mod binder;
pub mod config;
pub mod constraints;
pub mod context;
pub mod error;
pub mod handler;
pub mod limits;
pub mod record;
pub mod registry;
pub mod response;
pub mod sanitize;
pub mod schema;
pub mod supervisor;
pub mod validate;

pub use binder::{BindError, BindErrorKind, Binary, bind, bind_record};
pub use config::{ConfigError, SupervisorConfig};
pub use constraints::Constraints;
pub use context::InvocationContext;
pub use error::{RegistryError, ToolError};
pub use handler::TypedHandler;
pub use limits::{ExecutionLimits, LimitViolation};
pub use record::{FieldDescriptor, FieldType, FieldValue, FieldView, RecordRef, RecordView, ToolRecord};
pub use registry::{RegistryResult, ToolDefinition, ToolMetadata, ToolRegistry};
pub use response::{
    Annotations, ContentItem, ResourceContents, ResponseBuilder, ToolResponse, compose_error,
    compose_output,
};
pub use sanitize::{GENERIC_ERROR_MESSAGE, sanitize};
pub use schema::{Schema, SchemaType, generate_schema};
pub use supervisor::Supervisor;
pub use tool_primitives::{RequestId, ToolName};
pub use tool_runtime_macros::ToolRecord;
pub use validate::validate;

#[doc(hidden)]
pub mod __private {
    pub use serde_json::{Map, Value};
    pub use std::sync::OnceLock;
}
