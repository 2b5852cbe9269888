//! Core shared types for the typed tool runtime.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;
mod name;

/// Error type and result alias shared across the runtime.
pub use error::{Error, Result};
/// Unique identifier attached to every tool invocation.
pub use ids::RequestId;
/// Validated tool name used as the registry key.
pub use name::{MAX_TOOL_NAME_LEN, ToolName};
