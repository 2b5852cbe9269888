//! Runtime registry for typed tools.

use std::any::type_name;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tool_primitives::ToolName;
use tracing::{debug, info, warn};

use crate::config::SupervisorConfig;
use crate::error::{RegistryError, ToolError};
use crate::handler::{ErasedTool, TypedHandler, TypedTool};
use crate::record::ToolRecord;
use crate::response::{ToolResponse, compose_error};
use crate::schema::{Schema, generate_schema};
use crate::supervisor::Supervisor;

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Discovery metadata describing a registered tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolMetadata {
    name: ToolName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    input_schema: Schema,
    #[serde(rename = "_meta", default, skip_serializing_if = "Map::is_empty")]
    meta: Map<String, Value>,
}

impl ToolMetadata {
    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the generated input schema.
    #[must_use]
    pub const fn input_schema(&self) -> &Schema {
        &self.input_schema
    }

    /// Returns the free-form metadata map.
    #[must_use]
    pub const fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }
}

/// A typed tool ready to be registered or executed.
///
/// Cloning shares the handler; metadata is copied.
#[derive(Clone)]
pub struct ToolDefinition {
    metadata: ToolMetadata,
    tool: Arc<dyn ErasedTool>,
    supervisor: Arc<Supervisor>,
}

impl ToolDefinition {
    /// Builds a definition for `handler`, generating its input schema from `In`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidName`] if `name` is not a valid tool
    /// name.
    pub fn new<In, Out, H>(name: impl Into<String>, handler: H) -> RegistryResult<Self>
    where
        In: ToolRecord,
        Out: Serialize + Send + 'static,
        H: TypedHandler<In, Out>,
    {
        let name = ToolName::new(name)?;

        let mut meta = Map::new();
        meta.insert("type_safe".into(), Value::Bool(true));
        meta.insert("input_type".into(), Value::String(type_name::<In>().into()));
        meta.insert("output_type".into(), Value::String(type_name::<Out>().into()));

        Ok(Self {
            metadata: ToolMetadata {
                name,
                description: None,
                input_schema: generate_schema::<In>(),
                meta,
            },
            tool: Arc::new(TypedTool::<In, Out, H>::new(handler)),
            supervisor: Arc::new(Supervisor::default()),
        })
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = Some(description.into());
        self
    }

    /// Adds a metadata entry, replacing any existing value for `key`.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.meta.insert(key.into(), value.into());
        self
    }

    /// Runs this definition under the given supervisor.
    #[must_use]
    pub fn with_supervisor(mut self, supervisor: Arc<Supervisor>) -> Self {
        self.supervisor = supervisor;
        self
    }

    /// Returns the discovery metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    /// Returns the generated input schema.
    #[must_use]
    pub const fn input_schema(&self) -> &Schema {
        &self.metadata.input_schema
    }

    /// Executes the tool with an untyped payload.
    pub async fn execute(&self, payload: &Value) -> ToolResponse {
        let ctx = self.supervisor.context(self.metadata.name.clone());
        self.tool.run(&self.supervisor, ctx, payload).await
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Registry that stores typed tools keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<HashMap<ToolName, ToolDefinition>>,
    supervisor: Arc<Supervisor>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("registered", &self.names())
            .finish_non_exhaustive()
    }
}

impl ToolRegistry {
    /// Creates an empty registry with default supervision.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry whose tools run under `config`.
    #[must_use]
    pub fn with_config(config: SupervisorConfig) -> Self {
        Self {
            inner: RwLock::default(),
            supervisor: Arc::new(Supervisor::new(config)),
        }
    }

    /// Registers a typed handler.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidName`] for a malformed name and
    /// [`RegistryError::DuplicateTool`] if the name is already present.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn register<In, Out, H>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: H,
    ) -> RegistryResult<()>
    where
        In: ToolRecord,
        Out: Serialize + Send + 'static,
        H: TypedHandler<In, Out>,
    {
        let definition = ToolDefinition::new(name, handler)?.with_description(description);
        self.register_definition(definition)
    }

    /// Installs a prebuilt definition, binding it to this registry's
    /// supervisor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateTool`] if the name is already present.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn register_definition(&self, definition: ToolDefinition) -> RegistryResult<()> {
        let definition = definition.with_supervisor(Arc::clone(&self.supervisor));
        let name = definition.metadata.name.clone();

        let mut inner = self.inner.write().expect("tool registry poisoned");
        if inner.contains_key(&name) {
            warn!(tool = %name, "duplicate tool registration rejected");
            return Err(RegistryError::DuplicateTool { name: name.into() });
        }

        debug!(
            tool = %name,
            properties = definition.metadata.input_schema.properties().map_or(0, BTreeMap::len),
            "generated input schema"
        );
        info!(tool = %name, "registered tool");
        inner.insert(name, definition);
        Ok(())
    }

    /// Returns the definition registered under `name`.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ToolDefinition> {
        let inner = self.inner.read().expect("tool registry poisoned");
        inner.get(name).cloned()
    }

    /// Looks up and executes a tool.
    ///
    /// Unknown or malformed names produce an error response rather than an
    /// `Err`.
    pub async fn execute(&self, name: &str, payload: &Value) -> ToolResponse {
        if let Err(err) = ToolName::new(name) {
            warn!(error = %err, "rejected call with invalid tool name");
            return compose_error(&ToolError::invalid_input(
                "name",
                "tool name must be 1-128 ASCII letters, digits, '_', '-' or '.'",
            ));
        }
        match self.lookup(name) {
            Some(definition) => definition.execute(payload).await,
            None => {
                debug!(tool = name, "call for unknown tool");
                ToolResponse::error(format!("Tool '{name}' not found"))
            }
        }
    }

    /// Lists the metadata of all registered tools, ordered by name.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn list(&self) -> Vec<ToolMetadata> {
        let inner = self.inner.read().expect("tool registry poisoned");
        let mut tools: Vec<_> = inner
            .values()
            .map(|definition| definition.metadata.clone())
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Returns the registered names in sorted order.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.read().expect("tool registry poisoned");
        let mut names: Vec<_> = inner.keys().map(ToString::to_string).collect();
        names.sort();
        names
    }

    /// Returns `true` if a tool is registered under `name`.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner
            .read()
            .expect("tool registry poisoned")
            .contains_key(name)
    }

    /// Number of registered tools.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().expect("tool registry poisoned").len()
    }

    /// Returns `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
