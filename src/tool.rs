//! Tool system for agents
//!
//! Tools are the way agents act on the external world. An agent advertises
//! its registry to the model provider; when a completion carries tool calls,
//! the agent resolves each name through its [`ToolRegistry`] and folds the
//! text result back into the transcript.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{ChatError, Result};
use crate::items::ToolCall;

/// Result from a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The output from the tool
    pub output: Value,
    /// Optional error message if the tool failed
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: Value) -> Self {
        Self {
            output,
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            output: Value::Null,
            error: Some(message),
        }
    }

    /// Render the result as transcript text.
    pub fn as_text(&self) -> String {
        match &self.error {
            Some(err) => format!("Error: {}", err),
            None => match &self.output {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        }
    }
}

/// Trait for all tools that can be used by agents
#[async_trait]
pub trait Tool: Send + Sync + Debug {
    /// Get the name of the tool
    fn name(&self) -> &str;

    /// Get the description of the tool
    fn description(&self) -> &str;

    /// Get the JSON schema for the tool's parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments
    async fn execute(&self, arguments: Value) -> Result<ToolResult>;
}

/// A function-based tool
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    parameters_schema: Value,
    function: Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>,
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters_schema", &self.parameters_schema)
            .finish()
    }
}

impl FunctionTool {
    /// Create a new function tool with an explicit parameter schema.
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: Value,
        function: F,
    ) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters_schema,
            function: Arc::new(function),
        }
    }

    /// Create a function tool with a simple string-to-string function.
    ///
    /// The input string is read from the `input` argument.
    pub fn simple<F>(name: &str, description: &str, function: F) -> Self
    where
        F: Fn(String) -> String + Send + Sync + 'static,
    {
        let wrapped = move |args: Value| {
            let input = args
                .get("input")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            Ok(Value::String(function(input)))
        };

        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "input": { "type": "string" }
                },
                "required": ["input"]
            }),
            function: Arc::new(wrapped),
        }
    }

    /// Create a function tool from a typed handler.
    ///
    /// The parameter schema is derived from `A` via `schemars`.
    pub fn typed<A, R, F>(name: &str, description: &str, handler: F) -> Self
    where
        A: DeserializeOwned + JsonSchema,
        R: Serialize,
        F: Fn(A) -> Result<R> + Send + Sync + 'static,
    {
        let schema = schemars::schema_for!(A);
        let params = serde_json::to_value(schema.schema).expect("schema to value");
        let wrapped = move |raw: Value| {
            let args: A = serde_json::from_value(raw)?;
            let out = handler(args)?;
            Ok(serde_json::to_value(out)?)
        };

        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters_schema: params,
            function: Arc::new(wrapped),
        }
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters_schema.clone()
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult> {
        match (self.function)(arguments) {
            Ok(output) => Ok(ToolResult::success(output)),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

/// Name → tool mapping for one agent.
///
/// Read-only during execution; resolution of an unknown name fails with
/// [`ChatError::ToolNotFound`] rather than panicking.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut registry = Self::default();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.values()
    }

    /// Resolve and run one tool call.
    ///
    /// Fails with `ToolNotFound` for unknown names and `ExecutionError` when
    /// a resolved tool reports a failure. Callers fold both into the
    /// transcript rather than letting them escape the chat.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let tool = self.get(&call.name).ok_or_else(|| ChatError::ToolNotFound {
            name: call.name.clone(),
        })?;

        let result = tool.execute(call.arguments.clone()).await?;
        match result.error {
            Some(message) => Err(ChatError::ExecutionError { message }),
            None => Ok(result),
        }
    }
}
