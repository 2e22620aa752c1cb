//! Tool System
//!
//! Extensible tool framework for agent capabilities. Tools are registered at
//! runtime into a name-keyed registry; the executor validates and invokes
//! tool calls and reports results as observations fed back to the loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Tool call request decoded from an LLM response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    pub name: String,

    /// Argument object as returned by the model
    #[serde(default)]
    pub arguments: serde_json::Value,

    /// Optional call ID for tracking
    #[serde(default)]
    pub id: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            id: Some(uuid::Uuid::new_v4().to_string()),
        }
    }
}

/// Result of executing one tool call (success or recovered failure)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Observation {
    /// Tool output, or a description of the failure
    pub content: String,

    /// Tool that was called
    pub tool_name: String,

    /// Extra key-value context; failures carry `error = "true"`
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Observation {
    pub fn success(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_name: tool_name.into(),
            metadata: HashMap::new(),
        }
    }

    /// Fold an execution failure into an observation instead of aborting
    pub fn failure(tool_name: impl Into<String>, error: impl std::fmt::Display) -> Self {
        let tool_name = tool_name.into();
        let mut metadata = HashMap::new();
        metadata.insert("error".into(), "true".into());
        Self {
            content: format!("Tool '{}' failed: {}", tool_name, error),
            tool_name,
            metadata,
        }
    }

    pub fn is_error(&self) -> bool {
        self.metadata.get("error").map(String::as_str) == Some("true")
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl ParameterSchema {
    pub fn required(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            enum_values: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_enum(mut self, values: Vec<String>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// Tool definition schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier (sole identity key in the registry)
    pub name: String,

    /// Human-readable description (shown to the LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

/// One property in a model-facing function declaration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub param_type: String,

    pub description: String,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

/// JSON-Schema-shaped parameter object for function-calling backends.
///
/// `required` is an array naming exactly the parameters flagged required.
/// Function-calling APIs reject a per-parameter `required` boolean, so the
/// flag never appears inside `properties`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionParameters {
    #[serde(rename = "type")]
    pub object_type: String,

    pub properties: BTreeMap<String, PropertySchema>,

    pub required: Vec<String>,
}

/// Model-facing tool declaration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: FunctionParameters,
}

impl From<&ToolSchema> for ToolDeclaration {
    fn from(schema: &ToolSchema) -> Self {
        let mut properties = BTreeMap::new();
        let mut required = Vec::new();

        for param in &schema.parameters {
            properties.insert(
                param.name.clone(),
                PropertySchema {
                    param_type: param.param_type.clone(),
                    description: param.description.clone(),
                    enum_values: param.enum_values.clone(),
                },
            );
            if param.required {
                required.push(param.name.clone());
            }
        }

        Self {
            name: schema.name.clone(),
            description: schema.description.clone(),
            parameters: FunctionParameters {
                object_type: "object".into(),
                properties,
                required,
            },
        }
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with decoded arguments, returning text output
    async fn execute(&self, args: &HashMap<String, String>) -> Result<String>;
}

/// Name-keyed catalog of available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a new tool. Registering under an existing name replaces the
    /// prior entry.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_boxed(Arc::new(tool));
    }

    /// Register a boxed tool
    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        self.tools.insert(schema.name.clone(), tool);
    }

    /// Register a batch of tools
    pub fn register_all(&mut self, tools: Vec<Arc<dyn Tool>>) {
        for tool in tools {
            self.register_boxed(tool);
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Remove a tool by name
    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.remove(name)
    }

    /// Get all tool schemas
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Project every registered tool into the model-facing declaration shape
    pub fn model_declarations(&self) -> Vec<ToolDeclaration> {
        let mut declarations: Vec<ToolDeclaration> = self
            .tools
            .values()
            .map(|t| ToolDeclaration::from(&t.schema()))
            .collect();
        declarations.sort_by(|a, b| a.name.cmp(&b.name));
        declarations
    }
}

/// Decode an argument blob into a flat name→text mapping, stringifying any
/// non-string leaf value.
pub fn decode_arguments(arguments: &serde_json::Value) -> Result<HashMap<String, String>> {
    let object = match arguments {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => return Ok(HashMap::new()),
        other => {
            return Err(AgentError::InvalidArguments(format!(
                "expected object, got {}",
                other
            )));
        }
    };

    Ok(object
        .iter()
        .map(|(k, v)| {
            let text = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), text)
        })
        .collect())
}

/// Validates, executes, and reports tool calls
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Execute a single tool call.
    ///
    /// Required parameters are checked before the tool runs, so a rejected
    /// call has no side effects.
    pub async fn execute(&self, call: &ToolCall) -> Result<Observation> {
        let args = decode_arguments(&call.arguments)?;

        let tool = self
            .registry
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        for param in &tool.schema().parameters {
            if param.required && !args.contains_key(&param.name) {
                return Err(AgentError::MissingParameter {
                    tool: call.name.clone(),
                    parameter: param.name.clone(),
                });
            }
        }

        tracing::debug!(tool = %call.name, "Executing tool");

        let output = tool
            .execute(&args)
            .await
            .map_err(|e| AgentError::ToolExecution {
                tool: call.name.clone(),
                message: e.to_string(),
            })?;

        Ok(Observation::success(&call.name, output))
    }

    /// Execute a batch of calls, all-or-nothing: the first failure aborts the
    /// batch and propagates, returning no partial results.
    pub async fn execute_batch(&self, calls: &[ToolCall]) -> Result<Vec<Observation>> {
        let mut observations = Vec::with_capacity(calls.len());
        for call in calls {
            observations.push(self.execute(call).await?);
        }
        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "echo".into(),
                description: "Echo the given text".into(),
                parameters: vec![
                    ParameterSchema::required("text", "string", "Text to echo"),
                    ParameterSchema::optional("prefix", "string", "Optional prefix")
                        .with_enum(vec!["Echo".into(), "Say".into()]),
                ],
            }
        }

        async fn execute(&self, args: &HashMap<String, String>) -> Result<String> {
            let text = args.get("text").cloned().unwrap_or_default();
            Ok(format!("Echo: {}", text))
        }
    }

    struct CountingTool {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: if self.fail { "bad" } else { "good" }.into(),
                description: "Counts invocations".into(),
                parameters: vec![],
            }
        }

        async fn execute(&self, _args: &HashMap<String, String>) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AgentError::Other("boom".into()))
            } else {
                Ok("ok".into())
            }
        }
    }

    fn executor_with_echo() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        ToolExecutor::new(Arc::new(registry))
    }

    #[test]
    fn test_declaration_required_is_name_array() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        let declarations = registry.model_declarations();
        assert_eq!(declarations.len(), 1);

        let decl = &declarations[0];
        assert_eq!(decl.parameters.object_type, "object");
        assert_eq!(decl.parameters.required, vec!["text".to_string()]);
        assert_eq!(decl.parameters.properties.len(), 2);

        // The required flag must never leak into the property objects.
        let serialized = serde_json::to_value(decl).unwrap();
        assert!(serialized["parameters"]["properties"]["text"]
            .get("required")
            .is_none());
        assert_eq!(
            serialized["parameters"]["properties"]["prefix"]["enum"],
            json!(["Echo", "Say"])
        );
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(EchoTool);
        assert_eq!(registry.len(), 1);

        registry.remove("echo");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_echo_observation() {
        let executor = executor_with_echo();
        let call = ToolCall::new("echo", json!({"text": "hi"}));

        let observation = executor.execute(&call).await.unwrap();
        assert!(observation.content.contains("Echo: hi"));
        assert_eq!(observation.tool_name, "echo");
        assert!(!observation.is_error());
    }

    #[tokio::test]
    async fn test_missing_required_parameter() {
        let executor = executor_with_echo();
        let call = ToolCall::new("echo", json!({"prefix": "Echo"}));

        let err = executor.execute(&call).await.unwrap_err();
        match err {
            AgentError::MissingParameter { tool, parameter } => {
                assert_eq!(tool, "echo");
                assert_eq!(parameter, "text");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_non_string_arguments_stringified() {
        let executor = executor_with_echo();
        let call = ToolCall::new("echo", json!({"text": 42}));

        let observation = executor.execute(&call).await.unwrap();
        assert!(observation.content.contains("Echo: 42"));
    }

    #[tokio::test]
    async fn test_invalid_argument_blob() {
        let executor = executor_with_echo();
        let call = ToolCall::new("echo", json!(["not", "an", "object"]));

        assert!(matches!(
            executor.execute(&call).await,
            Err(AgentError::InvalidArguments(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let executor = executor_with_echo();
        let call = ToolCall::new("nope", json!({}));

        assert!(matches!(
            executor.execute(&call).await,
            Err(AgentError::ToolNotFound(name)) if name == "nope"
        ));
    }

    #[tokio::test]
    async fn test_batch_aborts_on_first_failure() {
        let good_calls = Arc::new(AtomicUsize::new(0));
        let bad_calls = Arc::new(AtomicUsize::new(0));

        let mut registry = ToolRegistry::new();
        registry.register(CountingTool {
            calls: Arc::clone(&good_calls),
            fail: false,
        });
        registry.register(CountingTool {
            calls: Arc::clone(&bad_calls),
            fail: true,
        });
        let executor = ToolExecutor::new(Arc::new(registry));

        let calls = vec![
            ToolCall::new("good", json!({})),
            ToolCall::new("bad", json!({})),
            ToolCall::new("good", json!({})),
        ];

        let err = executor.execute_batch(&calls).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolExecution { ref tool, .. } if tool == "bad"));

        // The third call never ran.
        assert_eq!(good_calls.load(Ordering::SeqCst), 1);
        assert_eq!(bad_calls.load(Ordering::SeqCst), 1);
    }
}
