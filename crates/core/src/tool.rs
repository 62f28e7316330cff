//! Tool trait — the abstraction over capabilities the model may invoke.
//!
//! Every entry in the [`ToolRegistry`] pairs a schema with either a
//! handler or an explicit "unimplemented" marker, so a schema offered to
//! the model can never silently lack behavior.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A request to execute a tool, with decoded arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content, as fed back to the model
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    /// A successful result with plain text output.
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: true,
            output: output.into(),
            data: None,
        }
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "get_db_info").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

enum Handler {
    Implemented(Box<dyn Tool>),
    Unimplemented,
}

struct RegisteredTool {
    definition: ToolDefinition,
    handler: Handler,
}

/// Summary of a registered tool, for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub implemented: bool,
}

/// A registry of available tools, kept in declaration order.
///
/// The response loop uses this to:
/// 1. Get tool definitions to send to the model
/// 2. Look up and execute tools when the model requests them
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn insert(&mut self, entry: RegisteredTool) {
        let name = entry.definition.name.clone();
        match self.index.get(&name) {
            Some(&pos) => {
                tracing::warn!(tool = %name, "Replacing previously registered tool");
                self.tools[pos] = entry;
            }
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(entry);
            }
        }
    }

    /// Register an implemented tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.insert(RegisteredTool {
            definition: tool.to_definition(),
            handler: Handler::Implemented(tool),
        });
    }

    /// Declare a tool whose schema is known but which has no handler yet.
    ///
    /// Invoking it yields [`ToolError::Unimplemented`].
    pub fn declare_unimplemented(&mut self, definition: ToolDefinition) {
        self.insert(RegisteredTool {
            definition,
            handler: Handler::Unimplemented,
        });
    }

    /// Get an implemented tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        let entry = &self.tools[*self.index.get(name)?];
        match &entry.handler {
            Handler::Implemented(tool) => Some(tool.as_ref()),
            Handler::Unimplemented => None,
        }
    }

    /// Whether a tool with this name is declared at all.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Whether the named tool has a handler. `None` if it isn't declared.
    pub fn is_implemented(&self, name: &str) -> Option<bool> {
        self.index
            .get(name)
            .map(|&pos| matches!(self.tools[pos].handler, Handler::Implemented(_)))
    }

    /// Get all tool definitions (for sending to the model), in declaration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    /// Describe every registered tool.
    pub fn infos(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.definition.name.clone(),
                description: t.definition.description.clone(),
                implemented: matches!(t.handler, Handler::Implemented(_)),
            })
            .collect()
    }

    /// Execute a tool call.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let pos = self
            .index
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        match &self.tools[*pos].handler {
            Handler::Implemented(tool) => {
                let mut result = tool.execute(call.arguments.clone()).await?;
                result.call_id = call.id.clone();
                Ok(result)
            }
            Handler::Unimplemented => Err(ToolError::Unimplemented(call.name.clone())),
        }
    }

    /// Keep only the named tools, failing if any name is not declared.
    pub fn retain_enabled(&mut self, enabled: &[String]) -> std::result::Result<(), ToolError> {
        if let Some(unknown) = enabled.iter().find(|name| !self.contains(name)) {
            return Err(ToolError::NotFound(unknown.clone()));
        }
        self.tools.retain(|t| enabled.contains(&t.definition.name));
        self.index = self
            .tools
            .iter()
            .enumerate()
            .map(|(pos, t)| (t.definition.name.clone(), pos))
            .collect();
        Ok(())
    }

    /// List all registered tool names, in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.definition.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError> {
            let text = arguments["text"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidArguments("Missing 'text' argument".into()))?;
            Ok(ToolResult::text(text))
        }
    }

    fn plot_definition() -> ToolDefinition {
        ToolDefinition {
            name: "plot".into(),
            description: "Plot a column".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.is_implemented("echo"), Some(true));
    }

    #[test]
    fn definitions_keep_declaration_order() {
        let mut registry = ToolRegistry::new();
        registry.declare_unimplemented(plot_definition());
        registry.register(Box::new(EchoTool));
        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["plot", "echo"]);
    }

    #[test]
    fn unimplemented_tool_is_declared_but_has_no_handler() {
        let mut registry = ToolRegistry::new();
        registry.declare_unimplemented(plot_definition());
        assert!(registry.contains("plot"));
        assert!(registry.get("plot").is_none());
        assert_eq!(registry.is_implemented("plot"), Some(false));
        assert_eq!(registry.is_implemented("missing"), None);
        assert!(!registry.infos()[0].implemented);
    }

    #[tokio::test]
    async fn registry_execute_tool_sets_call_id() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let call = ToolCall {
            id: "call_1".into(),
            name: "echo".into(),
            arguments: serde_json::json!({"text": "hello world"}),
        };
        let result = registry.execute(&call).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hello world");
        assert_eq!(result.call_id, "call_1");
    }

    #[tokio::test]
    async fn registry_execute_missing_tool() {
        let registry = ToolRegistry::new();
        let call = ToolCall {
            id: "call_1".into(),
            name: "nonexistent".into(),
            arguments: serde_json::json!({}),
        };
        let err = registry.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn registry_execute_unimplemented_fails_fast() {
        let mut registry = ToolRegistry::new();
        registry.declare_unimplemented(plot_definition());
        let call = ToolCall {
            id: "call_1".into(),
            name: "plot".into(),
            arguments: serde_json::json!({}),
        };
        let err = registry.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::Unimplemented(ref name) if name == "plot"));
    }

    #[test]
    fn retain_enabled_filters_and_reindexes() {
        let mut registry = ToolRegistry::new();
        registry.declare_unimplemented(plot_definition());
        registry.register(Box::new(EchoTool));

        registry.retain_enabled(&["echo".to_string()]).unwrap();
        assert_eq!(registry.names(), vec!["echo"]);
        assert!(registry.get("echo").is_some());
        assert!(!registry.contains("plot"));
    }

    #[test]
    fn retain_enabled_rejects_unknown_names() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let err = registry.retain_enabled(&["nope".to_string()]).unwrap_err();
        assert!(matches!(err, ToolError::NotFound(ref name) if name == "nope"));
        assert_eq!(registry.len(), 1);
    }
}
