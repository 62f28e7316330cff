//! Database description tool.

use async_trait::async_trait;
use iiot_assistant_core::error::ToolError;
use iiot_assistant_core::tool::{Tool, ToolResult};

/// Returns the configured description of the telemetry tables.
///
/// No I/O, never fails.
pub struct DatabaseInfoTool {
    description: String,
}

impl DatabaseInfoTool {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

#[async_trait]
impl Tool for DatabaseInfoTool {
    fn name(&self) -> &str {
        crate::GET_DB_INFO
    }

    fn description(&self) -> &str {
        "Get information about the available database, it's tables and their respective columns."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        tracing::debug!("Returning database description");
        Ok(ToolResult::text(&self.description))
    }
}
