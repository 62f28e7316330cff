//! Factory log tool.

use async_trait::async_trait;
use iiot_assistant_core::error::ToolError;
use iiot_assistant_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use std::sync::Arc;

use crate::telemetry::TelemetryClient;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Args {
    from_timestamp: Option<String>,
    to_timestamp: Option<String>,
}

/// Fetches log entries (warnings, errors, maintenance events) from the factory API.
pub struct LogsTool {
    client: Arc<TelemetryClient>,
    datetime_format: String,
}

impl LogsTool {
    pub fn new(client: Arc<TelemetryClient>, datetime_format: impl Into<String>) -> Self {
        Self {
            client,
            datetime_format: datetime_format.into(),
        }
    }
}

#[async_trait]
impl Tool for LogsTool {
    fn name(&self) -> &str {
        crate::GET_LOGS
    }

    fn description(&self) -> &str {
        "Get the factory's log entries, optionally restricted to a time window. \
         Useful to find events that explain unusual sensor values."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "from_timestamp": {
                    "type": "string",
                    "description": format!("Only entries at or after this time ('{}').", self.datetime_format)
                },
                "to_timestamp": {
                    "type": "string",
                    "description": format!("Only entries at or before this time ('{}').", self.datetime_format)
                }
            },
            "required": []
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        // Some models send null instead of an empty object
        let args: Args = if arguments.is_null() {
            Args::default()
        } else {
            serde_json::from_value(arguments)
                .map_err(|e| ToolError::InvalidArguments(format!("get_logs: {e}")))?
        };

        let mut query = Vec::new();
        if let Some(from) = args.from_timestamp {
            query.push(("from_timestamp", from));
        }
        if let Some(to) = args.to_timestamp {
            query.push(("to_timestamp", to));
        }

        tracing::info!(filters = query.len(), "Fetching factory logs");
        self.client.fetch(self.name(), "logs", &query).await
    }
}
