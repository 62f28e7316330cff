//! Telemetry table tool.

use async_trait::async_trait;
use iiot_assistant_core::error::ToolError;
use iiot_assistant_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use std::sync::Arc;

use crate::telemetry::TelemetryClient;

/// The factory's telemetry tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Machine,
    Ambient,
    Input,
    Qa,
}

impl Table {
    pub const ALL: [Table; 4] = [Table::Machine, Table::Ambient, Table::Input, Table::Qa];

    pub fn as_str(self) -> &'static str {
        match self {
            Table::Machine => "machine",
            Table::Ambient => "ambient",
            Table::Input => "input",
            Table::Qa => "qa",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Args {
    table: Table,
    from_timestamp: Option<String>,
    to_timestamp: Option<String>,
    column: Option<String>,
    min_value: Option<f64>,
    max_value: Option<f64>,
}

impl Args {
    fn query(&self) -> Result<Vec<(&'static str, String)>, ToolError> {
        if self.column.is_none() && (self.min_value.is_some() || self.max_value.is_some()) {
            return Err(ToolError::InvalidArguments(
                "min_value/max_value require a column".into(),
            ));
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                return Err(ToolError::InvalidArguments(format!(
                    "min_value {min} is greater than max_value {max}"
                )));
            }
        }

        let mut query = Vec::new();
        if let Some(from) = &self.from_timestamp {
            query.push(("from_timestamp", from.clone()));
        }
        if let Some(to) = &self.to_timestamp {
            query.push(("to_timestamp", to.clone()));
        }
        if let Some(column) = &self.column {
            query.push(("column", column.clone()));
        }
        if let Some(min) = self.min_value {
            query.push(("min", min.to_string()));
        }
        if let Some(max) = self.max_value {
            query.push(("max", max.to_string()));
        }
        Ok(query)
    }
}

/// Fetches rows of one telemetry table within an optional time window.
pub struct IiotDataTool {
    client: Arc<TelemetryClient>,
    datetime_format: String,
}

impl IiotDataTool {
    pub fn new(client: Arc<TelemetryClient>, datetime_format: impl Into<String>) -> Self {
        Self {
            client,
            datetime_format: datetime_format.into(),
        }
    }
}

#[async_trait]
impl Tool for IiotDataTool {
    fn name(&self) -> &str {
        crate::GET_IIOT_DATA
    }

    fn description(&self) -> &str {
        "Get IIoT sensor data from one of the factory's tables (machine, ambient, input, qa), \
         optionally restricted to a time window and a value range of one column. \
         Call get_db_info first if you are unsure which columns a table has."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        let tables: Vec<&str> = Table::ALL.iter().map(|t| t.as_str()).collect();
        let timestamp_hint = format!("Timestamp in the format '{}'", self.datetime_format);
        serde_json::json!({
            "type": "object",
            "properties": {
                "table": {
                    "type": "string",
                    "enum": tables,
                    "description": "The table to read from."
                },
                "from_timestamp": {
                    "type": "string",
                    "description": format!("{timestamp_hint}; only rows at or after it.")
                },
                "to_timestamp": {
                    "type": "string",
                    "description": format!("{timestamp_hint}; only rows at or before it.")
                },
                "column": {
                    "type": "string",
                    "description": "Column the value range applies to."
                },
                "min_value": {
                    "type": "number",
                    "description": "Only rows where the column is at least this value."
                },
                "max_value": {
                    "type": "number",
                    "description": "Only rows where the column is at most this value."
                }
            },
            "required": ["table"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: Args = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(format!("get_iiot_data: {e}")))?;
        let query = args.query()?;

        tracing::info!(table = args.table.as_str(), filters = query.len(), "Fetching IIoT data");
        self.client
            .fetch(self.name(), args.table.as_str(), &query)
            .await
    }
}
