//! Tools the IIoT assistant can offer to the model.
//!
//! - `get_db_info`: describe the telemetry tables
//! - `get_iiot_data`: read rows from a telemetry table
//! - `get_logs`: read the factory log
//! - `query_documentation`: answer questions from the documentation index
//! - `visualize`: declared, not implemented

pub mod db_info;
pub mod documentation;
pub mod iiot_data;
pub mod logs;
pub mod telemetry;

use iiot_assistant_config::AppConfig;
use iiot_assistant_core::error::ToolError;
use iiot_assistant_core::provider::{Provider, ToolDefinition};
use iiot_assistant_core::tool::ToolRegistry;
use std::sync::Arc;

pub const GET_DB_INFO: &str = "get_db_info";
pub const GET_IIOT_DATA: &str = "get_iiot_data";
pub const GET_LOGS: &str = "get_logs";
pub const QUERY_DOCUMENTATION: &str = "query_documentation";
pub const VISUALIZE: &str = "visualize";

/// Every tool name this crate knows about, in declaration order.
pub const KNOWN_TOOLS: [&str; 5] = [
    GET_DB_INFO,
    GET_IIOT_DATA,
    GET_LOGS,
    QUERY_DOCUMENTATION,
    VISUALIZE,
];

/// Schema of the plotting tool, which has no handler.
pub fn visualize_definition() -> ToolDefinition {
    ToolDefinition {
        name: VISUALIZE.into(),
        description: "Plot one column of a table over time and return the image as markdown."
            .into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "table": {
                    "type": "string",
                    "enum": iiot_data::Table::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
                    "description": "The table holding the column."
                },
                "column": {
                    "type": "string",
                    "description": "The column to plot."
                }
            },
            "required": ["table", "column"]
        }),
    }
}

/// Build the registry of tools offered to the model.
///
/// Every known tool is declared, then the registry is narrowed to
/// `config.tools.enabled`. Unknown names are an error. An enabled
/// `query_documentation` without a configured search service is dropped
/// with a warning.
pub fn build_registry(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
) -> Result<ToolRegistry, ToolError> {
    if let Some(unknown) = config
        .tools
        .enabled
        .iter()
        .find(|name| !KNOWN_TOOLS.contains(&name.as_str()))
    {
        return Err(ToolError::NotFound(unknown.clone()));
    }

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(db_info::DatabaseInfoTool::new(
        &config.database_description,
    )));

    let telemetry = Arc::new(telemetry::TelemetryClient::new(&config.telemetry)?);
    registry.register(Box::new(iiot_data::IiotDataTool::new(
        telemetry.clone(),
        &config.datetime_format,
    )));
    registry.register(Box::new(logs::LogsTool::new(
        telemetry,
        &config.datetime_format,
    )));

    let mut enabled = config.tools.enabled.clone();
    if config.retrieval.is_configured() {
        let answer_model = documentation::AnswerModel {
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: config.default_max_tokens,
        };
        registry.register(Box::new(documentation::DocumentationTool::new(
            &config.retrieval,
            config.telemetry.timeout_secs,
            provider,
            answer_model,
        )?));
    } else if enabled.iter().any(|name| name == QUERY_DOCUMENTATION) {
        tracing::warn!(
            "query_documentation is enabled but no search service is configured; not offering it"
        );
        enabled.retain(|name| name != QUERY_DOCUMENTATION);
    }

    registry.declare_unimplemented(visualize_definition());
    registry.retain_enabled(&enabled)?;

    tracing::info!(tools = ?registry.names(), "Tool registry ready");
    Ok(registry)
}
