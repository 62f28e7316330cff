pub mod ask;
pub mod doctor;
pub mod init;
pub mod serve;
pub mod tools;

use iiot_assistant_agent::AssistantLoop;
use iiot_assistant_config::AppConfig;
use iiot_assistant_core::event::EventBus;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub fn load_config(path: Option<&Path>) -> CliResult<AppConfig> {
    AppConfig::load(path).map_err(|e| format!("Failed to load config: {e}").into())
}

pub fn config_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Build the provider, tool registry and response loop from configuration.
pub fn build_assistant(config: &AppConfig) -> CliResult<AssistantLoop> {
    let provider = iiot_assistant_providers::build_from_config(config)?;
    let tools = iiot_assistant_tools::build_registry(config, provider.clone())?;
    Ok(AssistantLoop::from_config(
        config,
        provider,
        Arc::new(tools),
        Arc::new(EventBus::default()),
    ))
}
