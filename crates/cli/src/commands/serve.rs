//! `iiot-assistant serve` — Start the HTTP gateway.

use std::path::Path;

use super::{CliResult, load_config};

pub async fn run(config_path: Option<&Path>, port_override: Option<u16>) -> CliResult {
    let mut config = load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("IIoT Assistant Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {} ({})", config.default_model, config.default_provider);
    println!("   Telemetry: {}", config.telemetry.base_url);

    iiot_assistant_gateway::start(config).await?;

    Ok(())
}
