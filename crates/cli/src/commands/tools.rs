//! `iiot-assistant tools` — List the tools the model can call.

use std::path::Path;

use super::{CliResult, load_config};

pub async fn run(config_path: Option<&Path>) -> CliResult {
    let config = load_config(config_path)?;
    let provider = iiot_assistant_providers::build_from_config(&config)?;
    let registry = iiot_assistant_tools::build_registry(&config, provider)?;

    println!("Available tools ({}):\n", registry.len());
    for info in registry.infos() {
        let marker = if info.implemented { "  " } else { "! " };
        println!("  {marker}{:<22} {}", info.name, first_line(&info.description));
    }

    let declared_only = registry.infos().iter().filter(|i| !i.implemented).count();
    if declared_only > 0 {
        println!("\n  ! = declared to the model but not implemented");
    }

    Ok(())
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_trims_multiline_descriptions() {
        assert_eq!(first_line("  Fetch data.\nMore detail."), "Fetch data.");
        assert_eq!(first_line(""), "");
    }
}
