//! `iiot-assistant doctor` — Check configuration and connectivity.

use iiot_assistant_config::AppConfig;
use std::path::Path;
use std::time::Duration;

use super::{CliResult, config_path};

pub async fn run(path: Option<&Path>) -> CliResult {
    println!("IIoT Assistant Doctor");
    println!("=====================\n");

    let mut issues = 0;

    let file = config_path(path);
    if file.exists() {
        println!("  [ok]   Config file found at {}", file.display());
    } else {
        println!("  [warn] No config file at {} (defaults in use, run `iiot-assistant init`)", file.display());
    }

    let config = match AppConfig::load(path) {
        Ok(config) => {
            println!("  [ok]   Configuration valid");
            config
        }
        Err(e) => {
            println!("  [fail] Configuration invalid: {e}");
            println!("\n  1 issue found. Fix the configuration and run doctor again.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  [ok]   API key configured");
    } else {
        println!("  [fail] No API key, set OPENAI_API_KEY or api_key in the config file");
        issues += 1;
    }

    match iiot_assistant_providers::build_from_config(&config) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!("  [ok]   Provider '{}' reachable", provider.name()),
            Ok(false) => {
                println!("  [fail] Provider '{}' rejected the health check", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  [fail] Provider '{}' unreachable: {e}", provider.name());
                issues += 1;
            }
        },
        Err(e) => {
            println!("  [fail] Provider could not be built: {e}");
            issues += 1;
        }
    }

    match ping(&config.telemetry.base_url, config.telemetry.timeout_secs).await {
        Ok(status) => println!(
            "  [ok]   Telemetry service {} answered ({status})",
            config.telemetry.base_url
        ),
        Err(e) => {
            println!("  [fail] Telemetry service {} unreachable: {e}", config.telemetry.base_url);
            issues += 1;
        }
    }

    if config.retrieval.is_configured() {
        println!("  [ok]   Documentation search configured");
    } else if config.tools.enabled.iter().any(|t| t == iiot_assistant_tools::QUERY_DOCUMENTATION) {
        println!("  [warn] Documentation search not configured, query_documentation is disabled");
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

/// Any HTTP answer counts as reachable; only transport failures are reported.
async fn ping(url: &str, timeout_secs: u64) -> Result<reqwest::StatusCode, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.min(10)))
        .build()?;
    Ok(client.get(url).send().await?.status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn ping_reports_status_of_live_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let status = ping(&server.uri(), 5).await.unwrap();
        assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ping_fails_for_closed_port() {
        assert!(ping("http://127.0.0.1:1/", 2).await.is_err());
    }
}
