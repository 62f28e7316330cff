//! HTTP client for the factory telemetry API.
//!
//! The response schema belongs to the factory backend; bodies are passed
//! through as JSON, with arrays cut down to a bounded number of entries so
//! a large time window cannot flood the model's context.

use iiot_assistant_config::TelemetryConfig;
use iiot_assistant_core::error::ToolError;
use iiot_assistant_core::tool::ToolResult;
use std::time::Duration;

pub struct TelemetryClient {
    client: reqwest::Client,
    base_url: String,
    max_entries: usize,
    timeout_secs: u64,
}

impl TelemetryClient {
    pub fn new(config: &TelemetryConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ToolError::NotConfigured {
                tool_name: "telemetry".into(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_entries: config.max_entries,
            timeout_secs: config.timeout_secs,
        })
    }

    /// `GET {base_url}/{endpoint}` with the given query, as a tool result.
    pub async fn fetch(
        &self,
        tool_name: &str,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<ToolResult, ToolError> {
        let url = format!("{}/{endpoint}", self.base_url);
        tracing::debug!(tool = tool_name, %url, params = query.len(), "Querying telemetry API");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout {
                        tool_name: tool_name.into(),
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    ToolError::ExecutionFailed {
                        tool_name: tool_name.into(),
                        reason: format!("request to {url} failed: {e}"),
                    }
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: format!("failed to read response: {e}"),
        })?;

        if !status.is_success() {
            return Err(ToolError::ExecutionFailed {
                tool_name: tool_name.into(),
                reason: format!("{url} returned {}: {body}", status.as_u16()),
            });
        }

        Ok(self.summarize(body))
    }

    /// Turn a response body into the text fed back to the model.
    fn summarize(&self, body: String) -> ToolResult {
        let value: serde_json::Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            // Not JSON; hand it over untouched
            Err(_) => return ToolResult::text(body),
        };

        match value {
            serde_json::Value::Array(mut entries) if entries.len() > self.max_entries => {
                let total = entries.len();
                entries.truncate(self.max_entries);
                let shown = serde_json::Value::Array(entries);
                let output = format!(
                    "{shown}\n\n(Showing the first {} of {total} entries. Narrow the time range for more detail.)",
                    self.max_entries
                );
                ToolResult {
                    data: Some(shown),
                    ..ToolResult::text(output)
                }
            }
            value => ToolResult {
                data: Some(value),
                ..ToolResult::text(body)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, max_entries: usize) -> TelemetryClient {
        TelemetryClient::new(&TelemetryConfig {
            base_url: format!("{}/", server.uri()),
            max_entries,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn passes_query_and_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/machine"))
            .and(query_param("from_timestamp", "2024-05-01 10:00:00"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "motor_rpm": 1500.0}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server, 100);
        let result = client
            .fetch(
                "get_iiot_data",
                "machine",
                &[("from_timestamp", "2024-05-01 10:00:00".to_string())],
            )
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("motor_rpm"));
        assert_eq!(result.data.unwrap()[0]["id"], 1);
    }

    #[tokio::test]
    async fn long_arrays_are_truncated_with_note() {
        let server = MockServer::start().await;
        let rows: Vec<serde_json::Value> = (0..10).map(|i| serde_json::json!({"id": i})).collect();
        Mock::given(method("GET"))
            .and(path("/logs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows))
            .mount(&server)
            .await;

        let client = client_for(&server, 3);
        let result = client.fetch("get_logs", "logs", &[]).await.unwrap();
        assert_eq!(result.data.unwrap().as_array().unwrap().len(), 3);
        assert!(result.output.contains("first 3 of 10 entries"));
    }

    #[tokio::test]
    async fn error_status_is_execution_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = client_for(&server, 100);
        let err = client.fetch("get_logs", "logs", &[]).await.unwrap_err();
        match err {
            ToolError::ExecutionFailed { tool_name, reason } => {
                assert_eq!(tool_name, "get_logs");
                assert!(reason.contains("503"));
                assert!(reason.contains("maintenance"));
            }
            other => panic!("Expected ExecutionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_body_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("no data"))
            .mount(&server)
            .await;

        let client = client_for(&server, 100);
        let result = client.fetch("get_logs", "logs", &[]).await.unwrap();
        assert_eq!(result.output, "no data");
        assert!(result.data.is_none());
    }
}
