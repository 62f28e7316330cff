//! Documentation question answering over an Azure AI Search index.
//!
//! Retrieves the top-K chunks for the question, drops low-scoring ones,
//! and asks the model for an answer grounded in what is left. The
//! grounding completion is a fresh, tool-less request that never touches
//! the caller's conversation.

use async_trait::async_trait;
use iiot_assistant_config::RetrievalConfig;
use iiot_assistant_core::error::ToolError;
use iiot_assistant_core::message::Message;
use iiot_assistant_core::provider::{Provider, ProviderRequest};
use iiot_assistant_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const GROUNDING_INSTRUCTIONS: &str = "You answer questions about a factory using only the \
documentation excerpts you are given. If the excerpts do not contain the answer, say so \
instead of guessing.";

/// A retrieved documentation chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
struct Args {
    question: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<serde_json::Value>,
}

/// Settings for the grounding completion.
#[derive(Debug, Clone)]
pub struct AnswerModel {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

pub struct DocumentationTool {
    client: reqwest::Client,
    search_url: String,
    api_key: String,
    content_key: String,
    top_k: usize,
    min_score: f64,
    timeout_secs: u64,
    provider: Arc<dyn Provider>,
    answer_model: AnswerModel,
}

impl DocumentationTool {
    /// Build the tool, or `NotConfigured` if the search service is incomplete.
    pub fn new(
        retrieval: &RetrievalConfig,
        timeout_secs: u64,
        provider: Arc<dyn Provider>,
        answer_model: AnswerModel,
    ) -> Result<Self, ToolError> {
        let not_configured = |reason: &str| ToolError::NotConfigured {
            tool_name: crate::QUERY_DOCUMENTATION.into(),
            reason: reason.into(),
        };

        let search_url = retrieval
            .search_url()
            .ok_or_else(|| not_configured("retrieval.service_name and retrieval.index_name are required"))?;
        let api_key = retrieval
            .api_key
            .clone()
            .ok_or_else(|| not_configured("retrieval.api_key or AZURE_SEARCH_KEY is required"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| not_configured(&e.to_string()))?;

        Ok(Self {
            client,
            search_url,
            api_key,
            content_key: retrieval.content_key.clone(),
            top_k: retrieval.top_k,
            min_score: retrieval.min_score,
            timeout_secs,
            provider,
            answer_model,
        })
    }

    fn failed(reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: crate::QUERY_DOCUMENTATION.into(),
            reason: reason.into(),
        }
    }

    /// Fetch the most relevant chunks for a question, best first.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<Chunk>, ToolError> {
        let response = self
            .client
            .post(&self.search_url)
            .header("api-key", &self.api_key)
            .json(&serde_json::json!({ "search": question, "top": self.top_k }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout {
                        tool_name: crate::QUERY_DOCUMENTATION.into(),
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    Self::failed(format!("search request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::failed(format!(
                "search service returned {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| Self::failed(format!("unreadable search response: {e}")))?;

        let chunks = parsed
            .value
            .into_iter()
            .filter_map(|hit| {
                let content = hit.get(&self.content_key)?.as_str()?.to_string();
                let score = hit
                    .get("@search.score")
                    .and_then(|s| s.as_f64())
                    .unwrap_or(0.0);
                Some(Chunk { content, score })
            })
            .collect();

        Ok(filter_chunks(chunks, self.min_score))
    }
}

/// Drop chunks scoring below `min_score` and sort the rest best first.
///
/// A threshold of zero keeps everything.
pub fn filter_chunks(mut chunks: Vec<Chunk>, min_score: f64) -> Vec<Chunk> {
    if min_score > 0.0 {
        chunks.retain(|c| c.score >= min_score);
    }
    chunks.sort_by(|a, b| b.score.total_cmp(&a.score));
    chunks
}

/// The prompt pairing a question with its supporting excerpts.
pub fn grounded_prompt(question: &str, chunks: &[Chunk]) -> String {
    let mut prompt = format!("Question: {question}\n\nDocumentation excerpts:\n");
    for (i, chunk) in chunks.iter().enumerate() {
        prompt.push_str(&format!("\n[{}] {}\n", i + 1, chunk.content.trim()));
    }
    prompt
}

#[async_trait]
impl Tool for DocumentationTool {
    fn name(&self) -> &str {
        crate::QUERY_DOCUMENTATION
    }

    fn description(&self) -> &str {
        "Answer a question using the factory's documentation, e.g. the normal operating range \
         of a sensor or what a machine state means. Use it to explain values that are outside \
         of the norm."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to answer from the documentation."
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let Args { question } = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(format!("query_documentation: {e}")))?;
        if question.trim().is_empty() {
            return Err(ToolError::InvalidArguments("question must not be empty".into()));
        }

        let chunks = self.retrieve(&question).await?;
        tracing::info!(chunks = chunks.len(), min_score = self.min_score, "Retrieved documentation");

        if chunks.is_empty() {
            return Ok(ToolResult::text(
                "The documentation contains nothing relevant to this question.",
            ));
        }

        let request = ProviderRequest {
            model: self.answer_model.model.clone(),
            messages: vec![
                Message::system(GROUNDING_INSTRUCTIONS),
                Message::user(grounded_prompt(&question, &chunks)),
            ],
            temperature: self.answer_model.temperature,
            max_tokens: self.answer_model.max_tokens,
            tools: vec![],
        };

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| Self::failed(format!("answer generation failed: {e}")))?;

        let sources: Vec<serde_json::Value> = chunks
            .iter()
            .map(|c| serde_json::json!({ "score": c.score, "content": c.content }))
            .collect();

        Ok(ToolResult {
            data: Some(serde_json::Value::Array(sources)),
            ..ToolResult::text(response.message.content)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iiot_assistant_core::error::ProviderError;
    use iiot_assistant_core::provider::ProviderResponse;
    use std::sync::Mutex;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Answers every request with a fixed text and keeps the requests.
    struct RecordingProvider {
        answer: String,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    #[async_trait]
    impl Provider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(ProviderResponse {
                message: Message::assistant(&self.answer),
                usage: None,
                model: request.model,
            })
        }
    }

    fn retrieval_for(server: &MockServer, min_score: f64) -> RetrievalConfig {
        RetrievalConfig {
            endpoint: Some(server.uri()),
            index_name: Some("factory-docs".into()),
            api_key: Some("search-key".into()),
            top_k: 3,
            min_score,
            ..RetrievalConfig::default()
        }
    }

    fn answer_model() -> AnswerModel {
        AnswerModel {
            model: "gpt-4o".into(),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    async fn mount_hits(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/indexes/factory-docs/docs/search"))
            .and(header("api-key", "search-key"))
            .and(body_json(serde_json::json!({"search": "normal motor rpm?", "top": 3})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [
                    {"@search.score": 0.4, "content": "Break room rules."},
                    {"@search.score": 2.5, "content": "Motor RPM normally stays between 1400 and 1600."}
                ]
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn zero_threshold_keeps_everything_sorted() {
        let chunks = vec![
            Chunk { content: "a".into(), score: 0.1 },
            Chunk { content: "b".into(), score: 0.9 },
        ];
        let kept = filter_chunks(chunks, 0.0);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].content, "b");
    }

    #[test]
    fn threshold_drops_low_scores() {
        let chunks = vec![
            Chunk { content: "a".into(), score: 0.1 },
            Chunk { content: "b".into(), score: 0.9 },
        ];
        let kept = filter_chunks(chunks, 0.5);
        assert_eq!(kept, vec![Chunk { content: "b".into(), score: 0.9 }]);
    }

    #[test]
    fn prompt_numbers_excerpts() {
        let prompt = grounded_prompt(
            "Why?",
            &[Chunk { content: " first ".into(), score: 1.0 }],
        );
        assert!(prompt.starts_with("Question: Why?"));
        assert!(prompt.contains("[1] first"));
    }

    #[test]
    fn incomplete_retrieval_is_not_configured() {
        let provider = Arc::new(RecordingProvider {
            answer: String::new(),
            requests: Mutex::new(vec![]),
        });
        let err = DocumentationTool::new(&RetrievalConfig::default(), 5, provider, answer_model())
            .err()
            .unwrap();
        assert!(matches!(err, ToolError::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn answers_from_retrieved_chunks() {
        let server = MockServer::start().await;
        mount_hits(&server).await;

        let provider = Arc::new(RecordingProvider {
            answer: "Between 1400 and 1600 RPM.".into(),
            requests: Mutex::new(vec![]),
        });
        let tool = DocumentationTool::new(
            &retrieval_for(&server, 1.0),
            5,
            provider.clone(),
            answer_model(),
        )
        .unwrap();

        let result = tool
            .execute(serde_json::json!({"question": "normal motor rpm?"}))
            .await
            .unwrap();
        assert_eq!(result.output, "Between 1400 and 1600 RPM.");
        assert_eq!(result.data.unwrap().as_array().unwrap().len(), 1);

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].tools.is_empty());
        let prompt = &requests[0].messages[1].content;
        assert!(prompt.contains("1400 and 1600"));
        assert!(!prompt.contains("Break room"));
    }

    #[tokio::test]
    async fn nothing_relevant_skips_the_model() {
        let server = MockServer::start().await;
        mount_hits(&server).await;

        let provider = Arc::new(RecordingProvider {
            answer: "unused".into(),
            requests: Mutex::new(vec![]),
        });
        let tool = DocumentationTool::new(
            &retrieval_for(&server, 10.0),
            5,
            provider.clone(),
            answer_model(),
        )
        .unwrap();

        let result = tool
            .execute(serde_json::json!({"question": "normal motor rpm?"}))
            .await
            .unwrap();
        assert!(result.output.contains("nothing relevant"));
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_failure_is_execution_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
            .mount(&server)
            .await;

        let provider = Arc::new(RecordingProvider {
            answer: String::new(),
            requests: Mutex::new(vec![]),
        });
        let tool = DocumentationTool::new(&retrieval_for(&server, 0.0), 5, provider, answer_model())
            .unwrap();
        let err = tool
            .execute(serde_json::json!({"question": "anything"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { ref reason, .. } if reason.contains("403")));
    }
}
