//! The two-pass tool-calling loop.

use chrono::Utc;
use iiot_assistant_config::{AppConfig, DEFAULT_SYSTEM_PROMPT};
use iiot_assistant_core::agent::{ToolFailurePolicy, UnknownToolPolicy};
use iiot_assistant_core::error::{Error, ToolError};
use iiot_assistant_core::event::{DomainEvent, EventBus};
use iiot_assistant_core::message::{ConversationTurn, Message, MessageToolCall};
use iiot_assistant_core::provider::{Provider, ProviderRequest, ToolDefinition};
use iiot_assistant_core::session::{Session, SessionId};
use iiot_assistant_core::tool::{ToolCall, ToolRegistry};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Which model round-trip a request belongs to.
#[derive(Debug, Clone, Copy)]
enum Pass {
    First,
    Second,
}

impl Pass {
    fn as_str(self) -> &'static str {
        match self {
            Pass::First => "first",
            Pass::Second => "second",
        }
    }
}

/// Answers user prompts against a session, invoking tools as the model asks.
pub struct AssistantLoop {
    /// The model provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting, used for both passes
    temperature: f32,

    /// Max tokens per model response
    max_tokens: Option<u32>,

    /// Tools offered on the first pass
    tools: Arc<ToolRegistry>,

    /// System prompt opening every new session
    system_prompt: String,

    /// strftime format of the timestamp appended to prompts
    datetime_format: String,

    unknown_tool_policy: UnknownToolPolicy,
    tool_failure_policy: ToolFailurePolicy,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,
}

impl AssistantLoop {
    /// Create a new loop with default prompt, format and policies.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            datetime_format: "%Y-%m-%d %H:%M:%S".to_string(),
            unknown_tool_policy: UnknownToolPolicy::default(),
            tool_failure_policy: ToolFailurePolicy::default(),
            event_bus,
        }
    }

    /// Create a loop with every setting taken from configuration.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let mut assistant = Self::new(
            provider,
            &config.default_model,
            config.default_temperature,
            tools,
            event_bus,
        )
        .with_system_prompt(&config.system_prompt)
        .with_datetime_format(&config.datetime_format)
        .with_unknown_tool_policy(config.agent.unknown_tool_policy)
        .with_tool_failure_policy(config.agent.tool_failure_policy);
        assistant.max_tokens = config.default_max_tokens;
        assistant
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_datetime_format(mut self, format: impl Into<String>) -> Self {
        self.datetime_format = format.into();
        self
    }

    pub fn with_unknown_tool_policy(mut self, policy: UnknownToolPolicy) -> Self {
        self.unknown_tool_policy = policy;
        self
    }

    pub fn with_tool_failure_policy(mut self, policy: ToolFailurePolicy) -> Self {
        self.tool_failure_policy = policy;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// A fresh session holding only the system prompt.
    pub fn new_session(&self, id: SessionId) -> Session {
        Session::new(id, &self.system_prompt)
    }

    /// Answer one prompt within `session`.
    ///
    /// On success the exchange's messages and a transcript turn are
    /// committed to the session and the final text is returned. On any
    /// error the session is left exactly as it was.
    pub async fn respond(&self, session: &mut Session, prompt: &str) -> Result<String, Error> {
        let session_id = session.id.to_string();
        info!(
            session_id = %session_id,
            messages = session.messages().len(),
            "Processing prompt"
        );

        match self.exchange(session.messages(), prompt, &session_id).await {
            Ok((staged, answer)) => {
                debug!(session_id = %session_id, appended = staged.len(), "Committing exchange");
                session.commit(staged, ConversationTurn::new(prompt, &answer));
                Ok(answer)
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Exchange failed, session unchanged");
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: format!("session {session_id}"),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    /// Clear a session back to its system prompt.
    pub fn reset(&self, session: &mut Session) {
        session.reset();
        info!(session_id = %session.id, "Session reset");
        self.event_bus.publish(DomainEvent::SessionReset {
            session_id: session.id.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Run Start → FirstPass → ToolExecution → SecondPass → Done.
    ///
    /// Returns the messages to append to the history and the final answer.
    async fn exchange(
        &self,
        history: &[Message],
        prompt: &str,
        session_id: &str,
    ) -> Result<(Vec<Message>, String), Error> {
        // Start
        let timestamp = self.timestamp()?;
        let mut staged = vec![Message::user(format!("{prompt}\n\nTimestamp: {timestamp}"))];

        // FirstPass
        let mut first = self
            .complete(history, &staged, self.tools.definitions(), Pass::First, session_id)
            .await?;

        if !first.requests_tools() {
            let answer = first.content.clone();
            staged.push(first);
            return Self::done(staged, answer);
        }

        // ToolExecution
        let requested = std::mem::take(&mut first.tool_calls);
        debug!(session_id, tool_count = requested.len(), "Executing tool calls");

        let mut kept = Vec::with_capacity(requested.len());
        let mut results = Vec::with_capacity(requested.len());
        for call in requested {
            if let Some(result) = self.run_tool(&call, session_id).await? {
                results.push(result);
                kept.push(call);
            }
        }

        // Skipped calls leave the recorded request so every call keeps its answer
        first.tool_calls = kept;
        if first.requests_tools() || !first.content.is_empty() {
            staged.push(first);
        }
        staged.extend(results);

        // SecondPass
        let mut second = self
            .complete(history, &staged, Vec::new(), Pass::Second, session_id)
            .await?;
        if second.requests_tools() {
            // No tools were offered, so these calls can never be answered
            warn!(
                session_id,
                ignored = second.tool_calls.len(),
                "Model requested tools on the second pass, ignoring"
            );
            second.tool_calls.clear();
        }
        let answer = second.content.clone();
        staged.push(second);
        Self::done(staged, answer)
    }

    /// The current local time in the configured format.
    fn timestamp(&self) -> Result<String, Error> {
        let mut rendered = String::new();
        write!(rendered, "{}", chrono::Local::now().format(&self.datetime_format)).map_err(|_| {
            Error::Config {
                message: format!(
                    "datetime_format '{}' is not a valid strftime format",
                    self.datetime_format
                ),
            }
        })?;
        Ok(rendered)
    }

    fn done(staged: Vec<Message>, answer: String) -> Result<(Vec<Message>, String), Error> {
        if answer.trim().is_empty() {
            return Err(Error::EmptyAnswer);
        }
        Ok((staged, answer))
    }

    async fn complete(
        &self,
        history: &[Message],
        staged: &[Message],
        tools: Vec<ToolDefinition>,
        pass: Pass,
        session_id: &str,
    ) -> Result<Message, Error> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: history.iter().chain(staged).cloned().collect(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools,
        };

        debug!(
            session_id,
            pass = pass.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Calling model"
        );

        let response = self.provider.complete(request).await?;

        if let Some(usage) = &response.usage {
            self.event_bus.publish(DomainEvent::ResponseGenerated {
                session_id: session_id.to_string(),
                model: response.model.clone(),
                tokens_used: usage.total_tokens,
                timestamp: Utc::now(),
            });
        }

        Ok(response.message)
    }

    /// Execute one requested call.
    ///
    /// `Ok(None)` means the call was skipped; `Err` aborts the exchange.
    async fn run_tool(
        &self,
        call: &MessageToolCall,
        session_id: &str,
    ) -> Result<Option<Message>, Error> {
        if !self.tools.contains(&call.name) {
            warn!(session_id, tool = %call.name, policy = ?self.unknown_tool_policy, "Model requested unknown tool");
            return match self.unknown_tool_policy {
                UnknownToolPolicy::Fail => Err(ToolError::NotFound(call.name.clone()).into()),
                UnknownToolPolicy::Skip => Ok(None),
                UnknownToolPolicy::Report => Ok(Some(Message::tool_result(
                    &call.id,
                    &call.name,
                    format!(
                        "Error: there is no tool named '{}'. Available tools: {}",
                        call.name,
                        self.tools.names().join(", ")
                    ),
                ))),
            };
        }

        let start = Instant::now();
        let outcome = match decode_arguments(&call.arguments) {
            Ok(arguments) => {
                self.tools
                    .execute(&ToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments,
                    })
                    .await
            }
            Err(e) => Err(e),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: outcome.as_ref().is_ok_and(|r| r.success),
            duration_ms,
            timestamp: Utc::now(),
        });

        match outcome {
            Ok(result) => {
                debug!(session_id, tool = %call.name, duration_ms, "Tool succeeded");
                Ok(Some(Message::tool_result(&call.id, &call.name, result.output)))
            }
            Err(e) => {
                warn!(session_id, tool = %call.name, duration_ms, error = %e, "Tool failed");
                match self.tool_failure_policy {
                    ToolFailurePolicy::Abort => Err(e.into()),
                    ToolFailurePolicy::Report => Ok(Some(Message::tool_result(
                        &call.id,
                        &call.name,
                        format!("Error: {e}"),
                    ))),
                }
            }
        }
    }
}

/// Decode the model's JSON argument string. An empty string means no arguments.
fn decode_arguments(raw: &str) -> Result<serde_json::Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(raw)
        .map_err(|e| ToolError::InvalidArguments(format!("arguments are not valid JSON: {e}")))
}
