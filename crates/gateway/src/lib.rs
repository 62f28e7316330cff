//! HTTP gateway for the IIoT assistant.
//!
//! Routes:
//! - `POST /ask-assistant` answer a prompt, returning the session's transcript
//! - `GET|POST /clear-chat` reset the caller's session
//! - `GET /conversation` the caller's transcript
//! - `GET /tools` the tools offered to the model
//! - `GET /health` liveness
//!
//! The caller's session comes from the `session_id` body field or query
//! parameter, then the `X-Session-Id` header, then `"default"`.
//!
//! Built on Axum.

pub mod sessions;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Query};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use axum::{
    Router,
    extract::State,
    response::Json,
    routing::get,
    routing::post,
};
use iiot_assistant_agent::AssistantLoop;
use iiot_assistant_config::AppConfig;
use iiot_assistant_core::error::Error;
use iiot_assistant_core::event::EventBus;
use iiot_assistant_core::message::ConversationTurn;
use iiot_assistant_core::session::{DEFAULT_SESSION, SessionId};
use iiot_assistant_core::tool::ToolInfo;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

use crate::sessions::{SessionHandle, SessionStore};

const SESSION_HEADER: &str = "x-session-id";

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub agent: Arc<AssistantLoop>,
    pub sessions: SessionStore,
}

impl GatewayState {
    pub fn new(config: AppConfig, agent: Arc<AssistantLoop>) -> Self {
        let sessions = SessionStore::new(config.gateway.max_sessions);
        Self {
            config,
            agent,
            sessions,
        }
    }

    async fn session(&self, id: &str) -> SessionHandle {
        self.sessions
            .get_or_create(id, || self.agent.new_session(SessionId::from(id)))
            .await
    }
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers: CORS (any origin unless `gateway.allowed_origins` is set),
/// a 1 MB body limit, and HTTP trace logging.
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.gateway.allowed_origins);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ask-assistant", post(ask_handler))
        .route("/clear-chat", get(clear_handler).post(clear_handler))
        .route("/conversation", get(conversation_handler))
        .route("/tools", get(tools_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(SESSION_HEADER)])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
///
/// Builds the provider, tools and loop once and shares them across
/// requests.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = iiot_assistant_providers::build_from_config(&config)?;
    let tools = Arc::new(iiot_assistant_tools::build_registry(&config, provider.clone())?);
    let event_bus = Arc::new(EventBus::default());
    let agent = Arc::new(AssistantLoop::from_config(&config, provider, tools, event_bus));

    let app = build_router(Arc::new(GatewayState::new(config, agent)));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Pick the session id: explicit value, then header, then the default.
fn resolve_session_id(explicit: Option<&str>, headers: &HeaderMap) -> String {
    explicit
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|id| !id.is_empty())
        })
        .unwrap_or(DEFAULT_SESSION)
        .to_string()
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub conversation: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Upstream model trouble is a bad gateway; everything else is ours.
fn status_for(e: &Error) -> StatusCode {
    match e {
        Error::Provider(_) | Error::EmptyAnswer => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn ask_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected ask-assistant body");
        api_error(rejection.status(), rejection.body_text())
    })?;
    if payload.prompt.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "prompt must not be empty"));
    }

    let session_id = resolve_session_id(payload.session_id.as_deref(), &headers);
    info!(session_id = %session_id, prompt_len = payload.prompt.len(), "ask-assistant request");

    let handle = state.session(&session_id).await;
    let mut session = handle.lock().await;

    match state.agent.respond(&mut session, &payload.prompt).await {
        Ok(_) => Ok(Json(ConversationResponse {
            conversation: session.transcript().to_vec(),
        })),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Assistant failed to answer");
            Err(api_error(status_for(&e), e.to_string()))
        }
    }
}

#[derive(Deserialize)]
struct SessionQuery {
    session_id: Option<String>,
}

#[derive(Serialize)]
struct ClearResponse {
    status: u16,
}

async fn clear_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<SessionQuery>,
) -> Json<ClearResponse> {
    let session_id = resolve_session_id(query.session_id.as_deref(), &headers);

    // Nothing to clear for a session that was never used
    if let Some(handle) = state.sessions.get(&session_id).await {
        let mut session = handle.lock().await;
        state.agent.reset(&mut session);
    }

    Json(ClearResponse {
        status: StatusCode::OK.as_u16(),
    })
}

async fn conversation_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<SessionQuery>,
) -> Json<ConversationResponse> {
    let session_id = resolve_session_id(query.session_id.as_deref(), &headers);

    let conversation = match state.sessions.get(&session_id).await {
        Some(handle) => {
            let session = handle.lock().await;
            session.transcript().to_vec()
        }
        None => Vec::new(),
    };

    Json(ConversationResponse { conversation })
}

#[derive(Serialize)]
struct ToolsResponse {
    tools: Vec<ToolInfo>,
}

async fn tools_handler(State(state): State<SharedState>) -> Json<ToolsResponse> {
    Json(ToolsResponse {
        tools: state.agent.tools().infos(),
    })
}
