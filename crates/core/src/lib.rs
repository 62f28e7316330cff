//! # IIoT Assistant Core
//!
//! Domain types, traits, and error definitions for the IIoT assistant.
//! This crate has **no framework dependencies** — it defines the domain
//! model that the other crates implement against.
//!
//! Every external collaborator (the model provider, the tools) is a trait
//! here. Implementations live in their respective crates, which keeps the
//! response loop testable with scripted stand-ins.

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{ToolFailurePolicy, UnknownToolPolicy};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{ConversationTurn, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use session::{Session, SessionId, DEFAULT_SESSION};
pub use tool::{Tool, ToolCall, ToolInfo, ToolRegistry, ToolResult};
