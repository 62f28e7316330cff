//! Policies governing how the response loop treats tool trouble.

use serde::{Deserialize, Serialize};

/// What to do when the model asks for a tool that isn't registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownToolPolicy {
    /// Abort the whole exchange with a tool-not-found error
    Fail,
    /// Drop the request; it is also removed from the recorded assistant message
    Skip,
    /// Answer the call with a tool message saying the tool doesn't exist (default)
    #[default]
    Report,
}

/// What to do when a registered tool fails (including bad arguments).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailurePolicy {
    /// Abort the whole exchange
    Abort,
    /// Feed the error back to the model as the tool's result (default)
    #[default]
    Report,
}
