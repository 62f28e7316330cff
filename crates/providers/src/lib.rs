//! Chat-completion provider implementations for the IIoT assistant.
//!
//! All providers implement the `iiot_assistant_core::Provider` trait.
//! [`router::build_from_config`] selects one based on configuration.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_from_config, is_keyless};
