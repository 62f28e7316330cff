//! The IIoT assistant's response loop.
//!
//! Takes a user prompt, lets the model request tool invocations, runs
//! them, and asks the model once more for the final answer:
//! FirstPass → ToolExecution → SecondPass.

pub mod loop_runner;

#[cfg(test)]
mod test_helpers;

pub use loop_runner::AssistantLoop;
