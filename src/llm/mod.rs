//! LLM transport for the agent pipeline.
//!
//! This module provides:
//! * [`LlmClient`]: async trait implemented by all chat-completions backends.
//! * [`ApiClient`]: OpenAI-compatible REST client (Gemini, OpenAI, Ollama …).
//! * [`ChatMessage`] / [`Role`]: wire-format messages.
//! * [`PromptBuilder`]: per-stage instructions and message assembly.
//! * [`LlmError`]: error variants for completion requests.

pub mod client;
pub mod prompt;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{ApiClient, ChatMessage, LlmClient, LlmError, Role};
pub use prompt::{instructions_for, PromptBuilder};
