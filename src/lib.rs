//! Conversational cooking assistant.
//!
//! A turn flows through the modules in this order:
//!
//! ```text
//! topic ─▶ session::context ─▶ pipeline ─▶ response ─▶ session ─▶ speech
//! ```
//!
//! [`dialogue::DialogueEngine`] drives it; [`app`] is the terminal front-end.

pub mod app;
pub mod config;
pub mod dialogue;
pub mod llm;
pub mod pipeline;
pub mod response;
pub mod session;
pub mod speech;
pub mod topic;
