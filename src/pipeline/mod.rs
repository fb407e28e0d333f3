//! Agent pipeline for the cooking assistant.
//!
//! A pipeline is an ordered list of named agent stages.  Each stage consumes
//! the user's (context-augmented) query plus the previous stage's output and
//! produces text; the last stage's output is the raw answer.
//!
//! # Architecture
//!
//! ```text
//! PipelineFactory::build()            one per session
//!        │
//!        ▼
//! PipelineExecutor::run(query)        strict sequential order, per-stage timeout
//!        │
//!        ├─ AgentRuntime::run_stage("cook_recipe", query)
//!        ├─ AgentRuntime::run_stage("notes_making", query + out 1)
//!        └─ AgentRuntime::run_stage("final_answer", query + out 2)  ==> raw answer
//!
//! LlmAgentRuntime ── AgentStage (instructions + StageMemory: Resettable)
//!                └── LlmClient (OpenAI-compatible chat completions)
//! ```

pub mod executor;
pub mod factory;
pub mod runtime;
pub mod stage;

pub use executor::{PipelineError, PipelineExecutor};
pub use factory::{LlmPipelineFactory, PipelineFactory};
pub use runtime::{AgentRuntime, LlmAgentRuntime, StageError};
pub use stage::{AgentStage, Resettable, StageMemory};
