//! Turn orchestration: ties topic tracking, context, the agent pipeline,
//! response parsing and speech together for a [`Session`](crate::session::Session).

pub mod engine;
pub mod outcome;

pub use engine::{apology, DialogueEngine};
pub use outcome::{DialogueError, TurnAudio, TurnOutcome, TurnResponse};
