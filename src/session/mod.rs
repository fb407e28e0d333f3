//! Conversation session: state, bounds and the context window.
//!
//! * [`Session`]: one conversation (state + its own pipeline).
//! * [`SessionState`]: history, notes, topic, step and preferences.
//! * [`build_context`] / [`augment_query`]: bounded background for the
//!   next pipeline run.

pub mod context;
pub mod state;

pub use context::{augment_query, build_context, preview};
pub use state::{
    HistoryEntry, Preferences, Session, SessionLimits, SessionState, SessionSummary,
};
