//! What a turn hands back to the presentation layer.

use thiserror::Error;

use crate::config::SpeechProviderKind;
use crate::topic::TopicDecision;

/// Turn rejected before any work was done.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DialogueError {
    #[error("please enter a message")]
    EmptyMessage,
}

/// The answer produced by one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnResponse {
    /// A recipe step.
    Structured {
        recipe_text: String,
        notes_text: Option<String>,
        /// `Step N` found in the recipe text, if any.
        step: Option<String>,
    },
    /// Free text, pretty-printed when it was JSON.
    Freeform { text: String },
    /// The pipeline failed or is unavailable; `message` is the apology that
    /// was recorded as the answer.
    Failed { message: String },
}

impl TurnResponse {
    /// Text to show the user.
    pub fn display_text(&self) -> &str {
        match self {
            TurnResponse::Structured { recipe_text, .. } => recipe_text,
            TurnResponse::Freeform { text } => text,
            TurnResponse::Failed { message } => message,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TurnResponse::Failed { .. })
    }
}

/// Synthesised audio attached to a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnAudio {
    pub bytes: Vec<u8>,
    pub provider: SpeechProviderKind,
}

/// Everything one call to `handle_turn` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub response: TurnResponse,
    /// Present when speech was requested and succeeded.
    pub audio: Option<TurnAudio>,
    /// Set when speech was requested but produced no audio.
    pub speech_warning: Option<String>,
    /// How the turn affected the session topic.
    pub topic: TopicDecision,
}
