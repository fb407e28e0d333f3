//! Bounded context window for the next pipeline run.
//!
//! [`build_context`] reads the session's most recent notes and exchanges and
//! produces a compact block of background text:
//!
//! ```text
//! Previous recipe steps and notes:
//! Note 1: …
//! Note 2: …
//!
//! Recent conversation:
//! User: …
//! Chef: …
//! ```
//!
//! [`augment_query`] wraps the user's literal question around that block.
//! The question itself is always passed through verbatim.

use crate::session::state::{HistoryEntry, SessionState};

/// Cut `text` to `max_chars` characters, appending `...` when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    }
}

/// Build the context block, or an empty string when there is nothing to say.
///
/// Holds at most `context_notes` notes and `context_exchanges` exchanges;
/// system markers are never included.
pub fn build_context(state: &SessionState) -> String {
    let limits = state.limits();
    let mut parts: Vec<String> = Vec::with_capacity(2);

    let notes = state.notes();
    let recent_notes = &notes[notes.len().saturating_sub(limits.context_notes)..];
    if !recent_notes.is_empty() {
        let lines: Vec<String> = recent_notes
            .iter()
            .enumerate()
            .map(|(i, note)| format!("Note {}: {}", i + 1, note))
            .collect();
        parts.push(format!(
            "Previous recipe steps and notes:\n{}",
            lines.join("\n")
        ));
    }

    let exchanges: Vec<(&str, &str)> = state
        .history()
        .iter()
        .filter_map(|e| match e {
            HistoryEntry::Exchange { question, answer } => {
                Some((question.as_str(), answer.as_str()))
            }
            HistoryEntry::System { .. } => None,
        })
        .collect();
    let recent_exchanges = &exchanges[exchanges.len().saturating_sub(limits.context_exchanges)..];
    if !recent_exchanges.is_empty() {
        let lines: Vec<String> = recent_exchanges
            .iter()
            .map(|(q, a)| {
                format!(
                    "User: {}\nChef: {}",
                    q,
                    preview(a, limits.answer_preview_chars)
                )
            })
            .collect();
        parts.push(format!("Recent conversation:\n{}", lines.join("\n")));
    }

    parts.join("\n\n")
}

/// Combine the literal question with a context block.
///
/// An empty `context` returns `question` unchanged.
pub fn augment_query(question: &str, context: &str) -> String {
    if context.is_empty() {
        return question.to_string();
    }
    format!(
        "Current question: \"{question}\"\n\n\
         Context:\n{context}\n\n\
         Please respond to the current question considering the context and previous steps."
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
