//! Per-conversation session state.
//!
//! [`SessionState`] is the plain-data part of a conversation: history,
//! notes, topic, current recipe step and user preferences.  It is `Clone`
//! so the dialogue engine can work on a draft during a turn and commit it in
//! one assignment when the turn completes.
//!
//! [`Session`] pairs that state with the conversation's own agent pipeline.

use crate::config::{AppConfig, SessionConfig, SpeechConfig, SpeechProviderKind};
use crate::pipeline::PipelineExecutor;
use crate::topic::TopicDecision;

// ---------------------------------------------------------------------------
// HistoryEntry
// ---------------------------------------------------------------------------

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEntry {
    /// A real user turn and the answer it received.
    Exchange { question: String, answer: String },
    /// A synthetic marker written by the engine (e.g. a topic switch).
    System { note: String },
}

impl HistoryEntry {
    pub fn is_system(&self) -> bool {
        matches!(self, HistoryEntry::System { .. })
    }
}

// ---------------------------------------------------------------------------
// SessionLimits
// ---------------------------------------------------------------------------

/// Bounds applied to history growth and to the context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// History length that triggers an overflow cleanup.
    pub max_history: usize,
    /// Entries kept after an overflow cleanup.
    pub retain_on_overflow: usize,
    /// Entries kept after a topic change.
    pub retain_on_topic_change: usize,
    /// Notes read into the context window.
    pub context_notes: usize,
    /// Exchanges read into the context window.
    pub context_exchanges: usize,
    /// Answer preview length in the context window.
    pub answer_preview_chars: usize,
}

impl From<&SessionConfig> for SessionLimits {
    fn from(cfg: &SessionConfig) -> Self {
        // A retain count above the cap would never shrink anything.
        let max_history = cfg.max_history.max(1);
        Self {
            max_history,
            retain_on_overflow: cfg.retain_on_overflow.min(max_history),
            retain_on_topic_change: cfg.retain_on_topic_change,
            context_notes: cfg.context_notes,
            context_exchanges: cfg.context_exchanges,
            answer_preview_chars: cfg.answer_preview_chars,
        }
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

/// Per-session toggles the user can flip mid-conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    /// Topic tracking and context injection.
    pub memory_active: bool,
    /// Speak recipe steps automatically.
    pub tts_enabled: bool,
    /// Provider tried first.
    pub speech_provider: SpeechProviderKind,
    /// Voice id handed to the provider.
    pub voice: String,
}

impl Preferences {
    pub fn from_config(session: &SessionConfig, speech: &SpeechConfig) -> Self {
        Self {
            memory_active: session.memory_active,
            tts_enabled: speech.enabled,
            speech_provider: speech.provider,
            voice: speech.voice.clone(),
        }
    }
}

impl Preferences {
    /// Write these preferences into `config` as its new defaults.
    pub fn apply_to(&self, config: &mut AppConfig) {
        config.session.memory_active = self.memory_active;
        config.speech.enabled = self.tts_enabled;
        config.speech.provider = self.speech_provider;
        config.speech.voice = self.voice.clone();
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default(), &SpeechConfig::default())
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Plain-data state of one conversation.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    history: Vec<HistoryEntry>,
    notes: Vec<String>,
    current_topic: Option<String>,
    current_step: Option<String>,
    /// User-adjustable toggles.
    pub preferences: Preferences,
    limits: SessionLimits,
}

impl SessionState {
    pub fn new(limits: SessionLimits, preferences: Preferences) -> Self {
        Self {
            history: Vec::new(),
            notes: Vec::new(),
            current_topic: None,
            current_step: None,
            preferences,
            limits,
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn current_topic(&self) -> Option<&str> {
        self.current_topic.as_deref()
    }

    pub fn current_step(&self) -> Option<&str> {
        self.current_step.as_deref()
    }

    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    /// Answer of the most recent real exchange.
    pub fn last_answer(&self) -> Option<&str> {
        self.history.iter().rev().find_map(|e| match e {
            HistoryEntry::Exchange { answer, .. } => Some(answer.as_str()),
            HistoryEntry::System { .. } => None,
        })
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Record a user turn and its answer, then enforce the history cap.
    pub fn push_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.history.push(HistoryEntry::Exchange {
            question: question.into(),
            answer: answer.into(),
        });
        self.enforce_history_cap();
    }

    /// Record a synthetic system marker, then enforce the history cap.
    pub fn push_system_note(&mut self, note: impl Into<String>) {
        self.history.push(HistoryEntry::System { note: note.into() });
        self.enforce_history_cap();
    }

    /// Store a note produced by the pipeline.  Notes are capped when read,
    /// not here.
    pub fn push_note(&mut self, note: impl Into<String>) {
        let note = note.into();
        if !note.trim().is_empty() {
            self.notes.push(note);
        }
    }

    /// Overwrite the current recipe step label.
    pub fn set_current_step(&mut self, step: impl Into<String>) {
        self.current_step = Some(step.into());
    }

    /// Apply the state side of a topic decision.
    ///
    /// `TopicChanged` appends one system note, truncates history to
    /// `retain_on_topic_change` entries, clears the step and switches the
    /// topic.  `SameTopic` only fills an empty topic.  Resetting the stage
    /// memory is the caller's job since the pipeline lives outside this
    /// struct.
    pub fn apply_topic(&mut self, decision: &TopicDecision) {
        match decision {
            TopicDecision::NoTopic => {}
            TopicDecision::SameTopic(topic) => {
                if self.current_topic.is_none() {
                    self.current_topic = Some(topic.clone());
                }
            }
            TopicDecision::TopicChanged { old, new } => {
                self.push_system_note(format!("Switched topic from {old} to {new}"));
                truncate_front(&mut self.history, self.limits.retain_on_topic_change);
                self.current_step = None;
                self.current_topic = Some(new.clone());
                log::info!("session: topic changed {old:?} -> {new:?}");
            }
        }
    }

    /// Drop everything except preferences and limits.
    pub fn clear(&mut self) {
        self.history.clear();
        self.notes.clear();
        self.current_topic = None;
        self.current_step = None;
    }

    fn enforce_history_cap(&mut self) {
        if self.history.len() > self.limits.max_history {
            truncate_front(&mut self.history, self.limits.retain_on_overflow);
            log::debug!(
                "session: history over {} entries, kept last {}",
                self.limits.max_history,
                self.history.len()
            );
        }
    }
}

/// Keep only the last `keep` elements of `v`.
fn truncate_front<T>(v: &mut Vec<T>, keep: usize) {
    if v.len() > keep {
        v.drain(..v.len() - keep);
    }
}

// ---------------------------------------------------------------------------
// SessionSummary
// ---------------------------------------------------------------------------

/// Read-only snapshot for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub messages: usize,
    pub notes: usize,
    pub topic: Option<String>,
    pub step: Option<String>,
    /// Last three notes, each cut to 100 characters.
    pub recent_notes: Vec<String>,
    pub memory_active: bool,
    pub tts_enabled: bool,
    pub pipeline_ready: bool,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One conversation: its state plus its own agent pipeline.
///
/// The pipeline is `None` when start-up validation disabled it; turns then
/// answer with a configuration message instead of running stages.
pub struct Session {
    pub(crate) state: SessionState,
    pub(crate) pipeline: Option<PipelineExecutor>,
}

impl Session {
    pub fn new(state: SessionState, pipeline: Option<PipelineExecutor>) -> Self {
        Self { state, pipeline }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn preferences_mut(&mut self) -> &mut Preferences {
        &mut self.state.preferences
    }

    pub fn has_pipeline(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn summary(&self) -> SessionSummary {
        let s = &self.state;
        let recent_notes = s
            .notes
            .iter()
            .rev()
            .take(3)
            .rev()
            .map(|n| crate::session::context::preview(n, 100))
            .collect();

        SessionSummary {
            messages: s.history.len(),
            notes: s.notes.len(),
            topic: s.current_topic.clone(),
            step: s.current_step.clone(),
            recent_notes,
            memory_active: s.preferences.memory_active,
            tts_enabled: s.preferences.tts_enabled,
            pipeline_ready: self.pipeline.is_some(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
