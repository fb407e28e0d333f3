//! Pipeline stages and their memory.
//!
//! An [`AgentStage`] is one named agent: a fixed instruction plus a rolling
//! [`StageMemory`] of its own previous exchanges.  Every stage implements
//! [`Resettable`] so a topic change can wipe what it remembers without
//! rebuilding the pipeline.

use std::collections::VecDeque;

use crate::llm::{ChatMessage, PromptBuilder};

// ---------------------------------------------------------------------------
// Resettable
// ---------------------------------------------------------------------------

/// Something holding accumulated conversational memory that can be cleared.
pub trait Resettable {
    fn reset(&mut self);
}

// ---------------------------------------------------------------------------
// StageMemory
// ---------------------------------------------------------------------------

/// Rolling window of `(input, output)` pairs, oldest first.
#[derive(Debug, Clone)]
pub struct StageMemory {
    turns: VecDeque<(String, String)>,
    capacity: usize,
}

impl StageMemory {
    /// A window holding at most `capacity` exchanges.  `0` disables memory.
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Remember one exchange, dropping the oldest ones past capacity.
    pub fn remember(&mut self, input: impl Into<String>, output: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        self.turns.push_back((input.into(), output.into()));
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
        }
    }

    /// Snapshot of the remembered exchanges, oldest first.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Resettable for StageMemory {
    fn reset(&mut self) {
        self.turns.clear();
    }
}

// ---------------------------------------------------------------------------
// AgentStage
// ---------------------------------------------------------------------------

/// Memory of a run that has not finished yet.
struct PendingRun {
    memory: StageMemory,
    fresh: bool,
}

/// One named agent of the pipeline.
///
/// Exchanges recorded during a run live in a pending copy of the memory
/// until [`commit_run`](Self::commit_run); an aborted or abandoned run leaves
/// the committed memory untouched.
pub struct AgentStage {
    name: String,
    prompt: PromptBuilder,
    memory: StageMemory,
    pending: Option<PendingRun>,
}

impl AgentStage {
    /// Stage using the built-in instruction for `name`.
    pub fn new(name: impl Into<String>, memory_turns: usize) -> Self {
        let name = name.into();
        let prompt = PromptBuilder::for_stage(&name);
        Self {
            name,
            prompt,
            memory: StageMemory::new(memory_turns),
            pending: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Committed memory.
    pub fn memory(&self) -> &StageMemory {
        &self.memory
    }

    /// Start a run on a copy of the memory, or on an empty one if `fresh`.
    /// A run left pending by an abandoned turn is discarded.
    pub fn begin_run(&mut self, fresh: bool) {
        let memory = if fresh {
            StageMemory::new(self.memory.capacity)
        } else {
            self.memory.clone()
        };
        self.pending = Some(PendingRun { memory, fresh });
    }

    /// Make the pending run's memory the committed one.
    pub fn commit_run(&mut self) {
        if let Some(run) = self.pending.take() {
            self.memory = run.memory;
        }
    }

    /// Drop what the pending run recorded.  A fresh run still clears the
    /// committed memory, since the topic change it served stands.
    pub fn abort_run(&mut self) {
        if let Some(run) = self.pending.take() {
            if run.fresh {
                self.memory.reset();
            }
        }
    }

    fn active_memory(&self) -> &StageMemory {
        self.pending.as_ref().map_or(&self.memory, |run| &run.memory)
    }

    /// Chat messages for running this stage on `input`.
    pub fn messages_for(&self, input: &str) -> Vec<ChatMessage> {
        self.prompt.build_chat(&self.active_memory().entries(), input)
    }

    /// Remember one exchange, in the pending run when there is one.
    pub fn record(&mut self, input: &str, output: &str) {
        match self.pending.as_mut() {
            Some(run) => run.memory.remember(input, output),
            None => self.memory.remember(input, output),
        }
    }
}

impl Resettable for AgentStage {
    fn reset(&mut self) {
        self.memory.reset();
        self.pending = None;
        log::debug!("stage {}: memory cleared", self.name);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
