//! Agent runtime: the thing that actually runs a named stage.
//!
//! [`AgentRuntime`] is the seam between the executor and whatever performs
//! inference.  [`LlmAgentRuntime`] is the production implementation: one
//! [`AgentStage`] per name, each call going through an [`LlmClient`].

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::{LlmClient, LlmError};
use crate::pipeline::stage::{AgentStage, Resettable};

// ---------------------------------------------------------------------------
// StageError
// ---------------------------------------------------------------------------

/// Failure of a single stage call.
#[derive(Debug, Error)]
pub enum StageError {
    /// The runtime has no stage with this name.
    #[error("unknown stage: {0}")]
    UnknownStage(String),

    /// The LLM call behind the stage failed.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Any other runtime-specific failure.
    #[error("{0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// AgentRuntime trait
// ---------------------------------------------------------------------------

/// Runs named stages and owns their memory.
///
/// `&mut self` because running a stage updates its memory.  `Send` so a
/// session (and its pipeline) can move between runtime worker threads.
#[async_trait]
pub trait AgentRuntime: Send {
    /// Run `stage` on `input` and return its text output.
    async fn run_stage(&mut self, stage: &str, input: &str) -> Result<String, StageError>;

    /// Clear the memory of `stage`.  Returns `false` for an unknown name.
    fn reset_stage(&mut self, stage: &str) -> bool;

    /// Open a run over `stages`; with `fresh` the run starts from empty
    /// memory.  Runtimes without staged memory simply reset up front.
    fn begin_run(&mut self, stages: &[String], fresh: bool) {
        if fresh {
            for stage in stages {
                if !self.reset_stage(stage) {
                    log::warn!("pipeline: runtime does not know stage {stage}");
                }
            }
        }
    }

    /// Keep what the finished run recorded.
    fn commit_run(&mut self) {}

    /// Forget what an aborted run recorded.
    fn abort_run(&mut self) {}
}

// ---------------------------------------------------------------------------
// LlmAgentRuntime
// ---------------------------------------------------------------------------

/// LLM-backed runtime: each stage is a prompt over a shared [`LlmClient`].
pub struct LlmAgentRuntime {
    llm: Arc<dyn LlmClient>,
    stages: Vec<AgentStage>,
}

impl LlmAgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, stages: Vec<AgentStage>) -> Self {
        Self { llm, stages }
    }

    /// Runtime with built-in instructions for every name in `names`.
    pub fn with_stage_names(llm: Arc<dyn LlmClient>, names: &[String], memory_turns: usize) -> Self {
        let stages = names
            .iter()
            .map(|n| AgentStage::new(n.as_str(), memory_turns))
            .collect();
        Self::new(llm, stages)
    }

    #[cfg(test)]
    pub(crate) fn stage(&self, name: &str) -> Option<&AgentStage> {
        self.stages.iter().find(|s| s.name() == name)
    }
}

#[async_trait]
impl AgentRuntime for LlmAgentRuntime {
    async fn run_stage(&mut self, stage: &str, input: &str) -> Result<String, StageError> {
        let agent = self
            .stages
            .iter_mut()
            .find(|s| s.name() == stage)
            .ok_or_else(|| StageError::UnknownStage(stage.to_string()))?;

        let messages = agent.messages_for(input);
        let output = self.llm.complete(&messages).await?;

        agent.record(input, &output);
        Ok(output)
    }

    fn reset_stage(&mut self, stage: &str) -> bool {
        match self.stages.iter_mut().find(|s| s.name() == stage) {
            Some(agent) => {
                agent.reset();
                true
            }
            None => false,
        }
    }

    fn begin_run(&mut self, _stages: &[String], fresh: bool) {
        for agent in &mut self.stages {
            agent.begin_run(fresh);
        }
    }

    fn commit_run(&mut self) {
        for agent in &mut self.stages {
            agent.commit_run();
        }
    }

    fn abort_run(&mut self) {
        for agent in &mut self.stages {
            agent.abort_run();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
