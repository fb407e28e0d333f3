//! Sequential stage executor.
//!
//! [`PipelineExecutor`] runs its stage names in declared order through an
//! [`AgentRuntime`].  The first stage sees the (augmented) query; every later
//! stage sees the query plus the previous stage's output.  The last stage's
//! output is the pipeline result.
//!
//! ```text
//! query ─▶ stage 1 ─▶ out 1
//! query + out 1 ─▶ stage 2 ─▶ out 2
//! query + out 2 ─▶ stage 3 ─▶ out 3  ==> result
//! ```
//!
//! Any stage failure or timeout aborts the run; the caller gets one
//! [`PipelineError`] annotated with the query and never a partial result.
//! Stage memory is committed only when the whole run succeeds, so an aborted
//! run leaves nothing behind for the next one.

use std::time::Duration;

use thiserror::Error;

use crate::pipeline::runtime::{AgentRuntime, StageError};
use crate::session::preview;

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage call returned an error.
    #[error("stage `{stage}` failed: {source} (query: \"{}\")", preview(.query, 60))]
    StageFailed {
        stage: String,
        query: String,
        #[source]
        source: StageError,
    },

    /// A stage exceeded the per-stage timeout.
    #[error("stage `{stage}` timed out after {secs}s (query: \"{}\")", preview(.query, 60))]
    StageTimedOut {
        stage: String,
        query: String,
        secs: u64,
    },

    /// The executor was built with no stages.
    #[error("the pipeline has no stages")]
    NoStages,
}

// ---------------------------------------------------------------------------
// PipelineExecutor
// ---------------------------------------------------------------------------

/// Runs an ordered list of stages strictly one after another.
pub struct PipelineExecutor {
    stages: Vec<String>,
    runtime: Box<dyn AgentRuntime>,
    stage_timeout: Duration,
}

impl PipelineExecutor {
    pub fn new(stages: Vec<String>, runtime: Box<dyn AgentRuntime>, stage_timeout: Duration) -> Self {
        Self {
            stages,
            runtime,
            stage_timeout,
        }
    }

    pub fn stage_names(&self) -> &[String] {
        &self.stages
    }

    /// Run every stage in order and return the last stage's output.
    pub async fn run(&mut self, query: &str) -> Result<String, PipelineError> {
        self.execute(query, false).await
    }

    /// Like [`run`](Self::run), starting every stage from empty memory.  The
    /// old memory is dropped when the run ends, successful or not; if the
    /// run is abandoned midway it stays as it was.
    pub async fn run_fresh(&mut self, query: &str) -> Result<String, PipelineError> {
        self.execute(query, true).await
    }

    async fn execute(&mut self, query: &str, fresh: bool) -> Result<String, PipelineError> {
        self.runtime.begin_run(&self.stages, fresh);
        let result = self.run_stages(query).await;
        if result.is_ok() {
            self.runtime.commit_run();
        } else {
            self.runtime.abort_run();
        }
        result
    }

    async fn run_stages(&mut self, query: &str) -> Result<String, PipelineError> {
        let mut previous: Option<(&str, String)> = None;

        for stage in &self.stages {
            let input = stage_input(query, previous.as_ref().map(|(n, o)| (*n, o.as_str())));
            log::debug!("pipeline: running stage {stage}");

            let output =
                match tokio::time::timeout(self.stage_timeout, self.runtime.run_stage(stage, &input))
                    .await
                {
                    Ok(Ok(output)) => output,
                    Ok(Err(source)) => {
                        return Err(PipelineError::StageFailed {
                            stage: stage.clone(),
                            query: query.to_string(),
                            source,
                        });
                    }
                    Err(_elapsed) => {
                        return Err(PipelineError::StageTimedOut {
                            stage: stage.clone(),
                            query: query.to_string(),
                            secs: self.stage_timeout.as_secs(),
                        });
                    }
                };

            previous = Some((stage.as_str(), output));
        }

        previous.map(|(_, out)| out).ok_or(PipelineError::NoStages)
    }

    /// Clear one stage's memory.  Returns `false` for an unknown name.
    pub fn reset_stage(&mut self, stage: &str) -> bool {
        self.runtime.reset_stage(stage)
    }

    /// Clear every stage's memory, keeping the stage graph.
    pub fn reset_all(&mut self) {
        for stage in &self.stages {
            if !self.runtime.reset_stage(stage) {
                log::warn!("pipeline: runtime does not know stage {stage}");
            }
        }
    }
}

/// Working input of a stage: the query, plus the previous stage's output.
fn stage_input(query: &str, previous: Option<(&str, &str)>) -> String {
    match previous {
        None => query.to_string(),
        Some((name, output)) => {
            format!("{query}\n\nOutput from previous stage ({name}):\n{output}")
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
