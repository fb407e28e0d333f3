//! Builds a fresh pipeline for each new (or fully reset) session.

use std::sync::Arc;
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::llm::LlmClient;
use crate::pipeline::executor::PipelineExecutor;
use crate::pipeline::runtime::LlmAgentRuntime;

/// Creates pipelines.  Shared by the engine; each session gets its own
/// executor so sessions never share stage memory.
pub trait PipelineFactory: Send + Sync {
    fn build(&self) -> PipelineExecutor;
}

/// Factory for LLM-backed pipelines described by [`PipelineConfig`].
pub struct LlmPipelineFactory {
    llm: Arc<dyn LlmClient>,
    config: PipelineConfig,
}

impl LlmPipelineFactory {
    pub fn new(llm: Arc<dyn LlmClient>, config: &PipelineConfig) -> Self {
        Self {
            llm,
            config: config.clone(),
        }
    }
}

impl PipelineFactory for LlmPipelineFactory {
    fn build(&self) -> PipelineExecutor {
        let runtime = LlmAgentRuntime::with_stage_names(
            Arc::clone(&self.llm),
            &self.config.stages,
            self.config.stage_memory_turns,
        );
        PipelineExecutor::new(
            self.config.stages.clone(),
            Box::new(runtime),
            Duration::from_secs(self.config.stage_timeout_secs),
        )
    }
}
