//! Dialogue engine: drives one conversational turn end to end.
//!
//! # Turn flow
//!
//! ```text
//! user text
//!   └─▶ TopicDetector::detect + topic::decide
//!   └─▶ build_context / augment_query                (memory active only)
//!   └─▶ PipelineExecutor::run                        (run_fresh on TopicChanged;
//!                                                     Err → apology recorded as answer)
//!   └─▶ ResponseParser::parse                        (notes, current step)
//!   └─▶ commit draft into the session
//!   └─▶ SpeechResolver::synthesize                   (TTS enabled only, never fails the turn)
//! ```
//!
//! The engine is shared (`&self`); each [`Session`] is borrowed mutably for
//! the duration of one turn.  All state edits go to a draft copy that is
//! written back in one assignment once the answer is known; stage memory is
//! likewise only touched when the pipeline run ends.  A turn abandoned
//! midway leaves the session as it was.

use std::sync::Arc;

use crate::config::{AppConfig, ConfigError};
use crate::dialogue::outcome::{DialogueError, TurnAudio, TurnOutcome, TurnResponse};
use crate::llm::{ApiClient, LlmClient};
use crate::pipeline::{LlmPipelineFactory, PipelineExecutor, PipelineFactory};
use crate::response::{ParsedResponse, ResponseParser};
use crate::session::{
    augment_query, build_context, preview, Preferences, Session, SessionLimits, SessionState,
};
use crate::speech::{SpeechResolver, TtsResult};
use crate::topic::{self, TopicDetector};

/// Answer recorded when the pipeline cannot produce one.
pub fn apology(reason: &str) -> String {
    format!("Sorry, I encountered an error: {reason}. Please try again!")
}

// ---------------------------------------------------------------------------
// DialogueEngine
// ---------------------------------------------------------------------------

/// Orchestrates topic tracking, context, the agent pipeline, parsing and
/// speech for any number of sessions.
pub struct DialogueEngine {
    config: AppConfig,
    detector: TopicDetector,
    parser: ResponseParser,
    pipelines: Option<Arc<dyn PipelineFactory>>,
    /// Why `pipelines` is `None`, when validation said so.
    pipeline_issue: Option<ConfigError>,
    speech: Option<SpeechResolver>,
}

impl DialogueEngine {
    /// Build the production engine.
    ///
    /// Features whose credentials are missing are disabled with a warning
    /// instead of failing start-up.
    pub fn from_config(config: AppConfig) -> Self {
        let (pipelines, pipeline_issue) = match config.validate_pipeline() {
            Ok(()) => {
                let llm: Arc<dyn LlmClient> = Arc::new(ApiClient::from_config(&config.llm));
                let factory: Arc<dyn PipelineFactory> =
                    Arc::new(LlmPipelineFactory::new(llm, &config.pipeline));
                (Some(factory), None)
            }
            Err(e) => {
                log::warn!("agent pipeline disabled: {e}");
                (None, Some(e))
            }
        };

        let speech = SpeechResolver::from_config(&config);
        if speech.is_none() {
            log::warn!("text-to-speech disabled: no provider has credentials");
        }

        let mut engine = Self::with_parts(config, pipelines, speech);
        engine.pipeline_issue = pipeline_issue;
        engine
    }

    /// Build from explicit collaborators.
    pub fn with_parts(
        config: AppConfig,
        pipelines: Option<Arc<dyn PipelineFactory>>,
        speech: Option<SpeechResolver>,
    ) -> Self {
        Self {
            config,
            detector: TopicDetector::new(),
            parser: ResponseParser::new(),
            pipelines,
            pipeline_issue: None,
            speech,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn pipeline_issue(&self) -> Option<&ConfigError> {
        self.pipeline_issue.as_ref()
    }

    pub fn speech_available(&self) -> bool {
        self.speech.is_some()
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Start a conversation with its own pipeline.
    pub fn new_session(&self) -> Session {
        let state = SessionState::new(
            SessionLimits::from(&self.config.session),
            Preferences::from_config(&self.config.session, &self.config.speech),
        );
        Session::new(state, self.build_pipeline())
    }

    /// Forget everything but the preferences and rebuild the pipeline.
    pub fn reset_session(&self, session: &mut Session) {
        session.state.clear();
        session.pipeline = self.build_pipeline();
        log::info!("dialogue: session reset");
    }

    fn build_pipeline(&self) -> Option<PipelineExecutor> {
        self.pipelines.as_ref().map(|f| f.build())
    }

    // -----------------------------------------------------------------------
    // Turn
    // -----------------------------------------------------------------------

    /// Run one turn.
    ///
    /// Only an empty message is rejected; pipeline failures come back as a
    /// [`TurnResponse::Failed`] answer that is also recorded in history.
    pub async fn handle_turn(
        &self,
        session: &mut Session,
        user_text: &str,
    ) -> Result<TurnOutcome, DialogueError> {
        let question = user_text.trim();
        if question.is_empty() {
            return Err(DialogueError::EmptyMessage);
        }

        let mut draft = session.state.clone();
        let memory_active = draft.preferences.memory_active;

        // ── 1. Topic ─────────────────────────────────────────────────────
        let detected = self.detector.detect(question);
        let decision = topic::decide(draft.current_topic(), detected.as_deref(), memory_active);
        draft.apply_topic(&decision);

        // ── 2. Context ───────────────────────────────────────────────────
        let query = if memory_active {
            augment_query(question, &build_context(&draft))
        } else {
            question.to_string()
        };

        // ── 3. Pipeline ──────────────────────────────────────────────────
        log::info!("dialogue: processing query: {}", preview(question, 50));
        let fresh = decision.is_change();
        let response = match self
            .run_pipeline(session.pipeline.as_mut(), &query, fresh)
            .await
        {
            Ok(raw) => {
                let parsed = self.parser.parse(&raw);
                self.record_answer(&mut draft, question, parsed)
            }
            Err(message) => {
                draft.push_exchange(question, message.clone());
                TurnResponse::Failed { message }
            }
        };

        // ── 4. Commit ────────────────────────────────────────────────────
        session.state = draft;
        log::info!(
            "dialogue: turn complete ({} history entries, {} notes)",
            session.state.history().len(),
            session.state.notes().len()
        );

        // ── 5. Speech ────────────────────────────────────────────────────
        let (audio, speech_warning) = if session.state.preferences.tts_enabled
            && !response.is_failure()
        {
            self.speak_answer(session, response.display_text()).await
        } else {
            (None, None)
        };

        Ok(TurnOutcome {
            response,
            audio,
            speech_warning,
            topic: decision,
        })
    }

    /// On-demand speech with the session's provider and voice.
    pub async fn speak(&self, session: &Session, text: &str) -> TtsResult {
        match &self.speech {
            Some(resolver) => {
                let prefs = &session.state.preferences;
                resolver
                    .synthesize(text, prefs.speech_provider, &prefs.voice)
                    .await
            }
            None => TtsResult::Failed {
                reason: "text-to-speech is not configured".into(),
            },
        }
    }

    async fn speak_answer(
        &self,
        session: &Session,
        text: &str,
    ) -> (Option<TurnAudio>, Option<String>) {
        match self.speak(session, text).await {
            TtsResult::Audio { bytes, provider } => (Some(TurnAudio { bytes, provider }), None),
            TtsResult::Skipped => (None, None),
            TtsResult::Failed { reason } => {
                log::warn!("dialogue: speech unavailable: {reason}");
                (None, Some(format!("Speech unavailable: {reason}")))
            }
        }
    }

    /// Run the session pipeline, from empty stage memory when `fresh`;
    /// `Err` carries the apology to record.
    async fn run_pipeline(
        &self,
        pipeline: Option<&mut PipelineExecutor>,
        query: &str,
        fresh: bool,
    ) -> Result<String, String> {
        let Some(pipeline) = pipeline else {
            let reason = self
                .pipeline_issue
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "the agent pipeline is not configured".into());
            log::warn!("dialogue: no pipeline: {reason}");
            return Err(apology(&reason));
        };

        let result = if fresh {
            pipeline.run_fresh(query).await
        } else {
            pipeline.run(query).await
        };
        result.map_err(|e| {
            log::error!("dialogue: error processing query: {e}");
            apology(&e.to_string())
        })
    }

    /// Fold a parsed answer into the draft and build the response.
    fn record_answer(
        &self,
        draft: &mut SessionState,
        question: &str,
        parsed: ParsedResponse,
    ) -> TurnResponse {
        let display = self.parser.display_text(&parsed);
        match parsed {
            ParsedResponse::Structured {
                recipe_text,
                notes_text,
                raw,
            } => {
                if let Some(note) = &notes_text {
                    draft.push_note(note.clone());
                }
                let step = self.parser.extract_step(&recipe_text);
                if let Some(step) = &step {
                    draft.set_current_step(step.clone());
                }
                draft.push_exchange(question, raw);
                TurnResponse::Structured {
                    recipe_text,
                    notes_text,
                    step,
                }
            }
            ParsedResponse::Freeform { text } => {
                log::warn!("dialogue: answer has no recipe payload, showing it as free text");
                draft.push_exchange(question, text);
                TurnResponse::Freeform { text: display }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, SpeechProviderKind};
    use crate::llm::{ChatMessage, LlmError};
    use crate::pipeline::{AgentRuntime, StageError};
    use crate::session::HistoryEntry;
    use crate::speech::{SpeechError, SpeechProvider};
    use crate::topic::TopicDecision;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Everything the scripted runtimes saw, shared with the test.
    #[derive(Default)]
    struct Log {
        calls: Vec<(String, String)>,
        resets: usize,
    }

    /// Final stage answers with `answer`; `fail_at` makes that stage fail.
    struct ScriptedRuntime {
        log: Arc<Mutex<Log>>,
        answer: Arc<Mutex<String>>,
        fail_at: Option<String>,
    }

    #[async_trait]
    impl AgentRuntime for ScriptedRuntime {
        async fn run_stage(&mut self, stage: &str, input: &str) -> Result<String, StageError> {
            self.log
                .lock()
                .unwrap()
                .calls
                .push((stage.to_string(), input.to_string()));
            if self.fail_at.as_deref() == Some(stage) {
                return Err(StageError::Other("quota exceeded".into()));
            }
            if stage == "final_answer" {
                Ok(self.answer.lock().unwrap().clone())
            } else {
                Ok(format!("{stage} output"))
            }
        }

        fn reset_stage(&mut self, _stage: &str) -> bool {
            self.log.lock().unwrap().resets += 1;
            true
        }
    }

    struct ScriptedFactory {
        log: Arc<Mutex<Log>>,
        answer: Arc<Mutex<String>>,
        fail_at: Option<String>,
        builds: AtomicUsize,
    }

    impl PipelineFactory for ScriptedFactory {
        fn build(&self) -> PipelineExecutor {
            self.builds.fetch_add(1, Ordering::SeqCst);
            PipelineExecutor::new(
                vec!["cook_recipe".into(), "notes_making".into(), "final_answer".into()],
                Box::new(ScriptedRuntime {
                    log: Arc::clone(&self.log),
                    answer: Arc::clone(&self.answer),
                    fail_at: self.fail_at.clone(),
                }),
                Duration::from_secs(5),
            )
        }
    }

    struct Harness {
        engine: DialogueEngine,
        factory: Arc<ScriptedFactory>,
    }

    impl Harness {
        fn new(answer: &str, fail_at: Option<&str>) -> Self {
            Self::with_speech(answer, fail_at, None)
        }

        fn with_speech(answer: &str, fail_at: Option<&str>, speech: Option<SpeechResolver>) -> Self {
            let factory = Arc::new(ScriptedFactory {
                log: Arc::default(),
                answer: Arc::new(Mutex::new(answer.to_string())),
                fail_at: fail_at.map(Into::into),
                builds: AtomicUsize::new(0),
            });
            let engine = DialogueEngine::with_parts(
                AppConfig::default(),
                Some(Arc::clone(&factory) as Arc<dyn PipelineFactory>),
                speech,
            );
            Self { engine, factory }
        }

        fn set_answer(&self, answer: &str) {
            *self.factory.answer.lock().unwrap() = answer.to_string();
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.factory.log.lock().unwrap().calls.clone()
        }

        fn resets(&self) -> usize {
            self.factory.log.lock().unwrap().resets
        }
    }

    const STEP_ONE: &str = "```json\n{\"cook_recipe\": \"### Current Step: Step 1\\nBoil the water\", \"notes_making\": \"Pasta: step 1 boil water\"}\n```";

    // -----------------------------------------------------------------------
    // Turn handling
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn structured_answer_updates_step_notes_and_history() {
        let h = Harness::new(STEP_ONE, None);
        let mut session = h.engine.new_session();

        let out = h
            .engine
            .handle_turn(&mut session, "I want a pasta recipe")
            .await
            .unwrap();

        assert_eq!(
            out.response,
            TurnResponse::Structured {
                recipe_text: "### Current Step: Step 1\nBoil the water".into(),
                notes_text: Some("Pasta: step 1 boil water".into()),
                step: Some("Step 1".into()),
            }
        );
        assert_eq!(out.topic, TopicDecision::SameTopic("pasta".into()));
        assert!(out.audio.is_none());

        let state = session.state();
        assert_eq!(state.current_topic(), Some("pasta"));
        assert_eq!(state.current_step(), Some("Step 1"));
        assert_eq!(state.notes(), &["Pasta: step 1 boil water".to_string()]);
        assert_eq!(
            state.history(),
            &[HistoryEntry::Exchange {
                question: "I want a pasta recipe".into(),
                answer: STEP_ONE.into(),
            }]
        );
    }

    #[tokio::test]
    async fn freeform_answer_is_recorded_unchanged() {
        let h = Harness::new("Use butter instead.", None);
        let mut session = h.engine.new_session();

        let out = h.engine.handle_turn(&mut session, "no margarine?").await.unwrap();
        assert_eq!(
            out.response,
            TurnResponse::Freeform {
                text: "Use butter instead.".into()
            }
        );
        assert_eq!(session.state().notes().len(), 0);
        assert_eq!(session.state().current_step(), None);
        assert_eq!(session.state().last_answer(), Some("Use butter instead."));
    }

    #[tokio::test]
    async fn stage_two_failure_skips_stage_three_and_records_apology() {
        let h = Harness::new(STEP_ONE, Some("notes_making"));
        let mut session = h.engine.new_session();

        let out = h.engine.handle_turn(&mut session, "boil eggs").await.unwrap();

        let stages: Vec<String> = h.calls().into_iter().map(|(s, _)| s).collect();
        assert_eq!(stages, vec!["cook_recipe", "notes_making"]);

        let TurnResponse::Failed { message } = &out.response else {
            panic!("expected Failed, got {:?}", out.response);
        };
        assert!(message.starts_with("Sorry, I encountered an error: "));
        assert!(message.contains("quota exceeded"));
        assert!(message.ends_with(". Please try again!"));

        assert_eq!(
            session.state().history(),
            &[HistoryEntry::Exchange {
                question: "boil eggs".into(),
                answer: message.clone(),
            }]
        );
    }

    #[tokio::test]
    async fn empty_message_is_rejected_without_side_effects() {
        let h = Harness::new(STEP_ONE, None);
        let mut session = h.engine.new_session();

        let err = h.engine.handle_turn(&mut session, "   \n").await.unwrap_err();
        assert_eq!(err, DialogueError::EmptyMessage);
        assert!(session.state().history().is_empty());
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn second_turn_carries_context_and_literal_question() {
        let h = Harness::new(STEP_ONE, None);
        let mut session = h.engine.new_session();

        h.engine.handle_turn(&mut session, "pasta recipe").await.unwrap();
        h.engine.handle_turn(&mut session, "done").await.unwrap();

        let calls = h.calls();
        let (stage, first_input) = &calls[3];
        assert_eq!(stage, "cook_recipe");
        assert!(first_input.starts_with("Current question: \"done\""));
        assert!(first_input.contains("Note 1: Pasta: step 1 boil water"));
        assert!(first_input.contains("User: pasta recipe"));
    }

    #[tokio::test]
    async fn memory_off_passes_question_unmodified_and_ignores_topics() {
        let h = Harness::new(STEP_ONE, None);
        let mut session = h.engine.new_session();
        session.preferences_mut().memory_active = false;

        h.engine.handle_turn(&mut session, "pasta recipe").await.unwrap();
        let out = h.engine.handle_turn(&mut session, "chicken recipe").await.unwrap();

        assert_eq!(out.topic, TopicDecision::NoTopic);
        assert_eq!(session.state().current_topic(), None);
        let calls = h.calls();
        assert_eq!(calls[3].1, "chicken recipe");
        assert_eq!(h.resets(), 0);
    }

    #[tokio::test]
    async fn topic_change_truncates_history_and_resets_stages() {
        let h = Harness::new(STEP_ONE, None);
        let mut session = h.engine.new_session();

        for text in ["pasta recipe", "done", "next", "next", "done"] {
            h.engine.handle_turn(&mut session, text).await.unwrap();
        }
        assert_eq!(session.state().history().len(), 5);
        assert_eq!(h.resets(), 0);

        let out = h
            .engine
            .handle_turn(&mut session, "how to make beef stew")
            .await
            .unwrap();

        assert_eq!(
            out.topic,
            TopicDecision::TopicChanged {
                old: "pasta".into(),
                new: "beef stew".into()
            }
        );
        assert_eq!(h.resets(), 3);

        let history = session.state().history();
        // Two retained entries (one being the switch marker) plus this turn.
        assert_eq!(history.len(), 3);
        let system: Vec<&HistoryEntry> = history.iter().filter(|e| e.is_system()).collect();
        assert_eq!(
            system,
            vec![&HistoryEntry::System {
                note: "Switched topic from pasta to beef stew".into()
            }]
        );
        assert_eq!(session.state().current_topic(), Some("beef stew"));
        // The new answer carries Step 1 again.
        assert_eq!(session.state().current_step(), Some("Step 1"));
    }

    #[tokio::test]
    async fn many_turns_keep_history_bounded() {
        let h = Harness::new("ok", None);
        let mut session = h.engine.new_session();
        let cap = h.engine.config().session.max_history;

        for i in 0..(cap * 2 + 7) {
            h.engine
                .handle_turn(&mut session, &format!("question {i}"))
                .await
                .unwrap();
            assert!(session.state().history().len() <= cap);
        }
        assert_eq!(
            session.state().history().last(),
            Some(&HistoryEntry::Exchange {
                question: format!("question {}", cap * 2 + 6),
                answer: "ok".into(),
            })
        );
    }

    #[tokio::test]
    async fn missing_pipeline_answers_with_configuration_message() {
        let engine = DialogueEngine::with_parts(AppConfig::default(), None, None);
        let mut session = engine.new_session();
        assert!(!session.has_pipeline());

        let out = engine.handle_turn(&mut session, "pasta recipe").await.unwrap();
        assert_eq!(
            out.response,
            TurnResponse::Failed {
                message: apology("the agent pipeline is not configured")
            }
        );
        assert_eq!(session.state().history().len(), 1);
    }

    #[tokio::test]
    async fn from_config_without_key_disables_pipeline() {
        let mut cfg = AppConfig::default();
        cfg.llm.api_key = None;
        cfg.llm.api_key_env = Some("COOKING_ASSISTANT_TEST_UNSET_KEY_7F3A".into());
        cfg.speech.open_ai.api_key_env = Some("COOKING_ASSISTANT_TEST_UNSET_KEY_7F3A".into());
        cfg.speech.fal.api_key_env = Some("COOKING_ASSISTANT_TEST_UNSET_KEY_7F3A".into());

        let engine = DialogueEngine::from_config(cfg);
        assert!(engine.pipeline_issue().is_some());
        assert!(!engine.speech_available());

        let mut session = engine.new_session();
        let out = engine.handle_turn(&mut session, "hi").await.unwrap();
        let TurnResponse::Failed { message } = out.response else {
            panic!("expected Failed");
        };
        assert!(message.contains("COOKING_ASSISTANT_TEST_UNSET_KEY_7F3A"));
    }

    #[tokio::test]
    async fn reset_session_clears_state_and_rebuilds_pipeline() {
        let h = Harness::new(STEP_ONE, None);
        let mut session = h.engine.new_session();
        session.preferences_mut().tts_enabled = true;
        h.engine.handle_turn(&mut session, "pasta recipe").await.unwrap();

        h.engine.reset_session(&mut session);

        assert_eq!(h.factory.builds.load(Ordering::SeqCst), 2);
        let state = session.state();
        assert!(state.history().is_empty());
        assert!(state.notes().is_empty());
        assert_eq!(state.current_topic(), None);
        assert_eq!(state.current_step(), None);
        assert!(state.preferences.tts_enabled);
    }

    #[tokio::test]
    async fn sessions_do_not_share_state() {
        let h = Harness::new(STEP_ONE, None);
        let mut a = h.engine.new_session();
        let b = h.engine.new_session();

        h.engine.handle_turn(&mut a, "pasta recipe").await.unwrap();
        h.set_answer("plain");

        assert_eq!(a.state().history().len(), 1);
        assert!(b.state().history().is_empty());
    }

    // -----------------------------------------------------------------------
    // Default stages over an LLM
    // -----------------------------------------------------------------------

    const RECIPE: &str = "### Current Step: Step 1\n**Boil the water** for the pasta";

    /// Answers each default stage the way its instruction asks: the notes
    /// stage repeats the recipe and appends a `Note:` line, the formatter
    /// splits the two into the JSON payload.
    #[derive(Default)]
    struct KitchenLlm {
        requests: Mutex<Vec<(&'static str, Vec<ChatMessage>)>>,
        failing: Mutex<Option<&'static str>>,
    }

    impl KitchenLlm {
        fn fail(&self, stage: Option<&'static str>) {
            *self.failing.lock().unwrap() = stage;
        }

        fn requests_of(&self, stage: &str) -> Vec<Vec<ChatMessage>> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|(s, _)| *s == stage)
                .map(|(_, m)| m.clone())
                .collect()
        }
    }

    fn previous_output(input: &str) -> &str {
        input
            .split_once("\n\nOutput from previous stage (")
            .and_then(|(_, rest)| rest.split_once("):\n"))
            .map_or("", |(_, out)| out)
    }

    #[async_trait]
    impl LlmClient for KitchenLlm {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
            let system = &messages[0].content;
            let stage = if system.contains("experienced chef") {
                "cook_recipe"
            } else if system.contains("running notes") {
                "notes_making"
            } else {
                "final_answer"
            };
            self.requests.lock().unwrap().push((stage, messages.to_vec()));
            if *self.failing.lock().unwrap() == Some(stage) {
                return Err(LlmError::Timeout);
            }

            let previous = previous_output(&messages[messages.len() - 1].content);
            Ok(match stage {
                "cook_recipe" => RECIPE.to_string(),
                "notes_making" => format!("{previous}\n\nNote: Pasta, step 1 boil water"),
                _ => {
                    let (recipe, note) = previous.split_once("\n\nNote: ").unwrap_or((previous, ""));
                    let payload = serde_json::json!({"cook_recipe": recipe, "notes_making": note});
                    format!("```json\n{payload}\n```")
                }
            })
        }
    }

    fn kitchen_engine(llm: &Arc<KitchenLlm>) -> DialogueEngine {
        let llm: Arc<dyn LlmClient> = Arc::clone(llm) as Arc<dyn LlmClient>;
        let factory = LlmPipelineFactory::new(llm, &PipelineConfig::default());
        DialogueEngine::with_parts(AppConfig::default(), Some(Arc::new(factory)), None)
    }

    #[tokio::test]
    async fn default_stages_carry_the_recipe_text_to_the_final_answer() {
        let llm = Arc::new(KitchenLlm::default());
        let engine = kitchen_engine(&llm);
        let mut session = engine.new_session();

        let out = engine
            .handle_turn(&mut session, "I want a pasta recipe")
            .await
            .unwrap();

        let finals = llm.requests_of("final_answer");
        assert_eq!(finals.len(), 1);
        assert!(finals[0].last().unwrap().content.contains(RECIPE));
        assert_eq!(
            out.response,
            TurnResponse::Structured {
                recipe_text: RECIPE.into(),
                notes_text: Some("Pasta, step 1 boil water".into()),
                step: Some("Step 1".into()),
            }
        );
    }

    #[tokio::test]
    async fn failed_turn_leaves_no_stage_memory_behind() {
        let llm = Arc::new(KitchenLlm::default());
        let engine = kitchen_engine(&llm);
        let mut session = engine.new_session();

        engine.handle_turn(&mut session, "I want a pasta recipe").await.unwrap();

        llm.fail(Some("notes_making"));
        let out = engine.handle_turn(&mut session, "done").await.unwrap();
        assert!(out.response.is_failure());

        llm.fail(None);
        engine.handle_turn(&mut session, "next").await.unwrap();

        let recipe_calls = llm.requests_of("cook_recipe");
        assert_eq!(recipe_calls.len(), 3);
        // system, the first turn's exchange, this turn.
        assert_eq!(recipe_calls[2].len(), 4);
        assert_eq!(recipe_calls[2][2].content, RECIPE);
        assert!(!recipe_calls[2][1].content.contains("\"done\""));
    }

    #[tokio::test]
    async fn failed_topic_change_still_forgets_the_old_topic() {
        let llm = Arc::new(KitchenLlm::default());
        let engine = kitchen_engine(&llm);
        let mut session = engine.new_session();

        engine.handle_turn(&mut session, "I want a pasta recipe").await.unwrap();

        llm.fail(Some("final_answer"));
        let out = engine
            .handle_turn(&mut session, "how to make beef stew")
            .await
            .unwrap();
        assert!(out.topic.is_change());
        assert!(out.response.is_failure());
        assert_eq!(session.state().current_topic(), Some("beef stew"));

        llm.fail(None);
        engine.handle_turn(&mut session, "next").await.unwrap();

        // The stew turn never completed and pasta was dropped with the topic.
        let recipe_calls = llm.requests_of("cook_recipe");
        assert_eq!(recipe_calls[1].len(), 2);
        assert_eq!(recipe_calls[2].len(), 2);
    }

    // -----------------------------------------------------------------------
    // Speech
    // -----------------------------------------------------------------------

    struct FixedSpeech {
        kind: SpeechProviderKind,
        bytes: Option<Vec<u8>>,
    }

    #[async_trait]
    impl SpeechProvider for FixedSpeech {
        fn kind(&self) -> SpeechProviderKind {
            self.kind
        }

        fn max_chars(&self) -> usize {
            1000
        }

        async fn synthesize(&self, _text: &str, _voice: &str) -> Result<Vec<u8>, SpeechError> {
            self.bytes
                .clone()
                .ok_or_else(|| SpeechError::Request("offline".into()))
        }
    }

    fn resolver(openai: Option<Vec<u8>>, fal: Option<Vec<u8>>) -> SpeechResolver {
        SpeechResolver::new(Duration::from_secs(1))
            .with_provider(Arc::new(FixedSpeech {
                kind: SpeechProviderKind::OpenAi,
                bytes: openai,
            }))
            .with_provider(Arc::new(FixedSpeech {
                kind: SpeechProviderKind::Fal,
                bytes: fal,
            }))
    }

    #[tokio::test]
    async fn tts_attaches_audio_from_fallback_provider() {
        let h = Harness::with_speech(STEP_ONE, None, Some(resolver(None, Some(vec![1, 2, 3]))));
        let mut session = h.engine.new_session();
        session.preferences_mut().tts_enabled = true;

        let out = h.engine.handle_turn(&mut session, "pasta recipe").await.unwrap();
        assert_eq!(
            out.audio,
            Some(TurnAudio {
                bytes: vec![1, 2, 3],
                provider: SpeechProviderKind::Fal
            })
        );
        assert_eq!(out.speech_warning, None);
    }

    #[tokio::test]
    async fn tts_failure_is_a_warning_not_an_error() {
        let h = Harness::with_speech(STEP_ONE, None, Some(resolver(None, None)));
        let mut session = h.engine.new_session();
        session.preferences_mut().tts_enabled = true;

        let out = h.engine.handle_turn(&mut session, "pasta recipe").await.unwrap();
        assert!(out.response.display_text().contains("Boil the water"));
        assert!(out.audio.is_none());
        assert!(out.speech_warning.unwrap().starts_with("Speech unavailable"));
        assert_eq!(session.state().history().len(), 1);
    }

    #[tokio::test]
    async fn tts_off_never_calls_speech() {
        let h = Harness::with_speech(STEP_ONE, None, Some(resolver(Some(vec![9]), None)));
        let mut session = h.engine.new_session();

        let out = h.engine.handle_turn(&mut session, "pasta recipe").await.unwrap();
        assert!(out.audio.is_none());
        assert!(out.speech_warning.is_none());
    }

    #[tokio::test]
    async fn speak_without_resolver_fails_softly() {
        let h = Harness::new(STEP_ONE, None);
        let session = h.engine.new_session();
        assert_eq!(
            h.engine.speak(&session, "hello").await,
            TtsResult::Failed {
                reason: "text-to-speech is not configured".into()
            }
        );
    }
}
