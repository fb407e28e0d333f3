//! Application settings structs, defaults, validation and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Every section carries `#[serde(default)]`, so a hand-written
//! `settings.toml` only needs the keys it wants to override.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Problems detected by the start-up validation pass.
///
/// These never abort the process: the binary logs them and builds the engine
/// with the affected feature disabled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A credential required by `feature` is absent from both the settings
    /// file and the environment.
    #[error("{feature} requires an API key (set `{env_var}` or configure one in settings.toml)")]
    MissingCredential {
        feature: &'static str,
        env_var: String,
    },

    /// A setting has a value the engine cannot work with.
    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Resolve a credential from an explicit value or a named environment variable.
///
/// Empty strings count as absent in both places.
fn resolve_key(explicit: Option<&str>, env_var: Option<&str>) -> Option<String> {
    if let Some(key) = explicit.filter(|k| !k.trim().is_empty()) {
        return Some(key.to_string());
    }
    env_var
        .and_then(|name| std::env::var(name).ok())
        .filter(|k| !k.trim().is_empty())
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Connection settings for the OpenAI-compatible chat completions endpoint
/// that backs every pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL up to (not including) `/chat/completions`.
    ///
    /// - Gemini (default): `https://generativelanguage.googleapis.com/v1beta/openai`
    /// - Ollama: `http://localhost:11434/v1`
    pub base_url: String,
    /// Explicit API key; takes precedence over `api_key_env`.
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: Option<String>,
    /// When `true`, a missing key disables the pipeline at start-up.
    pub require_api_key: bool,
    /// Model identifier sent to the API.
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f32,
    /// Upper bound on generated tokens per stage call.
    pub max_tokens: u32,
    /// HTTP-level timeout for a single completion request.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".into(),
            api_key: None,
            api_key_env: Some("GEMINI_API_KEY".into()),
            require_api_key: true,
            model: "gemini-2.0-flash".into(),
            temperature: 0.4,
            max_tokens: 1024,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// The API key to send, if any.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), self.api_key_env.as_deref())
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Agent pipeline layout and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ordered stage names.  Known names get built-in instructions; unknown
    /// names get a generic pass-through instruction.
    pub stages: Vec<String>,
    /// Seconds a single stage may run before the whole turn is aborted.
    pub stage_timeout_secs: u64,
    /// Number of previous exchanges each stage remembers.
    pub stage_memory_turns: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stages: vec![
                "cook_recipe".into(),
                "notes_making".into(),
                "final_answer".into(),
            ],
            stage_timeout_secs: 90,
            stage_memory_turns: 4,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Bounds applied to the per-conversation session.
///
/// The retention thresholds were tuned by hand; they are settings rather
/// than invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Initial value of the per-session memory toggle.
    pub memory_active: bool,
    /// History length that triggers an overflow cleanup.
    pub max_history: usize,
    /// Entries kept after an overflow cleanup.
    pub retain_on_overflow: usize,
    /// Entries kept after a topic change.
    pub retain_on_topic_change: usize,
    /// Most recent notes included in the context window.
    pub context_notes: usize,
    /// Most recent exchanges included in the context window.
    pub context_exchanges: usize,
    /// Answers longer than this are cut in the context window.
    pub answer_preview_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            memory_active: true,
            max_history: 50,
            retain_on_overflow: 25,
            retain_on_topic_change: 2,
            context_notes: 5,
            context_exchanges: 3,
            answer_preview_chars: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// Speech
// ---------------------------------------------------------------------------

/// The interchangeable speech backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechProviderKind {
    /// Any OpenAI-compatible `/audio/speech` endpoint.
    OpenAi,
    /// fal.ai hosted Kokoro.
    Fal,
}

impl SpeechProviderKind {
    /// The provider tried when this one fails.
    pub fn other(self) -> Self {
        match self {
            Self::OpenAi => Self::Fal,
            Self::Fal => Self::OpenAi,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI TTS",
            Self::Fal => "fal.ai",
        }
    }

    /// Parse a user-typed provider name (`openai`, `open_ai`, `fal`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" | "open_ai" | "open-ai" => Some(Self::OpenAi),
            "fal" | "fal.ai" | "falai" => Some(Self::Fal),
            _ => None,
        }
    }
}

impl Default for SpeechProviderKind {
    fn default() -> Self {
        Self::OpenAi
    }
}

/// Settings for the OpenAI-compatible speech provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSpeechConfig {
    /// Base URL up to (not including) `/audio/speech`.
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
    /// Local servers usually need no key.
    pub require_api_key: bool,
    pub model: String,
    /// Voice used when the session voice is not an OpenAI voice.
    pub voice: String,
    /// Sanitised text is cut to this many characters.
    pub max_chars: usize,
}

impl Default for OpenAiSpeechConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            api_key_env: Some("OPENAI_API_KEY".into()),
            require_api_key: true,
            model: "tts-1".into(),
            voice: "alloy".into(),
            max_chars: 1000,
        }
    }
}

impl OpenAiSpeechConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), self.api_key_env.as_deref())
    }
}

/// Settings for the fal.ai speech provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FalSpeechConfig {
    /// Synchronous model endpoint.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
    /// Voice used when the session voice is not a Kokoro voice.
    pub voice: String,
    /// fal.ai is stricter, hence the shorter cap.
    pub max_chars: usize,
}

impl Default for FalSpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://fal.run/fal-ai/kokoro/american-english".into(),
            api_key: None,
            api_key_env: Some("FAL_KEY".into()),
            voice: "af_heart".into(),
            max_chars: 500,
        }
    }
}

impl FalSpeechConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), self.api_key_env.as_deref())
    }
}

/// Text-to-speech settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Initial value of the per-session TTS toggle.
    pub enabled: bool,
    /// Provider tried first.
    pub provider: SpeechProviderKind,
    /// Initial voice for new sessions.
    pub voice: String,
    /// Per-attempt timeout; a timed-out attempt counts as a failure.
    pub timeout_secs: u64,
    pub open_ai: OpenAiSpeechConfig,
    pub fal: FalSpeechConfig,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: SpeechProviderKind::default(),
            voice: "alloy".into(),
            timeout_secs: 30,
            open_ai: OpenAiSpeechConfig::default(),
            fal: FalSpeechConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Chat completions endpoint shared by all stages.
    pub llm: LlmConfig,
    /// Stage order and limits.
    pub pipeline: PipelineConfig,
    /// History / notes bounds.
    pub session: SessionConfig,
    /// Text-to-speech.
    pub speech: SpeechConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Check everything the agent pipeline needs before the first turn.
    pub fn validate_pipeline(&self) -> Result<(), ConfigError> {
        if self.pipeline.stages.is_empty() {
            return Err(ConfigError::Invalid {
                key: "pipeline.stages",
                reason: "at least one stage is required".into(),
            });
        }
        if self.pipeline.stage_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "pipeline.stage_timeout_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.llm.require_api_key && self.llm.resolve_api_key().is_none() {
            return Err(ConfigError::MissingCredential {
                feature: "the agent pipeline",
                env_var: self
                    .llm
                    .api_key_env
                    .clone()
                    .unwrap_or_else(|| "llm.api_key".into()),
            });
        }
        Ok(())
    }

    /// Check one speech provider's credentials.
    pub fn validate_speech_provider(&self, kind: SpeechProviderKind) -> Result<(), ConfigError> {
        match kind {
            SpeechProviderKind::OpenAi => {
                let cfg = &self.speech.open_ai;
                if cfg.require_api_key && cfg.resolve_api_key().is_none() {
                    return Err(ConfigError::MissingCredential {
                        feature: "OpenAI text-to-speech",
                        env_var: cfg
                            .api_key_env
                            .clone()
                            .unwrap_or_else(|| "speech.open_ai.api_key".into()),
                    });
                }
            }
            SpeechProviderKind::Fal => {
                let cfg = &self.speech.fal;
                if cfg.resolve_api_key().is_none() {
                    return Err(ConfigError::MissingCredential {
                        feature: "fal.ai text-to-speech",
                        env_var: cfg
                            .api_key_env
                            .clone()
                            .unwrap_or_else(|| "speech.fal.api_key".into()),
                    });
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// An environment variable name that no test machine defines.
    const UNSET_ENV: &str = "COOKING_ASSISTANT_TEST_UNSET_KEY_7F3A";

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.llm.base_url, loaded.llm.base_url);
        assert_eq!(original.llm.model, loaded.llm.model);
        assert_eq!(original.llm.api_key_env, loaded.llm.api_key_env);
        assert_eq!(original.pipeline.stages, loaded.pipeline.stages);
        assert_eq!(
            original.pipeline.stage_timeout_secs,
            loaded.pipeline.stage_timeout_secs
        );
        assert_eq!(original.session.max_history, loaded.session.max_history);
        assert_eq!(
            original.session.retain_on_topic_change,
            loaded.session.retain_on_topic_change
        );
        assert_eq!(original.speech.provider, loaded.speech.provider);
        assert_eq!(original.speech.fal.max_chars, loaded.speech.fal.max_chars);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.llm.model, AppConfig::default().llm.model);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[session]\nmax_history = 10\n\n[speech]\nprovider = \"fal\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).expect("load");
        assert_eq!(config.session.max_history, 10);
        assert_eq!(config.session.retain_on_overflow, 25);
        assert_eq!(config.speech.provider, SpeechProviderKind::Fal);
        assert_eq!(config.pipeline.stages.len(), 3);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.llm.model, "gemini-2.0-flash");
        assert_eq!(cfg.llm.api_key_env.as_deref(), Some("GEMINI_API_KEY"));
        assert_eq!(
            cfg.pipeline.stages,
            vec!["cook_recipe", "notes_making", "final_answer"]
        );
        assert!(cfg.session.memory_active);
        assert_eq!(cfg.session.max_history, 50);
        assert_eq!(cfg.session.retain_on_overflow, 25);
        assert_eq!(cfg.session.retain_on_topic_change, 2);
        assert_eq!(cfg.session.context_notes, 5);
        assert_eq!(cfg.session.context_exchanges, 3);
        assert!(!cfg.speech.enabled);
        assert_eq!(cfg.speech.open_ai.max_chars, 1000);
        assert_eq!(cfg.speech.fal.max_chars, 500);
    }

    #[test]
    fn explicit_key_wins_and_blank_is_absent() {
        let mut llm = LlmConfig::default();
        llm.api_key_env = Some(UNSET_ENV.into());

        llm.api_key = Some("  ".into());
        assert_eq!(llm.resolve_api_key(), None);

        llm.api_key = Some("sk-test".into());
        assert_eq!(llm.resolve_api_key().as_deref(), Some("sk-test"));
    }

    #[test]
    fn missing_llm_key_is_reported() {
        let mut cfg = AppConfig::default();
        cfg.llm.api_key = None;
        cfg.llm.api_key_env = Some(UNSET_ENV.into());

        let err = cfg.validate_pipeline().unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingCredential {
                feature: "the agent pipeline",
                env_var: UNSET_ENV.into(),
            }
        );
        assert!(err.to_string().contains(UNSET_ENV));
    }

    #[test]
    fn local_llm_without_key_validates() {
        let mut cfg = AppConfig::default();
        cfg.llm.base_url = "http://localhost:11434/v1".into();
        cfg.llm.require_api_key = false;
        cfg.llm.api_key_env = Some(UNSET_ENV.into());

        assert!(cfg.validate_pipeline().is_ok());
    }

    #[test]
    fn empty_stage_list_is_invalid() {
        let mut cfg = AppConfig::default();
        cfg.llm.api_key = Some("k".into());
        cfg.pipeline.stages.clear();

        assert!(matches!(
            cfg.validate_pipeline(),
            Err(ConfigError::Invalid { key: "pipeline.stages", .. })
        ));
    }

    #[test]
    fn speech_provider_validation() {
        let mut cfg = AppConfig::default();
        cfg.speech.fal.api_key = None;
        cfg.speech.fal.api_key_env = Some(UNSET_ENV.into());
        cfg.speech.open_ai.require_api_key = false;

        assert!(cfg.validate_speech_provider(SpeechProviderKind::OpenAi).is_ok());
        assert!(matches!(
            cfg.validate_speech_provider(SpeechProviderKind::Fal),
            Err(ConfigError::MissingCredential { .. })
        ));

        cfg.speech.fal.api_key = Some("fal-key".into());
        assert!(cfg.validate_speech_provider(SpeechProviderKind::Fal).is_ok());
    }

    #[test]
    fn provider_kind_helpers() {
        assert_eq!(SpeechProviderKind::OpenAi.other(), SpeechProviderKind::Fal);
        assert_eq!(SpeechProviderKind::Fal.other(), SpeechProviderKind::OpenAi);
        assert_eq!(
            SpeechProviderKind::from_name("OpenAI"),
            Some(SpeechProviderKind::OpenAi)
        );
        assert_eq!(
            SpeechProviderKind::from_name("fal"),
            Some(SpeechProviderKind::Fal)
        );
        assert_eq!(SpeechProviderKind::from_name("edge"), None);
    }
}
