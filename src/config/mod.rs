//! Configuration module for the cooking assistant.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for cross-platform data directories, TOML persistence via
//! `AppConfig::load` / `AppConfig::save`, and start-up credential validation.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, ConfigError, FalSpeechConfig, LlmConfig, OpenAiSpeechConfig, PipelineConfig,
    SessionConfig, SpeechConfig, SpeechProviderKind,
};
