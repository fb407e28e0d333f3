//! Text-to-speech for answers.
//!
//! Two interchangeable providers sit behind [`SpeechProvider`];
//! [`SpeechResolver`] picks the session's preferred one and falls back to
//! the other exactly once.

pub mod provider;
pub mod resolver;
pub mod sanitize;
pub mod voices;

pub use provider::{FalSpeech, OpenAiSpeech, SpeechError, SpeechProvider};
pub use resolver::{SpeechResolver, TtsResult};
pub use sanitize::sanitize_for_speech;
pub use voices::Voice;
