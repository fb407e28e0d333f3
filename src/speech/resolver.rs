//! Speech resolver: preferred provider first, the other one once on failure.
//!
//! [`SpeechResolver`] never returns an error.  Any failure of the preferred
//! provider (HTTP error, empty audio, timeout) triggers exactly one attempt
//! on the other provider; when that fails too the caller gets
//! [`TtsResult::Failed`] and carries on with the text answer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, SpeechProviderKind};
use crate::speech::provider::{FalSpeech, OpenAiSpeech, SpeechError, SpeechProvider};
use crate::speech::sanitize::sanitize_for_speech;

// ---------------------------------------------------------------------------
// TtsResult
// ---------------------------------------------------------------------------

/// Outcome of one synthesis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TtsResult {
    /// Encoded audio and the provider that produced it.
    Audio {
        bytes: Vec<u8>,
        provider: SpeechProviderKind,
    },
    /// Nothing speakable after sanitising.
    Skipped,
    /// Every available provider failed.
    Failed { reason: String },
}

impl TtsResult {
    pub fn audio(&self) -> Option<&[u8]> {
        match self {
            TtsResult::Audio { bytes, .. } => Some(bytes),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechResolver
// ---------------------------------------------------------------------------

/// Holds the configured providers and the per-attempt timeout.
pub struct SpeechResolver {
    providers: HashMap<SpeechProviderKind, Arc<dyn SpeechProvider>>,
    timeout: Duration,
}

impl SpeechResolver {
    pub fn new(timeout: Duration) -> Self {
        Self {
            providers: HashMap::new(),
            timeout,
        }
    }

    /// Register `provider` under its own kind, replacing any previous one.
    pub fn with_provider(mut self, provider: Arc<dyn SpeechProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    /// Build from config, leaving out providers whose credentials are missing.
    ///
    /// Returns `None` when no provider is usable.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let speech = &config.speech;
        let mut resolver = Self::new(Duration::from_secs(speech.timeout_secs));

        for kind in [SpeechProviderKind::OpenAi, SpeechProviderKind::Fal] {
            if let Err(e) = config.validate_speech_provider(kind) {
                log::warn!("{} disabled: {e}", kind.label());
                continue;
            }
            let provider: Arc<dyn SpeechProvider> = match kind {
                SpeechProviderKind::OpenAi => Arc::new(OpenAiSpeech::from_config(
                    &speech.open_ai,
                    speech.timeout_secs,
                )),
                SpeechProviderKind::Fal => {
                    Arc::new(FalSpeech::from_config(&speech.fal, speech.timeout_secs))
                }
            };
            resolver = resolver.with_provider(provider);
        }

        if resolver.providers.is_empty() {
            None
        } else {
            Some(resolver)
        }
    }

    pub fn has_provider(&self, kind: SpeechProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// Speak `text`, trying `preferred` then the other provider.
    pub async fn synthesize(
        &self,
        text: &str,
        preferred: SpeechProviderKind,
        voice: &str,
    ) -> TtsResult {
        if sanitize_for_speech(text, usize::MAX).is_empty() {
            log::debug!("tts: nothing speakable, skipping");
            return TtsResult::Skipped;
        }

        let mut failures = Vec::new();
        for kind in [preferred, preferred.other()] {
            let Some(provider) = self.providers.get(&kind) else {
                log::debug!("tts: {} not configured, skipping", kind.label());
                continue;
            };

            let clean = sanitize_for_speech(text, provider.max_chars());
            match self.attempt(provider.as_ref(), &clean, voice).await {
                Ok(bytes) => {
                    log::debug!("tts: {} produced {} bytes", kind.label(), bytes.len());
                    return TtsResult::Audio {
                        bytes,
                        provider: kind,
                    };
                }
                Err(e) => {
                    log::warn!("tts: {} failed: {e}", kind.label());
                    failures.push(format!("{}: {e}", kind.label()));
                }
            }
        }

        let reason = if failures.is_empty() {
            "no speech provider is configured".to_string()
        } else {
            failures.join("; ")
        };
        TtsResult::Failed { reason }
    }

    async fn attempt(
        &self,
        provider: &dyn SpeechProvider,
        text: &str,
        voice: &str,
    ) -> Result<Vec<u8>, SpeechError> {
        match tokio::time::timeout(self.timeout, provider.synthesize(text, voice)).await {
            Ok(Ok(bytes)) if bytes.is_empty() => Err(SpeechError::EmptyAudio),
            Ok(result) => result,
            Err(_) => Err(SpeechError::Timeout),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
