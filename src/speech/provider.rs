//! `SpeechProvider` trait and the two HTTP-backed implementations.
//!
//! * [`OpenAiSpeech`] posts to any OpenAI-compatible `/audio/speech`
//!   endpoint and receives audio bytes directly.
//! * [`FalSpeech`] posts to a fal.ai model endpoint, receives a JSON document
//!   pointing at the generated audio, then downloads it.
//!
//! Both take already-sanitised text; see [`sanitize_for_speech`](super::sanitize_for_speech).

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{FalSpeechConfig, OpenAiSpeechConfig, SpeechProviderKind};

// ---------------------------------------------------------------------------
// SpeechError
// ---------------------------------------------------------------------------

/// Errors from a single synthesis attempt.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("speech endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("speech request timed out")]
    Timeout,

    #[error("unexpected speech response: {0}")]
    Parse(String),

    #[error("speech provider returned no audio")]
    EmptyAudio,
}

impl From<reqwest::Error> for SpeechError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SpeechError::Timeout
        } else {
            SpeechError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechProvider trait
// ---------------------------------------------------------------------------

/// One text-to-speech backend.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    fn kind(&self) -> SpeechProviderKind;

    /// Longest text (in characters) this provider is sent.
    fn max_chars(&self) -> usize;

    /// Render `text` with `voice` and return the encoded audio.
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, SpeechError>;
}

fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, SpeechError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SpeechError::Status {
        status: status.as_u16(),
        body: body.chars().take(200).collect(),
    })
}

// ---------------------------------------------------------------------------
// OpenAiSpeech
// ---------------------------------------------------------------------------

/// OpenAI-compatible `/audio/speech` backend.
pub struct OpenAiSpeech {
    client: reqwest::Client,
    config: OpenAiSpeechConfig,
    api_key: Option<String>,
}

impl OpenAiSpeech {
    pub fn from_config(config: &OpenAiSpeechConfig, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            config: config.clone(),
            api_key: config.resolve_api_key(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/speech", self.config.base_url.trim_end_matches('/'))
    }

    /// A Kokoro voice reaches this provider when fal.ai was preferred and
    /// failed; OpenAI rejects voices it does not know.
    fn voice_for<'a>(&'a self, requested: &'a str) -> &'a str {
        if super::voices::is_known(SpeechProviderKind::OpenAi, requested) {
            requested
        } else {
            &self.config.voice
        }
    }
}

#[async_trait]
impl SpeechProvider for OpenAiSpeech {
    fn kind(&self) -> SpeechProviderKind {
        SpeechProviderKind::OpenAi
    }

    fn max_chars(&self) -> usize {
        self.config.max_chars
    }

    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, SpeechError> {
        let body = serde_json::json!({
            "model":           self.config.model,
            "input":           text,
            "voice":           self.voice_for(voice),
            "response_format": "mp3"
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = self.api_key.as_deref() {
            req = req.bearer_auth(key);
        }

        let response = ensure_success(req.send().await?).await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }
        Ok(bytes.to_vec())
    }
}

// ---------------------------------------------------------------------------
// FalSpeech
// ---------------------------------------------------------------------------

/// fal.ai Kokoro backend.
pub struct FalSpeech {
    client: reqwest::Client,
    config: FalSpeechConfig,
    api_key: Option<String>,
}

impl FalSpeech {
    pub fn from_config(config: &FalSpeechConfig, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            config: config.clone(),
            api_key: config.resolve_api_key(),
        }
    }

    /// Session voices are usually OpenAI names; Kokoro only knows its own.
    fn voice_for<'a>(&'a self, requested: &'a str) -> &'a str {
        if super::voices::is_known(SpeechProviderKind::Fal, requested) {
            requested
        } else {
            &self.config.voice
        }
    }
}

/// Pull the audio URL out of a fal.ai result document.
///
/// Accepts both `{"audio": {"url": …}}` and `{"audio_url": …}`.
pub(crate) fn audio_url(doc: &serde_json::Value) -> Option<&str> {
    doc.get("audio")
        .and_then(|a| a.get("url"))
        .and_then(|u| u.as_str())
        .or_else(|| doc.get("audio_url").and_then(|u| u.as_str()))
        .or_else(|| {
            doc.get("audio_url")
                .and_then(|a| a.get("url"))
                .and_then(|u| u.as_str())
        })
        .filter(|u| !u.is_empty())
}

#[async_trait]
impl SpeechProvider for FalSpeech {
    fn kind(&self) -> SpeechProviderKind {
        SpeechProviderKind::Fal
    }

    fn max_chars(&self) -> usize {
        self.config.max_chars
    }

    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, SpeechError> {
        let body = serde_json::json!({
            "text":  text,
            "voice": self.voice_for(voice)
        });

        let mut req = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = self.api_key.as_deref() {
            req = req.header("Authorization", format!("Key {key}"));
        }

        let response = ensure_success(req.send().await?).await?;
        let doc: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SpeechError::Parse(e.to_string()))?;

        let url = audio_url(&doc)
            .ok_or_else(|| SpeechError::Parse("no audio url in response".into()))?
            .to_string();
        log::debug!("fal.ai: downloading audio from {url}");

        let audio = ensure_success(self.client.get(&url).send().await?).await?;
        let bytes = audio.bytes().await?;
        if bytes.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }
        Ok(bytes.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
