//! Known voices per speech provider.
//!
//! Used by the terminal front-end to list and validate `/voice` choices and by
//! [`FalSpeech`](super::FalSpeech) to map foreign voice names onto its default.

use crate::config::SpeechProviderKind;

// ---------------------------------------------------------------------------
// Static catalogue
// ---------------------------------------------------------------------------

/// A selectable voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voice {
    /// Identifier sent to the provider.
    pub id: &'static str,
    /// Human-readable label.
    pub label: &'static str,
}

static OPENAI_VOICES: &[Voice] = &[
    Voice { id: "alloy", label: "Alloy (neutral)" },
    Voice { id: "ash", label: "Ash (male)" },
    Voice { id: "coral", label: "Coral (female)" },
    Voice { id: "echo", label: "Echo (male)" },
    Voice { id: "fable", label: "Fable (British)" },
    Voice { id: "nova", label: "Nova (female)" },
    Voice { id: "onyx", label: "Onyx (deep male)" },
    Voice { id: "sage", label: "Sage (female)" },
    Voice { id: "shimmer", label: "Shimmer (female)" },
];

static KOKORO_VOICES: &[Voice] = &[
    Voice { id: "af_heart", label: "Heart (US female)" },
    Voice { id: "af_bella", label: "Bella (US female)" },
    Voice { id: "af_nicole", label: "Nicole (US female)" },
    Voice { id: "af_sarah", label: "Sarah (US female)" },
    Voice { id: "af_sky", label: "Sky (US female)" },
    Voice { id: "am_adam", label: "Adam (US male)" },
    Voice { id: "am_michael", label: "Michael (US male)" },
    Voice { id: "am_eric", label: "Eric (US male)" },
    Voice { id: "am_liam", label: "Liam (US male)" },
];

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// All voices offered by `kind`.
pub fn voices_for(kind: SpeechProviderKind) -> &'static [Voice] {
    match kind {
        SpeechProviderKind::OpenAi => OPENAI_VOICES,
        SpeechProviderKind::Fal => KOKORO_VOICES,
    }
}

pub fn is_known(kind: SpeechProviderKind, id: &str) -> bool {
    voices_for(kind).iter().any(|v| v.id == id)
}

/// Provider that owns voice `id`, if any.
pub fn provider_of(id: &str) -> Option<SpeechProviderKind> {
    [SpeechProviderKind::OpenAi, SpeechProviderKind::Fal]
        .into_iter()
        .find(|&kind| is_known(kind, id))
}
