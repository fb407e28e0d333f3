//! Terminal chat front-end.
//!
//! # Architecture
//!
//! `main` reads stdin on a tokio task and forwards each line over an
//! `mpsc` channel.  [`ChatApp`] owns the [`DialogueEngine`] and the single
//! [`Session`] of the terminal user; every line is parsed into a
//! [`ChatCommand`] and answered with a [`Reply`] for `main` to print.
//!
//! # Commands
//!
//! | Input | Effect |
//! |-------|--------|
//! | any text | one conversational turn |
//! | `/done` `/next` `/repeat` | recipe navigation (only while a step is active) |
//! | `/reset` | clear the conversation and rebuild the pipeline |
//! | `/memory [on\|off]` | toggle topic tracking and context |
//! | `/tts [on\|off]` | toggle speaking answers |
//! | `/provider openai\|fal` | preferred speech provider |
//! | `/voice <id>` / `/voices` | pick / list voices |
//! | `/speak` | speak the last answer now |
//! | `/save` | keep the current toggles, provider and voice in `settings.toml` |
//! | `/status` | session summary |
//! | `/help` / `/quit` | |

use std::path::PathBuf;

use crate::config::{AppPaths, SpeechProviderKind};
use crate::dialogue::{DialogueEngine, TurnOutcome, TurnResponse};
use crate::session::{Session, SessionSummary};
use crate::speech::{voices, TtsResult};

// ---------------------------------------------------------------------------
// ChatCommand
// ---------------------------------------------------------------------------

/// Recipe navigation shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Done,
    Next,
    Repeat,
}

impl Navigation {
    /// Message sent as the turn.
    pub fn message(self) -> &'static str {
        match self {
            Navigation::Done => "done",
            Navigation::Next => "next",
            Navigation::Repeat => "repeat this step",
        }
    }
}

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Say(String),
    Navigate(Navigation),
    Reset,
    /// `None` flips the current value.
    Memory(Option<bool>),
    /// `None` flips the current value.
    Tts(Option<bool>),
    Provider(SpeechProviderKind),
    Voice(String),
    Voices,
    Speak,
    Save,
    Status,
    Help,
    Quit,
    /// Malformed command; the payload is shown to the user.
    Invalid(String),
}

impl ChatCommand {
    /// Parse a line of input.  Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let Some(rest) = line.strip_prefix('/') else {
            return Some(ChatCommand::Say(line.to_string()));
        };

        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        let cmd = match (name.as_str(), arg) {
            ("done", None) => ChatCommand::Navigate(Navigation::Done),
            ("next", None) => ChatCommand::Navigate(Navigation::Next),
            ("repeat", None) => ChatCommand::Navigate(Navigation::Repeat),
            ("reset", None) => ChatCommand::Reset,
            ("memory", arg) => match parse_toggle(arg) {
                Ok(v) => ChatCommand::Memory(v),
                Err(msg) => ChatCommand::Invalid(msg),
            },
            ("tts", arg) => match parse_toggle(arg) {
                Ok(v) => ChatCommand::Tts(v),
                Err(msg) => ChatCommand::Invalid(msg),
            },
            ("provider", Some(name)) => match SpeechProviderKind::from_name(name) {
                Some(kind) => ChatCommand::Provider(kind),
                None => ChatCommand::Invalid(format!("unknown provider `{name}` (use openai or fal)")),
            },
            ("voice", Some(id)) => ChatCommand::Voice(id.to_string()),
            ("voices", None) => ChatCommand::Voices,
            ("speak", None) => ChatCommand::Speak,
            ("save", None) => ChatCommand::Save,
            ("status", None) => ChatCommand::Status,
            ("help", None) => ChatCommand::Help,
            ("quit" | "exit", None) => ChatCommand::Quit,
            _ => ChatCommand::Invalid(format!("unknown command `{line}` (try /help)")),
        };
        Some(cmd)
    }
}

fn parse_toggle(arg: Option<&str>) -> Result<Option<bool>, String> {
    match arg.map(str::to_lowercase).as_deref() {
        None => Ok(None),
        Some("on") => Ok(Some(true)),
        Some("off") => Ok(Some(false)),
        Some(other) => Err(format!("expected on or off, got `{other}`")),
    }
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// Lines to print, and whether to stop afterwards.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Reply {
    pub lines: Vec<String>,
    pub quit: bool,
}

impl Reply {
    fn line(text: impl Into<String>) -> Self {
        Self {
            lines: vec![text.into()],
            quit: false,
        }
    }
}

pub const HELP: &str = "\
Type a question to chat, e.g. \"I want a pasta recipe\".
  /done /next /repeat    move through the current recipe
  /reset                 start over
  /memory [on|off]       topic tracking and context
  /tts [on|off]          speak answers
  /provider openai|fal   preferred speech provider
  /voice <id>, /voices   choose a voice
  /speak                 speak the last answer
  /save                  keep these preferences for next time
  /status                session summary
  /quit                  leave";

// ---------------------------------------------------------------------------
// ChatApp
// ---------------------------------------------------------------------------

/// The terminal user's conversation.
pub struct ChatApp {
    engine: DialogueEngine,
    session: Session,
    settings_file: PathBuf,
    audio_dir: PathBuf,
    audio_seq: usize,
}

impl ChatApp {
    pub fn new(engine: DialogueEngine, paths: AppPaths) -> Self {
        let session = engine.new_session();
        Self {
            engine,
            session,
            settings_file: paths.settings_file,
            audio_dir: paths.audio_dir,
            audio_seq: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Start-up notices about disabled features.
    pub fn banner(&self) -> Vec<String> {
        let mut lines = vec!["Cooking assistant ready. /help lists commands.".to_string()];
        if let Some(issue) = self.engine.pipeline_issue() {
            lines.push(format!("warning: {issue}"));
        }
        if !self.engine.speech_available() {
            lines.push("warning: text-to-speech is unavailable".to_string());
        }
        lines
    }

    pub async fn handle(&mut self, command: ChatCommand) -> Reply {
        match command {
            ChatCommand::Say(text) => self.turn(&text).await,
            ChatCommand::Navigate(nav) => {
                if self.session.state().current_step().is_none() {
                    return Reply::line("No recipe step in progress. Ask for a recipe first.");
                }
                self.turn(nav.message()).await
            }
            ChatCommand::Reset => {
                self.engine.reset_session(&mut self.session);
                Reply::line("Session reset.")
            }
            ChatCommand::Memory(value) => {
                let prefs = self.session.preferences_mut();
                prefs.memory_active = value.unwrap_or(!prefs.memory_active);
                Reply::line(format!("Memory {}.", on_off(prefs.memory_active)))
            }
            ChatCommand::Tts(value) => {
                let prefs = self.session.preferences_mut();
                prefs.tts_enabled = value.unwrap_or(!prefs.tts_enabled);
                Reply::line(format!("Speech {}.", on_off(prefs.tts_enabled)))
            }
            ChatCommand::Provider(kind) => {
                self.session.preferences_mut().speech_provider = kind;
                Reply::line(format!("Preferred speech provider: {}.", kind.label()))
            }
            ChatCommand::Voice(id) => self.set_voice(&id),
            ChatCommand::Voices => self.list_voices(),
            ChatCommand::Speak => self.speak_last().await,
            ChatCommand::Save => self.save_preferences(),
            ChatCommand::Status => Reply {
                lines: render_summary(&self.session.summary()),
                quit: false,
            },
            ChatCommand::Help => Reply::line(HELP),
            ChatCommand::Quit => Reply {
                lines: vec!["Happy cooking!".to_string()],
                quit: true,
            },
            ChatCommand::Invalid(msg) => Reply::line(msg),
        }
    }

    async fn turn(&mut self, text: &str) -> Reply {
        match self.engine.handle_turn(&mut self.session, text).await {
            Ok(outcome) => {
                let mut lines = render_outcome(&outcome);
                if let Some(audio) = &outcome.audio {
                    lines.push(self.save_audio(&audio.bytes).await);
                }
                Reply { lines, quit: false }
            }
            Err(e) => Reply::line(e.to_string()),
        }
    }

    fn set_voice(&mut self, id: &str) -> Reply {
        match voices::provider_of(id) {
            Some(kind) => {
                let prefs = self.session.preferences_mut();
                prefs.voice = id.to_string();
                prefs.speech_provider = kind;
                Reply::line(format!("Voice set to {id} ({}).", kind.label()))
            }
            None => Reply::line(format!("Unknown voice `{id}`. /voices lists them.")),
        }
    }

    fn list_voices(&self) -> Reply {
        let prefs = &self.session.state().preferences;
        let mut lines = vec![format!("{} voices:", prefs.speech_provider.label())];
        for v in voices::voices_for(prefs.speech_provider) {
            let marker = if v.id == prefs.voice { "*" } else { " " };
            lines.push(format!(" {marker} {:<12} {}", v.id, v.label));
        }
        Reply { lines, quit: false }
    }

    fn save_preferences(&self) -> Reply {
        let mut config = self.engine.config().clone();
        self.session.state().preferences.apply_to(&mut config);
        match config.save_to(&self.settings_file) {
            Ok(()) => Reply::line(format!(
                "Preferences saved to {}.",
                self.settings_file.display()
            )),
            Err(e) => {
                log::warn!("could not save settings: {e:#}");
                Reply::line(format!("Could not save preferences: {e}"))
            }
        }
    }

    async fn speak_last(&mut self) -> Reply {
        let Some(answer) = self.session.state().last_answer().map(str::to_string) else {
            return Reply::line("Nothing to speak yet.");
        };
        // Recipe answers are stored raw; speak the step, not the JSON.
        let text = crate::response::ResponseParser::new()
            .parse(&answer)
            .speakable_text()
            .to_string();

        match self.engine.speak(&self.session, &text).await {
            TtsResult::Audio { bytes, .. } => Reply::line(self.save_audio(&bytes).await),
            TtsResult::Skipped => Reply::line("Nothing to speak."),
            TtsResult::Failed { reason } => Reply::line(format!("Speech unavailable: {reason}")),
        }
    }

    /// Write `bytes` under the audio directory and describe where.
    async fn save_audio(&mut self, bytes: &[u8]) -> String {
        self.audio_seq += 1;
        let path = self.audio_dir.join(format!("answer-{:04}.mp3", self.audio_seq));

        let written = async {
            tokio::fs::create_dir_all(&self.audio_dir).await?;
            tokio::fs::write(&path, bytes).await
        }
        .await;

        match written {
            Ok(()) => format!("[audio saved to {}]", path.display()),
            Err(e) => {
                log::warn!("could not save audio to {}: {e}", path.display());
                format!("[audio could not be saved: {e}]")
            }
        }
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Lines describing one turn.
pub fn render_outcome(outcome: &TurnOutcome) -> Vec<String> {
    let mut lines = Vec::new();

    if let crate::topic::TopicDecision::TopicChanged { old, new } = &outcome.topic {
        lines.push(format!("(switched topic from {old} to {new})"));
    }

    match &outcome.response {
        TurnResponse::Structured {
            recipe_text, step, ..
        } => {
            if let Some(step) = step {
                lines.push(format!("[{step}]"));
            }
            lines.push(recipe_text.clone());
        }
        TurnResponse::Freeform { text } => lines.push(text.clone()),
        TurnResponse::Failed { message } => lines.push(message.clone()),
    }

    if let Some(warning) = &outcome.speech_warning {
        lines.push(format!("({warning})"));
    }
    lines
}

/// Lines for `/status`.
pub fn render_summary(summary: &SessionSummary) -> Vec<String> {
    let mut lines = vec![
        format!("Messages: {}", summary.messages),
        format!("Notes:    {}", summary.notes),
        format!("Topic:    {}", summary.topic.as_deref().unwrap_or("none")),
        format!("Step:     {}", summary.step.as_deref().unwrap_or("none")),
        format!(
            "Memory {}, speech {}, pipeline {}",
            on_off(summary.memory_active),
            on_off(summary.tts_enabled),
            if summary.pipeline_ready { "ready" } else { "unavailable" }
        ),
    ];
    if !summary.recent_notes.is_empty() {
        lines.push("Recent notes:".to_string());
        lines.extend(summary.recent_notes.iter().map(|n| format!("  - {n}")));
    }
    lines
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
