//! Classify raw pipeline output as a structured recipe step or free text.
//!
//! The final stage is asked for a ```` ```json ```` block, but models drift:
//! sometimes the JSON is bare, sometimes wrapped in prose, sometimes in an
//! untagged fence.  [`ResponseParser::parse`] tries four strategies in order
//! and takes the first one whose JSON carries a `cook_recipe` field:
//!
//! 1. the first ```` ```json ```` fenced object,
//! 2. the whole trimmed text when it starts with `{`,
//! 3. the first balanced `{…}` anywhere (see [`first_balanced_object`]),
//! 4. every fenced object, tagged or not, in order.
//!
//! Nothing here ever fails: unparseable output is [`ParsedResponse::Freeform`].

use regex::Regex;
use serde_json::Value;

use crate::response::scan::first_balanced_object;

/// Field holding the recipe step or answer.
pub const RECIPE_FIELD: &str = "cook_recipe";
/// Field holding the running note.
pub const NOTES_FIELD: &str = "notes_making";

// ---------------------------------------------------------------------------
// ParsedResponse
// ---------------------------------------------------------------------------

/// Result of classifying one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse {
    /// The output carried a recipe payload.
    Structured {
        recipe_text: String,
        notes_text: Option<String>,
        /// The untouched pipeline output.
        raw: String,
    },
    /// Anything else, unchanged.
    Freeform { text: String },
}

impl ParsedResponse {
    pub fn is_structured(&self) -> bool {
        matches!(self, ParsedResponse::Structured { .. })
    }

    /// The raw pipeline output, whichever the variant.
    pub fn raw(&self) -> &str {
        match self {
            ParsedResponse::Structured { raw, .. } => raw,
            ParsedResponse::Freeform { text } => text,
        }
    }

    /// Text suitable for speaking: the recipe step, or the free text.
    pub fn speakable_text(&self) -> &str {
        match self {
            ParsedResponse::Structured { recipe_text, .. } => recipe_text,
            ParsedResponse::Freeform { text } => text,
        }
    }
}

// ---------------------------------------------------------------------------
// ResponseParser
// ---------------------------------------------------------------------------

/// Compiled patterns for response classification.
///
/// # Example
/// ```rust
/// use cooking_assistant::response::{ParsedResponse, ResponseParser};
///
/// let parser = ResponseParser::new();
/// let parsed = parser.parse("```json\n{\"cook_recipe\": \"Step 1: boil\"}\n```");
/// assert!(parsed.is_structured());
/// assert_eq!(parser.extract_step(parsed.speakable_text()).as_deref(), Some("Step 1"));
/// ```
pub struct ResponseParser {
    tagged_block: Regex,
    any_block: Regex,
    step: Regex,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            tagged_block: Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("invalid regex"),
            any_block: Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("invalid regex"),
            step: Regex::new(r"Step (\d+)").expect("invalid regex"),
        }
    }

    /// Classify `raw`.
    pub fn parse(&self, raw: &str) -> ParsedResponse {
        let found = self
            .from_tagged_block(raw)
            .or_else(|| Self::from_whole_text(raw))
            .or_else(|| Self::from_scan(raw))
            .or_else(|| self.from_any_block(raw));

        match found {
            Some((recipe_text, notes_text)) => ParsedResponse::Structured {
                recipe_text,
                notes_text,
                raw: raw.to_string(),
            },
            None => {
                log::debug!("parser: no recipe payload found, treating as free text");
                ParsedResponse::Freeform {
                    text: raw.to_string(),
                }
            }
        }
    }

    /// First `Step N` label in `recipe_text`.
    pub fn extract_step(&self, recipe_text: &str) -> Option<String> {
        self.step
            .captures(recipe_text)
            .and_then(|c| c.get(1))
            .map(|n| format!("Step {}", n.as_str()))
    }

    /// Display form of a free-text answer: JSON that is not a recipe payload
    /// is pretty-printed, everything else is returned unchanged.
    pub fn display_text(&self, parsed: &ParsedResponse) -> String {
        let text = match parsed {
            ParsedResponse::Structured { recipe_text, .. } => return recipe_text.clone(),
            ParsedResponse::Freeform { text } => text,
        };

        let trimmed = text.trim();
        if trimmed.starts_with('{') && trimmed.ends_with('}') {
            if let Some(pretty) = pretty_json(trimmed) {
                return pretty;
            }
        }

        if let Some(caps) = self.tagged_block.captures(text) {
            if let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) {
                if let Some(pretty) = pretty_json(body.as_str()) {
                    return text.replacen(whole.as_str(), &format!("```json\n{pretty}\n```"), 1);
                }
            }
        }

        text.clone()
    }

    // -----------------------------------------------------------------------
    // Strategies
    // -----------------------------------------------------------------------

    fn from_tagged_block(&self, raw: &str) -> Option<(String, Option<String>)> {
        let body = self.tagged_block.captures(raw)?.get(1)?.as_str();
        recipe_fields(body)
    }

    fn from_whole_text(raw: &str) -> Option<(String, Option<String>)> {
        let trimmed = raw.trim();
        if !trimmed.starts_with('{') {
            return None;
        }
        recipe_fields(trimmed)
    }

    fn from_scan(raw: &str) -> Option<(String, Option<String>)> {
        first_balanced_object(raw).and_then(recipe_fields)
    }

    fn from_any_block(&self, raw: &str) -> Option<(String, Option<String>)> {
        self.any_block
            .captures_iter(raw)
            .filter_map(|c| c.get(1))
            .find_map(|body| recipe_fields(body.as_str()))
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse `json` and pull out `(cook_recipe, notes_making)`.
///
/// `None` when the text is not JSON or has no recipe field.
fn recipe_fields(json: &str) -> Option<(String, Option<String>)> {
    let value: Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            log::debug!("parser: candidate rejected: {e}");
            return None;
        }
    };

    let recipe = value.get(RECIPE_FIELD).filter(|v| !v.is_null())?;
    let notes = value
        .get(NOTES_FIELD)
        .filter(|v| !v.is_null())
        .map(field_text);

    Some((field_text(recipe), notes))
}

/// Strings as-is, anything else as compact JSON.
fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn pretty_json(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    serde_json::to_string_pretty(&value).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
