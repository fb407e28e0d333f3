//! Markdown-to-speech text cleanup.

use std::sync::LazyLock;

use regex::Regex;

static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[*#`]").expect("invalid regex"));
static NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n+").expect("invalid regex"));

/// Prepare `text` for a speech provider.
///
/// Removes `*`, `#` and backticks, replaces each run of newlines with one
/// space, trims, then cuts to `max_chars` characters (appending `...` when
/// anything was cut).  Returns an empty string when nothing speakable is left.
pub fn sanitize_for_speech(text: &str, max_chars: usize) -> String {
    let unmarked = MARKUP.replace_all(text, "");
    let joined = NEWLINES.replace_all(&unmarked, " ");
    let trimmed = joined.trim();

    if trimmed.chars().count() > max_chars {
        let mut cut: String = trimmed.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    } else {
        trimmed.to_string()
    }
}
