//! Pattern-based cooking topic detection and topic-change decisions.
//!
//! [`TopicDetector`] scans a user query for recipe phrasing ("make X",
//! "how to cook X", "X recipe", "want X recipe") and returns a short topic
//! phrase.  Patterns are tried in declaration order and the first one that
//! matches decides the result, even if its capture turns out to be nothing
//! but stop-words.
//!
//! [`decide`] compares the detected topic with the session's current one and
//! yields a [`TopicDecision`] that the session applies.

use regex::Regex;

// ---------------------------------------------------------------------------
// Static pattern definitions
// ---------------------------------------------------------------------------

/// Ordered topic patterns; capture group 1 is the topic phrase.
static TOPIC_PATTERNS: &[&str] = &[
    r"\b(?:recipe|cook|make|prepare)\s+(?:for\s+)?(?:a\s+)?(\w+(?:\s+\w+)?)",
    r"\bhow to (?:make|cook|prepare)\s+(\w+(?:\s+\w+)?)",
    r"\b(\w+(?:\s+\w+)?)\s+recipe\b",
    r"\bwant\s+(?:a\s+)?(\w+(?:\s+\w+)?)\s+recipe\b",
];

/// Words dropped from a captured phrase.
static STOP_WORDS: &[&str] = &["the", "a", "an", "some", "good", "best", "easy", "quick"];

// ---------------------------------------------------------------------------
// TopicDetector
// ---------------------------------------------------------------------------

/// Extracts a cooking topic from free text.
///
/// # Example
/// ```rust
/// use cooking_assistant::topic::TopicDetector;
///
/// let detector = TopicDetector::new();
/// assert_eq!(detector.detect("How do I make banana bread?").as_deref(), Some("banana bread"));
/// assert_eq!(detector.detect("thanks!"), None);
/// ```
pub struct TopicDetector {
    patterns: Vec<Regex>,
}

impl TopicDetector {
    /// Compile the built-in patterns.
    pub fn new() -> Self {
        let patterns = TOPIC_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("invalid topic regex"))
            .collect();
        Self { patterns }
    }

    /// Return the topic phrase of `query`, or `None`.
    ///
    /// Only the first matching pattern is considered; a capture made only of
    /// stop-words yields `None`.
    pub fn detect(&self, query: &str) -> Option<String> {
        let lowered = query.to_lowercase();

        let capture = self
            .patterns
            .iter()
            .find_map(|re| re.captures(&lowered).and_then(|c| c.get(1)))?;

        let words: Vec<&str> = capture
            .as_str()
            .split_whitespace()
            .filter(|w| !STOP_WORDS.contains(w))
            .collect();

        if words.is_empty() {
            log::debug!("topic: capture {:?} was only stop-words", capture.as_str());
            return None;
        }

        Some(words.join(" "))
    }
}

impl Default for TopicDetector {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// TopicDecision
// ---------------------------------------------------------------------------

/// Outcome of comparing a detected topic with the session's current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicDecision {
    /// Nothing to do: no topic detected, or memory is off.
    NoTopic,
    /// Continuing (or establishing) `topic`; never truncates.
    SameTopic(String),
    /// The conversation moved from `old` to `new`.
    TopicChanged { old: String, new: String },
}

impl TopicDecision {
    pub fn is_change(&self) -> bool {
        matches!(self, TopicDecision::TopicChanged { .. })
    }

    /// The topic in effect after applying this decision, if it names one.
    pub fn topic(&self) -> Option<&str> {
        match self {
            TopicDecision::NoTopic => None,
            TopicDecision::SameTopic(t) => Some(t),
            TopicDecision::TopicChanged { new, .. } => Some(new),
        }
    }
}

/// Decide what a detected topic means for the session.
///
/// * memory inactive → `NoTopic`
/// * nothing detected → `NoTopic`
/// * no current topic → `SameTopic` (establishes it)
/// * same as current → `SameTopic`
/// * different from current → `TopicChanged`
pub fn decide(current: Option<&str>, detected: Option<&str>, memory_active: bool) -> TopicDecision {
    if !memory_active {
        return TopicDecision::NoTopic;
    }

    let Some(detected) = detected else {
        return TopicDecision::NoTopic;
    };

    match current.filter(|c| !c.is_empty()) {
        Some(current) if current != detected => TopicDecision::TopicChanged {
            old: current.to_string(),
            new: detected.to_string(),
        },
        _ => TopicDecision::SameTopic(detected.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(q: &str) -> Option<String> {
        TopicDetector::new().detect(q)
    }

    // ---- detect ---

    #[test]
    fn make_phrase() {
        assert_eq!(detect("Can you make lasagna?").as_deref(), Some("lasagna"));
    }

    #[test]
    fn recipe_for_strips_stop_words() {
        assert_eq!(
            detect("Give me a recipe for a good curry").as_deref(),
            Some("curry")
        );
    }

    #[test]
    fn how_to_is_caught_by_first_pattern() {
        // "make pad thai" matches pattern 1 before pattern 2 is consulted.
        assert_eq!(detect("How to make Pad Thai").as_deref(), Some("pad thai"));
    }

    #[test]
    fn recipe_suffix() {
        assert_eq!(
            detect("I want a chicken recipe").as_deref(),
            Some("chicken")
        );
    }

    #[test]
    fn first_matching_pattern_wins_over_later_ones() {
        // The "X recipe" pattern captures "want pasta"; the later
        // "want X recipe" pattern would have said "pasta".
        assert_eq!(detect("i want pasta recipe").as_deref(), Some("want pasta"));
    }

    #[test]
    fn stop_word_only_capture_is_no_topic() {
        assert_eq!(detect("a recipe"), None);
        assert_eq!(detect("the best recipe"), None);
    }

    #[test]
    fn unrelated_text_is_no_topic() {
        assert_eq!(detect("done"), None);
        assert_eq!(detect("next"), None);
        assert_eq!(detect(""), None);
    }

    #[test]
    fn detection_is_case_insensitive() {
        assert_eq!(detect("COOK RISOTTO").as_deref(), Some("risotto"));
    }

    // ---- decide ---

    #[test]
    fn memory_off_is_always_no_topic() {
        assert_eq!(
            decide(Some("curry"), Some("pasta"), false),
            TopicDecision::NoTopic
        );
        assert_eq!(decide(None, Some("pasta"), false), TopicDecision::NoTopic);
    }

    #[test]
    fn nothing_detected_is_no_topic() {
        assert_eq!(decide(Some("curry"), None, true), TopicDecision::NoTopic);
        assert_eq!(decide(None, None, true), TopicDecision::NoTopic);
    }

    #[test]
    fn first_topic_is_established_without_change() {
        let d = decide(None, Some("curry"), true);
        assert_eq!(d, TopicDecision::SameTopic("curry".into()));
        assert!(!d.is_change());

        assert_eq!(
            decide(Some(""), Some("curry"), true),
            TopicDecision::SameTopic("curry".into())
        );
    }

    #[test]
    fn same_topic_continues() {
        assert_eq!(
            decide(Some("curry"), Some("curry"), true),
            TopicDecision::SameTopic("curry".into())
        );
    }

    #[test]
    fn different_topic_changes() {
        let d = decide(Some("curry"), Some("pasta"), true);
        assert_eq!(
            d,
            TopicDecision::TopicChanged {
                old: "curry".into(),
                new: "pasta".into()
            }
        );
        assert!(d.is_change());
        assert_eq!(d.topic(), Some("pasta"));
    }
}
