//! Bounded scanner for the first balanced `{…}` object in free text.
//!
//! Model output often wraps its JSON in prose.  [`first_balanced_object`]
//! walks the text once with an explicit state machine, counting nesting
//! depth and skipping braces that sit inside JSON strings.  It gives up on
//! inputs longer than [`MAX_SCAN_BYTES`] or nested deeper than
//! [`MAX_DEPTH`], so adversarial input always terminates quickly.

/// Bytes examined before the scan gives up.
pub const MAX_SCAN_BYTES: usize = 64 * 1024;

/// Deepest nesting accepted (matches `serde_json`'s recursion limit).
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Before the first `{`.
    Seeking,
    /// Inside the object, outside any string.
    Object { depth: usize },
    /// Inside a string literal.
    Str { depth: usize },
    /// Just after a backslash inside a string literal.
    Escape { depth: usize },
}

/// Return the substring from the first `{` to its matching `}`.
///
/// `None` when there is no `{`, the object never closes, or a limit is hit.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let mut state = ScanState::Seeking;
    let mut start = 0;

    for (i, ch) in text.char_indices() {
        if i >= MAX_SCAN_BYTES {
            log::debug!("scan: gave up after {MAX_SCAN_BYTES} bytes");
            return None;
        }

        state = match (state, ch) {
            (ScanState::Seeking, '{') => {
                start = i;
                ScanState::Object { depth: 1 }
            }
            (ScanState::Seeking, _) => ScanState::Seeking,

            (ScanState::Object { depth }, '{') => {
                if depth >= MAX_DEPTH {
                    return None;
                }
                ScanState::Object { depth: depth + 1 }
            }
            (ScanState::Object { depth }, '}') => {
                if depth == 1 {
                    return Some(&text[start..=i]);
                }
                ScanState::Object { depth: depth - 1 }
            }
            (ScanState::Object { depth }, '"') => ScanState::Str { depth },
            (s @ ScanState::Object { .. }, _) => s,

            (ScanState::Str { depth }, '\\') => ScanState::Escape { depth },
            (ScanState::Str { depth }, '"') => ScanState::Object { depth },
            (s @ ScanState::Str { .. }, _) => s,

            (ScanState::Escape { depth }, _) => ScanState::Str { depth },
        };
    }

    None
}
