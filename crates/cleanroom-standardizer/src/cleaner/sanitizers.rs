//! Low-level text sanitizers used by the canonicalizer and response parsers.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters that may legally follow a backslash in a JSON-style escape.
const RECOGNIZED_ESCAPES: [char; 9] = ['\\', '/', '"', 'b', 'f', 'n', 'r', 't', 'u'];

/// Opening or closing markdown fence, with an optional language tag.
static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[A-Za-z0-9_+-]*").expect("Invalid regex: code fence"));

/// Double every backslash that does not start a recognized escape.
///
/// A recognized pair is copied through as a unit, so the output only ever
/// contains recognized pairs and a second pass leaves it unchanged.
pub(crate) fn escape_stray_backslashes(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(&next) if RECOGNIZED_ESCAPES.contains(&next) => {
                out.push('\\');
                out.push(next);
                chars.next();
            }
            _ => out.push_str("\\\\"),
        }
    }

    out
}

/// Collapse whitespace runs to a single space and trim both ends.
pub(crate) fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove markdown code fences an LLM wraps around its answer.
pub(crate) fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_stray_backslash() {
        assert_eq!(escape_stray_backslashes(r"A\B"), r"A\\B");
        assert_eq!(escape_stray_backslashes(r"C:\data"), r"C:\\data");
    }

    #[test]
    fn test_recognized_escapes_untouched() {
        assert_eq!(escape_stray_backslashes(r"line\nbreak"), r"line\nbreak");
        assert_eq!(escape_stray_backslashes(r#"say \"hi\""#), r#"say \"hi\""#);
        assert_eq!(escape_stray_backslashes(r"a\\b"), r"a\\b");
        assert_eq!(escape_stray_backslashes(r"\u00e9"), r"\u00e9");
    }

    #[test]
    fn test_trailing_backslash() {
        assert_eq!(escape_stray_backslashes("end\\"), "end\\\\");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  COCA   COLA \t ZERO\n"), "COCA COLA ZERO");
        assert_eq!(collapse_whitespace("   "), "");
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```\nA=B\n```"), "A=B");
        assert_eq!(strip_code_fences("```json\n[[\"a\"]]\n```"), "[[\"a\"]]");
        assert_eq!(strip_code_fences("A=B"), "A=B");
    }
}
