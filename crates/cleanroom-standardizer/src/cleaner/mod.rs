//! Value canonicalization.
//!
//! Every raw cell value passes through [`canonicalize`] before it reaches a
//! prompt, a value set or an export lookup, so all three agree on spelling.

mod sanitizers;

pub(crate) use sanitizers::strip_code_fences;

use sanitizers::{collapse_whitespace, escape_stray_backslashes};

/// Normalize a raw string value.
///
/// Stray backslashes are doubled so the text can be embedded in structured
/// output, then whitespace runs collapse to one space and the ends are
/// trimmed. The function is total and idempotent.
///
/// # Example
///
/// ```rust
/// use cleanroom_standardizer::cleaner::canonicalize;
///
/// assert_eq!(canonicalize("  Coca   Cola "), "Coca Cola");
/// assert_eq!(canonicalize(r"A\B"), r"A\\B");
/// ```
pub fn canonicalize(raw: &str) -> String {
    collapse_whitespace(&escape_stray_backslashes(raw))
}

/// Canonicalize a cell, treating blank results as missing.
pub fn canonicalize_cell(raw: &str) -> Option<String> {
    let value = canonicalize(raw);
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_whitespace() {
        assert_eq!(canonicalize("  PEPSI\tMAX  "), "PEPSI MAX");
    }

    #[test]
    fn test_canonicalize_escapes_then_collapses() {
        assert_eq!(canonicalize(r" A\ B "), r"A\\ B");
    }

    #[test]
    fn test_canonicalize_idempotent() {
        let inputs = [
            "",
            "   ",
            r"A\B",
            r"A\\B",
            r"\\\",
            "tab\there",
            r#"quote \" ok"#,
            "trailing\\   ",
            r"\u12 and \x",
            "  many   spaces\n\nand lines ",
        ];
        for input in inputs {
            let once = canonicalize(input);
            assert_eq!(canonicalize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_canonicalize_cell_blank() {
        assert_eq!(canonicalize_cell("  "), None);
        assert_eq!(canonicalize_cell(" x "), Some("x".to_string()));
    }
}
