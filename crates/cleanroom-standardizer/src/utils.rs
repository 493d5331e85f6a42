//! Shared helpers for telling text columns apart from numbers stored as text.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType holds text that can be standardized.
#[inline]
pub fn is_text_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String)
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Currency signs, separators and spaces that decorate numbers in exports.
const NUMBER_DECORATIONS: [char; 6] = [',', '$', '%', '€', '£', ' '];

/// Strip number decorations so the remainder can be parsed.
///
/// ```rust,ignore
/// assert_eq!(clean_numeric_string("$1,234.56"), "1234.56");
/// ```
pub fn clean_numeric_string(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !NUMBER_DECORATIONS.contains(c))
        .collect()
}

/// Parse a formatted number such as `"$1,234.56"` or `"42%"`.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Check if a string value is a number once formatting is removed.
#[inline]
pub fn is_numeric_string(s: &str) -> bool {
    parse_numeric_string(s).is_some()
}

/// True when strictly more than half of `values` are non-numeric text.
///
/// An empty slice is never predominantly text.
pub fn is_predominantly_text<S: AsRef<str>>(values: &[S]) -> bool {
    if values.is_empty() {
        return false;
    }
    let text = values
        .iter()
        .filter(|v| !is_numeric_string(v.as_ref()))
        .count();
    text * 2 > values.len()
}
