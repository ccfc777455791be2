//! Per-type acceptance rules for user-entered values.

use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::KeyType;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"));

/// Checks `value` against the shape rules for `key_type`.
///
/// Surrounding whitespace is ignored. On rejection the error carries the
/// message to show before re-prompting.
///
/// # Errors
///
/// Returns the user-facing message when the value does not fit the type.
///
/// # Examples
///
/// ```rust
/// use envcompose::{KeyType, validate};
///
/// assert!(validate("TRUE", KeyType::Boolean).is_ok());
/// assert!(validate("yes", KeyType::Boolean).is_err());
/// assert!(validate("3.14", KeyType::Number).is_ok());
/// assert!(validate("a@b", KeyType::Email).is_err());
/// ```
pub fn validate(value: &str, key_type: KeyType) -> Result<(), &'static str> {
    let trimmed = value.trim();
    match key_type {
        KeyType::String | KeyType::Password | KeyType::Database => Ok(()),
        KeyType::Email => {
            if EMAIL_RE.is_match(trimmed) {
                Ok(())
            } else {
                Err("Please enter a valid email address.")
            }
        }
        KeyType::Boolean => {
            if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
                Ok(())
            } else {
                Err("Please enter \"true\" or \"false\".")
            }
        }
        KeyType::Number => match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(()),
            _ => Err("Please enter a valid number."),
        },
    }
}
