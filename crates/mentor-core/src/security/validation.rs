//! Content validation and sanitization.
//!
//! The validator rejects oversized or unsafe message content before it
//! reaches the network; the sanitizer strips markup and unsafe URI schemes
//! from text flowing in either direction.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Patterns that are never allowed in message content.
static UNSAFE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(?i)<\s*script\b").expect("script pattern"),
            "embedded script tag",
        ),
        (
            Regex::new(r"(?i)javascript:").expect("javascript uri pattern"),
            "javascript: URI",
        ),
        (
            Regex::new(r"(?i)vbscript:").expect("vbscript uri pattern"),
            "vbscript: URI",
        ),
        (
            Regex::new(r"(?i)data:text/html").expect("data uri pattern"),
            "data:text/html URI",
        ),
        (
            Regex::new(r"(?i)\bon\w+\s*=").expect("event handler pattern"),
            "inline event handler",
        ),
    ]
});

/// Reasons message content is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message exceeds the maximum length of {max} characters ({actual})")]
    TooLong { max: usize, actual: usize },

    #[error("message contains unsafe content: {0}")]
    UnsafeContent(&'static str),
}

/// Validates message content against the size and denylist policy.
///
/// Validation is pure: no side effects, case-insensitive matching.
#[derive(Debug, Clone)]
pub struct ContentValidator {
    max_chars: usize,
}

impl Default for ContentValidator {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl ContentValidator {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Checks content against the policy.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Content is acceptable
    /// - `Err(ValidationError)`: Content is oversized or matches the denylist
    pub fn validate(&self, text: &str) -> Result<(), ValidationError> {
        let length = text.chars().count();
        if length > self.max_chars {
            return Err(ValidationError::TooLong {
                max: self.max_chars,
                actual: length,
            });
        }

        for (pattern, label) in UNSAFE_PATTERNS.iter() {
            if pattern.is_match(text) {
                return Err(ValidationError::UnsafeContent(label));
            }
        }

        Ok(())
    }
}

/// Strips markup and unsafe patterns from text.
///
/// Sanitization is idempotent: sanitizing already-sanitized text is a
/// no-op.
pub struct ContentSanitizer;

impl ContentSanitizer {
    /// Sanitizes user-entered text before it is stored or sent.
    pub fn sanitize_input(text: &str) -> String {
        Self::sanitize(text)
    }

    /// Sanitizes model output before it is stored or displayed.
    pub fn sanitize_output(text: &str) -> String {
        Self::sanitize(text)
    }

    fn sanitize(text: &str) -> String {
        let mut cleaned: String = text.chars().filter(|c| *c != '<' && *c != '>').collect();
        for (pattern, _) in UNSAFE_PATTERNS.iter() {
            cleaned = strip_to_fixpoint(pattern, cleaned);
        }
        cleaned.trim().to_string()
    }
}

/// Removes every match of `pattern`, repeating until no match remains.
///
/// A single pass is not enough: removing a match can splice surrounding
/// text into a new match (e.g. `javajavascript:script:`).
fn strip_to_fixpoint(pattern: &Regex, mut text: String) -> String {
    loop {
        let replaced = pattern.replace_all(&text, "").into_owned();
        if replaced == text {
            return text;
        }
        text = replaced;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_ordinary_text() {
        let validator = ContentValidator::default();
        assert!(validator.validate("What homework is due tomorrow?").is_ok());
        assert!(validator.validate("").is_ok());
    }

    #[test]
    fn test_validate_rejects_oversized_text() {
        let validator = ContentValidator::new(10);
        let err = validator.validate("this is far too long").unwrap_err();
        assert!(matches!(err, ValidationError::TooLong { max: 10, .. }));
    }

    #[test]
    fn test_validate_rejects_denylisted_patterns() {
        let validator = ContentValidator::default();
        for sample in [
            "<script>alert(1)</script>",
            "<SCRIPT src=x>",
            "click javascript:alert(1)",
            "VBSCRIPT:msgbox",
            "data:text/html,<h1>x</h1>",
            "<img onerror=alert(1)>",
        ] {
            let err = validator.validate(sample);
            assert!(err.is_err(), "expected rejection for {sample:?}");
            assert!(!err.unwrap_err().to_string().is_empty());
        }
    }

    #[test]
    fn test_sanitize_strips_markup_and_schemes() {
        let cleaned = ContentSanitizer::sanitize_input("  <b>hello</b> javascript:alert(1) ");
        assert!(!cleaned.contains('<'));
        assert!(!cleaned.contains("javascript:"));
        assert!(cleaned.starts_with("bhello"));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for sample in [
            "  <b>hello</b> javascript:alert(1) ",
            "javajavascript:script:alert(1)",
            "plain text",
            "onclick = run()",
        ] {
            let once = ContentSanitizer::sanitize_input(sample);
            let twice = ContentSanitizer::sanitize_input(&once);
            assert_eq!(once, twice, "sanitize not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_sanitized_text_passes_validation() {
        let validator = ContentValidator::default();
        let cleaned = ContentSanitizer::sanitize_input("<script>alert(1)</script>");
        assert!(validator.validate(&cleaned).is_ok());
    }
}
