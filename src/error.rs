//! Structured error types for the typesetting engine.
//!
//! Only a handful of things can actually fail: a replacement unit that can't
//! be rendered, a length policy that can't be resolved, a splice that doesn't
//! address real text, and configuration input that doesn't parse. Empty
//! measurements are deliberately *not* errors; they mean "nothing to fit".

use thiserror::Error;

/// The unified error type returned by all fallible public API functions.
#[derive(Debug, Error)]
pub enum FitError {
    /// The non-breaking replacement is neither text nor a renderable inline
    /// element. Aborts the widow pass that tried to use it.
    #[error("Unsupported replacement: {0}")]
    UnsupportedReplacement(String),

    /// A minimum-width policy could not be turned into a pixel value.
    #[error("Invalid length {value:?}: {reason}")]
    InvalidLength { value: String, reason: String },

    /// A splice addressed a node or offset that doesn't hold plain text.
    #[error("Invalid splice: {0}")]
    InvalidSplice(String),

    /// An undo was requested for a substitution that isn't active.
    #[error("Unknown substitution #{0}")]
    UnknownSubstitution(u32),

    /// JSON configuration or document input failed to parse.
    #[error("Failed to parse configuration: {source}{}", format_hint(.hint))]
    ParseError {
        source: serde_json::Error,
        hint: String,
    },

    /// A preset name was requested that the registry doesn't define.
    #[error("Unknown preset {0:?}")]
    UnknownPreset(String),

    /// A font could not be parsed for metrics.
    #[error("Font error: {0}")]
    FontError(String),
}

fn format_hint(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {hint}")
    }
}

impl From<serde_json::Error> for FitError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the configuration schema. Check field names and types (camelCase).".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input; is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        FitError::ParseError { source: e, hint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_errors_carry_a_hint() {
        let err: FitError = serde_json::from_str::<serde_json::Value>("{ \"a\": 1, }")
            .unwrap_err()
            .into();
        let message = err.to_string();
        assert!(message.starts_with("Failed to parse configuration"));
        assert!(message.contains("Hint: Check for trailing commas"));
    }

    #[test]
    fn schema_errors_point_at_field_names() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Strict {
            max_iterations: u32,
        }
        let err: FitError = serde_json::from_str::<Strict>("{ \"max_iterations\": \"five\" }")
            .unwrap_err()
            .into();
        match err {
            FitError::ParseError { hint, .. } => assert!(hint.contains("camelCase")),
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn invalid_length_names_the_value() {
        let err = FitError::InvalidLength {
            value: "12em".to_string(),
            reason: "unknown unit".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid length \"12em\": unknown unit");
    }
}
