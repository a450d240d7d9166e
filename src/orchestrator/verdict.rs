//! Validator reply parsing
//!
//! A run passes only when the first token of the reply is exactly `PASS`.
//! Anything else is a failure whose feedback goes into the next plan attempt.

use serde::{Deserialize, Serialize};

pub const SUCCESS_MARKER: &str = "PASS";
pub const FAILURE_MARKER: &str = "FAIL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub success: bool,
    /// Always non-empty
    pub feedback: String,
}

impl ValidationVerdict {
    pub fn pass(feedback: impl Into<String>) -> Self {
        Self {
            success: true,
            feedback: feedback.into(),
        }
    }

    pub fn fail(feedback: impl Into<String>) -> Self {
        Self {
            success: false,
            feedback: feedback.into(),
        }
    }
}

/// Text after a leading marker, or the whole reply when nothing follows it
fn remainder<'a>(text: &'a str, marker: &str) -> &'a str {
    let rest = text[marker.len()..].trim_start_matches(':').trim();
    if rest.is_empty() { text } else { rest }
}

pub fn parse_verdict(reply: &str) -> ValidationVerdict {
    let text = reply.trim();
    if text.is_empty() {
        return ValidationVerdict::fail("Validator returned an empty reply");
    }

    let first = text.split_whitespace().next().unwrap_or_default();
    if first == SUCCESS_MARKER {
        return ValidationVerdict::pass(remainder(text, SUCCESS_MARKER));
    }
    if first == FAILURE_MARKER || first.starts_with("FAIL:") {
        return ValidationVerdict::fail(remainder(text, FAILURE_MARKER));
    }
    ValidationVerdict::fail(text)
}
