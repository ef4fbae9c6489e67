//! Request input validation.

use crate::error::{MarketlensError, Result};

/// Substrings rejected anywhere in a query, compared case-insensitively.
const BLOCKED_PATTERNS: &[&str] = &[
    "javascript:",
    "<script",
    "eval(",
    "exec(",
    "import(",
    "__import__",
    "subprocess",
    "os.system",
    "shell=true",
];

/// Validate query text and return it trimmed.
pub fn validate_query(text: &str, max_length: usize) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(MarketlensError::InvalidInput(
            "Query must not be empty".to_string(),
        ));
    }

    let length = text.chars().count();
    if length > max_length {
        return Err(MarketlensError::InvalidInput(format!(
            "Query is {} characters; the limit is {}",
            length, max_length
        )));
    }

    let lowered = text.to_lowercase();
    if BLOCKED_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return Err(MarketlensError::InvalidInput(
            "Query contains a disallowed pattern".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}
