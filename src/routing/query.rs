//! Incoming query text.

use sha2::{Digest, Sha256};

/// A received query. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    raw: String,
    normalized: String,
}

impl Query {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = raw.to_lowercase();
        Self { raw, normalized }
    }

    /// The text as received.
    pub fn text(&self) -> &str {
        &self.raw
    }

    /// Lower-cased form, used only for classification.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn is_empty(&self) -> bool {
        self.raw.trim().is_empty()
    }

    /// Short SHA-256 fingerprint for logging without exposing the text.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.raw)
    }
}

/// First eight hex digits of the SHA-256 of `data`.
pub fn fingerprint(data: &str) -> String {
    let digest = Sha256::digest(data.as_bytes());
    hex::encode(digest)[..8].to_string()
}

impl From<&str> for Query {
    fn from(raw: &str) -> Self {
        Query::new(raw)
    }
}
