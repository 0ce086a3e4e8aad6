use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CsError;

/// Characters of a token shown in logs and audit entries.
pub const TOKEN_PREVIEW_LEN: usize = 16;

/// An opaque search token (URL-safe base64 of an HMAC-SHA256 tag).
///
/// The store compares tokens for equality only; it never learns the keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Truncated, non-identifying form for audit records and logs.
    pub fn preview(&self) -> String {
        let head: String = self.0.chars().take(TOKEN_PREVIEW_LEN).collect();
        format!("{head}...")
    }
}

/// What the client sends to the store for one document. No plaintext anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedDocument {
    pub document_id: String,
    /// AES-256-GCM ciphertext with tag (base64)
    pub ciphertext: String,
    /// 96-bit nonce (base64)
    pub nonce: String,
    /// Exact-match tokens, one per extracted keyword, in keyword order
    pub tokens: Vec<Token>,
    /// Client-side keyword count; the store never persists it
    pub keyword_count: usize,
    /// Unix timestamp (seconds) of encryption
    pub created_at: u64,
}

/// N-gram tokens for one keyword, tagged with that keyword's exact token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NgramSet {
    pub source_keyword_hash: Token,
    pub tokens: Vec<Token>,
}

/// Everything needed to (re)index a document in one store write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub document: EncryptedDocument,
    pub ngram_sets: Vec<NgramSet>,
}

/// A search hit as returned by the store: still encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    pub document_id: String,
    pub ciphertext: String,
    pub nonce: String,
}

/// Boolean combinator for multi-token search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SearchOp {
    /// Document must hold every query token
    And,
    /// Document must hold at least one query token
    Or,
}

impl fmt::Display for SearchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchOp::And => f.write_str("AND"),
            SearchOp::Or => f.write_str("OR"),
        }
    }
}

impl FromStr for SearchOp {
    type Err = CsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(SearchOp::And),
            "OR" => Ok(SearchOp::Or),
            other => Err(CsError::InvalidInput(format!(
                "unknown search operator {other:?} (expected AND or OR)"
            ))),
        }
    }
}
