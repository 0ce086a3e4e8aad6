//! Append-only record of what the store did.
//!
//! Entries carry operation class, counters, document ids, and truncated token
//! previews only. The log is owned by one `Store` and lives as long as it does.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    StoreDocument,
    StoreNgramTokens,
    Ingest,
    ExactSearch,
    MultiSearchAnd,
    MultiSearchOr,
    FuzzySearch,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::StoreDocument => "STORE_DOCUMENT",
            AuditAction::StoreNgramTokens => "STORE_NGRAM_TOKENS",
            AuditAction::Ingest => "INGEST",
            AuditAction::ExactSearch => "EXACT_SEARCH",
            AuditAction::MultiSearchAnd => "MULTI_SEARCH_AND",
            AuditAction::MultiSearchOr => "MULTI_SEARCH_OR",
            AuditAction::FuzzySearch => "FUZZY_SEARCH",
            AuditAction::Delete => "DELETE",
        }
    }
}

/// Operation-specific counters. Unset fields are omitted when serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_indexed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ngram_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_found: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    /// Unix timestamp (milliseconds)
    pub timestamp: u64,
    #[serde(flatten)]
    pub details: AuditDetails,
}

#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditLog {
    pub fn record(&self, action: AuditAction, details: AuditDetails) {
        tracing::debug!(action = action.as_str(), "audit");
        self.entries.lock().push(AuditEntry {
            action,
            timestamp: unix_millis(),
            details,
        });
    }

    /// Copy of all entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_appends_in_order() {
        let log = AuditLog::default();
        log.record(AuditAction::StoreDocument, AuditDetails::default());
        log.record(AuditAction::ExactSearch, AuditDetails::default());

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AuditAction::StoreDocument);
        assert_eq!(entries[1].action, AuditAction::ExactSearch);
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[test]
    fn test_serialized_entry_omits_unset_fields() {
        let entry = AuditEntry {
            action: AuditAction::ExactSearch,
            timestamp: 1,
            details: AuditDetails {
                token_preview: Some("abcdefghijklmnop...".into()),
                results_found: Some(2),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["action"], "EXACT_SEARCH");
        assert_eq!(json["results_found"], 2);
        assert!(json.get("document_id").is_none());
    }

    #[test]
    fn test_action_names_match_serde() {
        for action in [
            AuditAction::StoreDocument,
            AuditAction::MultiSearchAnd,
            AuditAction::FuzzySearch,
        ] {
            let json = serde_json::to_value(action).unwrap();
            assert_eq!(json, action.as_str());
        }
    }

    #[test]
    fn test_clear() {
        let log = AuditLog::default();
        log.record(AuditAction::Delete, AuditDetails::default());
        log.clear();
        assert!(log.is_empty());
    }
}
