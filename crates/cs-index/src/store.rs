//! The untrusted store: encrypted documents, token indexes, audit trail.
//!
//! The store only ever handles ciphertext, nonces, and opaque tokens. It has
//! no keys and cannot read documents or recover keywords.
//!
//! Relations are loaded into memory on `open()` and written back as a single
//! JSON snapshot (write to temp file, then rename) on every mutation. Writers
//! build the new relations on a copy and only publish it after the snapshot
//! is on disk, so readers see either the state before a write or after it.

use parking_lot::RwLock;
use serde::Serialize;
use std::path::{Path, PathBuf};

use cs_core::config::validate_threshold;
use cs_core::{CsError, CsResult, EncryptedDocument, EncryptedRecord, IngestRequest, SearchOp, Token};

use crate::audit::{AuditAction, AuditDetails, AuditEntry, AuditLog};
use crate::relations::{IndexEntry, Relations, StoredDocument};

/// Aggregate counts over the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub documents: usize,
    pub index_entries: usize,
    pub unique_tokens: usize,
    pub audit_events: usize,
}

pub struct Store {
    /// Snapshot location; `None` keeps everything in memory
    path: Option<PathBuf>,
    relations: RwLock<Relations>,
    audit: AuditLog,
}

impl Store {
    /// Load or create a store backed by the snapshot at `path`.
    /// If the file doesn't exist, starts empty.
    pub fn open(path: &Path) -> CsResult<Self> {
        let relations = if path.exists() {
            let content = std::fs::read(path)
                .map_err(|e| CsError::Storage(format!("reading index {}: {e}", path.display())))?;
            serde_json::from_slice(&content)
                .map_err(|e| CsError::Storage(format!("parsing index {}: {e}", path.display())))?
        } else {
            Relations::default()
        };

        tracing::info!(
            path = %path.display(),
            documents = relations.documents.len(),
            "encrypted index opened"
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            relations: RwLock::new(relations),
            audit: AuditLog::default(),
        })
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            relations: RwLock::new(Relations::default()),
            audit: AuditLog::default(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ── Writes ──────────────────────────────────────────────────────────────

    /// Upsert a document and replace its exact-index rows.
    pub fn store_document(&self, doc: &EncryptedDocument) -> CsResult<()> {
        require_document_id(&doc.document_id)?;
        self.write(
            |rel| rel.upsert_document(doc),
            |_| {
                self.audit.record(
                    AuditAction::StoreDocument,
                    AuditDetails {
                        document_id: Some(doc.document_id.clone()),
                        tokens_indexed: Some(doc.tokens.len()),
                        ..Default::default()
                    },
                )
            },
        )?;

        tracing::info!(document_id = %doc.document_id, tokens = doc.tokens.len(), "document stored");
        Ok(())
    }

    /// Append n-gram rows for `document_id`. Repeated windows are kept.
    pub fn store_ngram_tokens(
        &self,
        document_id: &str,
        tokens: &[Token],
        source_keyword_hash: &Token,
    ) -> CsResult<()> {
        require_document_id(document_id)?;
        require_tokens(tokens)?;
        self.write(
            |rel| rel.append_ngrams(document_id, tokens, source_keyword_hash),
            |_| {
                self.audit.record(
                    AuditAction::StoreNgramTokens,
                    AuditDetails {
                        document_id: Some(document_id.to_string()),
                        ngram_tokens: Some(tokens.len()),
                        ..Default::default()
                    },
                )
            },
        )?;

        tracing::debug!(document_id, ngrams = tokens.len(), "n-gram tokens stored");
        Ok(())
    }

    /// Index a document in one write: upsert it and replace its rows in both
    /// the exact and n-gram indexes. Re-ingesting the same request is idempotent.
    pub fn ingest(&self, request: &IngestRequest) -> CsResult<()> {
        let doc = &request.document;
        require_document_id(&doc.document_id)?;

        let ngram_count: usize = request.ngram_sets.iter().map(|s| s.tokens.len()).sum();
        self.write(
            |rel| {
                rel.upsert_document(doc);
                rel.remove_ngram_rows(&doc.document_id);
                for set in &request.ngram_sets {
                    rel.append_ngrams(&doc.document_id, &set.tokens, &set.source_keyword_hash);
                }
            },
            |_| {
                self.audit.record(
                    AuditAction::Ingest,
                    AuditDetails {
                        document_id: Some(doc.document_id.clone()),
                        tokens_indexed: Some(doc.tokens.len()),
                        ngram_tokens: Some(ngram_count),
                        ..Default::default()
                    },
                )
            },
        )?;

        tracing::info!(
            document_id = %doc.document_id,
            tokens = doc.tokens.len(),
            ngrams = ngram_count,
            "document ingested"
        );
        Ok(())
    }

    /// Delete a document and its rows in both indexes.
    /// Returns `false` if nothing was stored under `document_id`.
    pub fn delete_document(&self, document_id: &str) -> CsResult<bool> {
        let removed = self.write(
            |rel| rel.delete_document(document_id),
            |_| {
                self.audit.record(
                    AuditAction::Delete,
                    AuditDetails {
                        document_id: Some(document_id.to_string()),
                        ..Default::default()
                    },
                )
            },
        )?;

        tracing::info!(document_id, removed, "document deleted");
        Ok(removed)
    }

    /// Empty every relation and reset the audit log.
    pub fn clear_all(&self) -> CsResult<()> {
        self.write(|rel| *rel = Relations::default(), |_| self.audit.clear())?;
        tracing::info!("encrypted index cleared");
        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// Exact token match.
    pub fn search_token(&self, token: &Token) -> Vec<EncryptedRecord> {
        // recorded before the read lock drops; clear_all cannot interleave
        let rel = self.relations.read();
        let results = rel.records(&rel.exact_matches(token));

        tracing::debug!(token = %token.preview(), results = results.len(), "exact search");
        self.audit.record(
            AuditAction::ExactSearch,
            AuditDetails {
                token_preview: Some(token.preview()),
                results_found: Some(results.len()),
                ..Default::default()
            },
        );
        drop(rel);
        results
    }

    /// Boolean search over several exact tokens.
    pub fn search_multi(&self, tokens: &[Token], op: SearchOp) -> CsResult<Vec<EncryptedRecord>> {
        require_tokens(tokens)?;
        let rel = self.relations.read();
        let results = rel.records(&rel.multi_matches(tokens, op));

        tracing::debug!(%op, tokens = tokens.len(), results = results.len(), "multi search");
        let action = match op {
            SearchOp::And => AuditAction::MultiSearchAnd,
            SearchOp::Or => AuditAction::MultiSearchOr,
        };
        self.audit.record(
            action,
            AuditDetails {
                token_count: Some(tokens.len()),
                results_found: Some(results.len()),
                ..Default::default()
            },
        );
        drop(rel);
        Ok(results)
    }

    /// Threshold match over n-gram tokens; `threshold` must lie in `[0, 1]`.
    pub fn search_fuzzy(&self, tokens: &[Token], threshold: f64) -> CsResult<Vec<EncryptedRecord>> {
        require_tokens(tokens)?;
        validate_threshold(threshold)?;
        let rel = self.relations.read();
        let results = rel.records(&rel.fuzzy_matches(tokens, threshold));

        tracing::debug!(ngrams = tokens.len(), threshold, results = results.len(), "fuzzy search");
        self.audit.record(
            AuditAction::FuzzySearch,
            AuditDetails {
                token_count: Some(tokens.len()),
                threshold: Some(threshold),
                results_found: Some(results.len()),
                ..Default::default()
            },
        );
        drop(rel);
        Ok(results)
    }

    // ── Inspection ──────────────────────────────────────────────────────────

    /// Every stored document, still encrypted.
    pub fn get_all_documents_raw(&self) -> Vec<StoredDocument> {
        self.relations.read().documents.values().cloned().collect()
    }

    /// Up to `limit` exact-index rows, in token order.
    pub fn get_all_tokens_raw(&self, limit: usize) -> Vec<IndexEntry> {
        self.relations.read().index_entries(limit)
    }

    pub fn get_stats(&self) -> StoreStats {
        let rel = self.relations.read();
        StoreStats {
            documents: rel.documents.len(),
            index_entries: rel.index_entry_count(),
            unique_tokens: rel.unique_token_count(),
            audit_events: self.audit.len(),
        }
    }

    /// Copy of the audit trail, oldest first.
    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }

    // ── Internals ───────────────────────────────────────────────────────────

    /// Apply `f` under the write lock. With a backing file, `f` runs on a copy
    /// that is persisted before it replaces the live relations; on failure
    /// nothing changes and `committed` is not called.
    ///
    /// `committed` runs after the new relations are live but before the lock
    /// is released, so the audit log never lags or leads the relations.
    fn write<R>(
        &self,
        f: impl FnOnce(&mut Relations) -> R,
        committed: impl FnOnce(&R),
    ) -> CsResult<R> {
        let mut live = self.relations.write();
        let out = match &self.path {
            None => f(&mut *live),
            Some(path) => {
                let mut next = live.clone();
                let out = f(&mut next);
                persist(path, &next)?;
                *live = next;
                out
            }
        };
        committed(&out);
        Ok(out)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("stats", &self.get_stats())
            .finish()
    }
}

/// Atomic snapshot write: temp file, then rename over the old snapshot.
fn persist(path: &Path, relations: &Relations) -> CsResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| CsError::Storage(format!("creating index dir {}: {e}", parent.display())))?;
    }

    let json = serde_json::to_vec(relations)
        .map_err(|e| CsError::Storage(format!("serializing index: {e}")))?;

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, &json)
        .map_err(|e| CsError::Storage(format!("writing index temp {}: {e}", tmp_path.display())))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| CsError::Storage(format!("renaming index {}: {e}", path.display())))?;

    tracing::debug!(path = %path.display(), bytes = json.len(), "index snapshot written");
    Ok(())
}

fn require_document_id(document_id: &str) -> CsResult<()> {
    if document_id.is_empty() {
        return Err(CsError::InvalidInput("document id must not be empty".into()));
    }
    Ok(())
}

fn require_tokens(tokens: &[Token]) -> CsResult<()> {
    if tokens.is_empty() {
        return Err(CsError::InvalidInput("token list must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_core::NgramSet;

    fn tok(s: &str) -> Token {
        Token::new(s)
    }

    fn doc(id: &str, tokens: &[&str]) -> EncryptedDocument {
        EncryptedDocument {
            document_id: id.into(),
            ciphertext: format!("ct-{id}"),
            nonce: format!("nonce-{id}"),
            tokens: tokens.iter().map(|t| tok(t)).collect(),
            keyword_count: tokens.len(),
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_every_operation_is_audited_once() {
        let store = Store::in_memory();
        store.store_document(&doc("D1", &["a", "b"])).unwrap();
        store.store_ngram_tokens("D1", &[tok("g1")], &tok("a")).unwrap();
        store.search_token(&tok("a"));
        store.search_multi(&[tok("a"), tok("b")], SearchOp::And).unwrap();
        store.search_multi(&[tok("a")], SearchOp::Or).unwrap();
        store.search_fuzzy(&[tok("g1")], 0.6).unwrap();
        store.delete_document("D1").unwrap();

        let actions: Vec<AuditAction> = store.audit_log().iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::StoreDocument,
                AuditAction::StoreNgramTokens,
                AuditAction::ExactSearch,
                AuditAction::MultiSearchAnd,
                AuditAction::MultiSearchOr,
                AuditAction::FuzzySearch,
                AuditAction::Delete,
            ]
        );
    }

    #[test]
    fn test_audit_never_holds_full_token() {
        let store = Store::in_memory();
        let token = tok("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=");
        store.search_token(&token);

        let entry = &store.audit_log()[0];
        let preview = entry.details.token_preview.as_deref().unwrap();
        assert_eq!(preview, "AAAAAAAAAAAAAAAA...");
        let rendered = serde_json::to_string(entry).unwrap();
        assert!(!rendered.contains(token.as_str()));
    }

    #[test]
    fn test_failed_validation_is_not_audited() {
        let store = Store::in_memory();
        assert!(matches!(
            store.search_multi(&[], SearchOp::Or),
            Err(CsError::InvalidInput(_))
        ));
        assert!(matches!(
            store.search_fuzzy(&[], 0.5),
            Err(CsError::InvalidInput(_))
        ));
        assert!(matches!(
            store.search_fuzzy(&[tok("g")], 1.5),
            Err(CsError::InvalidInput(_))
        ));
        assert!(matches!(
            store.search_fuzzy(&[tok("g")], f64::NAN),
            Err(CsError::InvalidInput(_))
        ));
        assert!(matches!(
            store.store_document(&doc("", &["a"])),
            Err(CsError::InvalidInput(_))
        ));
        assert!(store.audit_log().is_empty());
    }

    #[test]
    fn test_stats() {
        let store = Store::in_memory();
        store.store_document(&doc("D1", &["a", "b"])).unwrap();
        store.store_document(&doc("D2", &["b", "c"])).unwrap();

        assert_eq!(
            store.get_stats(),
            StoreStats {
                documents: 2,
                index_entries: 4,
                unique_tokens: 3,
                audit_events: 2,
            }
        );
    }

    #[test]
    fn test_clear_all_zeroes_stats() {
        let store = Store::in_memory();
        store.store_document(&doc("D1", &["a"])).unwrap();
        store.store_ngram_tokens("D1", &[tok("g")], &tok("a")).unwrap();
        store.search_token(&tok("a"));
        store.clear_all().unwrap();

        assert_eq!(
            store.get_stats(),
            StoreStats {
                documents: 0,
                index_entries: 0,
                unique_tokens: 0,
                audit_events: 0,
            }
        );
        assert!(store.search_fuzzy(&[tok("g")], 0.0).unwrap().is_empty());
    }

    #[test]
    fn test_ngram_rows_not_deduplicated() {
        let store = Store::in_memory();
        store.store_document(&doc("D1", &["a"])).unwrap();
        store.store_ngram_tokens("D1", &[tok("g"), tok("g")], &tok("a")).unwrap();
        store.store_ngram_tokens("D1", &[tok("g")], &tok("a")).unwrap();

        assert_eq!(store.relations.read().ngram_entry_count(), 3);
    }

    #[test]
    fn test_ingest_replaces_ngram_rows() {
        let store = Store::in_memory();
        let request = IngestRequest {
            document: doc("D1", &["a"]),
            ngram_sets: vec![NgramSet {
                source_keyword_hash: tok("a"),
                tokens: vec![tok("g1"), tok("g2")],
            }],
        };

        store.ingest(&request).unwrap();
        store.ingest(&request).unwrap();

        let rel = store.relations.read();
        assert_eq!(rel.ngram_entry_count(), 2);
        assert_eq!(rel.index_entry_count(), 1);
        assert_eq!(rel.documents.len(), 1);
    }

    #[test]
    fn test_raw_views_are_ciphertext_only() {
        let store = Store::in_memory();
        store.store_document(&doc("D1", &["t1", "t2", "t3"])).unwrap();

        let docs = store.get_all_documents_raw();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].ciphertext, "ct-D1");
        assert_eq!(docs[0].keyword_count, 0);

        assert_eq!(store.get_all_tokens_raw(2).len(), 2);
        assert_eq!(store.get_all_tokens_raw(50).len(), 3);
    }

    #[test]
    fn test_delete_missing_document() {
        let store = Store::in_memory();
        assert!(!store.delete_document("nope").unwrap());
        assert_eq!(store.audit_log().len(), 1);
    }
}
