//! The three persisted relations and the query algebra over them.
//!
//! - documents:   document id → ciphertext, nonce, created_at
//! - exact index: token → document ids (one per row)
//! - n-gram index: token → (document id, source keyword hash) rows
//!
//! Both indexes are keyed by token, which doubles as the secondary index for
//! O(log n) lookups. Everything here is pure; locking and persistence live in
//! `store`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use cs_core::{EncryptedDocument, EncryptedRecord, SearchOp, Token};

/// A document as the store keeps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub document_id: String,
    pub ciphertext: String,
    pub nonce: String,
    /// Always 0: the store does not record how many keywords a document has
    pub keyword_count: usize,
    pub created_at: u64,
}

/// One exact-index row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub token: Token,
    pub document_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NgramPosting {
    pub document_id: String,
    pub source_keyword_hash: Token,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Relations {
    pub documents: BTreeMap<String, StoredDocument>,
    pub exact_index: BTreeMap<Token, Vec<String>>,
    pub ngram_index: BTreeMap<Token, Vec<NgramPosting>>,
}

impl Relations {
    /// Upsert the document and replace (not merge) its exact-index rows.
    pub fn upsert_document(&mut self, doc: &EncryptedDocument) {
        self.documents.insert(
            doc.document_id.clone(),
            StoredDocument {
                document_id: doc.document_id.clone(),
                ciphertext: doc.ciphertext.clone(),
                nonce: doc.nonce.clone(),
                keyword_count: 0,
                created_at: doc.created_at,
            },
        );

        self.remove_exact_rows(&doc.document_id);
        for token in &doc.tokens {
            self.exact_index
                .entry(token.clone())
                .or_default()
                .push(doc.document_id.clone());
        }
    }

    pub fn append_ngrams(&mut self, document_id: &str, tokens: &[Token], source_keyword_hash: &Token) {
        for token in tokens {
            self.ngram_index
                .entry(token.clone())
                .or_default()
                .push(NgramPosting {
                    document_id: document_id.to_string(),
                    source_keyword_hash: source_keyword_hash.clone(),
                });
        }
    }

    pub fn remove_exact_rows(&mut self, document_id: &str) {
        self.exact_index.retain(|_, ids| {
            ids.retain(|id| id != document_id);
            !ids.is_empty()
        });
    }

    pub fn remove_ngram_rows(&mut self, document_id: &str) {
        self.ngram_index.retain(|_, rows| {
            rows.retain(|row| row.document_id != document_id);
            !rows.is_empty()
        });
    }

    /// Delete a document and cascade to both indexes. Returns whether anything was removed.
    pub fn delete_document(&mut self, document_id: &str) -> bool {
        let before = self.index_entry_count() + self.ngram_entry_count();
        self.remove_exact_rows(document_id);
        self.remove_ngram_rows(document_id);
        let existed = self.documents.remove(document_id).is_some();
        existed || before != self.index_entry_count() + self.ngram_entry_count()
    }

    pub fn exact_matches(&self, token: &Token) -> BTreeSet<String> {
        self.exact_index
            .get(token)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// AND: the document holds every distinct query token. OR: at least one.
    pub fn multi_matches(&self, tokens: &[Token], op: SearchOp) -> BTreeSet<String> {
        let distinct: BTreeSet<&Token> = tokens.iter().collect();
        let hits = count_hits(distinct.iter().map(|token| {
            self.exact_index
                .get(*token)
                .map(|ids| ids.iter().map(String::as_str).collect())
                .unwrap_or_default()
        }));

        hits.into_iter()
            .filter(|(_, count)| match op {
                SearchOp::And => *count == distinct.len(),
                SearchOp::Or => *count >= 1,
            })
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// Documents holding at least `floor(tokens.len() * threshold)` of the
    /// distinct query n-grams (and at least one of them). The minimum counts
    /// repeated query windows; the hits do not.
    pub fn fuzzy_matches(&self, tokens: &[Token], threshold: f64) -> BTreeSet<String> {
        let distinct: BTreeSet<&Token> = tokens.iter().collect();
        let min_matches = min_matches(tokens.len(), threshold);
        let hits = count_hits(distinct.iter().map(|token| {
            self.ngram_index
                .get(*token)
                .map(|rows| rows.iter().map(|row| row.document_id.as_str()).collect())
                .unwrap_or_default()
        }));

        hits.into_iter()
            .filter(|(_, count)| *count >= min_matches)
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// Join document ids against the documents relation, in id order.
    pub fn records<'a>(&self, ids: impl IntoIterator<Item = &'a String>) -> Vec<EncryptedRecord> {
        ids.into_iter()
            .filter_map(|id| self.documents.get(id))
            .map(|doc| EncryptedRecord {
                document_id: doc.document_id.clone(),
                ciphertext: doc.ciphertext.clone(),
                nonce: doc.nonce.clone(),
            })
            .collect()
    }

    pub fn index_entry_count(&self) -> usize {
        self.exact_index.values().map(Vec::len).sum()
    }

    pub fn ngram_entry_count(&self) -> usize {
        self.ngram_index.values().map(Vec::len).sum()
    }

    pub fn unique_token_count(&self) -> usize {
        self.exact_index.len()
    }

    pub fn index_entries(&self, limit: usize) -> Vec<IndexEntry> {
        self.exact_index
            .iter()
            .flat_map(|(token, ids)| {
                ids.iter().map(move |id| IndexEntry {
                    token: token.clone(),
                    document_id: id.clone(),
                })
            })
            .take(limit)
            .collect()
    }
}

/// Integer floor of `len * threshold`, not rounding.
pub(crate) fn min_matches(len: usize, threshold: f64) -> usize {
    (len as f64 * threshold).floor() as usize
}

/// For each per-token set of matching document ids, count how many tokens
/// each document matched.
fn count_hits<'a>(per_token: impl Iterator<Item = BTreeSet<&'a str>>) -> HashMap<&'a str, usize> {
    let mut hits: HashMap<&str, usize> = HashMap::new();
    for ids in per_token {
        for id in ids {
            *hits.entry(id).or_default() += 1;
        }
    }
    hits
}
