//! Client-side engine: holds the session keys and runs every crypto operation.
//!
//! An `Engine` lives for one client session (created at login, dropped at
//! logout or process exit). Keys never leave it and are zeroized on drop.
//! All methods take `&self`, so one engine can be shared across threads.

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use secrecy::SecretString;
use std::time::{SystemTime, UNIX_EPOCH};

use cs_core::{CsError, CsResult, EncryptedDocument, EncryptedRecord, IngestRequest, NgramSet, Token};

use crate::cipher;
use crate::kdf::{generate_salt, KdfParams};
use crate::keys::{derive_session_keys, DataKey, SearchKey};
use crate::keywords::KeywordExtractor;
use crate::tokens;

#[derive(Debug)]
pub struct Engine {
    salt: Vec<u8>,
    data_key: DataKey,
    search_key: SearchKey,
    extractor: KeywordExtractor,
}

impl Engine {
    /// Derive session keys from `passphrase`.
    ///
    /// Pass the salt from an earlier session to reconstruct the same keys;
    /// `None` generates a fresh one (read it back with [`Engine::salt`]).
    pub fn new(passphrase: &SecretString, salt: Option<Vec<u8>>, params: &KdfParams) -> CsResult<Self> {
        let salt = salt.unwrap_or_else(generate_salt);
        let (data_key, search_key) = derive_session_keys(passphrase, &salt, params)?;
        tracing::debug!(iterations = params.iterations, "session keys derived");

        Ok(Self {
            salt,
            data_key,
            search_key,
            extractor: KeywordExtractor::default(),
        })
    }

    /// Replace the default keyword extraction rules.
    pub fn with_extractor(mut self, extractor: KeywordExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Salt as standard base64, for persisting alongside client state.
    pub fn salt_b64(&self) -> String {
        B64.encode(&self.salt)
    }

    /// Encrypt `plaintext` bound to `document_id`. Returns `(ciphertext_b64, nonce_b64)`.
    pub fn encrypt_text(&self, plaintext: &str, document_id: &str) -> CsResult<(String, String)> {
        let sealed = cipher::encrypt(&self.data_key, document_id.as_bytes(), plaintext.as_bytes())?;
        Ok((B64.encode(&sealed.ciphertext), B64.encode(sealed.nonce)))
    }

    /// Decrypt a base64 ciphertext/nonce pair produced for `document_id`.
    pub fn decrypt_text(&self, ciphertext_b64: &str, nonce_b64: &str, document_id: &str) -> CsResult<String> {
        let ciphertext = B64
            .decode(ciphertext_b64)
            .map_err(|e| CsError::InvalidInput(format!("ciphertext is not valid base64: {e}")))?;
        let nonce = B64
            .decode(nonce_b64)
            .map_err(|e| CsError::InvalidInput(format!("nonce is not valid base64: {e}")))?;

        let plaintext = cipher::decrypt(&self.data_key, document_id.as_bytes(), &nonce, &ciphertext)?;
        String::from_utf8(plaintext)
            .map_err(|_| CsError::InvalidInput("decrypted content is not UTF-8".into()))
    }

    /// Decrypt a search hit returned by the store.
    pub fn decrypt_record(&self, record: &EncryptedRecord) -> CsResult<String> {
        self.decrypt_text(&record.ciphertext, &record.nonce, &record.document_id)
    }

    pub fn generate_token(&self, keyword: &str) -> CsResult<Token> {
        tokens::exact_token(&self.search_key, keyword)
    }

    pub fn generate_ngram_tokens(&self, keyword: &str, n: usize) -> CsResult<Vec<Token>> {
        tokens::ngram_tokens(&self.search_key, keyword, n)
    }

    pub fn extract_keywords(&self, text: &str) -> Vec<String> {
        self.extractor.extract(text)
    }

    /// Encrypt `content` and build its exact-match tokens.
    pub fn encrypt_document(&self, document_id: &str, content: &str) -> CsResult<EncryptedDocument> {
        if document_id.is_empty() {
            return Err(CsError::InvalidInput("document id must not be empty".into()));
        }

        let (ciphertext, nonce) = self.encrypt_text(content, document_id)?;
        let keywords = self.extract_keywords(content);
        let tokens = keywords
            .iter()
            .map(|kw| self.generate_token(kw))
            .collect::<CsResult<Vec<_>>>()?;

        tracing::debug!(document_id, tokens = tokens.len(), "document encrypted");

        Ok(EncryptedDocument {
            document_id: document_id.to_string(),
            ciphertext,
            nonce,
            tokens,
            keyword_count: keywords.len(),
            created_at: unix_now(),
        })
    }

    /// Encrypt `content` and build both exact tokens and per-keyword n-gram
    /// sets, ready for a single `Store::ingest` call.
    pub fn prepare_ingest(&self, document_id: &str, content: &str, ngram_size: usize) -> CsResult<IngestRequest> {
        let document = self.encrypt_document(document_id, content)?;

        let ngram_sets = self
            .extract_keywords(content)
            .iter()
            .map(|kw| {
                Ok(NgramSet {
                    source_keyword_hash: self.generate_token(kw)?,
                    tokens: self.generate_ngram_tokens(kw, ngram_size)?,
                })
            })
            .collect::<CsResult<Vec<_>>>()?;

        Ok(IngestRequest {
            document,
            ngram_sets,
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
