use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CsError, CsResult};

/// PBKDF2 iteration floor. Configured values below this are rejected.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Top-level configuration (loaded from csearch.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CsConfig {
    pub store: StoreConfig,
    pub kdf: KdfConfig,
    pub keywords: KeywordConfig,
    pub search: SearchConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot of the encrypted index (default: ~/.local/share/csearch/index.json)
    pub path: PathBuf,
    /// Maximum rows returned by a raw token dump
    pub raw_token_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// PBKDF2-HMAC-SHA256 iterations (minimum 100000)
    pub iterations: u32,
    /// Where the client keeps its base64 session salt
    pub salt_file: PathBuf,
}

/// Keyword extraction rules. Changing these changes which terms become searchable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    /// Shortest ASCII alphanumeric run kept as a keyword
    pub min_length: usize,
    /// Terms never indexed
    pub stop_words: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Character window length for n-gram tokens
    pub ngram_size: usize,
    /// Share of query n-grams a document must hold for a fuzzy hit
    pub fuzzy_threshold: f64,
    /// Looser share used for substring-style lookups
    pub substring_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.local/share/csearch/index.json"),
            raw_token_limit: 50,
        }
    }
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            iterations: MIN_KDF_ITERATIONS,
            salt_file: PathBuf::from("~/.local/share/csearch/salt"),
        }
    }
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            min_length: 3,
            stop_words: DEFAULT_STOP_WORDS.iter().map(|w| (*w).to_string()).collect(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            ngram_size: 3,
            fuzzy_threshold: 0.6,
            substring_threshold: 0.5,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl CsConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(content: &str) -> CsResult<Self> {
        let config: CsConfig =
            toml::from_str(content).map_err(|e| CsError::Config(format!("parsing config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or fall back to defaults when the file does not exist.
    pub fn load(path: &Path) -> CsResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| CsError::Config(format!("reading config {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> CsResult<()> {
        if self.kdf.iterations < MIN_KDF_ITERATIONS {
            return Err(CsError::Config(format!(
                "kdf.iterations must be at least {MIN_KDF_ITERATIONS}, got {}",
                self.kdf.iterations
            )));
        }
        if self.keywords.min_length == 0 {
            return Err(CsError::Config("keywords.min_length must be at least 1".into()));
        }
        if self.search.ngram_size == 0 {
            return Err(CsError::Config("search.ngram_size must be at least 1".into()));
        }
        validate_threshold(self.search.fuzzy_threshold)
            .map_err(|e| CsError::Config(format!("search.fuzzy_threshold: {e}")))?;
        validate_threshold(self.search.substring_threshold)
            .map_err(|e| CsError::Config(format!("search.substring_threshold: {e}")))?;
        Ok(())
    }
}

/// Reject thresholds outside `[0, 1]` (NaN included).
pub fn validate_threshold(threshold: f64) -> CsResult<()> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(CsError::invalid(format!(
            "threshold must be within [0, 1], got {threshold}"
        )))
    }
}

/// Stop words carried over from the reference keyword extractor.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was", "one",
    "our", "out", "has", "have", "been", "some", "them", "than", "its", "over", "also", "with",
    "this", "that", "from", "they", "will", "each", "make", "like", "long", "look", "many",
    "then", "what", "were", "when", "your", "said", "into", "who", "did", "get", "may", "him",
    "his", "how", "let", "say", "she", "too", "use", "more", "other", "could", "would",
    "should", "being", "after", "before", "between", "through", "during", "without", "again",
    "further", "once", "here", "there", "where", "why", "very", "just", "only", "own", "same",
    "both", "few", "most", "such", "because", "until", "while", "above", "below", "does",
    "doing", "down", "having", "might", "must", "need", "still", "under", "upon", "which",
    "about", "these", "those", "every", "much", "any", "per", "via",
];
