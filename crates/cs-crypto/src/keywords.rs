//! Keyword extraction for indexing.
//!
//! A keyword is a whole word (maximal run of alphanumerics and `_`) made only
//! of ASCII letters and digits, at least `min_length` long, not a stop word.
//! Words glued to `_` or non-ASCII letters are skipped entirely rather than
//! split.

use std::collections::{BTreeSet, HashSet};

use cs_core::config::KeywordConfig;

#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    min_length: usize,
    stop_words: HashSet<String>,
}

impl KeywordExtractor {
    pub fn new(config: &KeywordConfig) -> Self {
        Self {
            min_length: config.min_length,
            stop_words: config
                .stop_words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .collect(),
        }
    }

    /// Sorted, de-duplicated keywords of `text`.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        lowered
            .split(|c: char| !is_word_char(c))
            .filter(|word| word.chars().all(|c| c.is_ascii_alphanumeric()))
            .filter(|word| word.len() >= self.min_length)
            .filter(|word| !self.stop_words.contains(*word))
            .map(str::to_owned)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(&KeywordConfig::default())
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_medical_note() {
        let extractor = KeywordExtractor::default();
        let keywords = extractor.extract(
            "Patient John Smith diagnosed with Type 2 Diabetes and Hypertension. \
             Prescribed Metformin 500mg and Lisinopril 10mg.",
        );

        assert_eq!(
            keywords,
            vec![
                "10mg",
                "500mg",
                "diabetes",
                "diagnosed",
                "hypertension",
                "john",
                "lisinopril",
                "metformin",
                "patient",
                "prescribed",
                "smith",
                "type",
            ]
        );
    }

    #[test]
    fn test_extract_dedups_and_sorts() {
        let keywords = KeywordExtractor::default().extract("zeta alpha ZETA Alpha beta");
        assert_eq!(keywords, vec!["alpha", "beta", "zeta"]);
    }

    #[test]
    fn test_extract_skips_short_and_stop_words() {
        let keywords = KeywordExtractor::default().extract("an ox and the cat with hats");
        assert_eq!(keywords, vec!["cat", "hats"]);
    }

    #[test]
    fn test_extract_skips_glued_words() {
        let keywords = KeywordExtractor::default().extract("snake_case café naïve plain");
        assert_eq!(keywords, vec!["plain"]);
    }

    #[test]
    fn test_extract_empty() {
        assert!(KeywordExtractor::default().extract("").is_empty());
        assert!(KeywordExtractor::default().extract("!! ?? --").is_empty());
    }

    #[test]
    fn test_custom_config() {
        let extractor = KeywordExtractor::new(&KeywordConfig {
            min_length: 5,
            stop_words: vec!["Patient".into()],
        });
        let keywords = extractor.extract("patient reports chronic migraine and anxiety");
        assert_eq!(keywords, vec!["anxiety", "chronic", "migraine", "reports"]);
    }
}
