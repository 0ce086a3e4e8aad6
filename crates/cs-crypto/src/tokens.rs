//! Deterministic HMAC-SHA256 search tokens
//!
//! Determinism is required here (same keyword + key = same token) because the
//! store matches tokens by equality. HMAC keeps them one-way: without the
//! search key a token cannot be linked back to its keyword or recomputed.
//!
//! N-gram tokens share the keyed function but hash `"ngram:" + window`, so the
//! exact and n-gram token spaces never collide.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use cs_core::{CsError, CsResult, Token};

use crate::keys::SearchKey;

type HmacSha256 = Hmac<Sha256>;

/// Namespace prefix for n-gram windows.
pub const NGRAM_PREFIX: &str = "ngram:";

/// Boundary marker used to pad keywords before slicing windows.
pub const PAD_MARKER: char = '$';

/// Lowercase and trim surrounding whitespace.
pub fn normalize(keyword: &str) -> String {
    keyword.to_lowercase().trim().to_string()
}

/// Exact-match token for `keyword` (normalized first).
pub fn exact_token(search_key: &SearchKey, keyword: &str) -> CsResult<Token> {
    let normalized = normalize(keyword);
    let mut mac = <HmacSha256 as Mac>::new_from_slice(search_key.as_bytes())
        .map_err(|e| CsError::KeyDerivation(format!("HMAC key setup: {e}")))?;
    mac.update(normalized.as_bytes());
    Ok(Token::new(URL_SAFE.encode(mac.finalize().into_bytes())))
}

/// Padded character windows of `keyword`, e.g. `"cat"`, n=3 →
/// `["$$c", "$ca", "cat", "at$", "t$$"]`.
pub fn ngram_windows(keyword: &str, n: usize) -> CsResult<Vec<String>> {
    if n == 0 {
        return Err(CsError::InvalidInput("n-gram size must be at least 1".into()));
    }

    let pad: String = std::iter::repeat(PAD_MARKER).take(n - 1).collect();
    let padded: Vec<char> = format!("{pad}{}{pad}", normalize(keyword)).chars().collect();

    let windows: Vec<String> = padded
        .windows(n)
        .map(|w| w.iter().collect())
        .collect();
    if windows.is_empty() {
        return Err(CsError::InvalidInput(
            "keyword produced no n-gram windows".into(),
        ));
    }
    Ok(windows)
}

/// One token per padded window of `keyword`, in window order.
pub fn ngram_tokens(search_key: &SearchKey, keyword: &str, n: usize) -> CsResult<Vec<Token>> {
    ngram_windows(keyword, n)?
        .iter()
        .map(|window| exact_token(search_key, &format!("{NGRAM_PREFIX}{window}")))
        .collect()
}
