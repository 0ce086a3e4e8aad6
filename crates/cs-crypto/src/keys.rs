//! Key separation: one passphrase → independent data and search keys

use secrecy::SecretString;
use zeroize::Zeroize;

use cs_core::CsResult;

use crate::kdf::{derive_key, KdfParams};
use crate::KEY_SIZE;

/// Context label for the document encryption key.
pub const DATA_KEY_CONTEXT: &[u8] = b"ciphersearch:data";

/// Context label for the token generation key.
pub const SEARCH_KEY_CONTEXT: &[u8] = b"ciphersearch:search";

/// 256-bit AES-GCM key for document contents. Zeroized on drop.
pub struct DataKey {
    bytes: [u8; KEY_SIZE],
}

impl DataKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DataKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// 256-bit HMAC key for search tokens. Zeroized on drop.
pub struct SearchKey {
    bytes: [u8; KEY_SIZE],
}

impl SearchKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SearchKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SearchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive the data key and search key for a session.
pub fn derive_session_keys(
    passphrase: &SecretString,
    salt: &[u8],
    params: &KdfParams,
) -> CsResult<(DataKey, SearchKey)> {
    let data = derive_key(passphrase, salt, DATA_KEY_CONTEXT, params)?;
    let search = derive_key(passphrase, salt, SEARCH_KEY_CONTEXT, params)?;
    Ok((DataKey::from_bytes(data), SearchKey::from_bytes(search)))
}
