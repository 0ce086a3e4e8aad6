//! cs-crypto: client-side searchable symmetric encryption for CipherSearch
//!
//! Everything in this crate runs on the client. The store only ever sees its
//! outputs: base64 ciphertext, nonces, and opaque tokens.
//!
//! Key hierarchy:
//! ```text
//! Master secret (passphrase) + session salt (16 random bytes)
//!   ├── Data Key   (PBKDF2-HMAC-SHA256, salt = salt || "ciphersearch:data")
//!   │   └── AES-256-GCM (nonce = random 96-bit, AAD = document id)
//!   └── Search Key (PBKDF2-HMAC-SHA256, salt = salt || "ciphersearch:search")
//!       ├── exact token  = HMAC-SHA256(search_key, normalize(keyword))
//!       └── n-gram token = HMAC-SHA256(search_key, "ngram:" || window)
//! ```

pub mod cipher;
pub mod engine;
pub mod kdf;
pub mod keys;
pub mod keywords;
pub mod tokens;

pub use cipher::{decrypt, encrypt, SealedText};
pub use engine::Engine;
pub use kdf::{derive_key, generate_salt, KdfParams};
pub use keys::{derive_session_keys, DataKey, SearchKey};
pub use keywords::KeywordExtractor;
pub use tokens::{exact_token, ngram_tokens, ngram_windows, normalize};

/// Size of a derived key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Length of a freshly generated session salt
pub const SALT_SIZE: usize = 16;
