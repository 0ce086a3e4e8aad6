//! cs-index: the untrusted side of CipherSearch
//!
//! Persists ciphertext, nonces, and opaque tokens, and answers exact, boolean
//! (AND/OR), and n-gram threshold queries purely by token comparison. This
//! crate does not depend on `cs-crypto`: it has no way to derive keys.

pub mod audit;
pub mod relations;
pub mod store;

pub use audit::{AuditAction, AuditDetails, AuditEntry, AuditLog};
pub use relations::{IndexEntry, NgramPosting, StoredDocument};
pub use store::{Store, StoreStats};
