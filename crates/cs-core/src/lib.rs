pub mod config;
pub mod error;
pub mod types;

pub use error::{CsError, CsResult};
pub use types::{EncryptedDocument, EncryptedRecord, IngestRequest, NgramSet, SearchOp, Token};
