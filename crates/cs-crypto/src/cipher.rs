//! Document AES-256-GCM encryption/decryption
//!
//! Each call draws a fresh 96-bit nonce from the thread-local CSPRNG. The
//! document id is bound as AAD (Additional Authenticated Data), so a
//! ciphertext moved under another document id no longer decrypts.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use cs_core::{CsError, CsResult};

use crate::keys::DataKey;
use crate::NONCE_SIZE;

/// Output of [`encrypt`]: ciphertext with appended tag, plus its nonce.
#[derive(Debug, Clone)]
pub struct SealedText {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
}

/// Encrypt `plaintext` under `data_key`, binding `aad` (the document id).
pub fn encrypt(data_key: &DataKey, aad: &[u8], plaintext: &[u8]) -> CsResult<SealedText> {
    let cipher = Aes256Gcm::new(data_key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CsError::InvalidInput("plaintext too large for AES-GCM".into()))?;

    Ok(SealedText {
        ciphertext,
        nonce: nonce_bytes,
    })
}

/// Decrypt and verify `ciphertext` (with tag) under `data_key`.
///
/// Fails closed: a bad tag, a different `aad`, or the wrong key all return
/// [`CsError::Authentication`] and never a partial plaintext.
pub fn decrypt(data_key: &DataKey, aad: &[u8], nonce: &[u8], ciphertext: &[u8]) -> CsResult<Vec<u8>> {
    if nonce.len() != NONCE_SIZE {
        return Err(CsError::InvalidInput(format!(
            "nonce must be {NONCE_SIZE} bytes, got {}",
            nonce.len()
        )));
    }

    let cipher = Aes256Gcm::new(data_key.as_bytes().into());
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CsError::Authentication)
}
