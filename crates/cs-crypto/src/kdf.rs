//! Key derivation: PBKDF2-HMAC-SHA256 passphrase → 256-bit keys

use cs_core::config::{KdfConfig, MIN_KDF_ITERATIONS};
use cs_core::{CsError, CsResult};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{KEY_SIZE, SALT_SIZE};

/// PBKDF2 parameters for KDF
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// HMAC-SHA256 iterations (default and floor: 100000)
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: MIN_KDF_ITERATIONS,
        }
    }
}

impl From<&KdfConfig> for KdfParams {
    fn from(config: &KdfConfig) -> Self {
        Self {
            iterations: config.iterations,
        }
    }
}

/// Generate a fresh random session salt.
pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit key from a passphrase, salt, and context label.
///
/// The effective PBKDF2 salt is `salt || context`, so keys derived for
/// different contexts are independent even though they share the session salt.
/// Same inputs always yield the same key; the salt need not be secret.
pub fn derive_key(
    passphrase: &SecretString,
    salt: &[u8],
    context: &[u8],
    params: &KdfParams,
) -> CsResult<[u8; KEY_SIZE]> {
    if params.iterations < MIN_KDF_ITERATIONS {
        return Err(CsError::KeyDerivation(format!(
            "PBKDF2 iterations {} below minimum {MIN_KDF_ITERATIONS}",
            params.iterations
        )));
    }
    if salt.len() < SALT_SIZE {
        return Err(CsError::InvalidInput(format!(
            "salt too short: {} bytes (minimum {SALT_SIZE})",
            salt.len()
        )));
    }
    if context.is_empty() {
        return Err(CsError::KeyDerivation("empty context label".into()));
    }

    let mut effective_salt = Vec::with_capacity(salt.len() + context.len());
    effective_salt.extend_from_slice(salt);
    effective_salt.extend_from_slice(context);

    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(
        passphrase.expose_secret().as_bytes(),
        &effective_salt,
        params.iterations,
        &mut key,
    );
    effective_salt.zeroize();

    Ok(key)
}
