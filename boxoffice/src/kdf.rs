//! Key generation and derivation.
//!
//! The field key is used directly for AEAD encryption. Keyed lookup digests
//! never use it as-is: they use a pepper derived from it with HKDF-SHA256.

use base64::{engine::general_purpose::URL_SAFE, Engine};
use chacha20poly1305::aead::{rand_core::RngCore, OsRng};
use hkdf::Hkdf;
use secrecy::SecretString;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::cipher::KEY_SIZE;
use crate::error::Error;

/// Pepper size in bytes.
pub const PEPPER_SIZE: usize = 32;

const PEPPER_INFO: &[u8] = b"boxoffice|lookup-pepper|v1";

/// Derives the lookup pepper from the field key.
///
/// # Errors
///
/// Returns `Error::EncryptionFailed` if HKDF expansion fails, which cannot
/// happen for a 32-byte output.
pub fn derive_pepper(key: &[u8; KEY_SIZE]) -> Result<Zeroizing<[u8; PEPPER_SIZE]>, Error> {
    let hkdf = Hkdf::<Sha256>::new(None, key);
    let mut pepper = Zeroizing::new([0u8; PEPPER_SIZE]);
    hkdf.expand(PEPPER_INFO, &mut pepper[..])
        .map_err(|e| Error::EncryptionFailed(format!("pepper derivation failed: {e}")))?;
    Ok(pepper)
}

/// Generates a fresh field key, URL-safe base64 encoded.
///
/// # Example
///
/// ```
/// use boxoffice::kdf::generate_key;
/// use secrecy::ExposeSecret;
///
/// let key = generate_key();
/// assert_eq!(key.expose_secret().len(), 44);
/// ```
#[must_use]
pub fn generate_key() -> SecretString {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    OsRng.fill_bytes(&mut key[..]);
    SecretString::new(URL_SAFE.encode(&key[..]))
}
