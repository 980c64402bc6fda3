//! Field cipher for protected PII columns.
//!
//! Values are sealed with an AEAD cipher under a single 32-byte key and
//! stored as URL-safe base64 tokens: `base64url([header][ciphertext+tag])`.
//! The same cipher also produces the lookup digest used to search the email
//! column without decrypting every row.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use aes_gcm::Aes256Gcm;
use base64::{engine::general_purpose::URL_SAFE, Engine};
use chacha20poly1305::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng, Payload},
    ChaCha20Poly1305, Nonce,
};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::context::LookupContext;
use crate::error::{Error, KeyFormatError};
use crate::header::{CipherId, TokenHeader, HEADER_SIZE, NONCE_SIZE};
use crate::lookup::{self, DigestMode, LookupDigest};

/// Decoded key size in bytes.
pub const KEY_SIZE: usize = 32;

/// Decoded field key, wiped on drop.
pub type FieldKey = Zeroizing<[u8; KEY_SIZE]>;

/// Cipher used for new tokens.
///
/// Decryption follows the cipher recorded in each token, so switching modes
/// keeps existing rows readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherMode {
    /// ChaCha20-Poly1305 AEAD cipher (default).
    #[default]
    ChaCha20Poly1305,
    /// AES-256-GCM AEAD cipher.
    Aes256Gcm,
}

impl CipherMode {
    const fn cipher_id(self) -> CipherId {
        match self {
            Self::ChaCha20Poly1305 => CipherId::ChaCha20Poly1305,
            Self::Aes256Gcm => CipherId::Aes256Gcm,
        }
    }
}

impl FromStr for CipherMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chacha20poly1305" | "chacha20-poly1305" => Ok(Self::ChaCha20Poly1305),
            "aes256gcm" | "aes-256-gcm" => Ok(Self::Aes256Gcm),
            other => Err(format!("unknown cipher '{other}'")),
        }
    }
}

/// Encrypts and decrypts protected fields.
///
/// The key is validated on first use and the result cached; a malformed key
/// makes every operation return `Error::Configuration`.
///
/// # Example
///
/// ```
/// use boxoffice::cipher::{CipherMode, FieldCipher};
/// use secrecy::SecretString;
///
/// let key = SecretString::new("AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=".to_string());
/// let cipher = FieldCipher::new(key, CipherMode::default());
///
/// let token = cipher.encrypt("alice@example.com").unwrap();
/// assert_eq!(cipher.decrypt(&token).unwrap().as_deref(), Some("alice@example.com"));
/// ```
#[derive(Clone)]
pub struct FieldCipher {
    inner: Arc<Inner>,
}

struct Inner {
    material: SecretString,
    mode: CipherMode,
    digest_mode: DigestMode,
    key: OnceLock<Result<FieldKey, KeyFormatError>>,
}

impl FieldCipher {
    /// Creates a cipher from an encoded key. Plain SHA-256 lookup digests.
    #[must_use]
    pub fn new(material: SecretString, mode: CipherMode) -> Self {
        Self::with_digest_mode(material, mode, DigestMode::Plain)
    }

    /// Creates a cipher with an explicit lookup digest mode.
    #[must_use]
    pub fn with_digest_mode(material: SecretString, mode: CipherMode, digest_mode: DigestMode) -> Self {
        Self {
            inner: Arc::new(Inner { material, mode, digest_mode, key: OnceLock::new() }),
        }
    }

    /// Returns the cipher used for new tokens.
    #[must_use]
    pub fn mode(&self) -> CipherMode {
        self.inner.mode
    }

    /// Returns the lookup digest mode.
    #[must_use]
    pub fn digest_mode(&self) -> DigestMode {
        self.inner.digest_mode
    }

    /// Checks the key format without encrypting anything.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the key is not 32 bytes of URL-safe
    /// base64.
    pub fn validate_key(&self) -> Result<(), Error> {
        self.key().map(|_| ())
    }

    /// Encrypts the canonical string form of a value.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for a malformed key and
    /// `Error::EncryptionFailed` if the AEAD rejects the input.
    pub fn encrypt<T: fmt::Display + ?Sized>(&self, value: &T) -> Result<String, Error> {
        let key = self.key()?;
        let plaintext = Zeroizing::new(value.to_string());

        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        let header = TokenHeader::new(self.inner.mode.cipher_id(), nonce);
        let aad = header.to_bytes();

        let sealed = seal(header.cipher(), key, &nonce, plaintext.as_bytes(), &aad)?;

        let mut token = Vec::with_capacity(HEADER_SIZE + sealed.len());
        token.extend_from_slice(&aad);
        token.extend_from_slice(&sealed);

        Ok(URL_SAFE.encode(token))
    }

    /// Decrypts a token.
    ///
    /// Returns `Ok(None)` for tampered, foreign or malformed tokens, so a
    /// corrupted row degrades to missing data instead of failing a request.
    /// Fernet tokens are foreign: rows written in that format must be
    /// re-encrypted before their fields can be read.
    ///
    /// # Errors
    ///
    /// Only a malformed key is an error.
    pub fn decrypt(&self, token: &str) -> Result<Option<String>, Error> {
        let key = self.key()?;

        let Ok(data) = URL_SAFE.decode(token.trim()) else {
            tracing::debug!("field token is not valid base64");
            return Ok(None);
        };
        let Some((header, sealed)) = TokenHeader::split(&data) else {
            tracing::debug!("field token header is malformed");
            return Ok(None);
        };

        let aad = header.to_bytes();
        let Some(plaintext) = open(header.cipher(), key, header.nonce(), sealed, &aad) else {
            tracing::debug!("field token failed authentication");
            return Ok(None);
        };

        Ok(String::from_utf8(plaintext).ok())
    }

    /// Computes the lookup digest of a value after trimming and lower-casing it.
    ///
    /// # Errors
    ///
    /// In keyed mode, returns `Error::Configuration` for a malformed key.
    pub fn digest_for_lookup(&self, value: &str, context: &LookupContext) -> Result<LookupDigest, Error> {
        match self.inner.digest_mode {
            DigestMode::Plain => Ok(lookup::plain_digest(value)),
            DigestMode::Keyed => lookup::keyed_digest(self.key()?, value, context),
        }
    }

    fn key(&self) -> Result<&[u8; KEY_SIZE], Error> {
        let cached = self.inner.key.get_or_init(|| {
            let decoded = decode_key(self.inner.material.expose_secret());
            if let Err(err) = &decoded {
                tracing::error!(error = %err, "field encryption key is malformed");
            }
            decoded
        });
        match cached {
            Ok(key) => Ok(&**key),
            Err(err) => Err(Error::Configuration(err.clone())),
        }
    }
}

impl fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCipher")
            .field("mode", &self.inner.mode)
            .field("digest_mode", &self.inner.digest_mode)
            .finish_non_exhaustive()
    }
}

/// Decodes a URL-safe base64 key into its 32 raw bytes.
///
/// # Errors
///
/// Returns `KeyFormatError` if the encoding or the decoded length is wrong.
pub fn decode_key(encoded: &str) -> Result<FieldKey, KeyFormatError> {
    let decoded = Zeroizing::new(URL_SAFE.decode(encoded.trim()).map_err(|_| KeyFormatError::Encoding)?);
    if decoded.len() != KEY_SIZE {
        return Err(KeyFormatError::Length { expected: KEY_SIZE, actual: decoded.len() });
    }
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(&decoded);
    Ok(key)
}

fn seal(
    cipher: CipherId,
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    msg: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, Error> {
    let payload = Payload { msg, aad };
    match cipher {
        CipherId::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key)
            .map_err(|e| Error::EncryptionFailed(format!("Invalid key: {e}")))?
            .encrypt(Nonce::from_slice(nonce), payload)
            .map_err(|e| Error::EncryptionFailed(format!("ChaCha20-Poly1305 encryption failed: {e}"))),
        CipherId::Aes256Gcm => Aes256Gcm::new_from_slice(key)
            .map_err(|e| Error::EncryptionFailed(format!("Invalid key: {e}")))?
            .encrypt(aes_gcm::Nonce::from_slice(nonce), payload)
            .map_err(|e| Error::EncryptionFailed(format!("AES-256-GCM encryption failed: {e}"))),
    }
}

fn open(
    cipher: CipherId,
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    msg: &[u8],
    aad: &[u8],
) -> Option<Vec<u8>> {
    let payload = Payload { msg, aad };
    match cipher {
        CipherId::ChaCha20Poly1305 => {
            ChaCha20Poly1305::new_from_slice(key).ok()?.decrypt(Nonce::from_slice(nonce), payload).ok()
        }
        CipherId::Aes256Gcm => {
            Aes256Gcm::new_from_slice(key).ok()?.decrypt(aes_gcm::Nonce::from_slice(nonce), payload).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TEST_KEY: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";
    const OTHER_KEY: &str = "Hx4dHBsaGRgXFhUUExIREA8ODQwLCgkIBwYFBAMCAQA=";

    fn cipher(mode: CipherMode) -> FieldCipher {
        FieldCipher::new(SecretString::new(TEST_KEY.to_string()), mode)
    }

    fn with_key(key: &str) -> FieldCipher {
        FieldCipher::new(SecretString::new(key.to_string()), CipherMode::default())
    }

    #[test]
    fn test_round_trip_both_ciphers() {
        for mode in [CipherMode::ChaCha20Poly1305, CipherMode::Aes256Gcm] {
            let cipher = cipher(mode);
            let token = cipher.encrypt("alice@example.com").unwrap();
            assert_eq!(cipher.decrypt(&token).unwrap().as_deref(), Some("alice@example.com"));
        }
    }

    #[test]
    fn test_encrypts_canonical_string_form() {
        let cipher = cipher(CipherMode::default());

        let age = cipher.encrypt(&42).unwrap();
        let flag = cipher.encrypt(&true).unwrap();

        assert_eq!(cipher.decrypt(&age).unwrap().as_deref(), Some("42"));
        assert_eq!(cipher.decrypt(&flag).unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn test_tokens_are_randomized() {
        let cipher = cipher(CipherMode::default());
        let first = cipher.encrypt("alice").unwrap();
        let second = cipher.encrypt("alice").unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_decrypt_follows_token_cipher() {
        let chacha = cipher(CipherMode::ChaCha20Poly1305);
        let aes = cipher(CipherMode::Aes256Gcm);

        let token = aes.encrypt("bob").unwrap();
        assert_eq!(chacha.decrypt(&token).unwrap().as_deref(), Some("bob"));
    }

    #[test]
    fn test_empty_plaintext() {
        let cipher = cipher(CipherMode::default());
        let token = cipher.encrypt("").unwrap();
        assert_eq!(cipher.decrypt(&token).unwrap().as_deref(), Some(""));
    }

    #[test]
    fn test_wrong_key_is_absent() {
        let token = with_key(TEST_KEY).encrypt("alice").unwrap();
        assert_eq!(with_key(OTHER_KEY).decrypt(&token).unwrap(), None);
    }

    #[test]
    fn test_garbage_is_absent() {
        let cipher = cipher(CipherMode::default());

        assert_eq!(cipher.decrypt("").unwrap(), None);
        assert_eq!(cipher.decrypt("not base64 at all!").unwrap(), None);
        assert_eq!(cipher.decrypt("AQID").unwrap(), None);
    }

    #[test]
    fn test_fernet_token_is_absent() {
        let mut fernet = vec![0x80];
        fernet.extend_from_slice(&[0u8; 8]);
        fernet.extend_from_slice(&[1u8; 16]);
        fernet.extend_from_slice(&[2u8; 16]);
        fernet.extend_from_slice(&[3u8; 32]);
        let token = URL_SAFE.encode(&fernet);

        assert!(token.starts_with("gAAAAA"));
        assert_eq!(cipher(CipherMode::default()).decrypt(&token).unwrap(), None);
    }

    #[test]
    fn test_digest_is_not_a_token() {
        let cipher = cipher(CipherMode::default());
        let digest = cipher.digest_for_lookup("alice@example.com", &LookupContext::email()).unwrap();

        assert_eq!(cipher.decrypt(digest.as_str()).unwrap(), None);
    }

    #[test]
    fn test_swapped_cipher_byte_fails() {
        let cipher = cipher(CipherMode::ChaCha20Poly1305);
        let token = cipher.encrypt("alice").unwrap();

        let mut bytes = URL_SAFE.decode(&token).unwrap();
        bytes[0] = CipherId::Aes256Gcm.as_u8();

        assert_eq!(cipher.decrypt(&URL_SAFE.encode(bytes)).unwrap(), None);
    }

    #[test]
    fn test_malformed_key_is_configuration_error() {
        let short = with_key("c2hvcnQ=");
        assert!(matches!(
            short.encrypt("alice"),
            Err(Error::Configuration(KeyFormatError::Length { expected: 32, actual: 5 }))
        ));
        assert!(matches!(short.decrypt("anything"), Err(Error::Configuration(_))));

        let garbage = with_key("!!not-base64!!");
        assert!(matches!(garbage.validate_key(), Err(Error::Configuration(KeyFormatError::Encoding))));
    }

    #[test]
    fn test_standard_alphabet_key_is_rejected() {
        // 32 bytes of 0xfb encode with '+' and '/' in the standard alphabet.
        let standard = base64::engine::general_purpose::STANDARD.encode([0xfb; KEY_SIZE]);
        assert!(standard.contains('+') || standard.contains('/'));
        assert!(with_key(&standard).validate_key().is_err());
    }

    #[test]
    fn test_clone_shares_key() {
        let first = cipher(CipherMode::default());
        let second = first.clone();

        let token = first.encrypt("test").unwrap();
        assert_eq!(second.decrypt(&token).unwrap().as_deref(), Some("test"));
    }

    #[test]
    fn test_cipher_mode_from_str() {
        assert_eq!("chacha20poly1305".parse::<CipherMode>(), Ok(CipherMode::ChaCha20Poly1305));
        assert_eq!("AES-256-GCM".parse::<CipherMode>(), Ok(CipherMode::Aes256Gcm));
        assert!("rot13".parse::<CipherMode>().is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", cipher(CipherMode::default()));
        assert!(!rendered.contains(TEST_KEY));
    }

    proptest! {
        #[test]
        fn prop_round_trip(plaintext in ".*") {
            let cipher = cipher(CipherMode::default());
            let token = cipher.encrypt(&plaintext).unwrap();
            prop_assert_eq!(cipher.decrypt(&token).unwrap(), Some(plaintext));
        }

        #[test]
        fn prop_any_flipped_byte_is_rejected(plaintext in ".{0,64}", index in any::<prop::sample::Index>(), bit in 0u8..8) {
            let cipher = cipher(CipherMode::default());
            let token = cipher.encrypt(&plaintext).unwrap();

            let mut bytes = URL_SAFE.decode(&token).unwrap();
            let position = index.index(bytes.len());
            bytes[position] ^= 1 << bit;

            prop_assert_eq!(cipher.decrypt(&URL_SAFE.encode(bytes)).unwrap(), None);
        }
    }
}
