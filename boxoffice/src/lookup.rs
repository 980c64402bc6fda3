//! Lookup digests for searching encrypted columns.
//!
//! Encrypted tokens are randomized, so they cannot be compared for equality.
//! Each searchable column gets a companion digest over the normalized
//! plaintext instead. Digests are one-way; a match is only a candidate and is
//! confirmed by decrypting the row.

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::cipher::KEY_SIZE;
use crate::context::LookupContext;
use crate::error::Error;
use crate::kdf::derive_pepper;

type HmacSha256 = Hmac<Sha256>;

/// Digest length in hex characters.
pub const DIGEST_HEX_LEN: usize = 64;

/// How lookup digests are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestMode {
    /// `SHA-256(normalized)`. Digests of rows written before the AEAD token
    /// format still match, but those rows' fields only decrypt once
    /// re-encrypted.
    #[default]
    Plain,
    /// `HMAC-SHA256(pepper, normalized || context)`, pepper derived from the field key.
    Keyed,
}

impl FromStr for DigestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "keyed" => Ok(Self::Keyed),
            other => Err(format!("unknown digest mode '{other}'")),
        }
    }
}

/// Fixed-length hex digest stored in a lookup column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupDigest(String);

impl LookupDigest {
    /// Returns the hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the digest, returning the hex string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for LookupDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trims surrounding whitespace and lower-cases a value.
///
/// # Example
///
/// ```
/// use boxoffice::lookup::normalize;
///
/// assert_eq!(normalize("  Foo@Bar.COM "), "foo@bar.com");
/// ```
#[must_use]
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Computes the plain SHA-256 digest of a normalized value.
#[must_use]
pub fn plain_digest(value: &str) -> LookupDigest {
    let digest = Sha256::digest(normalize(value).as_bytes());
    LookupDigest(hex::encode(digest))
}

/// Computes the keyed digest of a normalized value.
///
/// # Errors
///
/// Returns error if the pepper cannot be derived or the HMAC rejects it.
pub fn keyed_digest(
    key: &[u8; KEY_SIZE],
    value: &str,
    context: &LookupContext,
) -> Result<LookupDigest, Error> {
    let pepper = derive_pepper(key)?;

    let mut mac = HmacSha256::new_from_slice(pepper.as_slice())
        .map_err(|e| Error::EncryptionFailed(format!("Invalid pepper: {e}")))?;

    mac.update(normalize(value).as_bytes());
    // Separator keeps "ab" + "c|d" apart from "a" + "bc|d".
    mac.update(&[0]);
    mac.update(context.to_string().as_bytes());

    Ok(LookupDigest(hex::encode(mac.finalize().into_bytes())))
}
