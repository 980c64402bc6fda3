//! Header format for protected field tokens.
//!
//! Every token starts with a fixed header:
//! - Cipher identifier (also the format version)
//! - Nonce
//!
//! The header is authenticated as associated data, so swapping the cipher
//! byte or the nonce makes decryption fail.

/// Nonce size shared by ChaCha20-Poly1305 and AES-256-GCM (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Total header length in bytes.
pub const HEADER_SIZE: usize = 1 + NONCE_SIZE;

/// AEAD algorithm recorded in a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherId {
    /// ChaCha20-Poly1305
    ChaCha20Poly1305,
    /// AES-256-GCM
    Aes256Gcm,
}

impl CipherId {
    /// Returns the byte stored in the header.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::ChaCha20Poly1305 => 0x01,
            Self::Aes256Gcm => 0x02,
        }
    }

    /// Parses a header byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::ChaCha20Poly1305),
            0x02 => Some(Self::Aes256Gcm),
            _ => None,
        }
    }
}

/// Token header containing what decryption needs besides the key.
///
/// Format:
/// ```text
/// [cipher:1][nonce:12]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenHeader {
    cipher: CipherId,
    nonce: [u8; NONCE_SIZE],
}

impl TokenHeader {
    /// Creates a new header.
    #[must_use]
    pub const fn new(cipher: CipherId, nonce: [u8; NONCE_SIZE]) -> Self {
        Self { cipher, nonce }
    }

    /// Returns the cipher identifier.
    #[must_use]
    pub const fn cipher(&self) -> CipherId {
        self.cipher
    }

    /// Returns the nonce.
    #[must_use]
    pub const fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    /// Serializes the header.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0] = self.cipher.as_u8();
        bytes[1..].copy_from_slice(&self.nonce);
        bytes
    }

    /// Splits a token into its header and the sealed payload.
    ///
    /// Returns `None` if the data is too short or names an unknown cipher.
    #[must_use]
    pub fn split(data: &[u8]) -> Option<(Self, &[u8])> {
        if data.len() < HEADER_SIZE {
            return None;
        }
        let (header, payload) = data.split_at(HEADER_SIZE);
        let cipher = CipherId::from_u8(header[0])?;
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&header[1..]);
        Some((Self { cipher, nonce }, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cipher_id_bytes() {
        assert_eq!(CipherId::ChaCha20Poly1305.as_u8(), 0x01);
        assert_eq!(CipherId::Aes256Gcm.as_u8(), 0x02);
        assert_eq!(CipherId::from_u8(0x01), Some(CipherId::ChaCha20Poly1305));
        assert_eq!(CipherId::from_u8(0x02), Some(CipherId::Aes256Gcm));
        assert_eq!(CipherId::from_u8(0x80), None);
    }

    #[test]
    fn test_header_split() {
        let header = TokenHeader::new(CipherId::Aes256Gcm, [7; NONCE_SIZE]);
        let mut token = header.to_bytes().to_vec();
        token.extend_from_slice(b"payload");

        let (parsed, payload) = TokenHeader::split(&token).expect("header should parse");
        assert_eq!(parsed, header);
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn test_header_unknown_cipher() {
        let mut bytes = vec![0x7f];
        bytes.extend_from_slice(&[0; NONCE_SIZE]);
        assert!(TokenHeader::split(&bytes).is_none());
    }

    #[test]
    fn test_header_truncated_data() {
        assert!(TokenHeader::split(&[0x01, 1, 2, 3]).is_none());
        assert!(TokenHeader::split(&[]).is_none());
    }

    #[test]
    fn test_header_with_empty_payload() {
        let header = TokenHeader::new(CipherId::ChaCha20Poly1305, [1; NONCE_SIZE]);
        let bytes = header.to_bytes();
        let (parsed, payload) = TokenHeader::split(&bytes).unwrap();

        assert_eq!(parsed.cipher(), CipherId::ChaCha20Poly1305);
        assert_eq!(parsed.nonce(), &[1; NONCE_SIZE]);
        assert!(payload.is_empty());
    }
}
