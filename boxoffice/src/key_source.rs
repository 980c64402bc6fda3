//! Key source abstraction for loading the field encryption key.

use secrecy::SecretString;

use crate::error::KeySourceError;

/// Name of the environment variable holding the encryption key.
pub const KEY_ENV_VAR: &str = "KEY";

/// Supplies the URL-safe base64 encryption key.
///
/// The key is returned as-is; format validation belongs to
/// [`FieldCipher`](crate::cipher::FieldCipher), which reports a malformed key
/// on first use.
///
/// # Example
///
/// ```rust,ignore
/// use boxoffice::key_source::{EnvKeySource, KeySource};
///
/// let key = EnvKeySource::default().encryption_key()?;
/// let cipher = FieldCipher::new(key, CipherMode::default());
/// ```
pub trait KeySource: Send + Sync {
    /// Returns the encoded encryption key.
    ///
    /// # Errors
    ///
    /// Returns `KeySourceError::Missing` if no key is configured and
    /// `KeySourceError::Unreadable` if it cannot be read.
    fn encryption_key(&self) -> Result<SecretString, KeySourceError>;
}

/// Reads the key from an environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvKeySource {
    var: String,
}

impl EnvKeySource {
    /// Creates a source reading the given variable.
    #[must_use]
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    /// Returns the variable name.
    #[must_use]
    pub fn var(&self) -> &str {
        &self.var
    }
}

impl Default for EnvKeySource {
    fn default() -> Self {
        Self::new(KEY_ENV_VAR)
    }
}

impl KeySource for EnvKeySource {
    fn encryption_key(&self) -> Result<SecretString, KeySourceError> {
        match std::env::var(&self.var) {
            Ok(value) if value.trim().is_empty() => Err(KeySourceError::Missing(self.var.clone())),
            Ok(value) => Ok(SecretString::new(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(KeySourceError::Missing(self.var.clone())),
            Err(err) => Err(KeySourceError::Unreadable(format!("{}: {err}", self.var))),
        }
    }
}
