//! Process configuration from the environment.
//!
//! | Variable      | Default             |                                   |
//! |---------------|---------------------|-----------------------------------|
//! | `KEY`         | required            | field key, URL-safe base64        |
//! | `DB_PATH`     | `boxoffice.sqlite`  | SQLite database file              |
//! | `CIPHER`      | `chacha20poly1305`  | cipher for new tokens             |
//! | `DIGEST_MODE` | `plain`             | `plain` or `keyed` lookup digests |
//!
//! A `.env` file in the working directory is loaded first; variables already
//! set in the process take precedence.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::cipher::{CipherMode, FieldCipher};
use crate::error::Error;
use crate::key_source::{EnvKeySource, KeySource};
use crate::lookup::DigestMode;

/// Default database file.
pub const DEFAULT_DB_PATH: &str = "boxoffice.sqlite";

/// Resolved settings.
#[derive(Debug)]
pub struct Settings {
    pub db_path: PathBuf,
    pub cipher_mode: CipherMode,
    pub digest_mode: DigestMode,
    key: SecretString,
}

impl Settings {
    /// Loads `.env`, then reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeySource` if `KEY` is unset and
    /// `Error::InvalidSetting` for an unparsable value. The key's format is
    /// not checked here; see [`FieldCipher::validate_key`].
    pub fn from_env() -> Result<Self, Error> {
        Self::from_env_with(&EnvKeySource::default())
    }

    /// Like [`Self::from_env`], but takes the key from `key_source`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_env_with(key_source: &dyn KeySource) -> Result<Self, Error> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(err) if err.not_found() => {}
            Err(err) => {
                return Err(Error::InvalidSetting { name: ".env", message: err.to_string() });
            }
        }
        Self::from_lookup(key_source, |name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`, with the key from `key_source`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup<F>(key_source: &dyn KeySource, lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = key_source.encryption_key()?;

        let db_path = lookup("DB_PATH")
            .filter(|path| !path.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from);

        let cipher_mode = match lookup("CIPHER") {
            Some(value) => value
                .parse()
                .map_err(|message| Error::InvalidSetting { name: "CIPHER", message })?,
            None => CipherMode::default(),
        };

        let digest_mode = match lookup("DIGEST_MODE") {
            Some(value) => value
                .parse()
                .map_err(|message| Error::InvalidSetting { name: "DIGEST_MODE", message })?,
            None => DigestMode::default(),
        };

        Ok(Self { db_path, cipher_mode, digest_mode, key })
    }

    /// Builds the field cipher for these settings.
    #[must_use]
    pub fn field_cipher(&self) -> FieldCipher {
        FieldCipher::with_digest_mode(self.key.clone(), self.cipher_mode, self.digest_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KeySourceError;
    use std::collections::HashMap;

    const TEST_KEY: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";

    struct StaticKey(Option<&'static str>);

    impl KeySource for StaticKey {
        fn encryption_key(&self) -> Result<SecretString, KeySourceError> {
            self.0
                .map(|key| SecretString::new(key.to_string()))
                .ok_or_else(|| KeySourceError::Missing("KEY".into()))
        }
    }

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, Error> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        Settings::from_lookup(&StaticKey(Some(TEST_KEY)), |name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();

        assert_eq!(settings.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(settings.cipher_mode, CipherMode::ChaCha20Poly1305);
        assert_eq!(settings.digest_mode, DigestMode::Plain);
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("DB_PATH", "/var/lib/boxoffice/db.sqlite"),
            ("CIPHER", "aes256gcm"),
            ("DIGEST_MODE", "keyed"),
        ])
        .unwrap();

        assert_eq!(settings.db_path, PathBuf::from("/var/lib/boxoffice/db.sqlite"));
        assert_eq!(settings.cipher_mode, CipherMode::Aes256Gcm);
        assert_eq!(settings.digest_mode, DigestMode::Keyed);

        let cipher = settings.field_cipher();
        assert_eq!(cipher.mode(), CipherMode::Aes256Gcm);
        assert_eq!(cipher.digest_mode(), DigestMode::Keyed);
        assert!(cipher.validate_key().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            settings(&[("CIPHER", "des")]),
            Err(Error::InvalidSetting { name: "CIPHER", .. })
        ));
        assert!(matches!(
            settings(&[("DIGEST_MODE", "md5")]),
            Err(Error::InvalidSetting { name: "DIGEST_MODE", .. })
        ));
    }

    #[test]
    fn test_missing_key() {
        let result = Settings::from_lookup(&StaticKey(None), |_| None);
        assert!(matches!(result, Err(Error::KeySource(KeySourceError::Missing(_)))));
    }
}
