//! File-based key source for `boxoffice`.
//!
//! Keeps the field encryption key in a single file instead of the `KEY`
//! environment variable. Suitable for development and single-host
//! deployments.

#![warn(clippy::pedantic, clippy::nursery)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use boxoffice::error::KeySourceError;
use boxoffice::kdf::generate_key;
use boxoffice::key_source::KeySource;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

/// Reads the field key from a file.
///
/// The file holds the 44-character URL-safe base64 key on one line, with
/// 0600 permissions on Unix. Surrounding whitespace is ignored.
#[derive(Debug, Clone)]
pub struct FileKeySource {
    path: PathBuf,
}

impl FileKeySource {
    /// Creates a new `FileKeySource`.
    ///
    /// # Errors
    ///
    /// Returns error if the key file doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, KeySourceError> {
        let path = path.into();
        if !path.is_file() {
            return Err(KeySourceError::Missing(format!("Key file does not exist: {}", path.display())));
        }
        Ok(Self { path })
    }

    /// Returns the key file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes a freshly generated key to `path`.
    ///
    /// Parent directories are created as needed. An existing file is never
    /// overwritten.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists or cannot be written.
    pub fn init(path: impl Into<PathBuf>) -> Result<Self, KeySourceError> {
        let path = path.into();
        if path.exists() {
            return Err(KeySourceError::CreationFailed(format!(
                "Refusing to overwrite existing key file: {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let key = generate_key();
        let mut file = create_private(&path)?;
        file.write_all(key.expose_secret().as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;

        Ok(Self { path })
    }
}

impl KeySource for FileKeySource {
    fn encryption_key(&self) -> Result<SecretString, KeySourceError> {
        let contents = Zeroizing::new(fs::read_to_string(&self.path)?);
        let key = contents.trim();
        if key.is_empty() {
            return Err(KeySourceError::Unreadable(format!("Key file is empty: {}", self.path.display())));
        }
        Ok(SecretString::new(key.to_string()))
    }
}

#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new().write(true).create_new(true).mode(0o600).open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create_new(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice::cipher::{decode_key, CipherMode, FieldCipher};
    use tempfile::TempDir;

    #[test]
    fn test_init_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keys").join("boxoffice.key");

        FileKeySource::init(&path).unwrap();
        let source = FileKeySource::new(&path).unwrap();
        let key = source.encryption_key().unwrap();

        assert_eq!(key.expose_secret().len(), 44);
        assert!(decode_key(key.expose_secret()).is_ok());
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("boxoffice.key");

        let first = FileKeySource::init(&path).unwrap().encryption_key().unwrap();
        let err = FileKeySource::init(&path).unwrap_err();

        assert!(matches!(err, KeySourceError::CreationFailed(_)));
        let after = FileKeySource::new(&path).unwrap().encryption_key().unwrap();
        assert_eq!(first.expose_secret(), after.expose_secret());
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = FileKeySource::new(dir.path().join("absent.key")).unwrap_err();
        assert!(matches!(err, KeySourceError::Missing(_)));
    }

    #[test]
    fn test_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.key");
        fs::write(&path, "\n").unwrap();

        let err = FileKeySource::new(&path).unwrap().encryption_key().unwrap_err();
        assert!(matches!(err, KeySourceError::Unreadable(_)));
    }

    #[test]
    fn test_key_drives_cipher() {
        let dir = TempDir::new().unwrap();
        let source = FileKeySource::init(dir.path().join("boxoffice.key")).unwrap();
        let cipher = FieldCipher::new(source.encryption_key().unwrap(), CipherMode::default());

        let token = cipher.encrypt("alice@example.com").unwrap();
        assert_eq!(cipher.decrypt(&token).unwrap().as_deref(), Some("alice@example.com"));
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let source = FileKeySource::init(dir.path().join("boxoffice.key")).unwrap();
        let mode = fs::metadata(source.path()).unwrap().permissions().mode();

        assert_eq!(mode & 0o777, 0o600);
    }
}
