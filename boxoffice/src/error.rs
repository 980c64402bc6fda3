//! Error types for `boxoffice` operations.

use std::fmt;

use crate::tariff::UnknownTariff;
use crate::token::TokenError;

/// Column whose uniqueness makes a duplicate account.
const EMAIL_HASH_COLUMN: &str = "users.email_hash";

/// Main error type for core operations.
///
/// Wrong passwords and undecryptable fields are not errors: they are reported
/// as `false` and `None` by the guardian and the cipher.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configured encryption key is malformed
    #[error("invalid encryption key: {0}")]
    Configuration(#[from] KeyFormatError),

    /// The encryption key could not be loaded
    #[error("key source error: {0}")]
    KeySource(#[from] KeySourceError),

    /// Empty passwords are never hashed
    #[error("password must not be empty")]
    EmptyPassword,

    /// The hashing profile cannot be expressed by Argon2 or a PHC string
    #[error("invalid hashing profile: {0}")]
    InvalidProfile(String),

    /// Argon2 failed while computing a credential
    #[error("password hashing failed: {0}")]
    Hashing(String),

    /// Encryption operation failed
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// A configuration value could not be parsed
    #[error("invalid setting {name}: {message}")]
    InvalidSetting {
        /// Variable name
        name: &'static str,
        /// What was wrong with it
        message: String,
    },
}

/// Reasons an encryption key is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyFormatError {
    /// The key is not URL-safe base64
    #[error("key is not URL-safe base64 encoded")]
    Encoding,

    /// The decoded key has the wrong size
    #[error("key must decode to {expected} bytes, got {actual}")]
    Length {
        /// Required key length
        expected: usize,
        /// Decoded key length
        actual: usize,
    },
}

/// Errors raised by storage backends and transaction scopes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite operation failed
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A uniqueness constraint was violated
    #[error("conflicting record: {0}")]
    Conflict(String),

    /// The scope has already committed or rolled back
    #[error("transaction scope is already finished")]
    ScopeFinished,

    /// The connection lease was poisoned by a panicking holder
    #[error("storage connection poisoned")]
    Poisoned,
}

/// Errors specific to key source operations.
#[derive(Debug)]
pub enum KeySourceError {
    /// The key is not configured
    Missing(String),

    /// The key exists but could not be read
    Unreadable(String),

    /// Key creation failed
    CreationFailed(String),

    /// I/O operation failed
    Io(std::io::Error),
}

impl fmt::Display for KeySourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(name) => write!(f, "encryption key not configured: {name}"),
            Self::Unreadable(msg) => write!(f, "encryption key unreadable: {msg}"),
            Self::CreationFailed(msg) => write!(f, "key creation failed: {msg}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for KeySourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for KeySourceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl StoreError {
    /// Maps SQLite uniqueness violations to [`StoreError::Conflict`].
    ///
    /// Other constraint failures (foreign key, not null) stay
    /// [`StoreError::Database`].
    pub(crate) fn from_sqlite(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, msg)
                if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                Self::Conflict(msg.unwrap_or_else(|| "uniqueness violation".to_string()))
            }
            other => Self::Database(other),
        }
    }

    /// Returns `true` for a uniqueness conflict on `column` (`table.column`).
    #[must_use]
    pub fn is_conflict_on(&self, column: &str) -> bool {
        matches!(self, Self::Conflict(msg) if msg.ends_with(column))
    }
}

/// Outcome of a rejected account or ticket operation.
///
/// The first group are request-level refusals a caller maps to a response;
/// the wrapped variants are faults.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Required fields were absent
    #[error("Missing value(s): [{}]", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// Role outside `user`/`admin`
    #[error("Invalid role. Allowed values: 'user', 'admin'.")]
    InvalidRole,

    /// Tariff outside the catalogue
    #[error(transparent)]
    InvalidTariff(#[from] UnknownTariff),

    /// An account with this email already exists
    #[error("Account already exists.")]
    Conflict,

    /// The addressed record does not exist
    #[error("{0} not found.")]
    NotFound(&'static str),

    /// The caller lacks the required role
    #[error("Admin role required.")]
    Forbidden,

    /// Unknown email or wrong password
    #[error("Email or password invalid.")]
    InvalidCredentials,

    /// An update named no field
    #[error("At least one field is required.")]
    NothingToUpdate,

    /// Token issuance failed
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Hashing, encryption or key failure
    #[error(transparent)]
    Core(#[from] Error),

    /// Storage failure
    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            err if err.is_conflict_on(EMAIL_HASH_COLUMN) => Self::Conflict,
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_email_is_account_conflict() {
        let err = StoreError::Conflict("UNIQUE constraint failed: users.email_hash".into());
        assert!(err.is_conflict_on("users.email_hash"));
        assert!(matches!(ServiceError::from(err), ServiceError::Conflict));
    }

    #[test]
    fn test_other_conflicts_are_storage_faults() {
        let err = StoreError::Conflict("UNIQUE constraint failed: tickets.uuid".into());
        assert!(!err.is_conflict_on("users.email_hash"));
        assert!(matches!(ServiceError::from(err), ServiceError::Storage(StoreError::Conflict(_))));

        let finished = ServiceError::from(StoreError::ScopeFinished);
        assert!(matches!(finished, ServiceError::Storage(StoreError::ScopeFinished)));
    }

    #[test]
    fn test_missing_fields_message() {
        let err = ServiceError::MissingFields(vec!["email", "password"]);
        assert_eq!(err.to_string(), "Missing value(s): [email, password]");
    }
}
