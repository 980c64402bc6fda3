//! # `boxoffice`
//!
//! Account and ticket storage for a cinema box office, with credential and
//! PII protection.
//!
//! ## Features
//!
//! - Argon2id password credentials, upgraded on login when the hashing
//!   profile changes
//! - AEAD-encrypted PII columns (ChaCha20-Poly1305, AES-256-GCM)
//! - Lookup digests for searching the encrypted email column
//! - All-or-nothing transaction scopes around every storage mutation
//!
//! ## Example
//!
//! ```rust,ignore
//! use boxoffice::prelude::*;
//!
//! let settings = Settings::from_env()?;
//! let backend = Arc::new(SqliteBackend::open(&settings.db_path)?);
//! let guardian = Arc::new(PasswordGuardian::new(HashingProfile::default())?);
//! let accounts = AccountService::new(backend, guardian, settings.field_cipher(), issuer);
//!
//! let tokens = accounts.login(LoginRequest { email, password })?;
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod accounts;
pub mod cipher;
pub mod config;
pub mod context;
pub mod error;
pub mod guardian;
pub mod header;
pub mod kdf;
pub mod key_source;
pub mod lookup;
pub mod profile;
pub mod scope;
pub mod store;
pub mod tariff;
pub mod tickets;
pub mod token;

pub use error::{Error, ServiceError, StoreError};

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::accounts::{AccountService, LoginRequest, NewAccount, Profile, ProfileUpdate};
    pub use crate::cipher::{CipherMode, FieldCipher};
    pub use crate::config::Settings;
    pub use crate::context::LookupContext;
    pub use crate::error::{Error, KeyFormatError, KeySourceError, ServiceError, StoreError};
    pub use crate::guardian::{Credential, PasswordGuardian};
    pub use crate::key_source::{EnvKeySource, KeySource};
    pub use crate::lookup::{DigestMode, LookupDigest};
    pub use crate::profile::HashingProfile;
    pub use crate::scope::{transaction, Backend, Session, TransactionScope};
    pub use crate::store::{IdentityStore, SqliteBackend, TicketStore};
    pub use crate::tickets::{NewTicket, TicketService};
    pub use crate::token::{TokenIssuer, TokenPair};
}
