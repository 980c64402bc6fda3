//! Account operations.
//!
//! Storage work runs inside transaction scopes. Password hashing,
//! verification and field encryption happen outside them, so a connection
//! lease is never held across Argon2.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::cipher::FieldCipher;
use crate::context::LookupContext;
use crate::error::{Error, ServiceError};
use crate::guardian::{Credential, PasswordGuardian};
use crate::lookup;
use crate::scope::{transaction, Backend};
use crate::store::{self, IdentityStore, Role, UserRecord, UserUpdate};
use crate::tariff;
use crate::token::{TokenIssuer, TokenPair};

/// Sign-up request. Absent required fields are reported together.
#[derive(Debug, Default, Deserialize)]
pub struct NewAccount {
    pub lastname: Option<String>,
    pub firstname: Option<String>,
    pub age: Option<u32>,
    pub email: Option<String>,
    pub password: Option<SecretString>,
    pub role: Option<String>,
    pub tariff: Option<String>,
}

/// Login request.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<SecretString>,
}

/// Fields to change on the caller's account.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub lastname: Option<String>,
    pub firstname: Option<String>,
    pub age: Option<u32>,
    pub email: Option<String>,
    pub password: Option<SecretString>,
    pub role: Option<String>,
    pub tariff: Option<String>,
}

/// Decrypted view of an account.
///
/// A field that cannot be decrypted is `None` rather than failing the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub uuid: String,
    pub lastname: Option<String>,
    pub firstname: Option<String>,
    pub age: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub tariff: String,
}

/// Account operations over any backend whose sessions are identity stores.
#[derive(Debug)]
pub struct AccountService<B, I> {
    backend: Arc<B>,
    guardian: Arc<PasswordGuardian>,
    cipher: FieldCipher,
    issuer: I,
}

impl<B, I> AccountService<B, I>
where
    B: Backend + 'static,
    for<'a> B::Session<'a>: IdentityStore,
    I: TokenIssuer,
{
    /// Creates the service.
    #[must_use]
    pub fn new(
        backend: Arc<B>,
        guardian: Arc<PasswordGuardian>,
        cipher: FieldCipher,
        issuer: I,
    ) -> Self {
        Self { backend, guardian, cipher, issuer }
    }

    /// Registers an account and returns its uuid.
    ///
    /// The email is trimmed before it is encrypted; its lookup digest also
    /// ignores case, so `A@x.com` and `a@x.com` are the same account.
    ///
    /// # Errors
    ///
    /// Returns `MissingFields`, `InvalidRole` or `InvalidTariff` for a bad
    /// request and `Conflict` if the email is already registered.
    pub fn create(&self, account: NewAccount) -> Result<String, ServiceError> {
        let NewAccount { lastname, firstname, age, email, password, role, tariff } = account;

        let missing = missing_fields(&[
            ("lastname", lastname.is_some()),
            ("firstname", firstname.is_some()),
            ("age", age.is_some()),
            ("email", email.is_some()),
            ("password", password.is_some()),
        ]);
        let (Some(lastname), Some(firstname), Some(age), Some(email), Some(password)) =
            (lastname, firstname, age, email, password)
        else {
            return Err(ServiceError::MissingFields(missing));
        };

        let role = parse_role(role.as_deref())?.unwrap_or_default();
        let tariff = tariff::lookup(tariff.as_deref())?;

        let email = email.trim();
        let digest = self.cipher.digest_for_lookup(email, &LookupContext::email())?;

        let user = UserRecord {
            uuid: store::new_key(),
            lastname: self.cipher.encrypt(&lastname)?,
            firstname: self.cipher.encrypt(&firstname)?,
            age: self.cipher.encrypt(&age)?,
            email: self.cipher.encrypt(email)?,
            email_hash: digest.as_str().to_string(),
            password: self.guardian.hash(password.expose_secret())?.into_string(),
            role,
            tariff: tariff.code.to_string(),
        };

        transaction(&*self.backend, |scope| {
            let store = scope.session()?;
            if !store.find_by_digest(&digest)?.is_empty() {
                return Err(ServiceError::Conflict);
            }
            store.insert_user(&user)?;
            Ok(())
        })?;

        tracing::info!(user = %user.uuid, role = %user.role, "account created");
        Ok(user.uuid)
    }

    /// Checks an email and password and issues a token pair.
    ///
    /// Candidates are loaded in one scope and checked outside it. A
    /// credential hashed under an older profile is then replaced on the
    /// verified account's row in a second scope.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` for an unknown email or a wrong password.
    pub fn login(&self, request: LoginRequest) -> Result<TokenPair, ServiceError> {
        let missing =
            missing_fields(&[("email", request.email.is_some()), ("password", request.password.is_some())]);
        let (Some(email), Some(password)) = (request.email, request.password) else {
            return Err(ServiceError::MissingFields(missing));
        };

        let digest = self.cipher.digest_for_lookup(&email, &LookupContext::email())?;
        let wanted = lookup::normalize(&email);

        let candidates = transaction(&*self.backend, |scope| {
            Ok::<_, ServiceError>(scope.session()?.find_by_digest(&digest)?)
        })?;

        let mut verified = None;
        for candidate in candidates {
            let Some(stored) = self.cipher.decrypt(&candidate.email)? else {
                tracing::warn!(user = %candidate.uuid, "stored email could not be decrypted");
                continue;
            };
            if lookup::normalize(&stored) != wanted {
                continue;
            }

            let credential = Credential::new(candidate.password.as_str());
            let (valid, upgraded) = self.guardian.verify_and_rehash(&credential, password.expose_secret())?;
            if valid {
                let upgraded = upgraded.filter(|new| new.as_str() != candidate.password);
                verified = Some((candidate.uuid, upgraded));
                break;
            }
        }
        let Some((identity, upgraded)) = verified else {
            return Err(ServiceError::InvalidCredentials);
        };

        if let Some(upgraded) = upgraded {
            let update = UserUpdate::password(upgraded.into_string());
            let updated = transaction(&*self.backend, |scope| {
                Ok::<_, ServiceError>(scope.session()?.update_user(&identity, &update)?)
            })?;
            if updated {
                tracing::info!(user = %identity, "credential upgraded to current profile");
            }
        }

        let tokens = self.issuer.issue_pair(&identity)?;
        tracing::info!(user = %identity, "login succeeded");
        Ok(tokens)
    }

    /// Issues a new access token for an already authenticated identity.
    ///
    /// # Errors
    ///
    /// Returns `Token` if issuance fails.
    pub fn refresh(&self, identity: &str) -> Result<String, ServiceError> {
        Ok(self.issuer.issue_access(identity)?)
    }

    /// Returns the caller's decrypted profile.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account no longer exists.
    pub fn me(&self, identity: &str) -> Result<Profile, ServiceError> {
        let user = transaction(&*self.backend, |scope| {
            scope.session()?.get_by_key(identity)?.ok_or(ServiceError::NotFound("User"))
        })?;
        Ok(self.reveal(user)?)
    }

    /// Returns every account's decrypted profile. Admin only.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the caller's account no longer exists and
    /// `Forbidden` if it is not an admin.
    pub fn list_all(&self, identity: &str) -> Result<Vec<Profile>, ServiceError> {
        let users = transaction(&*self.backend, |scope| {
            let store = scope.session()?;
            let caller = store.get_by_key(identity)?.ok_or(ServiceError::NotFound("User"))?;
            if caller.role != Role::Admin {
                return Err(ServiceError::Forbidden);
            }
            Ok(store.list_users()?)
        })?;

        users.into_iter().map(|user| self.reveal(user).map_err(ServiceError::from)).collect()
    }

    /// Changes the caller's account.
    ///
    /// Changed PII is re-encrypted, a changed email is re-digested and a
    /// changed password is hashed under the current profile.
    ///
    /// # Errors
    ///
    /// Returns `NothingToUpdate` if no field is given, `Conflict` if the new
    /// email belongs to another account and `NotFound` if the caller's account
    /// no longer exists.
    pub fn modify(&self, identity: &str, changes: ProfileUpdate) -> Result<(), ServiceError> {
        let role = parse_role(changes.role.as_deref())?;
        let tariff = changes.tariff.as_deref().map(|code| tariff::lookup(Some(code))).transpose()?;

        let mut update = UserUpdate {
            role,
            tariff: tariff.map(|tariff| tariff.code.to_string()),
            ..UserUpdate::default()
        };
        if let Some(lastname) = &changes.lastname {
            update.lastname = Some(self.cipher.encrypt(lastname)?);
        }
        if let Some(firstname) = &changes.firstname {
            update.firstname = Some(self.cipher.encrypt(firstname)?);
        }
        if let Some(age) = &changes.age {
            update.age = Some(self.cipher.encrypt(age)?);
        }
        if let Some(email) = &changes.email {
            let email = email.trim();
            update.email_hash =
                Some(self.cipher.digest_for_lookup(email, &LookupContext::email())?.into_string());
            update.email = Some(self.cipher.encrypt(email)?);
        }
        if let Some(password) = &changes.password {
            update.password = Some(self.guardian.hash(password.expose_secret())?.into_string());
        }

        if update.is_empty() {
            return Err(ServiceError::NothingToUpdate);
        }

        transaction(&*self.backend, |scope| {
            if scope.session()?.update_user(identity, &update)? {
                Ok(())
            } else {
                Err(ServiceError::NotFound("User"))
            }
        })?;

        tracing::info!(user = %identity, "account modified");
        Ok(())
    }

    /// Deletes the caller's account and its tickets.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account no longer exists.
    pub fn delete(&self, identity: &str) -> Result<(), ServiceError> {
        transaction(&*self.backend, |scope| {
            if scope.session()?.delete_user(identity)? {
                Ok(())
            } else {
                Err(ServiceError::NotFound("User"))
            }
        })?;

        tracing::info!(user = %identity, "account deleted");
        Ok(())
    }

    fn reveal(&self, user: UserRecord) -> Result<Profile, Error> {
        let field = |name: &str, token: &str| -> Result<Option<String>, Error> {
            let value = self.cipher.decrypt(token)?;
            if value.is_none() {
                tracing::warn!(user = %user.uuid, field = name, "stored field could not be decrypted");
            }
            Ok(value)
        };

        Ok(Profile {
            lastname: field("lastname", &user.lastname)?,
            firstname: field("firstname", &user.firstname)?,
            age: field("age", &user.age)?,
            email: field("email", &user.email)?,
            uuid: user.uuid.clone(),
            role: user.role,
            tariff: user.tariff.clone(),
        })
    }
}

fn missing_fields(fields: &[(&'static str, bool)]) -> Vec<&'static str> {
    fields.iter().filter(|(_, present)| !present).map(|(name, _)| *name).collect()
}

fn parse_role(role: Option<&str>) -> Result<Option<Role>, ServiceError> {
    role.map(|role| role.parse::<Role>().map_err(|_| ServiceError::InvalidRole)).transpose()
}
