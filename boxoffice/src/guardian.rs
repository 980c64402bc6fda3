//! Password hashing, verification and transparent rehashing.
//!
//! Credentials are PHC strings (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`).
//! They carry their own parameters, so a credential produced under an older
//! profile still verifies and is upgraded on the next successful login.

use std::fmt;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Argon2, Params};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::Error;
use crate::profile::HashingProfile;

/// A stored, self-describing password hash.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a credential read from storage.
    #[must_use]
    pub fn new(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    /// Returns the PHC string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the credential, returning the PHC string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The hash is not the password, but it is still offline-crackable.
        f.write_str("Credential(..)")
    }
}

impl From<String> for Credential {
    fn from(phc: String) -> Self {
        Self(phc)
    }
}

/// Hashes and verifies passwords under one [`HashingProfile`].
///
/// # Example
///
/// ```
/// use boxoffice::guardian::PasswordGuardian;
/// use boxoffice::profile::HashingProfile;
///
/// let profile = HashingProfile::default().with_memory_cost(1024).with_parallelism(1);
/// let guardian = PasswordGuardian::new(profile).unwrap();
///
/// let credential = guardian.hash("secret1").unwrap();
/// assert!(guardian.verify(&credential, "secret1"));
/// assert!(!guardian.needs_rehash(&credential));
/// ```
#[derive(Clone)]
pub struct PasswordGuardian {
    profile: HashingProfile,
    argon2: Argon2<'static>,
}

impl fmt::Debug for PasswordGuardian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordGuardian").field("profile", &self.profile).finish_non_exhaustive()
    }
}

impl PasswordGuardian {
    /// Creates a guardian for the given profile.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidProfile` if the profile is rejected by
    /// [`HashingProfile::validate`].
    pub fn new(profile: HashingProfile) -> Result<Self, Error> {
        profile.validate()?;
        let argon2 = profile.argon2()?;
        Ok(Self { profile, argon2 })
    }

    /// Returns the active profile.
    #[must_use]
    pub const fn profile(&self) -> &HashingProfile {
        &self.profile
    }

    /// Hashes a password with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyPassword` for an empty password and
    /// `Error::Hashing` if Argon2 fails (e.g. allocation of the memory cost).
    pub fn hash(&self, password: &str) -> Result<Credential, Error> {
        if password.is_empty() {
            return Err(Error::EmptyPassword);
        }

        let mut salt_bytes = Zeroizing::new(vec![0u8; self.profile.salt_len()]);
        OsRng.fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| Error::Hashing(e.to_string()))?;

        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Hashing(e.to_string()))?;

        Ok(Credential(hash.to_string()))
    }

    /// Checks a password against a credential.
    ///
    /// Uses the parameters embedded in the credential, not the active profile.
    /// Malformed credentials and empty passwords never verify.
    #[must_use]
    pub fn verify(&self, credential: &Credential, password: &str) -> bool {
        if password.is_empty() {
            return false;
        }
        let Ok(parsed) = PasswordHash::new(credential.as_str()) else {
            return false;
        };
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    }

    /// Returns true if the credential was not produced under the active profile.
    #[must_use]
    pub fn needs_rehash(&self, credential: &Credential) -> bool {
        let Ok(parsed) = PasswordHash::new(credential.as_str()) else {
            return true;
        };
        !self.matches_profile(&parsed)
    }

    /// Returns a fresh credential if the given one is stale, otherwise the input.
    ///
    /// The password is not verified here; use [`Self::verify_and_rehash`] on
    /// the login path.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::hash`].
    pub fn rehash(&self, credential: &Credential, password: &str) -> Result<Credential, Error> {
        if self.needs_rehash(credential) {
            tracing::debug!("credential parameters are stale, rehashing");
            self.hash(password)
        } else {
            Ok(credential.clone())
        }
    }

    /// Verifies a password and upgrades its credential if needed.
    ///
    /// Returns `(false, None)` when the password does not match. On success,
    /// returns `(true, Some(credential))`; callers persist the credential only
    /// when it differs from the one they passed in.
    ///
    /// # Errors
    ///
    /// Only hashing failures during the upgrade are errors.
    pub fn verify_and_rehash(
        &self,
        credential: &Credential,
        password: &str,
    ) -> Result<(bool, Option<Credential>), Error> {
        if !self.verify(credential, password) {
            return Ok((false, None));
        }
        Ok((true, Some(self.rehash(credential, password)?)))
    }

    fn matches_profile(&self, parsed: &PasswordHash<'_>) -> bool {
        let profile = &self.profile;

        if parsed.algorithm != profile.algorithm().ident() {
            return false;
        }
        if parsed.version != Some(profile.version() as u32) {
            return false;
        }

        let Ok(params) = Params::try_from(parsed) else {
            return false;
        };
        if params.m_cost() != profile.memory_cost()
            || params.t_cost() != profile.time_cost()
            || params.p_cost() != profile.parallelism()
        {
            return false;
        }

        let output_len = parsed.hash.map(|output| output.len());
        if output_len != Some(profile.output_len()) {
            return false;
        }

        // Unpadded base64: every 4 characters carry 3 bytes.
        let salt_len = parsed.salt.map(|salt| salt.as_str().len() * 3 / 4);
        salt_len == Some(profile.salt_len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_profile() -> HashingProfile {
        HashingProfile::default().with_memory_cost(1024).with_time_cost(1).with_parallelism(1)
    }

    fn guardian() -> PasswordGuardian {
        PasswordGuardian::new(fast_profile()).unwrap()
    }

    #[test]
    fn test_hash_then_verify() {
        let guardian = guardian();
        let credential = guardian.hash("secret1").unwrap();

        assert!(credential.as_str().starts_with("$argon2id$v=19$"));
        assert!(guardian.verify(&credential, "secret1"));
    }

    #[test]
    fn test_wrong_password_does_not_verify() {
        let guardian = guardian();
        let credential = guardian.hash("secret1").unwrap();

        assert!(!guardian.verify(&credential, "secret2"));
        assert!(!guardian.verify(&credential, "Secret1"));
    }

    #[test]
    fn test_hash_uses_fresh_salt() {
        let guardian = guardian();
        let first = guardian.hash("secret1").unwrap();
        let second = guardian.hash("secret1").unwrap();

        assert_ne!(first, second);
        assert!(guardian.verify(&first, "secret1"));
        assert!(guardian.verify(&second, "secret1"));
    }

    #[test]
    fn test_empty_password_is_rejected() {
        let guardian = guardian();
        assert!(matches!(guardian.hash(""), Err(Error::EmptyPassword)));

        let credential = guardian.hash("secret1").unwrap();
        assert!(!guardian.verify(&credential, ""));
    }

    #[test]
    fn test_malformed_credential_does_not_verify() {
        let guardian = guardian();

        assert!(!guardian.verify(&Credential::new(""), "secret1"));
        assert!(!guardian.verify(&Credential::new("not a hash"), "secret1"));
        assert!(!guardian.verify(&Credential::new("$argon2id$v=19$m=1024"), "secret1"));
    }

    #[test]
    fn test_fresh_credential_does_not_need_rehash() {
        let guardian = guardian();
        let credential = guardian.hash("secret1").unwrap();
        assert!(!guardian.needs_rehash(&credential));
    }

    #[test]
    fn test_stale_parameters_need_rehash() {
        let old = PasswordGuardian::new(fast_profile().with_memory_cost(2048)).unwrap();
        let credential = old.hash("secret1").unwrap();
        assert!(guardian().needs_rehash(&credential));

        let old = PasswordGuardian::new(fast_profile().with_time_cost(2)).unwrap();
        assert!(guardian().needs_rehash(&old.hash("secret1").unwrap()));

        let old = PasswordGuardian::new(fast_profile().with_salt_len(16)).unwrap();
        assert!(guardian().needs_rehash(&old.hash("secret1").unwrap()));

        let old = PasswordGuardian::new(fast_profile().with_output_len(32)).unwrap();
        assert!(guardian().needs_rehash(&old.hash("secret1").unwrap()));

        let old =
            PasswordGuardian::new(fast_profile().with_algorithm(argon2::Algorithm::Argon2i))
                .unwrap();
        assert!(guardian().needs_rehash(&old.hash("secret1").unwrap()));
    }

    #[test]
    fn test_malformed_credential_needs_rehash() {
        assert!(guardian().needs_rehash(&Credential::new("plaintext-password")));
    }

    #[test]
    fn test_old_profile_credential_still_verifies() {
        let old = PasswordGuardian::new(fast_profile().with_memory_cost(2048)).unwrap();
        let credential = old.hash("secret1").unwrap();

        assert!(guardian().verify(&credential, "secret1"));
    }

    #[test]
    fn test_rehash_keeps_current_credential() {
        let guardian = guardian();
        let credential = guardian.hash("secret1").unwrap();

        let rehashed = guardian.rehash(&credential, "secret1").unwrap();
        assert_eq!(rehashed, credential);
    }

    #[test]
    fn test_verify_and_rehash_upgrades_stale_credential() {
        let old = PasswordGuardian::new(fast_profile().with_memory_cost(2048)).unwrap();
        let credential = old.hash("secret1").unwrap();
        let guardian = guardian();

        let (valid, upgraded) = guardian.verify_and_rehash(&credential, "secret1").unwrap();
        let upgraded = upgraded.unwrap();

        assert!(valid);
        assert_ne!(upgraded, credential);
        assert!(guardian.verify(&upgraded, "secret1"));
        assert!(!guardian.needs_rehash(&upgraded));
    }

    #[test]
    fn test_verify_and_rehash_keeps_current_credential() {
        let guardian = guardian();
        let credential = guardian.hash("secret1").unwrap();

        let (valid, same) = guardian.verify_and_rehash(&credential, "secret1").unwrap();
        assert!(valid);
        assert_eq!(same, Some(credential));
    }

    #[test]
    fn test_verify_and_rehash_wrong_password() {
        let old = PasswordGuardian::new(fast_profile().with_memory_cost(2048)).unwrap();
        let credential = old.hash("secret1").unwrap();

        let (valid, upgraded) = guardian().verify_and_rehash(&credential, "wrong").unwrap();
        assert!(!valid);
        assert!(upgraded.is_none());
    }

    #[test]
    fn test_invalid_profile_is_rejected() {
        let result = PasswordGuardian::new(fast_profile().with_salt_len(4));
        assert!(matches!(result, Err(Error::InvalidProfile(_))));
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = guardian().hash("secret1").unwrap();
        assert_eq!(format!("{credential:?}"), "Credential(..)");
    }
}
