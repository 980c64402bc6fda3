//! Argon2 hashing profile.
//!
//! The profile is fixed for the lifetime of a process. Credentials record the
//! parameters they were produced with, so a credential whose parameters differ
//! from the active profile is stale and gets rehashed on the next login.

use argon2::{Algorithm, Argon2, Params, Version};

use crate::error::Error;

/// Smallest salt accepted, in bytes.
pub const MIN_SALT_LEN: usize = 8;

/// Largest salt a PHC string can carry (64 base64 characters).
pub const MAX_SALT_LEN: usize = 48;

/// Smallest hash output accepted, in bytes.
pub const MIN_OUTPUT_LEN: usize = 10;

/// Largest hash output a PHC string can carry.
pub const MAX_OUTPUT_LEN: usize = 64;

/// Immutable set of Argon2 parameters.
///
/// # Example
///
/// ```
/// use boxoffice::profile::HashingProfile;
///
/// let profile = HashingProfile::default().with_memory_cost(64 * 1024).with_parallelism(2);
/// assert!(profile.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingProfile {
    memory_cost: u32,
    time_cost: u32,
    parallelism: u32,
    salt_len: usize,
    output_len: usize,
    algorithm: Algorithm,
    version: Version,
}

impl Default for HashingProfile {
    /// Production profile: 2 GiB, one pass, eight lanes, Argon2id v19.
    fn default() -> Self {
        Self {
            memory_cost: 2 * 1024 * 1024,
            time_cost: 1,
            parallelism: 8,
            salt_len: 32,
            output_len: MAX_OUTPUT_LEN,
            algorithm: Algorithm::Argon2id,
            version: Version::V0x13,
        }
    }
}

impl HashingProfile {
    /// Sets the memory cost in KiB.
    #[must_use]
    pub const fn with_memory_cost(mut self, kib: u32) -> Self {
        self.memory_cost = kib;
        self
    }

    /// Sets the number of passes.
    #[must_use]
    pub const fn with_time_cost(mut self, passes: u32) -> Self {
        self.time_cost = passes;
        self
    }

    /// Sets the number of lanes.
    #[must_use]
    pub const fn with_parallelism(mut self, lanes: u32) -> Self {
        self.parallelism = lanes;
        self
    }

    /// Sets the salt length in bytes.
    #[must_use]
    pub const fn with_salt_len(mut self, len: usize) -> Self {
        self.salt_len = len;
        self
    }

    /// Sets the hash output length in bytes.
    #[must_use]
    pub const fn with_output_len(mut self, len: usize) -> Self {
        self.output_len = len;
        self
    }

    /// Sets the Argon2 variant.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the Argon2 version.
    #[must_use]
    pub const fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Memory cost in KiB.
    #[must_use]
    pub const fn memory_cost(&self) -> u32 {
        self.memory_cost
    }

    /// Number of passes.
    #[must_use]
    pub const fn time_cost(&self) -> u32 {
        self.time_cost
    }

    /// Number of lanes.
    #[must_use]
    pub const fn parallelism(&self) -> u32 {
        self.parallelism
    }

    /// Salt length in bytes.
    #[must_use]
    pub const fn salt_len(&self) -> usize {
        self.salt_len
    }

    /// Hash output length in bytes.
    #[must_use]
    pub const fn output_len(&self) -> usize {
        self.output_len
    }

    /// Argon2 variant.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Argon2 version.
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Checks that the profile can be computed and encoded.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidProfile` if the salt or output length falls
    /// outside what a PHC string can carry, or Argon2 rejects the costs.
    pub fn validate(&self) -> Result<(), Error> {
        if !(MIN_SALT_LEN..=MAX_SALT_LEN).contains(&self.salt_len) {
            return Err(Error::InvalidProfile(format!(
                "salt length {} outside {MIN_SALT_LEN}..={MAX_SALT_LEN}",
                self.salt_len
            )));
        }
        if !(MIN_OUTPUT_LEN..=MAX_OUTPUT_LEN).contains(&self.output_len) {
            return Err(Error::InvalidProfile(format!(
                "output length {} outside {MIN_OUTPUT_LEN}..={MAX_OUTPUT_LEN}",
                self.output_len
            )));
        }
        self.params().map(|_| ())
    }

    /// Builds the Argon2 context for this profile.
    pub(crate) fn argon2(&self) -> Result<Argon2<'static>, Error> {
        Ok(Argon2::new(self.algorithm, self.version, self.params()?))
    }

    fn params(&self) -> Result<Params, Error> {
        Params::new(self.memory_cost, self.time_cost, self.parallelism, Some(self.output_len))
            .map_err(|e| Error::InvalidProfile(e.to_string()))
    }
}
