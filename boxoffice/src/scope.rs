//! Transaction scopes around storage mutations.
//!
//! A [`Backend`] hands out [`Session`]s, each one an exclusive lease on a
//! storage connection. A [`TransactionScope`] drives one session through a
//! single unit of work:
//!
//! ```text
//! Idle -> Active -> Committed  -> Released
//!                \-> RolledBack -> Released
//! ```
//!
//! The lease is returned exactly once, when the scope is dropped. A scope
//! dropped while still active (early return, panic) is rolled back first.

use crate::error::StoreError;

/// One leased storage connection.
pub trait Session {
    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns error if the backend refuses to start a transaction.
    fn begin(&mut self) -> Result<(), StoreError>;

    /// Makes the transaction's writes durable.
    ///
    /// # Errors
    ///
    /// Returns error if the commit fails; the transaction is then still open.
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Discards the transaction's writes.
    ///
    /// # Errors
    ///
    /// Returns error if the rollback fails.
    fn rollback(&mut self) -> Result<(), StoreError>;
}

/// Source of storage sessions.
pub trait Backend {
    /// Session type, borrowing the backend for the lease's duration.
    type Session<'a>: Session
    where
        Self: 'a;

    /// Leases a connection.
    ///
    /// # Errors
    ///
    /// Returns error if no connection can be obtained.
    fn acquire(&self) -> Result<Self::Session<'_>, StoreError>;
}

/// Lifecycle state of a [`TransactionScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Lease held, no transaction started.
    Idle,
    /// Transaction open; storage operations are allowed.
    Active,
    /// Writes are durable.
    Committed,
    /// Writes were discarded.
    RolledBack,
    /// Lease returned to the backend.
    Released,
}

impl ScopeState {
    /// Returns `true` once the scope has committed, rolled back or released.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack | Self::Released)
    }
}

/// A leased session with an open transaction.
pub struct TransactionScope<S: Session> {
    session: Option<S>,
    state: ScopeState,
}

impl<S: Session> TransactionScope<S> {
    /// Wraps a leased session and begins a transaction on it.
    ///
    /// If the transaction cannot be started, the lease is released before the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Returns the backend's error from `begin`.
    pub fn begin(session: S) -> Result<Self, StoreError> {
        let mut scope = Self { session: Some(session), state: ScopeState::Idle };
        if let Some(session) = scope.session.as_mut() {
            session.begin()?;
        }
        scope.state = ScopeState::Active;
        tracing::debug!("transaction scope active");
        Ok(scope)
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ScopeState {
        self.state
    }

    /// Returns `true` while storage operations are allowed.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.state, ScopeState::Active)
    }

    /// Borrows the session for storage operations.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ScopeFinished` unless the scope is active.
    pub fn session(&mut self) -> Result<&mut S, StoreError> {
        if !self.is_active() {
            return Err(StoreError::ScopeFinished);
        }
        self.session.as_mut().ok_or(StoreError::ScopeFinished)
    }

    /// Commits the transaction.
    ///
    /// A failed commit is followed by a rollback and the commit error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ScopeFinished` if the scope is not active, or the
    /// backend's commit error.
    pub fn commit(&mut self) -> Result<(), StoreError> {
        let session = self.session()?;
        match session.commit() {
            Ok(()) => {
                self.state = ScopeState::Committed;
                tracing::debug!("transaction scope committed");
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = session.rollback() {
                    tracing::warn!(error = %rollback_err, "rollback after failed commit also failed");
                }
                self.state = ScopeState::RolledBack;
                Err(err)
            }
        }
    }

    /// Rolls the transaction back.
    ///
    /// The scope counts as finished even if the backend reports a failure.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ScopeFinished` if the scope is not active, or the
    /// backend's rollback error.
    pub fn rollback(&mut self) -> Result<(), StoreError> {
        let session = self.session()?;
        let result = session.rollback();
        self.state = ScopeState::RolledBack;
        tracing::debug!("transaction scope rolled back");
        result
    }

    fn release(&mut self) {
        if self.state == ScopeState::Released {
            return;
        }
        if self.is_active() {
            if let Err(err) = self.rollback() {
                tracing::warn!(error = %err, "rollback of abandoned scope failed");
            }
        }
        drop(self.session.take());
        self.state = ScopeState::Released;
        tracing::debug!("transaction scope released");
    }
}

impl<S: Session> Drop for TransactionScope<S> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<S: Session> std::fmt::Debug for TransactionScope<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionScope").field("state", &self.state).finish_non_exhaustive()
    }
}

/// Runs `work` inside a transaction scope.
///
/// Commits if `work` returns `Ok` and the scope is still active, rolls back if
/// it returns `Err`. The error from `work` is returned unchanged; a failing
/// rollback is only logged. The lease is released on every path, including a
/// panic inside `work`.
///
/// # Errors
///
/// Returns `work`'s error, or the storage error from acquiring, beginning or
/// committing.
///
/// # Example
///
/// ```
/// use boxoffice::scope::transaction;
/// use boxoffice::store::{IdentityStore, SqliteBackend};
/// use boxoffice::StoreError;
///
/// let backend = SqliteBackend::open_in_memory()?;
/// let users = transaction(&backend, |scope| {
///     Ok::<_, StoreError>(scope.session()?.list_users()?.len())
/// })?;
/// assert_eq!(users, 0);
/// # Ok::<(), StoreError>(())
/// ```
pub fn transaction<'b, B, T, E, F>(backend: &'b B, work: F) -> Result<T, E>
where
    B: Backend,
    E: From<StoreError>,
    F: FnOnce(&mut TransactionScope<B::Session<'b>>) -> Result<T, E>,
{
    let mut scope = TransactionScope::begin(backend.acquire()?)?;

    match work(&mut scope) {
        Ok(value) => {
            if scope.is_active() {
                scope.commit()?;
            }
            Ok(value)
        }
        Err(err) => {
            if scope.is_active() {
                if let Err(rollback_err) = scope.rollback() {
                    tracing::warn!(error = %rollback_err, "rollback failed; returning original error");
                }
            }
            Err(err)
        }
    }
}
