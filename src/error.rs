use thiserror::Error;

/// Failures from the keyed record store.
///
/// All variants mean the operation did NOT take effect. The rate limiter
/// treats any of them as a deny (fail closed); magic-link operations
/// surface them via [`RedeemError::Store`] so callers can tell an
/// infrastructure problem apart from a rejected token.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or the transaction timed out.
    #[error("record store unavailable")]
    Unavailable(#[source] anyhow::Error),
    /// A persisted record could not be decoded.
    #[error("stored record is malformed")]
    Corrupt(#[source] anyhow::Error),
    /// Optimistic retries exhausted without a commit.
    #[error("transaction aborted after {attempts} contended attempts")]
    Contended { attempts: u32 },
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.into())
    }
}

/// Failures from magic-link redemption, each user-distinguishable:
/// `AlreadyUsed` and `Expired` both suggest requesting a fresh link,
/// `NotFound` a mistyped or forged token.
#[derive(Debug, Error)]
pub enum RedeemError {
    #[error("magic link not found")]
    NotFound,
    #[error("magic link already used")]
    AlreadyUsed,
    #[error("magic link expired")]
    Expired,
    #[error(transparent)]
    Store(#[from] StoreError),
}
