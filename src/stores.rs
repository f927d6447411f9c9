//! Transactional keyed record store.
//!
//! Both services make every decision inside a single atomic per-key
//! read-modify-write against this store: concurrent requests for the same
//! identifier or token must never both observe the same record state and
//! both commit. The store, not the services, provides that serialization.
//!
//! ## Backends
//!
//! - [`RedisRecordStore`] - production backend, optimistic `WATCH`-based
//!   transactions
//! - [`MemoryRecordStore`] - mutex-serialized in-process backend for tests
//!   and local development
//!
//! ## Key Patterns
//!
//! ```text
//! ratelimit:magic-link:{email}      → RateLimitRecord JSON
//! ratelimit:chat:{session_id}       → RateLimitRecord JSON
//! magic-link:{token_sha256_hex}     → MagicLinkToken JSON
//! ```
//!
//! ## Usage
//!
//! Services go through the typed [`transact`] wrapper:
//!
//! ```ignore
//! let decision = stores::transact(store, Namespace::ChatRequests, &id, |current| {
//!     let (next, decision) = decide(current);
//!     (Tx::Put(next), decision)
//! })
//! .await?;
//! ```

mod memory;
mod redis;

pub use self::memory::MemoryRecordStore;
pub use self::redis::RedisRecordStore;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::StoreError;

/// Disjoint key spaces. Rate-limit records for the two limiter classes and
/// magic-link token records never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    MagicLinkRequests,
    ChatRequests,
    MagicLinkTokens,
}

impl Namespace {
    pub(crate) fn key(self, suffix: &str) -> String {
        match self {
            Namespace::MagicLinkRequests => format!("ratelimit:magic-link:{suffix}"),
            Namespace::ChatRequests => format!("ratelimit:chat:{suffix}"),
            Namespace::MagicLinkTokens => format!("magic-link:{suffix}"),
        }
    }
}

/// What a transaction does to the record it read.
#[derive(Debug)]
pub enum RawTx {
    /// Replace (or create) the record.
    Put(Value),
    /// Remove the record.
    Delete,
    /// Leave the record exactly as it was.
    Keep,
}

/// Transaction body: receives the current record (or `None`) and returns
/// the step to commit. May run more than once under optimistic contention;
/// only the committed run's effects are observable.
pub type TxFn<'a> = Box<dyn FnMut(Option<Value>) -> Result<RawTx, StoreError> + Send + 'a>;

/// Atomic per-key storage.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Connectivity probe.
    async fn health_check(&self) -> Result<bool, StoreError>;

    /// Runs `tx` as one atomic read-modify-write on `key`. Transactions on
    /// the same key are totally ordered; transactions on different keys
    /// are independent.
    async fn transact_raw(&self, ns: Namespace, key: &str, tx: TxFn<'_>)
    -> Result<(), StoreError>;
}

/// Typed transaction step, mirroring [`RawTx`].
#[derive(Debug)]
pub enum Tx<T> {
    Put(T),
    Delete,
    Keep,
}

/// Typed wrapper over [`RecordStore::transact_raw`]: decodes the current
/// record, encodes the next one, and returns the result value computed by
/// the committed run of `apply`.
pub async fn transact<S, T, R, F>(
    store: &S,
    ns: Namespace,
    key: &str,
    mut apply: F,
) -> Result<R, StoreError>
where
    S: RecordStore + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnMut(Option<T>) -> (Tx<T>, R) + Send,
    R: Send,
{
    let mut outcome = None;

    store
        .transact_raw(
            ns,
            key,
            Box::new(|raw| {
                let current: Option<T> = raw
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(|e| StoreError::Corrupt(e.into()))?;

                let (step, result) = apply(current);
                outcome = Some(result);

                Ok(match step {
                    Tx::Put(record) => RawTx::Put(
                        serde_json::to_value(record).map_err(|e| StoreError::Corrupt(e.into()))?,
                    ),
                    Tx::Delete => RawTx::Delete,
                    Tx::Keep => RawTx::Keep,
                })
            }),
        )
        .await?;

    outcome.ok_or_else(|| {
        StoreError::Unavailable(anyhow::anyhow!("transaction committed without running its body"))
    })
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::test_utils::memory_store;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        hits: u32,
    }

    #[tokio::test]
    async fn transact_threads_the_result_out() {
        let store = memory_store();

        let seen = transact(
            store.as_ref(),
            Namespace::ChatRequests,
            "sess-1",
            |current: Option<Counter>| (Tx::Put(Counter { hits: 1 }), current.is_none()),
        )
        .await
        .unwrap();

        assert!(seen, "first transaction sees an absent record");

        let hits = transact(
            store.as_ref(),
            Namespace::ChatRequests,
            "sess-1",
            |current: Option<Counter>| {
                let hits = current.map(|c| c.hits).unwrap_or(0);
                (Tx::Keep, hits)
            },
        )
        .await
        .unwrap();

        assert_eq!(hits, 1);
    }

    #[tokio::test]
    async fn namespaces_do_not_collide() {
        let store = memory_store();

        transact(
            store.as_ref(),
            Namespace::MagicLinkRequests,
            "a@b.com",
            |_: Option<Counter>| (Tx::Put(Counter { hits: 9 }), ()),
        )
        .await
        .unwrap();

        let other: Option<Counter> = transact(
            store.as_ref(),
            Namespace::ChatRequests,
            "a@b.com",
            |current| (Tx::Keep, current),
        )
        .await
        .unwrap();

        assert!(other.is_none(), "same key in another namespace stays empty");
    }

    #[tokio::test]
    async fn corrupt_records_are_reported_not_clobbered() {
        let store = memory_store();

        store
            .transact_raw(
                Namespace::MagicLinkTokens,
                "bad",
                Box::new(|_| Ok(RawTx::Put(serde_json::json!("not an object")))),
            )
            .await
            .unwrap();

        let err = transact(
            store.as_ref(),
            Namespace::MagicLinkTokens,
            "bad",
            |_: Option<Counter>| (Tx::Keep, ()),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
