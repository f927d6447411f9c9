//! Shared test fixtures.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::clock::Clock;
use crate::error::StoreError;
use crate::stores::{self, MemoryRecordStore, Namespace, RecordStore, Tx, TxFn};

/// Fixed start instant shared by tests.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn memory_store() -> Arc<MemoryRecordStore> {
    Arc::new(MemoryRecordStore::new())
}

/// Reads a record without modifying it.
pub async fn read_record<T>(store: &dyn RecordStore, ns: Namespace, key: &str) -> Option<T>
where
    T: Serialize + DeserializeOwned + Send,
{
    stores::transact(store, ns, key, |current: Option<T>| (Tx::Keep, current))
        .await
        .unwrap()
}

/// Clock that only moves when a test advances it.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Store whose every transaction fails; drives the fail-closed paths.
pub struct FailingStore;

#[async_trait]
impl RecordStore for FailingStore {
    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn transact_raw(
        &self,
        _ns: Namespace,
        _key: &str,
        _tx: TxFn<'_>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable(anyhow::anyhow!("store offline")))
    }
}
