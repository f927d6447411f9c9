//! In-memory record store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{Namespace, RawTx, RecordStore, TxFn};
use crate::error::StoreError;

/// In-process implementation of [`RecordStore`], for tests and local
/// development. One mutex serializes all transactions; the transaction
/// body is synchronous, so the lock never spans an await point.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, Value>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn transact_raw(
        &self,
        ns: Namespace,
        key: &str,
        mut tx: TxFn<'_>,
    ) -> Result<(), StoreError> {
        let key = ns.key(key);
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable(anyhow::anyhow!("record store mutex poisoned")))?;

        match tx(records.get(&key).cloned())? {
            RawTx::Put(value) => {
                records.insert(key, value);
            }
            RawTx::Delete => {
                records.remove(&key);
            }
            RawTx::Keep => {}
        }

        Ok(())
    }
}
