//! Redis-backed record store.

use async_trait::async_trait;
use redis::AsyncCommands;

use super::{Namespace, RawTx, RecordStore, TxFn};
use crate::error::StoreError;

/// How many times a contended transaction is retried before failing closed.
const MAX_TX_ATTEMPTS: u32 = 8;

/// Redis implementation of [`RecordStore`].
///
/// Uses optimistic `WATCH`/`MULTI`/`EXEC` transactions: the key is
/// watched, the body runs on the value read, and the write is committed
/// only if no other client touched the key in between. A nil `EXEC` reply
/// means the key changed and the transaction re-runs on the new state.
#[derive(Clone)]
pub struct RedisRecordStore {
    client: redis::Client,
}

impl RedisRecordStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecordStore for RedisRecordStore {
    async fn health_check(&self) -> Result<bool, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let result: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(result == "PONG")
    }

    async fn transact_raw(
        &self,
        ns: Namespace,
        key: &str,
        mut tx: TxFn<'_>,
    ) -> Result<(), StoreError> {
        // A fresh connection per transaction keeps WATCH state private to
        // this call.
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = ns.key(key);

        for _ in 0..MAX_TX_ATTEMPTS {
            let _: () = redis::cmd("WATCH").arg(&key).query_async(&mut conn).await?;

            let json: Option<String> = conn.get(&key).await?;
            let current = json
                .map(|j| serde_json::from_str(&j))
                .transpose()
                .map_err(|e| StoreError::Corrupt(e.into()))?;

            let mut pipe = redis::pipe();
            match tx(current)? {
                RawTx::Keep => {
                    // Nothing to commit; release the watch and stop.
                    let _: () = redis::cmd("UNWATCH").query_async(&mut conn).await?;
                    return Ok(());
                }
                RawTx::Put(value) => {
                    let json = serde_json::to_string(&value)
                        .map_err(|e| StoreError::Corrupt(e.into()))?;
                    pipe.atomic().set(&key, json).ignore();
                }
                RawTx::Delete => {
                    pipe.atomic().del(&key).ignore();
                }
            }

            // EXEC replies nil when the watched key changed under us.
            let committed: Option<()> = pipe.query_async(&mut conn).await?;
            if committed.is_some() {
                return Ok(());
            }
        }

        Err(StoreError::Contended {
            attempts: MAX_TX_ATTEMPTS,
        })
    }
}
