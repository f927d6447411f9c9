//! Magic-link issuance and single-use redemption.
//!
//! A raw token exists only in the issuance response and the redemption
//! request. The store key is its SHA-256 digest, so read access to the
//! store (logs, backups) cannot be turned into a valid redemption.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{RedeemError, StoreError};
use crate::stores::{self, Namespace, RecordStore, Tx};

/// Stored per issued token, keyed by the token's SHA-256 hex digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagicLinkToken {
    /// The session this token authenticates.
    pub session_id: String,
    /// Lower-cased, kept for auditing.
    pub email: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Absolute expiry, fixed at issuance.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    /// Monotone: flips false to true exactly once, at redemption.
    pub used: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub used_at: Option<DateTime<Utc>>,
}

/// Returned on successful redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    pub session_id: String,
    pub email: Option<String>,
}

/// 32 random bytes, hex-encoded: 256 bits of entropy in a fixed-length
/// 64-character string.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// One-way store key for a raw token. Must produce the same digest at
/// issuance and redemption.
fn token_hash(raw_token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Issues and redeems single-use login tokens against the record store.
pub struct MagicLinkService {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
}

impl MagicLinkService {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            store,
            clock,
            ttl: TimeDelta::milliseconds(config.magic_link_ttl_ms),
        }
    }

    /// Issues a fresh token for `session_id` and returns it. Only the
    /// token's hash is persisted.
    pub async fn issue(
        &self,
        session_id: &str,
        email: Option<&str>,
    ) -> Result<String, StoreError> {
        let raw_token = generate_token();
        let hash = token_hash(&raw_token);
        let now = self.clock.now();

        let record = MagicLinkToken {
            session_id: session_id.to_string(),
            email: email.map(|e| e.trim().to_lowercase()),
            created_at: now,
            expires_at: now + self.ttl,
            used: false,
            used_at: None,
        };

        stores::transact(
            self.store.as_ref(),
            Namespace::MagicLinkTokens,
            &hash,
            |_: Option<MagicLinkToken>| (Tx::Put(record.clone()), ()),
        )
        .await?;

        tracing::info!(%session_id, "magic link issued");

        Ok(raw_token)
    }

    /// Redeems a raw token exactly once, returning the session it
    /// authenticates. Concurrent redemptions of the same token resolve to
    /// one success; the rest observe `AlreadyUsed`.
    pub async fn redeem(&self, raw_token: &str) -> Result<Redemption, RedeemError> {
        let hash = token_hash(raw_token);
        let now = self.clock.now();

        let outcome = stores::transact(
            self.store.as_ref(),
            Namespace::MagicLinkTokens,
            &hash,
            |current: Option<MagicLinkToken>| match current {
                None => (Tx::Keep, Err(RedeemError::NotFound)),
                Some(record) if record.used => (Tx::Keep, Err(RedeemError::AlreadyUsed)),
                Some(record) if record.expires_at < now => (Tx::Keep, Err(RedeemError::Expired)),
                Some(mut record) => {
                    record.used = true;
                    record.used_at = Some(now);
                    let redemption = Redemption {
                        session_id: record.session_id.clone(),
                        email: record.email.clone(),
                    };
                    (Tx::Put(record), Ok(redemption))
                }
            },
        )
        .await?;

        match &outcome {
            Ok(redemption) => {
                tracing::info!(session_id = %redemption.session_id, "magic link redeemed");
            }
            Err(err) => tracing::warn!(error = %err, "magic link redemption refused"),
        }

        outcome
    }
}
