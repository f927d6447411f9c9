//! Sliding-window rate limiting over the record store.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::StoreError;
use crate::stores::{self, Namespace, RecordStore, Tx};

/// One record per rate-limited identifier, keyed by that identifier within
/// its class namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitRecord {
    pub identifier: String,
    /// Requests seen in the current window; always at least 1.
    pub attempts: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub first_attempt_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_attempt_at: DateTime<Utc>,
    /// Present only while a block is active; ignored once it has passed.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub blocked_until: Option<DateTime<Utc>>,
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed,
    /// Over the limit; `reason` is safe to show to the user.
    Denied { reason: String },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed)
    }
}

/// Per-class limiter settings, immutable per call.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: TimeDelta,
    pub max_attempts: u32,
    pub block_duration: TimeDelta,
    /// Maps minutes remaining to the user-facing deny message.
    pub message: fn(i64) -> String,
}

/// The two rate-limited call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterClass {
    MagicLink,
    Chat,
}

fn magic_link_message(minutes: i64) -> String {
    format!("Too many magic link requests. Try again in {minutes} minutes.")
}

fn chat_message(minutes: i64) -> String {
    format!("You're sending messages too quickly. Try again in {minutes} minutes.")
}

fn minutes_remaining(delta: TimeDelta) -> i64 {
    let ms = delta.num_milliseconds().max(0);
    (ms + 60_000 - 1) / 60_000
}

/// Outcome of one engine evaluation: the decision plus the record to
/// write (`None` leaves the stored record untouched).
struct Evaluation {
    decision: RateLimitResult,
    next: Option<RateLimitRecord>,
}

/// Decides allow/deny for one identifier and computes its next record
/// state. Pure; runs inside the store transaction so two concurrent
/// requests can never both observe the same attempt count.
fn evaluate(
    identifier: &str,
    current: Option<RateLimitRecord>,
    now: DateTime<Utc>,
    config: &RateLimitConfig,
) -> Evaluation {
    let fresh = || RateLimitRecord {
        identifier: identifier.to_string(),
        attempts: 1,
        first_attempt_at: now,
        last_attempt_at: now,
        blocked_until: None,
    };

    let Some(record) = current else {
        return Evaluation {
            decision: RateLimitResult::Allowed,
            next: Some(fresh()),
        };
    };

    // An active block denies without touching the record: repeated denied
    // requests neither extend nor shorten it.
    if let Some(blocked_until) = record.blocked_until
        && blocked_until > now
    {
        let reason = (config.message)(minutes_remaining(blocked_until - now));
        return Evaluation {
            decision: RateLimitResult::Denied { reason },
            next: None,
        };
    }

    // Window elapsed: start a fresh one, discarding any stale block.
    if now - record.first_attempt_at > config.window {
        return Evaluation {
            decision: RateLimitResult::Allowed,
            next: Some(fresh()),
        };
    }

    if record.attempts >= config.max_attempts {
        let reason = (config.message)(minutes_remaining(config.block_duration));
        return Evaluation {
            decision: RateLimitResult::Denied { reason },
            next: Some(RateLimitRecord {
                attempts: record.attempts + 1,
                last_attempt_at: now,
                blocked_until: Some(now + config.block_duration),
                ..record
            }),
        };
    }

    Evaluation {
        decision: RateLimitResult::Allowed,
        next: Some(RateLimitRecord {
            attempts: record.attempts + 1,
            last_attempt_at: now,
            ..record
        }),
    }
}

/// Binds the engine to the store for the two configured call sites.
pub struct RateLimiter {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    magic_link: RateLimitConfig,
    chat: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            store,
            clock,
            magic_link: RateLimitConfig {
                window: TimeDelta::milliseconds(config.magic_link_window_ms),
                max_attempts: config.magic_link_max_attempts,
                block_duration: TimeDelta::milliseconds(config.magic_link_block_ms),
                message: magic_link_message,
            },
            chat: RateLimitConfig {
                window: TimeDelta::milliseconds(config.chat_window_ms),
                max_attempts: config.chat_max_attempts,
                block_duration: TimeDelta::milliseconds(config.chat_block_ms),
                message: chat_message,
            },
        }
    }

    fn class_config(&self, class: LimiterClass) -> &RateLimitConfig {
        match class {
            LimiterClass::MagicLink => &self.magic_link,
            LimiterClass::Chat => &self.chat,
        }
    }

    fn namespace(class: LimiterClass) -> Namespace {
        match class {
            LimiterClass::MagicLink => Namespace::MagicLinkRequests,
            LimiterClass::Chat => Namespace::ChatRequests,
        }
    }

    /// Emails are limited case-insensitively; session ids pass through.
    fn normalize(class: LimiterClass, identifier: &str) -> String {
        match class {
            LimiterClass::MagicLink => identifier.trim().to_lowercase(),
            LimiterClass::Chat => identifier.to_string(),
        }
    }

    /// Checks and records one request for `identifier`.
    ///
    /// A store `Err` means the request was NOT allowed: callers must fail
    /// closed rather than treat an unreachable store as permission.
    pub async fn check_request(
        &self,
        class: LimiterClass,
        identifier: &str,
    ) -> Result<RateLimitResult, StoreError> {
        let config = self.class_config(class);
        let identifier = Self::normalize(class, identifier);
        let now = self.clock.now();

        let result = stores::transact(
            self.store.as_ref(),
            Self::namespace(class),
            &identifier,
            |current: Option<RateLimitRecord>| {
                let Evaluation { decision, next } = evaluate(&identifier, current, now, config);
                let step = match next {
                    Some(record) => Tx::Put(record),
                    None => Tx::Keep,
                };
                (step, decision)
            },
        )
        .await?;

        if let RateLimitResult::Denied { reason } = &result {
            tracing::warn!(%identifier, ?class, %reason, "request rate limited");
        }

        Ok(result)
    }

    /// Administrative: drops the record for `identifier`, clearing its
    /// window and any block. Not reachable from the public request path.
    pub async fn reset(&self, class: LimiterClass, identifier: &str) -> Result<(), StoreError> {
        let identifier = Self::normalize(class, identifier);

        stores::transact(
            self.store.as_ref(),
            Self::namespace(class),
            &identifier,
            |_: Option<RateLimitRecord>| (Tx::Delete, ()),
        )
        .await?;

        tracing::info!(%identifier, ?class, "rate limit reset");

        Ok(())
    }
}
