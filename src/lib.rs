//! Access-control core for the onboarding chat service.
//!
//! Two services share one transactional keyed record store:
//!
//! - **rate limiting** - sliding-window allow/deny for magic-link and chat
//!   requests ([`services::RateLimiter`])
//! - **magic links** - single-use passwordless login tokens
//!   ([`services::MagicLinkService`])
//!
//! Every decision is made inside a single store transaction, so the core
//! holds no state of its own and runs correctly across any number of
//! stateless service instances sharing one store. On store failure both
//! services fail closed: a request is never allowed because the store was
//! unreachable.

pub mod clock;
pub mod config;
pub mod error;
pub mod services;
pub mod stores;

#[cfg(test)]
mod test_utils;

pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use error::{RedeemError, StoreError};
pub use services::{LimiterClass, MagicLinkService, RateLimitResult, RateLimiter, Redemption};
pub use stores::{MemoryRecordStore, RecordStore, RedisRecordStore};
