//! Access-control services.
//!
//! The two public surfaces of the core, each binding a pure algorithm to
//! the record store:
//!
//! - **rate_limit** - sliding-window allow/deny per identifier, with a
//!   punitive block once the limit is exceeded
//! - **magic_link** - single-use passwordless login tokens, hashed at
//!   rest and redeemed atomically exactly once

mod magic_link;
mod rate_limit;

pub use magic_link::{MagicLinkService, MagicLinkToken, Redemption};
pub use rate_limit::{
    LimiterClass, RateLimitConfig, RateLimitRecord, RateLimitResult, RateLimiter,
};
