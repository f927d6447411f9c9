use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Magic-link request limiter (per normalized email).
    #[serde(default = "default_magic_link_window_ms")]
    pub magic_link_window_ms: i64,
    #[serde(default = "default_magic_link_max_attempts")]
    pub magic_link_max_attempts: u32,
    #[serde(default = "default_magic_link_block_ms")]
    pub magic_link_block_ms: i64,
    /// Chat request limiter (per session id).
    #[serde(default = "default_chat_window_ms")]
    pub chat_window_ms: i64,
    #[serde(default = "default_chat_max_attempts")]
    pub chat_max_attempts: u32,
    #[serde(default = "default_chat_block_ms")]
    pub chat_block_ms: i64,
    /// Magic-link token lifetime, fixed at issuance.
    #[serde(default = "default_magic_link_ttl_ms")]
    pub magic_link_ttl_ms: i64,
}

impl Config {
    /// Loads configuration from `LATCHKEY_`-prefixed environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("LATCHKEY_").from_env()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            magic_link_window_ms: default_magic_link_window_ms(),
            magic_link_max_attempts: default_magic_link_max_attempts(),
            magic_link_block_ms: default_magic_link_block_ms(),
            chat_window_ms: default_chat_window_ms(),
            chat_max_attempts: default_chat_max_attempts(),
            chat_block_ms: default_chat_block_ms(),
            magic_link_ttl_ms: default_magic_link_ttl_ms(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

// 5 magic-link requests per hour per email, then blocked for an hour.
fn default_magic_link_window_ms() -> i64 {
    60 * 60 * 1000
}

fn default_magic_link_max_attempts() -> u32 {
    5
}

fn default_magic_link_block_ms() -> i64 {
    60 * 60 * 1000
}

// 30 chat messages per 15 minutes per session.
fn default_chat_window_ms() -> i64 {
    15 * 60 * 1000
}

fn default_chat_max_attempts() -> u32 {
    30
}

fn default_chat_block_ms() -> i64 {
    15 * 60 * 1000
}

// Links stay redeemable for 15 minutes.
fn default_magic_link_ttl_ms() -> i64 {
    15 * 60 * 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_product_limits() {
        let config = Config::default();

        assert_eq!(config.magic_link_max_attempts, 5);
        assert_eq!(config.magic_link_window_ms, 3_600_000);
        assert_eq!(config.magic_link_ttl_ms, 900_000);
        assert_eq!(config.chat_max_attempts, 30);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config: Config = envy::prefixed("LATCHKEY_")
            .from_iter(vec![
                (
                    "LATCHKEY_REDIS_URL".to_string(),
                    "redis://cache:6379".to_string(),
                ),
                ("LATCHKEY_CHAT_MAX_ATTEMPTS".to_string(), "3".to_string()),
            ])
            .unwrap();

        assert_eq!(config.redis_url, "redis://cache:6379");
        assert_eq!(config.chat_max_attempts, 3);
        // Unset variables keep their defaults.
        assert_eq!(config.magic_link_max_attempts, 5);
    }
}
