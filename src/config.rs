use std::env;
use std::time::Duration;

/// Game tunables.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Minimum time between accepted spins (ms).
    pub spin_cooldown_ms: u64,
    /// Requests this close to the last accepted spin are duplicates (ms).
    pub race_margin_ms: u64,
    pub max_balance: u64,
    /// Balance a player has before their first write.
    pub starting_balance: u64,
    /// Per-cell chance of the rare symbol before buffs.
    pub rare_probability: f64,
    pub hourly_jackpot_bonus: u64,
    pub peek_ttl_secs: u64,
    /// Bound on each deferred task and on item grants (ms).
    pub deferred_timeout_ms: u64,
    pub store_retry_attempts: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            spin_cooldown_ms: 5_000,
            race_margin_ms: 2_000,
            max_balance: 10_000_000,
            starting_balance: 500,
            rare_probability: 1.0 / 150.0,
            hourly_jackpot_bonus: 1_000,
            peek_ttl_secs: 300,
            deferred_timeout_ms: 5_000,
            store_retry_attempts: 5,
        }
    }
}

impl GameConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            spin_cooldown_ms: env_parse("SPIN_COOLDOWN_MS").unwrap_or(defaults.spin_cooldown_ms),
            race_margin_ms: env_parse("RACE_MARGIN_MS").unwrap_or(defaults.race_margin_ms),
            max_balance: env_parse("MAX_BALANCE").unwrap_or(defaults.max_balance),
            starting_balance: env_parse("STARTING_BALANCE").unwrap_or(defaults.starting_balance),
            rare_probability: env_probability("RARE_PROBABILITY")
                .unwrap_or(defaults.rare_probability),
            hourly_jackpot_bonus: env_parse("HOURLY_JACKPOT_BONUS")
                .unwrap_or(defaults.hourly_jackpot_bonus),
            peek_ttl_secs: env_parse("PEEK_TTL_SECS").unwrap_or(defaults.peek_ttl_secs),
            deferred_timeout_ms: env_parse("DEFERRED_TIMEOUT_MS")
                .unwrap_or(defaults.deferred_timeout_ms),
            store_retry_attempts: env_parse("STORE_RETRY_ATTEMPTS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.store_retry_attempts),
        }
    }

    pub fn peek_ttl(&self) -> Duration {
        Duration::from_secs(self.peek_ttl_secs)
    }

    pub fn deferred_timeout(&self) -> Duration {
        Duration::from_millis(self.deferred_timeout_ms)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// A finite probability in [0, 1]; anything else is ignored.
fn env_probability(name: &str) -> Option<f64> {
    env_parse::<f64>(name).filter(|p| p.is_finite() && (0.0..=1.0).contains(p))
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Redis URL. Without it state lives in process memory.
    pub redis_url: Option<String>,
    pub game: GameConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            redis_url: env::var("REDIS_URL").ok().filter(|u| !u.is_empty()),
            game: GameConfig::from_env(),
        }
    }
}
