//! Configuration module - environment variable parsing and match tunables

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of human readable ones
    pub log_json: bool,
    /// Allowed client origins for CORS; empty means any origin
    pub client_origins: Vec<String>,
    /// Optional JSON map file; the built-in map is used when absent
    pub map_path: Option<PathBuf>,
    /// Rules applied to every room
    pub match_config: MatchConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let client_origins = lookup("CLIENT_ORIGIN")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty() && *o != "*")
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let mut match_config = MatchConfig::default();
        if let Some(secs) = parse_var::<u64, _>(&lookup, "RECONNECT_TIMEOUT_SECS")? {
            match_config.reconnect_timeout = Duration::from_secs(secs);
        }
        if let Some(rounds) = parse_var::<u32, _>(&lookup, "ROUNDS_TO_WIN")? {
            if rounds == 0 {
                return Err(ConfigError::Invalid {
                    key: "ROUNDS_TO_WIN",
                    value: rounds.to_string(),
                });
            }
            match_config.rounds_to_win = rounds;
            match_config.halftime_round = rounds - 1;
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            client_origins,
            map_path: lookup("MAP_PATH").filter(|p| !p.is_empty()).map(PathBuf::from),
            match_config,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

/// Round and phase rules for a room
#[derive(Clone, Debug, PartialEq)]
pub struct MatchConfig {
    pub buy_phase_secs: u32,
    pub strategy_phase_secs: u32,
    pub live_phase_secs: u32,
    /// Also the bomb timer
    pub post_plant_secs: u32,
    pub round_end_secs: u32,
    pub rounds_to_win: u32,
    /// Sides swap after this round
    pub halftime_round: u32,
    pub reconnect_timeout: Duration,
    pub economy: EconomyConfig,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            buy_phase_secs: 20,
            strategy_phase_secs: 15,
            live_phase_secs: 115,
            post_plant_secs: 40,
            round_end_secs: 5,
            rounds_to_win: 7,
            halftime_round: 6,
            reconnect_timeout: Duration::from_secs(60),
            economy: EconomyConfig::default(),
        }
    }
}

/// Money rules
#[derive(Clone, Debug, PartialEq)]
pub struct EconomyConfig {
    pub start_money: u32,
    pub max_money: u32,
    pub win_reward: u32,
    /// Indexed by consecutive losses minus one, capped at the last entry
    pub loss_rewards: Vec<u32>,
    pub plant_bonus: u32,
    pub defuse_bonus: u32,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            start_money: 800,
            max_money: 16_000,
            win_reward: 3_250,
            loss_rewards: vec![1_400, 1_900, 2_400, 2_900, 3_400],
            plant_bonus: 300,
            defuse_bonus: 300,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}
