//! Configuration management with validation and defaults
//!
//! `BingoConfig` holds the defaults every round is built from. It can be loaded
//! from TOML, overridden from `BINGO_*` environment variables and saved back.

use crate::errors::{BingoResult, ConfigurationError};
use crate::games::types::{BetTier, GameMode, Jackpot, SpeedTier};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Complete engine configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct BingoConfig {
    #[serde(default)]
    pub round: RoundDefaults,
    #[serde(default)]
    pub betting: BettingConfig,
    #[serde(default)]
    pub payout: PayoutConfig,
    #[serde(default)]
    pub progressive: ProgressiveConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Defaults applied to every new round
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RoundDefaults {
    pub mode: GameMode,
    pub speed: SpeedTier,
    pub bet_tier: BetTier,
    pub auto_daub: bool,
    /// End the round as soon as a card completes; otherwise wait for a claim
    pub auto_detect_wins: bool,
    /// Call numbers on the timer; when off, each call waits for a request
    #[serde(default = "default_auto_call")]
    pub auto_call: bool,
    pub countdown_seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_seconds: Option<u32>,
    /// Overrides the bet tier's card count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_count: Option<usize>,
}

fn default_auto_call() -> bool {
    true
}

impl Default for RoundDefaults {
    fn default() -> Self {
        Self {
            mode: GameMode::Classic,
            speed: SpeedTier::Medium,
            bet_tier: BetTier::Bronze,
            auto_daub: true,
            auto_detect_wins: true,
            auto_call: true,
            countdown_seconds: 0,
            time_limit_seconds: None,
            card_count: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BettingConfig {
    pub min_bet: f64,
    pub max_cards: usize,
    /// Apply the bet tier minimums in progressive rooms
    pub enforce_tier_minimum: bool,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            min_bet: 1.0,
            max_cards: 4,
            enforce_tier_minimum: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PayoutConfig {
    /// Payout is bet x this x tier multiplier
    pub base_multiplier: f64,
    /// Speed wins strictly under this many seconds earn the time bonus
    pub time_bonus_threshold_secs: u32,
    pub time_bonus_rate: f64,
    /// Fraction of every progressive bet added to each jackpot tier
    pub jackpot_contribution_rate: f64,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            base_multiplier: 75.0,
            time_bonus_threshold_secs: 30,
            time_bonus_rate: 0.5,
            jackpot_contribution_rate: 0.01,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgressiveConfig {
    pub jackpots: Vec<Jackpot>,
}

impl Default for ProgressiveConfig {
    fn default() -> Self {
        Self {
            jackpots: Jackpot::default_tiers(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MonitoringConfig {
    pub log_level: LogLevel,
    /// Announce every call through the tracing log
    pub log_calls: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_calls: false,
        }
    }
}

/// Room presets and validation
impl BingoConfig {
    /// Single-card room paying by bet level
    pub fn classic() -> Self {
        Self::default()
    }

    /// Three cards, countdown, auto-daub, paying by call speed
    pub fn speed() -> Self {
        Self {
            round: RoundDefaults {
                mode: GameMode::Speed,
                speed: SpeedTier::Medium,
                auto_daub: true,
                countdown_seconds: 3,
                card_count: Some(3),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Jackpot room; card count follows the bet tier and the player calls each number
    pub fn progressive() -> Self {
        Self {
            round: RoundDefaults {
                mode: GameMode::Progressive,
                bet_tier: BetTier::Silver,
                auto_call: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn for_mode(mode: GameMode) -> Self {
        match mode {
            GameMode::Classic => Self::classic(),
            GameMode::Speed => Self::speed(),
            GameMode::Progressive => Self::progressive(),
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.betting.min_bet > 0.0) {
            return Err(ConfigValidationError::InvalidValue(
                "betting.min_bet must be > 0".to_string(),
            ));
        }

        if self.betting.max_cards == 0 || self.betting.max_cards > 4 {
            return Err(ConfigValidationError::InvalidValue(
                "betting.max_cards must be between 1 and 4".to_string(),
            ));
        }

        if let Some(cards) = self.round.card_count {
            if cards == 0 || cards > self.betting.max_cards {
                return Err(ConfigValidationError::LogicalInconsistency(format!(
                    "round.card_count {} exceeds betting.max_cards {}",
                    cards, self.betting.max_cards
                )));
            }
        }

        if self.round.time_limit_seconds == Some(0) {
            return Err(ConfigValidationError::InvalidValue(
                "round.time_limit_seconds must be > 0 when set".to_string(),
            ));
        }

        if !(self.payout.base_multiplier > 0.0) {
            return Err(ConfigValidationError::InvalidValue(
                "payout.base_multiplier must be > 0".to_string(),
            ));
        }

        if self.payout.time_bonus_rate < 0.0 {
            return Err(ConfigValidationError::InvalidValue(
                "payout.time_bonus_rate must be >= 0".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.payout.jackpot_contribution_rate) {
            return Err(ConfigValidationError::InvalidValue(
                "payout.jackpot_contribution_rate must be in [0, 1)".to_string(),
            ));
        }

        if self.round.mode == GameMode::Progressive && self.progressive.jackpots.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "progressive.jackpots".to_string(),
            ));
        }

        for jackpot in &self.progressive.jackpots {
            if !(jackpot.target > 0.0) || jackpot.current < 0.0 {
                return Err(ConfigValidationError::InvalidValue(format!(
                    "jackpot '{}' needs target > 0 and current >= 0",
                    jackpot.name
                )));
            }
        }

        Ok(())
    }

    pub fn call_interval(&self) -> Duration {
        self.round.speed.interval()
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ConfigValidationError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
    #[error("Configuration logical inconsistency: {0}")]
    LogicalInconsistency(String),
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> BingoResult<BingoConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => BingoConfig::default(),
        };

        self.apply_env_overrides(&mut config)?;

        config
            .validate()
            .map_err(|e| ConfigurationError::ValidationFailed(e.to_string()))?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> BingoResult<BingoConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into()
        })
    }

    fn apply_env_overrides(&self, config: &mut BingoConfig) -> BingoResult<()> {
        if let Ok(mode) = env::var("BINGO_MODE") {
            config.round.mode = mode
                .parse::<GameMode>()
                .map_err(|reason| ConfigurationError::InvalidValue {
                    field: "BINGO_MODE".to_string(),
                    value: mode,
                    reason,
                })?;
        }

        if let Ok(speed) = env::var("BINGO_SPEED") {
            config.round.speed = speed
                .parse::<SpeedTier>()
                .map_err(|reason| ConfigurationError::InvalidValue {
                    field: "BINGO_SPEED".to_string(),
                    value: speed,
                    reason,
                })?;
        }

        if let Ok(min_bet) = env::var("BINGO_MIN_BET") {
            config.betting.min_bet = min_bet
                .parse::<f64>()
                .map_err(|_| ConfigurationError::InvalidValue {
                    field: "BINGO_MIN_BET".to_string(),
                    value: min_bet,
                    reason: "Invalid amount".to_string(),
                })?;
        }

        if let Ok(auto_daub) = env::var("BINGO_AUTO_DAUB") {
            config.round.auto_daub = parse_bool("BINGO_AUTO_DAUB", auto_daub)?;
        }

        if let Ok(auto_call) = env::var("BINGO_AUTO_CALL") {
            config.round.auto_call = parse_bool("BINGO_AUTO_CALL", auto_call)?;
        }

        if let Ok(level) = env::var("BINGO_LOG_LEVEL") {
            config.monitoring.log_level = level
                .parse::<LogLevel>()
                .map_err(|reason| ConfigurationError::InvalidValue {
                    field: "BINGO_LOG_LEVEL".to_string(),
                    value: level,
                    reason,
                })?;
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &BingoConfig, path: &str) -> BingoResult<()> {
        let toml_string = toml::to_string_pretty(config).map_err(|e| {
            ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, toml_string).map_err(|e| {
            ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into()
        })
    }
}

fn parse_bool(field: &str, value: String) -> Result<bool, ConfigurationError> {
    value
        .parse::<bool>()
        .map_err(|_| ConfigurationError::InvalidValue {
            field: field.to_string(),
            value,
            reason: "Invalid boolean value".to_string(),
        })
}

/// Write the default configuration to `path`
pub fn generate_sample_config(path: &str) -> BingoResult<()> {
    ConfigLoader::new().save(&BingoConfig::default(), path)
}
