//! Error types for the bingo engine
//!
//! One root error with a sub-enum per concern so callers can match on the
//! category (bet rejection, account failure, round misuse) without string parsing.

use thiserror::Error;

/// Root error type for all engine operations
#[derive(Debug, Error)]
pub enum BingoError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Bet rejected: {0}")]
    Bet(#[from] BetError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Round error: {0}")]
    Round(#[from] RoundError),
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

/// Bets that must be refused before any round state exists
#[derive(Debug, Error, PartialEq)]
pub enum BetError {
    #[error("Bet amount must be positive, got {0}")]
    NonPositive(f64),

    #[error("Bet amount {amount} is below the minimum of {minimum}")]
    BelowMinimum { amount: f64, minimum: f64 },

    #[error("Card count {0} is outside the allowed range 1..=4")]
    InvalidCardCount(usize),
}

/// Failures reported by the external account service
#[derive(Debug, Error, PartialEq)]
pub enum AccountError {
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("Unknown player: {0}")]
    UnknownPlayer(String),

    #[error("Account service unavailable: {0}")]
    Unavailable(String),
}

/// Misuse of a round or its pool
#[derive(Debug, Error, PartialEq)]
pub enum RoundError {
    #[error("Number pool exhausted: all 75 numbers called")]
    ExhaustedPool,

    #[error("Round is not playing (state: {0})")]
    NotPlaying(String),

    #[error("Round is paused")]
    Paused,

    #[error("Round is not paused")]
    NotPaused,

    #[error("Round has already finished")]
    AlreadyFinished,

    #[error("Round has not finished (state: {0})")]
    NotFinished(String),

    #[error("Round {0} has already been settled")]
    AlreadySettled(String),

    #[error("No card at index {0}")]
    UnknownCard(usize),

    #[error("No cell at card {card}, row {row}, column {col}")]
    InvalidCell { card: usize, row: usize, col: usize },

    #[error("Invalid card layout: {0}")]
    InvalidCard(String),

    #[error("Card {0} has no completed line")]
    FalseClaim(usize),

    #[error("Round actor is no longer running")]
    ActorStopped,
}

impl From<std::io::Error> for BingoError {
    fn from(e: std::io::Error) -> Self {
        BingoError::Configuration(ConfigurationError::LoadFailed(e.to_string()))
    }
}

impl From<serde_json::Error> for BingoError {
    fn from(e: serde_json::Error) -> Self {
        BingoError::Configuration(ConfigurationError::LoadFailed(e.to_string()))
    }
}

// Convenience type alias for Results
pub type BingoResult<T> = Result<T, BingoError>;
