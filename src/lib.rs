//! Bingo Engine - 75-ball BINGO rounds
//!
//! Deals 5x5 cards, calls numbers on a timer, detects completed lines and
//! settles payouts against player accounts. Classic, speed and progressive
//! jackpot rooms share one engine and differ only in configuration.

pub mod config;
pub mod errors;
pub mod games;

pub use config::{BingoConfig, ConfigLoader};
pub use errors::{BingoError, BingoResult};
pub use games::{
    CallSequencer, Card, CardGenerator, GameMode, GameProcessor, NumberPool, PayoutCalculator,
    Round, RoundConfig, RoundEvent, RoundResult, RoundSeed, WinDetector,
};
