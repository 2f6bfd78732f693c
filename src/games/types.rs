use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

/// Highest number in a 75-ball game
pub const MAX_NUMBER: u8 = 75;

/// Numbers per letter column
pub const COLUMN_SPAN: u8 = 15;

/// Cards are 5x5
pub const GRID_SIZE: usize = 5;

/// Row and column of the free space
pub const FREE_CELL: (usize, usize) = (2, 2);

/// Column letters of a BINGO card
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BingoLetter {
    B,
    I,
    N,
    G,
    O,
}

impl BingoLetter {
    pub const ALL: [BingoLetter; GRID_SIZE] = [
        BingoLetter::B,
        BingoLetter::I,
        BingoLetter::N,
        BingoLetter::G,
        BingoLetter::O,
    ];

    /// Letter for a card column index (0 = B)
    pub fn from_column(col: usize) -> Option<Self> {
        Self::ALL.get(col).copied()
    }

    /// Letter a called number belongs to
    pub fn from_number(number: u8) -> Option<Self> {
        if number == 0 || number > MAX_NUMBER {
            return None;
        }
        Self::from_column(((number - 1) / COLUMN_SPAN) as usize)
    }

    pub fn column(self) -> usize {
        self as usize
    }

    /// Inclusive range of numbers printed in this column
    pub fn range(self) -> RangeInclusive<u8> {
        let low = self.column() as u8 * COLUMN_SPAN + 1;
        low..=low + COLUMN_SPAN - 1
    }
}

impl fmt::Display for BingoLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            BingoLetter::B => "B",
            BingoLetter::I => "I",
            BingoLetter::N => "N",
            BingoLetter::G => "G",
            BingoLetter::O => "O",
        };
        write!(f, "{}", letter)
    }
}

/// Supported game modes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Classic,
    Speed,
    Progressive,
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameMode::Classic => write!(f, "classic"),
            GameMode::Speed => write!(f, "speed"),
            GameMode::Progressive => write!(f, "progressive"),
        }
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "classic" => Ok(GameMode::Classic),
            "speed" => Ok(GameMode::Speed),
            "progressive" => Ok(GameMode::Progressive),
            other => Err(format!("unknown game mode '{}'", other)),
        }
    }
}

/// Call speed; also selects the Speed-mode payout multiplier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeedTier {
    Slow,
    #[default]
    Medium,
    Fast,
}

impl SpeedTier {
    pub const ALL: [SpeedTier; 3] = [SpeedTier::Slow, SpeedTier::Medium, SpeedTier::Fast];

    pub fn interval_ms(self) -> u64 {
        match self {
            SpeedTier::Slow => 3000,
            SpeedTier::Medium => 2000,
            SpeedTier::Fast => 1000,
        }
    }

    pub fn interval(self) -> Duration {
        Duration::from_millis(self.interval_ms())
    }

    pub fn multiplier(self) -> f64 {
        match self {
            SpeedTier::Slow => 1.5,
            SpeedTier::Medium => 2.0,
            SpeedTier::Fast => 3.0,
        }
    }
}

impl fmt::Display for SpeedTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeedTier::Slow => write!(f, "slow"),
            SpeedTier::Medium => write!(f, "medium"),
            SpeedTier::Fast => write!(f, "fast"),
        }
    }
}

impl FromStr for SpeedTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "slow" => Ok(SpeedTier::Slow),
            "medium" => Ok(SpeedTier::Medium),
            "fast" => Ok(SpeedTier::Fast),
            other => Err(format!("unknown speed tier '{}'", other)),
        }
    }
}

/// Bet level: card count, payout multiplier and progressive minimum bet
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum BetTier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl BetTier {
    pub const ALL: [BetTier; 4] = [
        BetTier::Bronze,
        BetTier::Silver,
        BetTier::Gold,
        BetTier::Platinum,
    ];

    pub fn multiplier(self) -> f64 {
        match self {
            BetTier::Bronze => 1.0,
            BetTier::Silver => 2.0,
            BetTier::Gold => 3.0,
            BetTier::Platinum => 5.0,
        }
    }

    pub fn card_count(self) -> usize {
        match self {
            BetTier::Bronze => 1,
            BetTier::Silver => 2,
            BetTier::Gold => 3,
            BetTier::Platinum => 4,
        }
    }

    pub fn min_bet(self) -> f64 {
        match self {
            BetTier::Bronze => 5.0,
            BetTier::Silver => 10.0,
            BetTier::Gold => 25.0,
            BetTier::Platinum => 50.0,
        }
    }
}

impl fmt::Display for BetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetTier::Bronze => write!(f, "bronze"),
            BetTier::Silver => write!(f, "silver"),
            BetTier::Gold => write!(f, "gold"),
            BetTier::Platinum => write!(f, "platinum"),
        }
    }
}

impl FromStr for BetTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bronze" => Ok(BetTier::Bronze),
            "silver" => Ok(BetTier::Silver),
            "gold" => Ok(BetTier::Gold),
            "platinum" => Ok(BetTier::Platinum),
            other => Err(format!("unknown bet tier '{}'", other)),
        }
    }
}

/// Lifecycle of a round. Pausing is a flag on `Playing`, not a state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoundState {
    Waiting,
    Playing,
    Finished,
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundState::Waiting => write!(f, "waiting"),
            RoundState::Playing => write!(f, "playing"),
            RoundState::Finished => write!(f, "finished"),
        }
    }
}

/// A called number as announced to players ("B7", "B7.mp3")
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BingoCall {
    pub letter: BingoLetter,
    pub number: u8,
    pub full_call: String,
    pub audio_file: String,
}

impl BingoCall {
    pub fn new(number: u8) -> Option<Self> {
        let letter = BingoLetter::from_number(number)?;
        let full_call = format!("{}{}", letter, number);
        let audio_file = format!("{}.mp3", full_call);
        Some(Self {
            letter,
            number,
            full_call,
            audio_file,
        })
    }
}

/// Progressive jackpot tier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Jackpot {
    pub name: String,
    pub current: f64,
    pub target: f64,
}

impl Jackpot {
    pub fn new(name: &str, current: f64, target: f64) -> Self {
        Self {
            name: name.to_string(),
            current,
            target,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.current >= self.target
    }

    /// Four tiers the progressive room opens with
    pub fn default_tiers() -> Vec<Self> {
        vec![
            Self::new("Mini Jackpot", 1_250.0, 5_000.0),
            Self::new("Minor Jackpot", 8_750.0, 25_000.0),
            Self::new("Major Jackpot", 42_500.0, 100_000.0),
            Self::new("Grand Jackpot", 187_500.0, 500_000.0),
        ]
    }
}

/// How a finished round ended
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundOutcome {
    Winner {
        card_index: usize,
        card_id: String,
        lines: Vec<String>,
        /// Other cards that completed on the same call
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        also_complete: Vec<usize>,
        elapsed_seconds: u32,
    },
    NoWinner,
    TimeUp,
    Cancelled,
}

impl RoundOutcome {
    pub fn is_win(&self) -> bool {
        matches!(self, RoundOutcome::Winner { .. })
    }
}
