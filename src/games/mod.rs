pub mod account;
pub mod announcer;
pub mod card;
pub mod fairness;
pub mod number_pool;
pub mod payout;
pub mod processor;
pub mod round;
pub mod sequencer;
pub mod simulation;
pub mod types;
pub mod win_detector;

pub use account::{AccountService, InMemoryAccounts};
pub use announcer::{CallAnnouncer, NoopAnnouncer, TracingAnnouncer};
pub use card::{Card, CardGenerator, Cell, CellValue};
pub use fairness::{RoundSeed, SeedError};
pub use number_pool::NumberPool;
pub use payout::{JackpotAward, Payout, PayoutCalculator, PayoutMultiplier, PayoutRequest};
pub use processor::{GameProcessor, RoundResult};
pub use round::{CallRecord, CallResult, Round, RoundConfig, RoundSnapshot};
pub use sequencer::{CallSequencer, RoundEvent, SequencerHandle};
pub use simulation::{
    SimulationError, SimulationFramework, SimulationReporter, SimulationResults,
    SimulationScenario,
};
pub use types::*;
pub use win_detector::{Evaluation, LineId, WinDetector};
