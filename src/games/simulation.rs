//! Round simulation
//!
//! Plays batches of instant rounds through a `GameProcessor` and aggregates
//! return-to-player and win statistics per scenario.

use crate::config::BingoConfig;
use crate::errors::BingoError;
use crate::games::account::InMemoryAccounts;
use crate::games::processor::{GameProcessor, RoundResult};
use crate::games::types::{GameMode, RoundOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What to simulate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SimulationScenario {
    /// One round for one player
    SingleRound { player_id: String, bet_amount: f64 },
    /// Many rounds spread across players
    Batch {
        player_count: usize,
        rounds_per_player: usize,
        bet_amount: f64,
    },
}

/// Aggregated statistics for a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResults {
    pub scenario: String,
    pub mode: GameMode,
    pub execution_time: Duration,
    pub rounds_played: usize,
    pub failed_rounds: usize,
    pub wins: usize,
    pub no_winner_rounds: usize,
    pub time_up_rounds: usize,
    pub total_bet: f64,
    pub total_payout: f64,
    pub return_to_player: f64,
    pub average_calls_to_win: f64,
    pub average_elapsed_seconds: f64,
    pub jackpot_hits: usize,
    pub jackpot_paid: f64,
}

#[derive(Default)]
struct Tally {
    rounds_played: usize,
    failed_rounds: usize,
    wins: usize,
    no_winner_rounds: usize,
    time_up_rounds: usize,
    total_bet: f64,
    total_payout: f64,
    calls_to_win: usize,
    elapsed_seconds: u64,
    jackpot_hits: usize,
    jackpot_paid: f64,
}

impl Tally {
    fn record(&mut self, result: &RoundResult) {
        self.rounds_played += 1;
        self.total_bet += result.bet_amount;
        self.total_payout += result.payout.total;
        self.elapsed_seconds += u64::from(result.elapsed_seconds);

        match result.outcome {
            RoundOutcome::Winner { .. } => {
                self.wins += 1;
                self.calls_to_win += result.calls.len();
            }
            RoundOutcome::NoWinner => self.no_winner_rounds += 1,
            RoundOutcome::TimeUp => self.time_up_rounds += 1,
            RoundOutcome::Cancelled => {}
        }

        self.jackpot_hits += result.payout.jackpot_awards.len();
        self.jackpot_paid += result
            .payout
            .jackpot_awards
            .iter()
            .map(|a| a.amount)
            .sum::<f64>();
    }

    fn into_results(
        self,
        scenario: &str,
        mode: GameMode,
        execution_time: Duration,
    ) -> SimulationResults {
        let ratio = |num: f64, den: f64| if den > 0.0 { num / den } else { 0.0 };

        SimulationResults {
            scenario: scenario.to_string(),
            mode,
            execution_time,
            rounds_played: self.rounds_played,
            failed_rounds: self.failed_rounds,
            wins: self.wins,
            no_winner_rounds: self.no_winner_rounds,
            time_up_rounds: self.time_up_rounds,
            total_bet: self.total_bet,
            total_payout: self.total_payout,
            return_to_player: ratio(self.total_payout, self.total_bet),
            average_calls_to_win: ratio(self.calls_to_win as f64, self.wins as f64),
            average_elapsed_seconds: ratio(self.elapsed_seconds as f64, self.rounds_played as f64),
            jackpot_hits: self.jackpot_hits,
            jackpot_paid: self.jackpot_paid,
        }
    }
}

/// Drives rounds through a processor backed by in-memory accounts
pub struct SimulationFramework {
    processor: Arc<GameProcessor>,
    accounts: Arc<InMemoryAccounts>,
}

impl SimulationFramework {
    pub fn new(config: BingoConfig) -> Result<Self, SimulationError> {
        let accounts = Arc::new(InMemoryAccounts::new());
        let processor = GameProcessor::new(config, accounts.clone())
            .map_err(|e| SimulationError::Setup(e.to_string()))?;

        Ok(Self {
            processor: Arc::new(processor),
            accounts,
        })
    }

    pub fn processor(&self) -> &GameProcessor {
        &self.processor
    }

    pub async fn execute_scenario(
        &self,
        scenario: SimulationScenario,
    ) -> Result<SimulationResults, SimulationError> {
        match scenario {
            SimulationScenario::SingleRound {
                player_id,
                bet_amount,
            } => self.run_rounds("SingleRound", &[player_id], 1, bet_amount).await,
            SimulationScenario::Batch {
                player_count,
                rounds_per_player,
                bet_amount,
            } => {
                let players: Vec<String> = (0..player_count)
                    .map(|i| format!("sim-player-{}", i))
                    .collect();
                self.run_rounds("Batch", &players, rounds_per_player, bet_amount)
                    .await
            }
        }
    }

    async fn run_rounds(
        &self,
        scenario: &str,
        players: &[String],
        rounds_per_player: usize,
        bet_amount: f64,
    ) -> Result<SimulationResults, SimulationError> {
        let start_time = Instant::now();
        let mut tally = Tally::default();

        for player_id in players {
            // Enough to cover every stake even if nothing is won
            self.accounts
                .deposit(player_id, bet_amount * rounds_per_player as f64);

            for _ in 0..rounds_per_player {
                let config = self.processor.round_config(bet_amount);
                match self.processor.play_instant(player_id, config).await {
                    Ok(result) => tally.record(&result),
                    Err(BingoError::Bet(e)) => {
                        return Err(SimulationError::InvalidBet(e.to_string()))
                    }
                    Err(e) => {
                        tracing::warn!("Simulated round failed for {}: {}", player_id, e);
                        tally.failed_rounds += 1;
                    }
                }
            }
        }

        let mode = self.processor.config().round.mode;
        Ok(tally.into_results(scenario, mode, start_time.elapsed()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Simulation setup failed: {0}")]
    Setup(String),

    #[error("Simulated bet rejected: {0}")]
    InvalidBet(String),
}

/// Text rendering of simulation results
pub struct SimulationReporter;

impl SimulationReporter {
    pub fn generate_report(results: &SimulationResults) -> String {
        let mut report = String::new();

        report.push_str(&format!(
            "🎯 {} Simulation Results ({} mode)\n",
            results.scenario, results.mode
        ));
        report.push_str(&format!("{}\n", "=".repeat(50)));
        report.push_str(&format!("⏱️  Execution Time: {:?}\n", results.execution_time));
        report.push_str(&format!(
            "🎮 Rounds: {} played, {} failed\n",
            results.rounds_played, results.failed_rounds
        ));
        report.push_str(&format!(
            "🏆 Wins: {}, No winner: {}, Time up: {}\n",
            results.wins, results.no_winner_rounds, results.time_up_rounds
        ));
        report.push_str(&format!(
            "💰 Total Bet: {:.2}, Total Payout: {:.2}\n",
            results.total_bet, results.total_payout
        ));
        report.push_str(&format!(
            "📈 Return to Player: {:.1}%\n",
            results.return_to_player * 100.0
        ));
        report.push_str(&format!("🔢 Avg Calls to Win: {:.1}\n", results.average_calls_to_win));
        report.push_str(&format!(
            "⚡ Avg Round Length: {:.1}s\n",
            results.average_elapsed_seconds
        ));

        if results.jackpot_hits > 0 {
            report.push_str(&format!(
                "🎰 Jackpots: {} hit, {:.2} paid\n",
                results.jackpot_hits, results.jackpot_paid
            ));
        }

        report
    }
}
