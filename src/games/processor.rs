use crate::config::BingoConfig;
use crate::errors::{BetError, BingoError, BingoResult, ConfigurationError, RoundError};
use crate::games::account::AccountService;
use crate::games::card::Card;
use crate::games::fairness::RoundSeed;
use crate::games::payout::{Payout, PayoutCalculator, PayoutRequest};
use crate::games::round::{Round, RoundConfig};
use crate::games::types::{BetTier, GameMode, Jackpot, RoundOutcome, RoundState, SpeedTier};
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Settled round, safe to hand to players and auditors
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundResult {
    pub round_id: String,
    pub player_id: String,
    pub mode: GameMode,
    pub speed: SpeedTier,
    pub bet_tier: BetTier,
    pub bet_amount: f64,
    pub card_count: usize,
    pub outcome: RoundOutcome,
    /// Numbers in the order they were called
    pub calls: Vec<u8>,
    pub elapsed_seconds: u32,
    pub payout: Payout,
    pub balance_after: f64,
    pub commitment: String,
    pub seed: String,
    pub settled_at: DateTime<Utc>,
}

impl RoundResult {
    pub fn is_win(&self) -> bool {
        self.outcome.is_win()
    }
}

/// Opens rounds against player balances and settles them
pub struct GameProcessor {
    config: BingoConfig,
    accounts: Arc<dyn AccountService>,
    calculator: PayoutCalculator,
    jackpots: Mutex<Vec<Jackpot>>,
    /// Ids of rounds already paid out
    settled: DashSet<String>,
}

impl GameProcessor {
    /// Create a processor; the configuration is validated first
    pub fn new(config: BingoConfig, accounts: Arc<dyn AccountService>) -> BingoResult<Self> {
        config
            .validate()
            .map_err(|e| ConfigurationError::ValidationFailed(e.to_string()))?;

        Ok(Self {
            calculator: PayoutCalculator::new(config.payout.clone()),
            jackpots: Mutex::new(config.progressive.jackpots.clone()),
            settled: DashSet::new(),
            accounts,
            config,
        })
    }

    pub fn config(&self) -> &BingoConfig {
        &self.config
    }

    /// Round parameters for a bet under this processor's defaults
    pub fn round_config(&self, bet_amount: f64) -> RoundConfig {
        RoundConfig::from_config(&self.config, bet_amount)
    }

    /// Current jackpot bank
    pub async fn jackpots(&self) -> Vec<Jackpot> {
        self.jackpots.lock().await.clone()
    }

    /// Validate, debit and deal a fresh round
    pub async fn open_round(&self, player_id: &str, config: RoundConfig) -> BingoResult<Round> {
        self.open_round_with_seed(player_id, config, RoundSeed::generate()).await
    }

    /// As `open_round`, with a caller-chosen seed
    pub async fn open_round_with_seed(
        &self,
        player_id: &str,
        config: RoundConfig,
        seed: RoundSeed,
    ) -> BingoResult<Round> {
        self.charge(player_id, &config).await?;
        Ok(Round::new(config, seed))
    }

    /// As `open_round`, with cards dealt by the caller
    pub async fn open_round_with_cards(
        &self,
        player_id: &str,
        config: RoundConfig,
        cards: Vec<Card>,
        seed: RoundSeed,
    ) -> BingoResult<Round> {
        if cards.len() != config.card_count {
            return Err(BetError::InvalidCardCount(cards.len()).into());
        }
        self.charge(player_id, &config).await?;
        Ok(Round::with_cards(config, cards, seed))
    }

    /// Pay out a finished round and build its result. Each round settles once.
    pub async fn settle(&self, player_id: &str, round: &Round) -> BingoResult<RoundResult> {
        if round.state() != RoundState::Finished {
            return Err(RoundError::NotFinished(round.state().to_string()).into());
        }
        if !self.settled.insert(round.id().to_string()) {
            warn!("Round {} settlement repeated by {}", round.id(), player_id);
            return Err(RoundError::AlreadySettled(round.id().to_string()).into());
        }

        match self.pay_out(player_id, round).await {
            Ok(result) => Ok(result),
            Err(e) => {
                // Nothing was credited, so the round may be settled again
                self.settled.remove(round.id());
                Err(e)
            }
        }
    }

    pub fn is_settled(&self, round_id: &str) -> bool {
        self.settled.contains(round_id)
    }

    async fn pay_out(&self, player_id: &str, round: &Round) -> BingoResult<RoundResult> {
        let outcome = round
            .outcome()
            .cloned()
            .ok_or_else(|| RoundError::NotFinished(round.state().to_string()))?;
        let config = round.config();

        // Held until the credit lands so a jackpot is reset only once it is paid
        let mut bank = self.jackpots.lock().await;
        let payout = match &outcome {
            RoundOutcome::Winner { elapsed_seconds, .. } => {
                let request = PayoutRequest {
                    bet_amount: config.bet_amount,
                    multiplier: config.multiplier(),
                    elapsed_seconds: *elapsed_seconds,
                };
                let jackpots = (config.mode == GameMode::Progressive).then(|| bank.as_slice());
                self.calculator.compute_win(&request, jackpots)
            }
            RoundOutcome::NoWinner | RoundOutcome::TimeUp | RoundOutcome::Cancelled => {
                Payout::zero()
            }
        };

        let balance_after = if payout.total > 0.0 {
            self.accounts.credit(player_id, payout.total).await?
        } else {
            self.accounts.balance(player_id).await?
        };

        if let Some(updated) = &payout.updated_jackpots {
            *bank = updated.clone();
        }
        drop(bank);
        for award in &payout.jackpot_awards {
            info!("🎰 {} hit for {:.2} by {}", award.name, award.amount, player_id);
        }

        let seed = round
            .revealed_seed()
            .ok_or_else(|| RoundError::NotFinished(round.state().to_string()))?;

        let mut calls = round.called_numbers().to_vec();
        calls.reverse();

        info!(
            "Round {} settled for {}: bet {:.2}, payout {:.2}",
            round.id(),
            player_id,
            config.bet_amount,
            payout.total
        );

        Ok(RoundResult {
            round_id: round.id().to_string(),
            player_id: player_id.to_string(),
            mode: config.mode,
            speed: config.speed,
            bet_tier: config.bet_tier,
            bet_amount: config.bet_amount,
            card_count: round.cards().len(),
            outcome,
            calls,
            elapsed_seconds: round.elapsed_seconds(),
            payout,
            balance_after,
            commitment: round.commitment(),
            seed,
            settled_at: Utc::now(),
        })
    }

    /// Open, play to the end without timers, and settle
    pub async fn play_instant(
        &self,
        player_id: &str,
        config: RoundConfig,
    ) -> BingoResult<RoundResult> {
        let mut round = self.open_round(player_id, config).await?;
        round.play_out()?;
        self.settle(player_id, &round).await
    }

    /// Bet checks, debit, then jackpot contribution. Nothing changes if any step fails.
    async fn charge(&self, player_id: &str, config: &RoundConfig) -> BingoResult<()> {
        if let Err(e) = config.validate_bet(&self.config.betting) {
            warn!("Rejected bet from {}: {}", player_id, e);
            return Err(BingoError::Bet(e));
        }

        self.accounts.debit(player_id, config.bet_amount).await?;

        if config.mode == GameMode::Progressive {
            let mut bank = self.jackpots.lock().await;
            *bank = self.calculator.contribute(config.bet_amount, &bank);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AccountError;
    use crate::games::account::InMemoryAccounts;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Ledger that is down for every request
    struct OfflineAccounts;

    #[async_trait]
    impl AccountService for OfflineAccounts {
        async fn balance(&self, _player_id: &str) -> Result<f64, AccountError> {
            Err(AccountError::Unavailable("ledger offline".to_string()))
        }

        async fn debit(&self, _player_id: &str, _amount: f64) -> Result<f64, AccountError> {
            Err(AccountError::Unavailable("ledger offline".to_string()))
        }

        async fn credit(&self, _player_id: &str, _amount: f64) -> Result<f64, AccountError> {
            Err(AccountError::Unavailable("ledger offline".to_string()))
        }
    }

    fn processor(config: BingoConfig, balance: f64) -> (GameProcessor, Arc<InMemoryAccounts>) {
        let accounts = Arc::new(InMemoryAccounts::new());
        accounts.deposit("player", balance);
        let processor = GameProcessor::new(config, accounts.clone()).unwrap();
        (processor, accounts)
    }

    #[tokio::test]
    async fn test_play_instant_classic() {
        let (processor, accounts) = processor(BingoConfig::classic(), 100.0);
        let config = processor.round_config(10.0);

        let result = processor.play_instant("player", config).await.unwrap();

        assert!(result.is_win());
        assert_eq!(result.payout.total, 750.0);
        assert_eq!(result.balance_after, 840.0);
        assert_eq!(accounts.balance("player").await.unwrap(), 840.0);
        assert!(RoundSeed::verify_commitment(&result.seed, &result.commitment).unwrap());
    }

    #[tokio::test]
    async fn test_invalid_bet_does_not_debit() {
        let (processor, accounts) = processor(BingoConfig::classic(), 100.0);

        let err = processor
            .open_round("player", processor.round_config(-5.0))
            .await
            .unwrap_err();
        assert!(matches!(err, BingoError::Bet(BetError::NonPositive(_))));
        assert_eq!(accounts.balance("player").await.unwrap(), 100.0);
    }

    #[tokio::test]
    async fn test_insufficient_balance() {
        let (processor, _accounts) = processor(BingoConfig::classic(), 5.0);

        let err = processor
            .open_round("player", processor.round_config(10.0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BingoError::Account(AccountError::InsufficientBalance { .. })
        ));
    }

    #[tokio::test]
    async fn test_settle_requires_finished_round() {
        let (processor, _accounts) = processor(BingoConfig::classic(), 100.0);
        let round = processor
            .open_round("player", processor.round_config(10.0))
            .await
            .unwrap();

        let err = processor.settle("player", &round).await.unwrap_err();
        assert!(matches!(err, BingoError::Round(RoundError::NotFinished(_))));
    }

    #[tokio::test]
    async fn test_cancelled_round_pays_nothing() {
        let (processor, accounts) = processor(BingoConfig::classic(), 100.0);
        let mut round = processor
            .open_round("player", processor.round_config(10.0))
            .await
            .unwrap();
        round.cancel().unwrap();

        let result = processor.settle("player", &round).await.unwrap();
        assert_eq!(result.outcome, RoundOutcome::Cancelled);
        assert_eq!(result.payout.total, 0.0);
        assert_eq!(accounts.balance("player").await.unwrap(), 90.0);
    }

    #[tokio::test]
    async fn test_progressive_contributes_on_open() {
        let (processor, _accounts) = processor(BingoConfig::progressive(), 1_000.0);
        let before = processor.jackpots().await;

        processor
            .open_round("player", processor.round_config(100.0))
            .await
            .unwrap();

        let after = processor.jackpots().await;
        for (old, new) in before.iter().zip(after.iter()) {
            assert_eq!(new.current, old.current + 1.0);
        }
    }

    #[tokio::test]
    async fn test_result_serializes() {
        let (processor, _accounts) = processor(BingoConfig::speed(), 100.0);
        let result = processor
            .play_instant("player", processor.round_config(5.0))
            .await
            .unwrap();

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"kind\":\"winner\""));
        let back: RoundResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.round_id, result.round_id);
        assert_eq!(back.card_count, 3);
    }

    /// Ledger whose first credit fails
    struct FlakyCredit {
        inner: InMemoryAccounts,
        failed: AtomicBool,
    }

    #[async_trait]
    impl AccountService for FlakyCredit {
        async fn balance(&self, player_id: &str) -> Result<f64, AccountError> {
            self.inner.balance(player_id).await
        }

        async fn debit(&self, player_id: &str, amount: f64) -> Result<f64, AccountError> {
            self.inner.debit(player_id, amount).await
        }

        async fn credit(&self, player_id: &str, amount: f64) -> Result<f64, AccountError> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(AccountError::Unavailable("credit timed out".to_string()));
            }
            self.inner.credit(player_id, amount).await
        }
    }

    #[tokio::test]
    async fn test_jackpot_kept_until_credit_lands() {
        let mut config = BingoConfig::progressive();
        config.progressive.jackpots = vec![Jackpot::new("Mini Jackpot", 4_999.0, 5_000.0)];
        let accounts = Arc::new(FlakyCredit {
            inner: InMemoryAccounts::new(),
            failed: AtomicBool::new(false),
        });
        accounts.inner.deposit("player", 1_000.0);
        let processor = GameProcessor::new(config, accounts.clone()).unwrap();

        let mut round = processor
            .open_round("player", processor.round_config(100.0))
            .await
            .unwrap();
        round.play_out().unwrap();

        let err = processor.settle("player", &round).await.unwrap_err();
        assert!(matches!(err, BingoError::Account(AccountError::Unavailable(_))));
        assert_eq!(processor.jackpots().await[0].current, 5_000.0);

        let result = processor.settle("player", &round).await.unwrap();
        assert_eq!(result.payout.total, 20_000.0);
        assert_eq!(accounts.balance("player").await.unwrap(), 20_900.0);
        assert_eq!(processor.jackpots().await[0].current, 0.0);
    }

    #[tokio::test]
    async fn test_round_settles_only_once() {
        let mut config = BingoConfig::progressive();
        config.progressive.jackpots = vec![Jackpot::new("Mini Jackpot", 4_999.0, 5_000.0)];
        let (processor, accounts) = processor(config, 1_000.0);

        let mut round = processor
            .open_round("player", processor.round_config(100.0))
            .await
            .unwrap();
        round.play_out().unwrap();

        let first = processor.settle("player", &round).await.unwrap();
        assert_eq!(first.payout.total, 20_000.0);
        assert!(processor.is_settled(round.id()));

        let err = processor.settle("player", &round).await.unwrap_err();
        assert!(matches!(
            err,
            BingoError::Round(RoundError::AlreadySettled(ref id)) if id == round.id()
        ));
        assert_eq!(accounts.balance("player").await.unwrap(), 20_900.0);
        assert_eq!(processor.jackpots().await[0].current, 0.0);
    }

    #[tokio::test]
    async fn test_unavailable_ledger_leaves_bank_untouched() {
        let processor =
            GameProcessor::new(BingoConfig::progressive(), Arc::new(OfflineAccounts)).unwrap();
        let before = processor.jackpots().await;

        let err = processor
            .open_round("player", processor.round_config(100.0))
            .await
            .unwrap_err();

        assert!(matches!(err, BingoError::Account(AccountError::Unavailable(_))));
        assert_eq!(processor.jackpots().await, before);
    }

    #[tokio::test]
    async fn test_failed_settlement_can_be_retried() {
        let processor =
            GameProcessor::new(BingoConfig::classic(), Arc::new(OfflineAccounts)).unwrap();
        let mut round = Round::new(processor.round_config(10.0), RoundSeed::from_u64(7));
        round.cancel().unwrap();

        for _ in 0..2 {
            let err = processor.settle("player", &round).await.unwrap_err();
            assert!(matches!(err, BingoError::Account(AccountError::Unavailable(_))));
        }
        assert!(!processor.is_settled(round.id()));
    }
}
