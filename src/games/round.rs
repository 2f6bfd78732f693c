//! Explicit round state
//!
//! A `Round` owns its cards, its number pool and the seed both were drawn from.
//! It is driven step by step (`call_next`, `tick_second`, `mark_cell`,
//! `claim_win`) either by the timed sequencer actor or synchronously by
//! `Round::play_out` for instant play.

use crate::config::{BettingConfig, BingoConfig};
use crate::errors::{BetError, RoundError};
use crate::games::card::{Card, CardGenerator};
use crate::games::fairness::RoundSeed;
use crate::games::number_pool::NumberPool;
use crate::games::payout::PayoutMultiplier;
use crate::games::types::{BetTier, BingoCall, GameMode, RoundOutcome, RoundState, SpeedTier};
use crate::games::win_detector::{Evaluation, WinDetector};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Parameters fixed when a round is opened
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundConfig {
    pub mode: GameMode,
    pub bet_amount: f64,
    pub speed: SpeedTier,
    pub bet_tier: BetTier,
    pub card_count: usize,
    pub auto_daub: bool,
    pub auto_detect_wins: bool,
    /// Initial call mode for a timed round; `Round::set_auto_call` switches it later
    pub auto_call: bool,
    pub countdown_seconds: u32,
    pub time_limit_seconds: Option<u32>,
}

impl RoundConfig {
    /// Round parameters from the engine defaults and a bet
    pub fn from_config(config: &BingoConfig, bet_amount: f64) -> Self {
        let defaults = &config.round;
        Self {
            mode: defaults.mode,
            bet_amount,
            speed: defaults.speed,
            bet_tier: defaults.bet_tier,
            card_count: defaults
                .card_count
                .unwrap_or_else(|| defaults.bet_tier.card_count()),
            auto_daub: defaults.auto_daub,
            auto_detect_wins: defaults.auto_detect_wins,
            auto_call: defaults.auto_call,
            countdown_seconds: defaults.countdown_seconds,
            time_limit_seconds: defaults.time_limit_seconds,
        }
    }

    pub fn multiplier(&self) -> PayoutMultiplier {
        PayoutMultiplier::for_mode(self.mode, self.speed, self.bet_tier)
    }

    pub fn call_interval(&self) -> Duration {
        self.speed.interval()
    }

    /// Refuse bets that must never reach the account service
    pub fn validate_bet(&self, betting: &BettingConfig) -> Result<(), BetError> {
        if !self.bet_amount.is_finite() || self.bet_amount <= 0.0 {
            return Err(BetError::NonPositive(self.bet_amount));
        }

        if self.bet_amount < betting.min_bet {
            return Err(BetError::BelowMinimum {
                amount: self.bet_amount,
                minimum: betting.min_bet,
            });
        }

        if self.mode == GameMode::Progressive
            && betting.enforce_tier_minimum
            && self.bet_amount < self.bet_tier.min_bet()
        {
            return Err(BetError::BelowMinimum {
                amount: self.bet_amount,
                minimum: self.bet_tier.min_bet(),
            });
        }

        if self.card_count == 0 || self.card_count > betting.max_cards {
            return Err(BetError::InvalidCardCount(self.card_count));
        }

        Ok(())
    }
}

/// What a single call did
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    Called(CallRecord),
    /// Every number has been drawn; the round finished with no winner
    Exhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub call: BingoCall,
    /// 1-based position in the call order
    pub sequence: usize,
    /// `(card, row, col)` of every cell that matched
    pub hits: Vec<(usize, usize, usize)>,
    /// Set when this call finished the round with a winner
    pub winner: Option<usize>,
}

/// Serializable view of a round for UI consumers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundSnapshot {
    pub round_id: String,
    pub state: RoundState,
    pub paused: bool,
    pub auto_call: bool,
    pub current_number: Option<u8>,
    pub called_numbers: Vec<u8>,
    pub elapsed_seconds: u32,
    pub cards: Vec<Card>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RoundOutcome>,
}

#[derive(Debug)]
pub struct Round {
    id: String,
    config: RoundConfig,
    state: RoundState,
    paused: bool,
    auto_call: bool,
    cards: Vec<Card>,
    pool: NumberPool,
    call_rng: StdRng,
    seed: RoundSeed,
    current_number: Option<u8>,
    called_numbers: Vec<u8>,
    elapsed_seconds: u32,
    outcome: Option<RoundOutcome>,
    detector: WinDetector,
}

impl Round {
    /// Waiting round whose cards are drawn from the seed
    pub fn new(config: RoundConfig, seed: RoundSeed) -> Self {
        let cards = CardGenerator.generate_many(&mut seed.card_rng(), config.card_count);
        Self::with_cards(config, cards, seed)
    }

    /// Waiting round with pre-built cards
    pub fn with_cards(config: RoundConfig, cards: Vec<Card>, seed: RoundSeed) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            call_rng: seed.call_rng(),
            auto_call: config.auto_call,
            config,
            state: RoundState::Waiting,
            paused: false,
            cards,
            pool: NumberPool::new(),
            seed,
            current_number: None,
            called_numbers: Vec::new(),
            elapsed_seconds: 0,
            outcome: None,
            detector: WinDetector,
        }
    }

    pub fn start(&mut self) -> Result<(), RoundError> {
        match self.state {
            RoundState::Waiting => {
                self.pool.reset();
                self.state = RoundState::Playing;
                info!(
                    "Round {} started: {} mode, {} card(s), commitment {}",
                    self.id,
                    self.config.mode,
                    self.cards.len(),
                    self.seed.commitment()
                );
                Ok(())
            }
            RoundState::Playing => Ok(()),
            RoundState::Finished => Err(RoundError::AlreadyFinished),
        }
    }

    /// Draw the next number and apply it to every card
    pub fn call_next(&mut self) -> Result<CallResult, RoundError> {
        self.ensure_active()?;

        let number = match self.pool.draw(&mut self.call_rng) {
            Ok(number) => number,
            Err(RoundError::ExhaustedPool) => {
                warn!("Round {} exhausted the pool with no winner", self.id);
                self.finish(RoundOutcome::NoWinner);
                return Ok(CallResult::Exhausted);
            }
            Err(e) => return Err(e),
        };

        let call = BingoCall::new(number).ok_or_else(|| {
            RoundError::InvalidCard(format!("drawn number {} out of range", number))
        })?;
        self.current_number = Some(number);
        self.called_numbers.insert(0, number);

        let auto_daub = self.config.auto_daub;
        let hits: Vec<(usize, usize, usize)> = self
            .cards
            .iter_mut()
            .enumerate()
            .filter_map(|(index, card)| {
                card.apply_call(number, auto_daub)
                    .map(|(row, col)| (index, row, col))
            })
            .collect();

        debug!(
            "Round {} call #{}: {} ({} hit(s))",
            self.id,
            self.called_numbers.len(),
            call.full_call,
            hits.len()
        );

        let mut winner = None;
        if self.config.auto_detect_wins {
            let complete = self.detector.complete_cards(&self.cards);
            if let Some((&first, rest)) = complete.split_first() {
                self.finish_with_winner(first, rest.to_vec());
                winner = Some(first);
            }
        }

        Ok(CallResult::Called(CallRecord {
            call,
            sequence: self.called_numbers.len(),
            hits,
            winner,
        }))
    }

    /// Advance the round clock by one second. Returns true if the time limit ended the round.
    pub fn tick_second(&mut self) -> bool {
        if self.state != RoundState::Playing || self.paused {
            return false;
        }

        self.elapsed_seconds += 1;

        match self.config.time_limit_seconds {
            Some(limit) if self.elapsed_seconds >= limit => {
                info!("Round {} hit its {}s time limit", self.id, limit);
                self.finish(RoundOutcome::TimeUp);
                true
            }
            _ => false,
        }
    }

    /// Toggle the player's dab; returns the new marked state
    pub fn mark_cell(&mut self, card: usize, row: usize, col: usize) -> Result<bool, RoundError> {
        self.ensure_active()?;
        self.cards
            .get_mut(card)
            .ok_or(RoundError::UnknownCard(card))?
            .toggle_mark(row, col)
            .ok_or(RoundError::InvalidCell { card, row, col })
    }

    pub fn pause(&mut self) -> Result<(), RoundError> {
        self.ensure_active()?;
        self.paused = true;
        debug!("Round {} paused", self.id);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), RoundError> {
        if self.state != RoundState::Playing {
            return Err(RoundError::NotPlaying(self.state.to_string()));
        }
        if !self.paused {
            return Err(RoundError::NotPaused);
        }
        self.paused = false;
        debug!("Round {} resumed", self.id);
        Ok(())
    }

    /// Switch between timed calls and calls made on request
    pub fn set_auto_call(&mut self, enabled: bool) -> Result<(), RoundError> {
        if self.state == RoundState::Finished {
            return Err(RoundError::AlreadyFinished);
        }
        if self.auto_call != enabled {
            self.auto_call = enabled;
            debug!("Round {} auto-call {}", self.id, if enabled { "on" } else { "off" });
        }
        Ok(())
    }

    /// Player claim; a card without a complete line is refused and nothing changes
    pub fn claim_win(&mut self, card: usize) -> Result<Evaluation, RoundError> {
        self.ensure_active()?;
        let evaluation = self
            .cards
            .get(card)
            .map(|c| self.detector.evaluate(c))
            .ok_or(RoundError::UnknownCard(card))?;

        if !evaluation.complete {
            warn!("Round {} rejected claim on card {}", self.id, card);
            return Err(RoundError::FalseClaim(card));
        }

        let also_complete = self
            .detector
            .complete_cards(&self.cards)
            .into_iter()
            .filter(|&index| index != card)
            .collect();
        self.finish_with_winner(card, also_complete);
        Ok(evaluation)
    }

    pub fn cancel(&mut self) -> Result<(), RoundError> {
        if self.state == RoundState::Finished {
            return Err(RoundError::AlreadyFinished);
        }
        self.finish(RoundOutcome::Cancelled);
        Ok(())
    }

    /// Run the round to its end without timers.
    ///
    /// The clock advances by the call interval before every call, so elapsed
    /// time matches what the timed sequencer would report.
    pub fn play_out(&mut self) -> Result<(), RoundError> {
        self.start()?;
        if self.paused {
            self.resume()?;
        }

        let seconds_per_call = (self.config.speed.interval_ms() / 1000).max(1);
        while self.state == RoundState::Playing {
            for _ in 0..seconds_per_call {
                if self.tick_second() {
                    return Ok(());
                }
            }
            self.call_next()?;
        }
        Ok(())
    }

    pub fn evaluate_card(&self, card: usize) -> Option<Evaluation> {
        self.cards.get(card).map(|c| self.detector.evaluate(c))
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            round_id: self.id.clone(),
            state: self.state,
            paused: self.paused,
            auto_call: self.auto_call,
            current_number: self.current_number,
            called_numbers: self.called_numbers.clone(),
            elapsed_seconds: self.elapsed_seconds,
            cards: self.cards.clone(),
            outcome: self.outcome.clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the timed sequencer calls numbers on its own
    pub fn auto_call(&self) -> bool {
        self.auto_call
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn pool(&self) -> &NumberPool {
        &self.pool
    }

    pub fn current_number(&self) -> Option<u8> {
        self.current_number
    }

    /// Most recent first
    pub fn called_numbers(&self) -> &[u8] {
        &self.called_numbers
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    pub fn outcome(&self) -> Option<&RoundOutcome> {
        self.outcome.as_ref()
    }

    pub fn commitment(&self) -> String {
        self.seed.commitment()
    }

    /// Seed hex, available once the round has finished
    pub fn revealed_seed(&self) -> Option<String> {
        (self.state == RoundState::Finished).then(|| self.seed.to_hex())
    }

    fn ensure_active(&self) -> Result<(), RoundError> {
        match self.state {
            RoundState::Playing if self.paused => Err(RoundError::Paused),
            RoundState::Playing => Ok(()),
            RoundState::Finished => Err(RoundError::AlreadyFinished),
            RoundState::Waiting => Err(RoundError::NotPlaying(self.state.to_string())),
        }
    }

    fn finish_with_winner(&mut self, card_index: usize, also_complete: Vec<usize>) {
        let lines = self
            .evaluate_card(card_index)
            .map(|e| e.labels())
            .unwrap_or_default();
        let card_id = self
            .cards
            .get(card_index)
            .map(|c| c.id.clone())
            .unwrap_or_default();

        self.finish(RoundOutcome::Winner {
            card_index,
            card_id,
            lines,
            also_complete,
            elapsed_seconds: self.elapsed_seconds,
        });
    }

    fn finish(&mut self, outcome: RoundOutcome) {
        self.state = RoundState::Finished;
        self.paused = false;
        info!(
            "Round {} finished after {} call(s) in {}s: {:?}",
            self.id,
            self.called_numbers.len(),
            self.elapsed_seconds,
            outcome
        );
        self.outcome = Some(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::MAX_NUMBER;

    fn classic_config(bet: f64) -> RoundConfig {
        RoundConfig::from_config(&BingoConfig::classic(), bet)
    }

    fn manual_config(bet: f64) -> RoundConfig {
        RoundConfig {
            auto_detect_wins: false,
            ..classic_config(bet)
        }
    }

    #[test]
    fn test_config_from_presets() {
        let classic = classic_config(10.0);
        assert_eq!(classic.card_count, 1);
        assert_eq!(classic.multiplier(), PayoutMultiplier::BetLevel(BetTier::Bronze));

        let speed = RoundConfig::from_config(&BingoConfig::speed(), 10.0);
        assert_eq!(speed.card_count, 3);
        assert_eq!(speed.countdown_seconds, 3);
        assert_eq!(speed.call_interval(), Duration::from_millis(2000));

        let progressive = RoundConfig::from_config(&BingoConfig::progressive(), 10.0);
        assert_eq!(progressive.card_count, 2);
    }

    #[test]
    fn test_bet_validation() {
        let betting = BettingConfig::default();

        assert_eq!(classic_config(0.0).validate_bet(&betting), Err(BetError::NonPositive(0.0)));
        assert!(matches!(
            classic_config(f64::NAN).validate_bet(&betting),
            Err(BetError::NonPositive(_))
        ));
        assert_eq!(
            classic_config(0.5).validate_bet(&betting),
            Err(BetError::BelowMinimum { amount: 0.5, minimum: 1.0 })
        );

        let progressive = RoundConfig::from_config(&BingoConfig::progressive(), 5.0);
        assert_eq!(
            progressive.validate_bet(&betting),
            Err(BetError::BelowMinimum { amount: 5.0, minimum: 10.0 })
        );

        let too_many = RoundConfig {
            card_count: 5,
            ..classic_config(10.0)
        };
        assert_eq!(too_many.validate_bet(&betting), Err(BetError::InvalidCardCount(5)));

        assert!(classic_config(10.0).validate_bet(&betting).is_ok());
    }

    #[test]
    fn test_calls_require_playing_state() {
        let mut round = Round::new(classic_config(10.0), RoundSeed::from_u64(1));
        assert_eq!(round.state(), RoundState::Waiting);
        assert!(matches!(round.call_next(), Err(RoundError::NotPlaying(_))));

        round.start().unwrap();
        assert!(matches!(round.call_next(), Ok(CallResult::Called(_))));
    }

    #[test]
    fn test_called_numbers_most_recent_first() {
        let mut round = Round::new(manual_config(10.0), RoundSeed::from_u64(2));
        round.start().unwrap();

        let mut order = Vec::new();
        for _ in 0..5 {
            if let CallResult::Called(record) = round.call_next().unwrap() {
                order.push(record.call.number);
            }
        }

        order.reverse();
        assert_eq!(round.called_numbers(), order.as_slice());
        assert_eq!(round.current_number(), Some(order[0]));
    }

    #[test]
    fn test_call_marks_matching_cells() {
        let mut round = Round::new(classic_config(10.0), RoundSeed::from_u64(3));
        round.start().unwrap();

        while round.state() == RoundState::Playing {
            if let CallResult::Called(record) = round.call_next().unwrap() {
                for (card, row, col) in record.hits {
                    let cell = round.cards()[card].cell(row, col).unwrap();
                    assert!(cell.called);
                    assert!(cell.marked, "auto-daub should mark");
                }
            }
        }
        assert!(round.outcome().unwrap().is_win());
    }

    #[test]
    fn test_same_seed_replays_round() {
        let mut first = Round::new(classic_config(10.0), RoundSeed::from_u64(4));
        let mut second = Round::new(classic_config(10.0), RoundSeed::from_u64(4));
        first.play_out().unwrap();
        second.play_out().unwrap();

        assert_eq!(first.cards()[0].rows(), second.cards()[0].rows());
        assert_eq!(first.called_numbers(), second.called_numbers());
        assert_eq!(first.outcome(), second.outcome());
    }

    #[test]
    fn test_auto_detect_finishes_on_first_line() {
        let mut round = Round::new(classic_config(10.0), RoundSeed::from_u64(5));
        round.play_out().unwrap();

        assert_eq!(round.state(), RoundState::Finished);
        match round.outcome() {
            Some(RoundOutcome::Winner { card_index, lines, .. }) => {
                assert_eq!(*card_index, 0);
                assert!(!lines.is_empty());
            }
            other => panic!("expected winner, got {:?}", other),
        }
        // A round ending on a line never needs the whole pool
        assert!(round.called_numbers().len() < MAX_NUMBER as usize);
    }

    #[test]
    fn test_exhaustion_without_claim_is_no_winner() {
        let mut round = Round::new(manual_config(10.0), RoundSeed::from_u64(6));
        round.start().unwrap();

        for _ in 0..MAX_NUMBER {
            assert!(matches!(round.call_next().unwrap(), CallResult::Called(_)));
        }
        assert_eq!(round.call_next().unwrap(), CallResult::Exhausted);
        assert_eq!(round.state(), RoundState::Finished);
        assert_eq!(round.outcome(), Some(&RoundOutcome::NoWinner));
        assert!(round.pool().is_exhausted());
    }

    #[test]
    fn test_false_claim_changes_nothing() {
        let mut round = Round::new(manual_config(10.0), RoundSeed::from_u64(7));
        round.start().unwrap();
        round.call_next().unwrap();

        assert_eq!(round.claim_win(0), Err(RoundError::FalseClaim(0)));
        assert_eq!(round.state(), RoundState::Playing);
        assert!(round.outcome().is_none());
        assert_eq!(round.claim_win(3), Err(RoundError::UnknownCard(3)));
    }

    #[test]
    fn test_valid_claim_wins() {
        let mut round = Round::new(manual_config(10.0), RoundSeed::from_u64(8));
        round.start().unwrap();

        while !round.evaluate_card(0).unwrap().complete {
            round.call_next().unwrap();
        }
        // Manual rounds keep calling until a claim arrives
        assert_eq!(round.state(), RoundState::Playing);

        let evaluation = round.claim_win(0).unwrap();
        assert!(evaluation.complete);
        assert!(round.outcome().unwrap().is_win());
    }

    #[test]
    fn test_pause_blocks_calls_and_clock() {
        let mut round = Round::new(classic_config(10.0), RoundSeed::from_u64(9));
        round.start().unwrap();
        round.tick_second();
        round.pause().unwrap();

        assert_eq!(round.call_next(), Err(RoundError::Paused));
        assert!(!round.tick_second());
        assert_eq!(round.elapsed_seconds(), 1);

        round.resume().unwrap();
        assert_eq!(round.resume(), Err(RoundError::NotPaused));
        round.tick_second();
        assert_eq!(round.elapsed_seconds(), 2);
    }

    #[test]
    fn test_time_limit() {
        let config = RoundConfig {
            time_limit_seconds: Some(3),
            ..manual_config(10.0)
        };
        let mut round = Round::new(config, RoundSeed::from_u64(10));
        round.start().unwrap();

        assert!(!round.tick_second());
        assert!(!round.tick_second());
        assert!(round.tick_second());
        assert_eq!(round.outcome(), Some(&RoundOutcome::TimeUp));
    }

    #[test]
    fn test_mark_cell_and_cancel() {
        let config = RoundConfig {
            auto_daub: false,
            ..manual_config(10.0)
        };
        let mut round = Round::new(config, RoundSeed::from_u64(11));
        round.start().unwrap();

        assert_eq!(round.mark_cell(0, 0, 0), Ok(true));
        assert_eq!(round.mark_cell(0, 0, 0), Ok(false));
        assert_eq!(round.mark_cell(0, 2, 2), Ok(true));
        assert_eq!(
            round.mark_cell(0, 7, 0),
            Err(RoundError::InvalidCell { card: 0, row: 7, col: 0 })
        );

        round.cancel().unwrap();
        assert_eq!(round.outcome(), Some(&RoundOutcome::Cancelled));
        assert_eq!(round.cancel(), Err(RoundError::AlreadyFinished));
        assert!(round.revealed_seed().is_some());
    }

    #[test]
    fn test_play_out_elapsed_follows_interval() {
        let mut round = Round::new(classic_config(10.0), RoundSeed::from_u64(12));
        round.play_out().unwrap();

        let calls = round.called_numbers().len() as u32;
        assert_eq!(round.elapsed_seconds(), calls * 2);
    }

    #[test]
    fn test_auto_call_toggle() {
        let config = RoundConfig::from_config(&BingoConfig::progressive(), 10.0);
        assert!(!config.auto_call);

        let mut round = Round::new(config, RoundSeed::from_u64(13));
        assert!(!round.auto_call());
        round.set_auto_call(true).unwrap();
        assert!(round.snapshot().auto_call);

        // Instant play does not wait for requests
        round.set_auto_call(false).unwrap();
        round.play_out().unwrap();
        assert!(matches!(round.outcome(), Some(RoundOutcome::Winner { .. })));
        assert_eq!(round.set_auto_call(true), Err(RoundError::AlreadyFinished));
    }
}
