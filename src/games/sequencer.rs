//! Timed call sequencer
//!
//! Each round runs in its own tokio task. The task owns the `Round`, ticks a
//! call timer at the speed tier's interval and a one-second clock, and serves
//! player commands over an mpsc channel. Everything that happens is published
//! on a broadcast channel as a `RoundEvent`.
//!
//! With auto-call off the call timer is idle and numbers are only drawn on a
//! `SequencerHandle::call_next` request. The clock keeps running either way.

use crate::errors::RoundError;
use crate::games::announcer::{CallAnnouncer, NoopAnnouncer};
use crate::games::round::{CallResult, Round, RoundSnapshot};
use crate::games::types::{BingoCall, RoundOutcome, RoundState};
use crate::games::win_detector::Evaluation;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;
const COMMAND_CAPACITY: usize = 32;

/// Everything a UI needs to follow a live round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundEvent {
    Countdown {
        round_id: String,
        seconds_left: u32,
    },
    Started {
        round_id: String,
        commitment: String,
        card_count: usize,
    },
    NumberCalled {
        round_id: String,
        call: BingoCall,
        sequence: usize,
        /// `(card, row, col)` of each matching cell
        hits: Vec<(usize, usize, usize)>,
    },
    Clock {
        round_id: String,
        elapsed_seconds: u32,
    },
    CellMarked {
        round_id: String,
        card: usize,
        row: usize,
        col: usize,
        marked: bool,
    },
    Paused {
        round_id: String,
    },
    Resumed {
        round_id: String,
    },
    AutoCallChanged {
        round_id: String,
        enabled: bool,
    },
    Finished {
        round_id: String,
        outcome: RoundOutcome,
        calls: usize,
        elapsed_seconds: u32,
    },
}

enum RoundCommand {
    Pause(oneshot::Sender<Result<(), RoundError>>),
    Resume(oneshot::Sender<Result<(), RoundError>>),
    Mark {
        card: usize,
        row: usize,
        col: usize,
        reply: oneshot::Sender<Result<bool, RoundError>>,
    },
    Claim {
        card: usize,
        reply: oneshot::Sender<Result<Evaluation, RoundError>>,
    },
    CallNext(oneshot::Sender<Result<CallResult, RoundError>>),
    SetAutoCall {
        enabled: bool,
        reply: oneshot::Sender<Result<(), RoundError>>,
    },
    Cancel(oneshot::Sender<Result<(), RoundError>>),
    Snapshot(oneshot::Sender<RoundSnapshot>),
}

/// Builds the round actor; subscribe before `start` to see every event
pub struct CallSequencer {
    round: Round,
    announcer: Arc<dyn CallAnnouncer>,
    events: broadcast::Sender<RoundEvent>,
}

impl CallSequencer {
    pub fn new(round: Round) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            round,
            announcer: Arc::new(NoopAnnouncer),
            events,
        }
    }

    pub fn with_announcer(mut self, announcer: Arc<dyn CallAnnouncer>) -> Self {
        self.announcer = announcer;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.events.subscribe()
    }

    /// Spawn the round task. Calls are made every `round.config().call_interval()`.
    pub fn start(self) -> SequencerHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let round_id = self.round.id().to_string();
        let commitment = self.round.commitment();
        let events = self.events.clone();

        let actor = RoundActor {
            interval: self.round.config().call_interval(),
            round: self.round,
            announcer: self.announcer,
            events: self.events,
            commands: command_rx,
        };
        let task = tokio::spawn(actor.run());

        SequencerHandle {
            round_id,
            commitment,
            commands: command_tx,
            events,
            task,
        }
    }
}

/// Control surface for a running round
pub struct SequencerHandle {
    round_id: String,
    commitment: String,
    commands: mpsc::Sender<RoundCommand>,
    events: broadcast::Sender<RoundEvent>,
    task: JoinHandle<Round>,
}

impl SequencerHandle {
    pub fn round_id(&self) -> &str {
        &self.round_id
    }

    pub fn commitment(&self) -> &str {
        &self.commitment
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.events.subscribe()
    }

    pub async fn pause(&self) -> Result<(), RoundError> {
        self.request(RoundCommand::Pause).await?
    }

    pub async fn resume(&self) -> Result<(), RoundError> {
        self.request(RoundCommand::Resume).await?
    }

    /// Draw the next number now, whether or not auto-call is on
    pub async fn call_next(&self) -> Result<CallResult, RoundError> {
        self.request(RoundCommand::CallNext).await?
    }

    pub async fn set_auto_call(&self, enabled: bool) -> Result<(), RoundError> {
        self.request(|reply| RoundCommand::SetAutoCall { enabled, reply }).await?
    }

    pub async fn mark_cell(
        &self,
        card: usize,
        row: usize,
        col: usize,
    ) -> Result<bool, RoundError> {
        self.request(|reply| RoundCommand::Mark {
            card,
            row,
            col,
            reply,
        })
        .await?
    }

    pub async fn claim_win(&self, card: usize) -> Result<Evaluation, RoundError> {
        self.request(|reply| RoundCommand::Claim { card, reply }).await?
    }

    pub async fn cancel(&self) -> Result<(), RoundError> {
        self.request(RoundCommand::Cancel).await?
    }

    pub async fn snapshot(&self) -> Result<RoundSnapshot, RoundError> {
        self.request(RoundCommand::Snapshot).await
    }

    /// Wait for the round to finish and take it back
    pub async fn join(self) -> Result<Round, RoundError> {
        drop(self.commands);
        self.task.await.map_err(|e| {
            warn!("Round {} task failed: {}", self.round_id, e);
            RoundError::ActorStopped
        })
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoundCommand,
    ) -> Result<T, RoundError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| RoundError::ActorStopped)?;
        response.await.map_err(|_| RoundError::ActorStopped)
    }
}

struct RoundActor {
    round: Round,
    interval: Duration,
    announcer: Arc<dyn CallAnnouncer>,
    events: broadcast::Sender<RoundEvent>,
    commands: mpsc::Receiver<RoundCommand>,
}

impl RoundActor {
    async fn run(mut self) -> Round {
        let mut commands_open = true;

        for seconds_left in (1..=self.round.config().countdown_seconds).rev() {
            self.publish(RoundEvent::Countdown {
                round_id: self.round.id().to_string(),
                seconds_left,
            });

            let wait = sleep(Duration::from_secs(1));
            tokio::pin!(wait);
            loop {
                tokio::select! {
                    _ = &mut wait => break,
                    command = self.commands.recv(), if commands_open => match command {
                        Some(command) => self.handle(command),
                        None => commands_open = false,
                    },
                }
            }
            if self.round.state() == RoundState::Finished {
                return self.finish();
            }
        }

        if let Err(e) = self.round.start() {
            warn!("Round {} could not start: {}", self.round.id(), e);
            return self.finish();
        }
        self.publish(RoundEvent::Started {
            round_id: self.round.id().to_string(),
            commitment: self.round.commitment(),
            card_count: self.round.cards().len(),
        });

        let one_second = Duration::from_secs(1);
        let mut calls = interval_at(Instant::now() + self.interval, self.interval);
        let mut clock = interval_at(Instant::now() + one_second, one_second);
        calls.set_missed_tick_behavior(MissedTickBehavior::Delay);
        clock.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.round.state() == RoundState::Playing {
            let was_paused = self.round.is_paused();
            let was_auto = self.round.auto_call();

            tokio::select! {
                biased;
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => self.handle(command),
                    None => commands_open = false,
                },
                _ = clock.tick(), if !was_paused => self.tick_clock(),
                _ = calls.tick(), if !was_paused && was_auto => {
                    if let Err(e) = self.call_next() {
                        debug!("Round {} skipped call: {}", self.round.id(), e);
                    }
                }
                else => {
                    // Paused with nobody left to resume
                    let _ = self.round.cancel();
                }
            }

            let resumed = was_paused && !self.round.is_paused();
            if resumed {
                clock.reset();
            }
            if resumed || (!was_auto && self.round.auto_call()) {
                calls.reset();
            }

            if !commands_open
                && !self.round.auto_call()
                && self.round.state() == RoundState::Playing
            {
                warn!("Round {} has no caller left; cancelling", self.round.id());
                let _ = self.round.cancel();
            }
        }

        self.finish()
    }

    fn call_next(&mut self) -> Result<CallResult, RoundError> {
        let result = self.round.call_next()?;
        if let CallResult::Called(record) = &result {
            self.announcer.announce(self.round.id(), &record.call);
            self.publish(RoundEvent::NumberCalled {
                round_id: self.round.id().to_string(),
                call: record.call.clone(),
                sequence: record.sequence,
                hits: record.hits.clone(),
            });
        }
        Ok(result)
    }

    fn tick_clock(&mut self) {
        self.round.tick_second();
        self.publish(RoundEvent::Clock {
            round_id: self.round.id().to_string(),
            elapsed_seconds: self.round.elapsed_seconds(),
        });
    }

    fn handle(&mut self, command: RoundCommand) {
        let round_id = self.round.id().to_string();
        match command {
            RoundCommand::Pause(reply) => {
                let result = self.round.pause();
                if result.is_ok() {
                    self.publish(RoundEvent::Paused { round_id });
                }
                let _ = reply.send(result);
            }
            RoundCommand::Resume(reply) => {
                let result = self.round.resume();
                if result.is_ok() {
                    self.publish(RoundEvent::Resumed { round_id });
                }
                let _ = reply.send(result);
            }
            RoundCommand::Mark {
                card,
                row,
                col,
                reply,
            } => {
                let result = self.round.mark_cell(card, row, col);
                if let Ok(marked) = result {
                    self.publish(RoundEvent::CellMarked {
                        round_id,
                        card,
                        row,
                        col,
                        marked,
                    });
                }
                let _ = reply.send(result);
            }
            RoundCommand::CallNext(reply) => {
                let _ = reply.send(self.call_next());
            }
            RoundCommand::SetAutoCall { enabled, reply } => {
                let changed = self.round.auto_call() != enabled;
                let result = self.round.set_auto_call(enabled);
                if result.is_ok() && changed {
                    self.publish(RoundEvent::AutoCallChanged { round_id, enabled });
                }
                let _ = reply.send(result);
            }
            RoundCommand::Claim { card, reply } => {
                let _ = reply.send(self.round.claim_win(card));
            }
            RoundCommand::Cancel(reply) => {
                let _ = reply.send(self.round.cancel());
            }
            RoundCommand::Snapshot(reply) => {
                let _ = reply.send(self.round.snapshot());
            }
        }
    }

    fn finish(self) -> Round {
        if let Some(outcome) = self.round.outcome() {
            info!(
                "Round {} sequencer stopped after {} call(s)",
                self.round.id(),
                self.round.called_numbers().len()
            );
            self.publish(RoundEvent::Finished {
                round_id: self.round.id().to_string(),
                outcome: outcome.clone(),
                calls: self.round.called_numbers().len(),
                elapsed_seconds: self.round.elapsed_seconds(),
            });
        }
        self.round
    }

    fn publish(&self, event: RoundEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BingoConfig;
    use crate::games::fairness::RoundSeed;
    use crate::games::round::RoundConfig;

    fn round(config: &BingoConfig, seed: u64) -> Round {
        Round::new(RoundConfig::from_config(config, 10.0), RoundSeed::from_u64(seed))
    }

    fn manual_round(seed: u64) -> Round {
        let mut config = BingoConfig::classic();
        config.round.auto_detect_wins = false;
        round(&config, seed)
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_runs_to_winner() {
        let sequencer = CallSequencer::new(round(&BingoConfig::classic(), 1));
        let mut events = sequencer.subscribe();
        let handle = sequencer.start();

        let round = handle.join().await.unwrap();
        assert_eq!(round.state(), RoundState::Finished);
        assert!(round.outcome().unwrap().is_win());

        let calls = round.called_numbers().len() as u32;
        assert!(round.elapsed_seconds() >= calls * 2 - 1);
        assert!(round.elapsed_seconds() <= calls * 2);

        let mut called = 0;
        let mut finished = false;
        while let Ok(event) = events.try_recv() {
            match event {
                RoundEvent::NumberCalled { .. } => called += 1,
                RoundEvent::Finished { outcome, .. } => {
                    assert!(outcome.is_win());
                    finished = true;
                }
                _ => {}
            }
        }
        assert_eq!(called, calls);
        assert!(finished);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_precedes_start() {
        let sequencer = CallSequencer::new(round(&BingoConfig::speed(), 2));
        let mut events = sequencer.subscribe();
        let handle = sequencer.start();

        let mut countdown = Vec::new();
        loop {
            match events.recv().await.unwrap() {
                RoundEvent::Countdown { seconds_left, .. } => countdown.push(seconds_left),
                RoundEvent::Started {
                    commitment,
                    card_count,
                    ..
                } => {
                    assert_eq!(commitment, handle.commitment());
                    assert_eq!(card_count, 3);
                    break;
                }
                other => panic!("unexpected event before start: {:?}", other),
            }
        }
        assert_eq!(countdown, vec![3, 2, 1]);

        handle.cancel().await.unwrap();
        let round = handle.join().await.unwrap();
        assert_eq!(round.outcome(), Some(&RoundOutcome::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_calls() {
        let sequencer = CallSequencer::new(manual_round(3));
        let mut events = sequencer.subscribe();
        let handle = sequencer.start();

        loop {
            if let RoundEvent::NumberCalled { .. } = events.recv().await.unwrap() {
                break;
            }
        }
        handle.pause().await.unwrap();
        let before = handle.snapshot().await.unwrap();
        assert!(before.paused);

        sleep(Duration::from_secs(30)).await;
        let after = handle.snapshot().await.unwrap();
        assert_eq!(before.called_numbers, after.called_numbers);
        assert_eq!(before.elapsed_seconds, after.elapsed_seconds);
        assert_eq!(handle.mark_cell(0, 0, 0).await, Err(RoundError::Paused));

        handle.resume().await.unwrap();
        sleep(Duration::from_secs(5)).await;
        let resumed = handle.snapshot().await.unwrap();
        assert!(resumed.called_numbers.len() > after.called_numbers.len());

        handle.cancel().await.unwrap();
        handle.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_claim_through_handle() {
        let sequencer = CallSequencer::new(manual_round(4));
        let mut events = sequencer.subscribe();
        let handle = sequencer.start();

        let mut false_claims = 0;
        loop {
            if let RoundEvent::NumberCalled { .. } = events.recv().await.unwrap() {
                match handle.claim_win(0).await {
                    Ok(evaluation) => {
                        assert!(evaluation.complete);
                        break;
                    }
                    Err(RoundError::FalseClaim(0)) => false_claims += 1,
                    Err(e) => panic!("unexpected claim error: {}", e),
                }
            }
        }
        assert!(false_claims > 0);

        let round = handle.join().await.unwrap();
        assert!(round.outcome().unwrap().is_win());
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_after_finish_fail() {
        let handle = CallSequencer::new(round(&BingoConfig::classic(), 5)).start();
        handle.cancel().await.unwrap();

        sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.pause().await, Err(RoundError::ActorStopped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_calls_wait_for_requests() {
        let sequencer = CallSequencer::new(round(&BingoConfig::progressive(), 6));
        let mut events = sequencer.subscribe();
        let handle = sequencer.start();

        sleep(Duration::from_secs(30)).await;
        let idle = handle.snapshot().await.unwrap();
        assert!(!idle.auto_call);
        assert_eq!(idle.state, RoundState::Playing);
        assert!(idle.called_numbers.is_empty());

        match handle.call_next().await.unwrap() {
            CallResult::Called(record) => assert_eq!(record.sequence, 1),
            CallResult::Exhausted => panic!("pool cannot be empty after one call"),
        }
        sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.snapshot().await.unwrap().called_numbers.len(), 1);

        // Medium speed: timed calls resume two seconds after the switch
        handle.set_auto_call(true).await.unwrap();
        sleep(Duration::from_secs(5)).await;
        let timed = handle.snapshot().await.unwrap();
        assert!(timed.auto_call);
        assert_eq!(timed.called_numbers.len(), 3);

        handle.cancel().await.unwrap();
        handle.join().await.unwrap();

        let mut called = 0;
        let mut switched = Vec::new();
        while let Ok(event) = events.try_recv() {
            match event {
                RoundEvent::NumberCalled { .. } => called += 1,
                RoundEvent::AutoCallChanged { enabled, .. } => switched.push(enabled),
                _ => {}
            }
        }
        assert_eq!(called, 3);
        assert_eq!(switched, vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_round_without_caller_is_cancelled() {
        let handle = CallSequencer::new(round(&BingoConfig::progressive(), 7)).start();

        let round = handle.join().await.unwrap();
        assert_eq!(round.outcome(), Some(&RoundOutcome::Cancelled));
        assert!(round.called_numbers().is_empty());
    }
}
