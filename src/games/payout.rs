use crate::config::PayoutConfig;
use crate::games::types::{BetTier, GameMode, Jackpot, SpeedTier};
use serde::{Deserialize, Serialize};

/// Which multiplier table a game mode pays from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "axis", content = "tier", rename_all = "lowercase")]
pub enum PayoutMultiplier {
    Speed(SpeedTier),
    BetLevel(BetTier),
}

impl PayoutMultiplier {
    /// Speed mode pays by call speed, the other modes by bet level
    pub fn for_mode(mode: GameMode, speed: SpeedTier, tier: BetTier) -> Self {
        match mode {
            GameMode::Speed => PayoutMultiplier::Speed(speed),
            GameMode::Classic | GameMode::Progressive => PayoutMultiplier::BetLevel(tier),
        }
    }

    pub fn factor(&self) -> f64 {
        match self {
            PayoutMultiplier::Speed(speed) => speed.multiplier(),
            PayoutMultiplier::BetLevel(tier) => tier.multiplier(),
        }
    }

    fn earns_time_bonus(&self) -> bool {
        matches!(self, PayoutMultiplier::Speed(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayoutRequest {
    pub bet_amount: f64,
    pub multiplier: PayoutMultiplier,
    pub elapsed_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JackpotAward {
    pub name: String,
    pub amount: f64,
}

/// Breakdown of a winning payout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payout {
    pub base: f64,
    pub time_bonus: f64,
    pub jackpot_awards: Vec<JackpotAward>,
    pub total: f64,
    /// Jackpot balances after any hits were paid and reset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_jackpots: Option<Vec<Jackpot>>,
}

impl Payout {
    pub fn zero() -> Self {
        Self {
            base: 0.0,
            time_bonus: 0.0,
            jackpot_awards: Vec::new(),
            total: 0.0,
            updated_jackpots: None,
        }
    }
}

/// Pure payout and jackpot arithmetic
#[derive(Debug, Clone)]
pub struct PayoutCalculator {
    config: PayoutConfig,
}

impl PayoutCalculator {
    pub fn new(config: PayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PayoutConfig {
        &self.config
    }

    /// Amount credited to a winner, plus jackpot balances when jackpots are in play.
    ///
    /// Every jackpot at or above its target is paid in full and reset to zero;
    /// the rest are returned unchanged.
    pub fn compute_win(&self, request: &PayoutRequest, jackpots: Option<&[Jackpot]>) -> Payout {
        let base = request.bet_amount * self.config.base_multiplier * request.multiplier.factor();

        let time_bonus = if request.multiplier.earns_time_bonus()
            && request.elapsed_seconds < self.config.time_bonus_threshold_secs
        {
            base * self.config.time_bonus_rate
        } else {
            0.0
        };

        let mut jackpot_awards = Vec::new();
        let updated_jackpots = jackpots.map(|tiers| {
            tiers
                .iter()
                .map(|jackpot| {
                    if jackpot.is_ready() {
                        jackpot_awards.push(JackpotAward {
                            name: jackpot.name.clone(),
                            amount: jackpot.current,
                        });
                        Jackpot {
                            current: 0.0,
                            ..jackpot.clone()
                        }
                    } else {
                        jackpot.clone()
                    }
                })
                .collect::<Vec<_>>()
        });

        let jackpot_total: f64 = jackpot_awards.iter().map(|a| a.amount).sum();

        Payout {
            base,
            time_bonus,
            total: base + time_bonus + jackpot_total,
            jackpot_awards,
            updated_jackpots,
        }
    }

    /// Share of a bet added to each jackpot tier
    pub fn contribution(&self, bet_amount: f64) -> f64 {
        bet_amount * self.config.jackpot_contribution_rate
    }

    /// Jackpots after a bet has been placed
    pub fn contribute(&self, bet_amount: f64, jackpots: &[Jackpot]) -> Vec<Jackpot> {
        let contribution = self.contribution(bet_amount);
        jackpots
            .iter()
            .map(|jackpot| Jackpot {
                current: jackpot.current + contribution,
                ..jackpot.clone()
            })
            .collect()
    }
}

impl Default for PayoutCalculator {
    fn default() -> Self {
        Self::new(PayoutConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(bet: f64, multiplier: PayoutMultiplier, elapsed: u32) -> PayoutRequest {
        PayoutRequest {
            bet_amount: bet,
            multiplier,
            elapsed_seconds: elapsed,
        }
    }

    #[test]
    fn test_base_payout() {
        let calculator = PayoutCalculator::default();
        let payout = calculator.compute_win(
            &request(10.0, PayoutMultiplier::BetLevel(BetTier::Bronze), 45),
            None,
        );

        assert_eq!(payout.base, 750.0);
        assert_eq!(payout.time_bonus, 0.0);
        assert_eq!(payout.total, 750.0);
        assert!(payout.updated_jackpots.is_none());
    }

    #[test]
    fn test_bet_level_has_no_time_bonus() {
        let calculator = PayoutCalculator::default();
        let payout = calculator.compute_win(
            &request(10.0, PayoutMultiplier::BetLevel(BetTier::Silver), 5),
            None,
        );
        assert_eq!(payout.total, 1500.0);
    }

    #[test]
    fn test_time_bonus_boundary() {
        let calculator = PayoutCalculator::default();
        let multiplier = PayoutMultiplier::Speed(SpeedTier::Medium);

        let fast = calculator.compute_win(&request(5.0, multiplier, 29), None);
        assert_eq!(fast.base, 750.0);
        assert_eq!(fast.time_bonus, 375.0);
        assert_eq!(fast.total, 1125.0);

        let slow = calculator.compute_win(&request(5.0, multiplier, 30), None);
        assert_eq!(slow.time_bonus, 0.0);
        assert_eq!(slow.total, 750.0);
    }

    #[test]
    fn test_payout_increases_with_multiplier() {
        let calculator = PayoutCalculator::default();

        let speed_totals: Vec<f64> = SpeedTier::ALL
            .iter()
            .map(|&s| {
                calculator
                    .compute_win(&request(10.0, PayoutMultiplier::Speed(s), 40), None)
                    .total
            })
            .collect();
        assert!(speed_totals.windows(2).all(|w| w[0] < w[1]), "{:?}", speed_totals);

        let tier_totals: Vec<f64> = BetTier::ALL
            .iter()
            .map(|&t| {
                calculator
                    .compute_win(&request(10.0, PayoutMultiplier::BetLevel(t), 40), None)
                    .total
            })
            .collect();
        assert!(tier_totals.windows(2).all(|w| w[0] < w[1]), "{:?}", tier_totals);
    }

    #[test]
    fn test_ready_jackpot_pays_and_resets() {
        let calculator = PayoutCalculator::default();
        let jackpots = vec![
            Jackpot::new("Mini Jackpot", 5_000.0, 5_000.0),
            Jackpot::new("Minor Jackpot", 8_750.0, 25_000.0),
        ];

        let payout = calculator.compute_win(
            &request(100.0, PayoutMultiplier::BetLevel(BetTier::Bronze), 60),
            Some(&jackpots),
        );

        assert_eq!(payout.base, 7_500.0);
        assert_eq!(
            payout.jackpot_awards,
            vec![JackpotAward {
                name: "Mini Jackpot".to_string(),
                amount: 5_000.0
            }]
        );
        assert_eq!(payout.total, 12_500.0);

        let updated = payout.updated_jackpots.unwrap();
        assert_eq!(updated[0].current, 0.0);
        assert_eq!(updated[1].current, 8_750.0);
    }

    #[test]
    fn test_contribution_reaches_target() {
        let calculator = PayoutCalculator::default();
        let jackpots = vec![Jackpot::new("Mini Jackpot", 4_999.0, 5_000.0)];

        let updated = calculator.contribute(100.0, &jackpots);
        assert_eq!(updated[0].current, 5_000.0);
        assert!(updated[0].is_ready());
    }

    #[test]
    fn test_multiplier_axis_per_mode() {
        assert_eq!(
            PayoutMultiplier::for_mode(GameMode::Speed, SpeedTier::Fast, BetTier::Gold),
            PayoutMultiplier::Speed(SpeedTier::Fast)
        );
        assert_eq!(
            PayoutMultiplier::for_mode(GameMode::Progressive, SpeedTier::Fast, BetTier::Gold),
            PayoutMultiplier::BetLevel(BetTier::Gold)
        );
    }
}
