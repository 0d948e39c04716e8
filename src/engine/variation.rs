//! Per-bet pair variation: random rule and random chance.
//!
//! Applied before synchronization. A randomized chance is expressed as a
//! bet value and must be synchronized with the bet value locked; a varied
//! rule alone keeps the multiplier locked.

use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::pair_sync::{SyncPolicy, CHANCE_CEILING};
use crate::types::{quantize_half_up, BetPair, BotError, Rule};

const MIN_CHANCE: Decimal = dec!(0.01);
const MAX_CHANCE: Decimal = dec!(99.98);

/// Length of generated client seeds.
pub const CLIENT_SEED_LEN: usize = 24;

/// Uniform chance range, in percent.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomChance {
    pub min: Decimal,
    pub max: Decimal,
    /// Decimal places of the drawn chance.
    pub precision: u32,
}

impl RandomChance {
    /// Draw a chance on the `precision` grid within `[min, max]`, clamped
    /// to `[0.01, 99.98]`.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Decimal {
        let scale = Decimal::from(10i64.pow(self.precision.min(18)));
        let lo = (self.min * scale).ceil().to_i64();
        let hi = (self.max * scale).floor().to_i64();

        let chance = match (lo, hi) {
            (Some(lo), Some(hi)) if lo <= hi => Decimal::new(rng.random_range(lo..=hi), self.precision),
            _ => quantize_half_up(self.min, self.precision),
        };
        chance.clamp(MIN_CHANCE, MAX_CHANCE)
    }
}

/// Random rule and chance controls for a session.
#[derive(Debug)]
pub struct PairVariation {
    randomize_rule: bool,
    fixed_rule: Rule,
    random_chance: Option<RandomChance>,
    rng: StdRng,
}

impl PairVariation {
    pub fn new(
        randomize_rule: bool,
        fixed_rule: Rule,
        random_chance: Option<RandomChance>,
        rng: StdRng,
    ) -> Self {
        Self {
            randomize_rule,
            fixed_rule,
            random_chance,
            rng,
        }
    }

    /// Seeded from the operating system.
    pub fn from_os_rng(randomize_rule: bool, fixed_rule: Rule, random_chance: Option<RandomChance>) -> Self {
        Self::new(randomize_rule, fixed_rule, random_chance, StdRng::from_os_rng())
    }

    /// No variation: the configured rule and pair are used as-is.
    pub fn disabled(rule: Rule) -> Self {
        Self::new(false, rule, None, StdRng::seed_from_u64(0))
    }

    pub fn is_active(&self) -> bool {
        self.randomize_rule || self.random_chance.is_some()
    }

    /// Vary `pair` in place. Returns the policy the varied pair must be
    /// synchronized with: the bet value is locked when the chance was
    /// drawn, the multiplier otherwise. `None` when variation is off.
    pub fn apply(&mut self, pair: &mut BetPair) -> Result<Option<SyncPolicy>, BotError> {
        if !self.is_active() {
            return Ok(None);
        }

        pair.rule = if self.randomize_rule {
            if self.rng.random_bool(0.5) {
                Rule::Under
            } else {
                Rule::Over
            }
        } else {
            self.fixed_rule
        };

        let Some(range) = &self.random_chance else {
            return Ok(Some(SyncPolicy::LockMultiplier));
        };
        let chance = range.draw(&mut self.rng);
        let bet_value = match pair.rule {
            Rule::Under => chance,
            Rule::Over => CHANCE_CEILING - chance,
        };
        pair.bet_value = quantize_half_up(bet_value, pair.bet_value_precision);
        Ok(Some(SyncPolicy::LockBetValue))
    }

    /// Fresh client seed drawn from this session's generator.
    pub fn client_seed(&mut self) -> String {
        random_client_seed(&mut self.rng)
    }
}

/// Random alphanumeric client seed.
pub fn random_client_seed<R: Rng>(rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(CLIENT_SEED_LEN)
        .map(char::from)
        .collect()
}
