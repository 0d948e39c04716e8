//! Bet pair synchronizer.
//!
//! Keeps (bet value, multiplier) consistent with the API's pricing formula
//! `multiplier = 99 / chance`. One side is always derived from the other,
//! then the first side is recomputed from the result so the stored pair is
//! a fixed point of the double rounding the API performs.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::types::{quantize_down, quantize_half_up, BetPair, BotError, Rule};

/// Numerator of the pricing formula (1% house edge).
pub const HOUSE_NUMERATOR: Decimal = dec!(99);

/// Upper bound of the roll range. Bet values must stay strictly below it.
pub const CHANCE_CEILING: Decimal = dec!(99.99);

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Which side of the pair is held fixed during synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    LockMultiplier,
    LockBetValue,
    None,
    Auto,
}

impl fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPolicy::LockMultiplier => "lock_multiplier",
            SyncPolicy::LockBetValue => "lock_bet_value",
            SyncPolicy::None => "none",
            SyncPolicy::Auto => "auto",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for SyncPolicy {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "lock_multiplier" => Ok(SyncPolicy::LockMultiplier),
            "lock_bet_value" => Ok(SyncPolicy::LockBetValue),
            "none" | "off" => Ok(SyncPolicy::None),
            "auto" => Ok(SyncPolicy::Auto),
            _ => Err(BotError::Config(format!(
                "Unknown sync policy: {s} (expected auto, lock_multiplier, lock_bet_value, none)"
            ))),
        }
    }
}

/// The pair persisted after the previous run, used to detect which side
/// the user edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastSyncedPair {
    pub multiplier: Decimal,
    pub bet_value: Decimal,
}

// ---------------------------------------------------------------------------
// Formulas
// ---------------------------------------------------------------------------

/// Win chance in percent for a bet value under the given rule.
pub fn chance(bet_value: Decimal, rule: Rule) -> Decimal {
    match rule {
        Rule::Under => bet_value,
        Rule::Over => CHANCE_CEILING - bet_value,
    }
}

/// Payout multiplier implied by a bet value.
pub fn multiplier_for(bet_value: Decimal, rule: Rule, precision: u32) -> Result<Decimal, BotError> {
    let chance = chance(bet_value, rule);
    if chance <= Decimal::ZERO {
        return Err(BotError::Config(format!(
            "Chance {chance} from bet value {bet_value} ({rule}) must be positive"
        )));
    }
    Ok(quantize_half_up(HOUSE_NUMERATOR / chance, precision))
}

/// Bet value implied by a multiplier, re-quantized to `precision`.
pub fn bet_value_for(multiplier: Decimal, rule: Rule, precision: u32) -> Result<Decimal, BotError> {
    if multiplier <= Decimal::ONE {
        return Err(BotError::Config(format!(
            "Multiplier must be > 1 to derive a bet value (got {multiplier})"
        )));
    }

    let chance = quantize_half_up(HOUSE_NUMERATOR / multiplier, precision);
    let bet_value = match rule {
        Rule::Under => chance,
        Rule::Over => CHANCE_CEILING - chance,
    };
    let bet_value = quantize_half_up(bet_value, precision);
    check_bet_value(bet_value)?;
    Ok(bet_value)
}

fn check_bet_value(bet_value: Decimal) -> Result<(), BotError> {
    if bet_value <= Decimal::ZERO || bet_value >= CHANCE_CEILING {
        return Err(BotError::Config(format!(
            "Bet value {bet_value} is outside (0, {CHANCE_CEILING})"
        )));
    }
    Ok(())
}

/// Recompute one side of the pair from the other under a concrete policy.
///
/// `Auto` must be resolved first; passing it is a configuration error.
pub fn synchronize(pair: &BetPair, policy: SyncPolicy) -> Result<BetPair, BotError> {
    let mut out = pair.clone();
    out.bet_value = quantize_half_up(pair.bet_value, pair.bet_value_precision);
    check_bet_value(out.bet_value)?;
    out.multiplier = quantize_half_up(pair.multiplier, pair.multiplier_precision);

    match policy {
        SyncPolicy::LockBetValue => {
            out.multiplier = multiplier_for(out.bet_value, out.rule, out.multiplier_precision)?;
            out.bet_value = bet_value_for(out.multiplier, out.rule, out.bet_value_precision)?;
        }
        SyncPolicy::LockMultiplier => {
            out.bet_value = bet_value_for(out.multiplier, out.rule, out.bet_value_precision)?;
            out.multiplier = multiplier_for(out.bet_value, out.rule, out.multiplier_precision)?;
        }
        SyncPolicy::None => {}
        SyncPolicy::Auto => {
            return Err(BotError::Config(
                "Sync policy 'auto' must be resolved before synchronizing".into(),
            ));
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

/// Holds the resolved policy for a run and applies it to each pair.
#[derive(Debug, Clone)]
pub struct PairSynchronizer {
    policy: SyncPolicy,
}

impl PairSynchronizer {
    /// Resolve `requested` (possibly `Auto`) against the configured pair
    /// and the last persisted one.
    pub fn new(
        requested: SyncPolicy,
        fallback: SyncPolicy,
        auto_multiplier: bool,
        configured: &BetPair,
        last: Option<LastSyncedPair>,
    ) -> Self {
        let policy = resolve_policy(requested, fallback, auto_multiplier, configured, last);
        debug!(requested = %requested, resolved = %policy, "Sync policy resolved");
        Self { policy }
    }

    /// Synchronizer with an already concrete policy.
    pub fn with_policy(policy: SyncPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// Replace the active policy, e.g. after the API rejects the chance.
    pub fn force(&mut self, policy: SyncPolicy) {
        self.policy = policy;
    }

    pub fn sync(&self, pair: &BetPair) -> Result<BetPair, BotError> {
        synchronize(pair, self.policy)
    }
}

/// Resolve `Auto` to a concrete policy. Concrete policies pass through,
/// except that the auto-multiplier flag always forces `LockBetValue`.
pub fn resolve_policy(
    requested: SyncPolicy,
    fallback: SyncPolicy,
    auto_multiplier: bool,
    configured: &BetPair,
    last: Option<LastSyncedPair>,
) -> SyncPolicy {
    if auto_multiplier {
        return SyncPolicy::LockBetValue;
    }
    if requested != SyncPolicy::Auto {
        return requested;
    }

    let last = match last {
        Some(l) if l.multiplier > Decimal::ZERO && l.bet_value > Decimal::ZERO => l,
        _ => return fallback,
    };

    let changed = |current: Decimal, previous: Decimal, places: u32| {
        quantize_down(current, places) != quantize_down(previous, places)
    };
    let multiplier_changed = changed(
        configured.multiplier,
        last.multiplier,
        configured.multiplier_precision,
    );
    let bet_value_changed = changed(
        configured.bet_value,
        last.bet_value,
        configured.bet_value_precision,
    );

    match (multiplier_changed, bet_value_changed) {
        (true, false) => SyncPolicy::LockMultiplier,
        (false, true) => SyncPolicy::LockBetValue,
        _ => fallback,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(rule: Rule, multiplier: Decimal, bet_value: Decimal, bv_precision: u32) -> BetPair {
        BetPair {
            rule,
            multiplier,
            bet_value,
            multiplier_precision: 4,
            bet_value_precision: bv_precision,
        }
    }

    // -- Formula tests --

    #[test]
    fn test_chance_by_rule() {
        assert_eq!(chance(dec!(49.99), Rule::Under), dec!(49.99));
        assert_eq!(chance(dec!(49.99), Rule::Over), dec!(50.00));
    }

    #[test]
    fn test_multiplier_for() {
        assert_eq!(multiplier_for(dec!(49.99), Rule::Under, 4).unwrap(), dec!(1.9804));
        assert_eq!(multiplier_for(dec!(49.99), Rule::Over, 4).unwrap(), dec!(1.98));
        assert!(multiplier_for(dec!(99.99), Rule::Over, 4).is_err());
        assert!(multiplier_for(Decimal::ZERO, Rule::Under, 4).is_err());
    }

    #[test]
    fn test_bet_value_for() {
        assert_eq!(bet_value_for(dec!(1.98), Rule::Under, 2).unwrap(), dec!(50.00));
        assert_eq!(bet_value_for(dec!(1.98), Rule::Over, 2).unwrap(), dec!(49.99));
        assert_eq!(bet_value_for(dec!(2), Rule::Under, 2).unwrap(), dec!(49.50));
    }

    #[test]
    fn test_bet_value_for_rejects_low_multiplier() {
        assert!(bet_value_for(dec!(1), Rule::Under, 2).is_err());
        assert!(bet_value_for(dec!(0.5), Rule::Over, 2).is_err());
    }

    // -- synchronize tests --

    #[test]
    fn test_lock_bet_value_double_pass() {
        let synced = synchronize(&pair(Rule::Under, dec!(1), dec!(49.99), 2), SyncPolicy::LockBetValue)
            .unwrap();
        assert_eq!(synced.multiplier, dec!(1.9804));
        assert_eq!(synced.bet_value, dec!(49.99));
    }

    #[test]
    fn test_lock_multiplier_double_pass() {
        let synced = synchronize(&pair(Rule::Over, dec!(1.98), dec!(10), 2), SyncPolicy::LockMultiplier)
            .unwrap();
        assert_eq!(synced.bet_value, dec!(49.99));
        assert_eq!(synced.multiplier, dec!(1.98));
    }

    #[test]
    fn test_lock_multiplier_snaps_to_grid() {
        // 99 / 7 = 14.142857..., rounded to 14.14, which prices at 7.0014.
        let synced = synchronize(&pair(Rule::Under, dec!(7), dec!(50), 2), SyncPolicy::LockMultiplier)
            .unwrap();
        assert_eq!(synced.bet_value, dec!(14.14));
        assert_eq!(synced.multiplier, dec!(7.0014));
    }

    #[test]
    fn test_none_policy_only_quantizes() {
        let synced = synchronize(
            &pair(Rule::Under, dec!(3.14159), dec!(12.345), 2),
            SyncPolicy::None,
        )
        .unwrap();
        assert_eq!(synced.multiplier, dec!(3.1416));
        assert_eq!(synced.bet_value, dec!(12.35));
    }

    #[test]
    fn test_synchronize_rejects_out_of_range_bet_value() {
        for bv in [dec!(0), dec!(-1), dec!(99.99), dec!(100)] {
            let result = synchronize(&pair(Rule::Under, dec!(2), bv, 2), SyncPolicy::LockBetValue);
            assert!(matches!(result, Err(BotError::Config(_))), "bet value {bv} accepted");
        }
    }

    #[test]
    fn test_synchronize_rejects_auto() {
        let result = synchronize(&pair(Rule::Under, dec!(2), dec!(49.5), 2), SyncPolicy::Auto);
        assert!(result.is_err());
    }

    #[test]
    fn test_synchronize_reaches_fixed_point() {
        let multipliers = [dec!(1.01), dec!(1.5), dec!(1.98), dec!(2), dec!(3.3), dec!(7), dec!(12.5)];
        let bet_values = [dec!(10), dec!(33.33), dec!(49.99), dec!(75), dec!(98)];

        for precision in [2u32, 4, 8] {
            for rule in [Rule::Under, Rule::Over] {
                for m in multipliers {
                    let p = pair(rule, m, dec!(50), precision);
                    let once = synchronize(&p, SyncPolicy::LockMultiplier).unwrap();
                    let twice = synchronize(&once, SyncPolicy::LockMultiplier).unwrap();
                    let thrice = synchronize(&twice, SyncPolicy::LockMultiplier).unwrap();
                    assert_eq!(twice, thrice, "multiplier {m} {rule} p={precision}");
                    let c = chance(thrice.bet_value, rule);
                    assert!(c > Decimal::ZERO && c < CHANCE_CEILING);
                }
                for bv in bet_values {
                    let p = pair(rule, dec!(2), bv, precision);
                    let once = synchronize(&p, SyncPolicy::LockBetValue).unwrap();
                    let twice = synchronize(&once, SyncPolicy::LockBetValue).unwrap();
                    let thrice = synchronize(&twice, SyncPolicy::LockBetValue).unwrap();
                    assert_eq!(twice, thrice, "bet value {bv} {rule} p={precision}");
                }
            }
        }
    }

    // -- Auto resolution tests --

    #[test]
    fn test_auto_multiplier_forces_lock_bet_value() {
        let p = pair(Rule::Under, dec!(2), dec!(49.5), 2);
        let policy = resolve_policy(SyncPolicy::LockMultiplier, SyncPolicy::LockMultiplier, true, &p, None);
        assert_eq!(policy, SyncPolicy::LockBetValue);
    }

    #[test]
    fn test_auto_without_history_uses_fallback() {
        let p = pair(Rule::Under, dec!(2), dec!(49.5), 2);
        assert_eq!(
            resolve_policy(SyncPolicy::Auto, SyncPolicy::LockMultiplier, false, &p, None),
            SyncPolicy::LockMultiplier
        );
        let zeroed = LastSyncedPair {
            multiplier: Decimal::ZERO,
            bet_value: Decimal::ZERO,
        };
        assert_eq!(
            resolve_policy(SyncPolicy::Auto, SyncPolicy::LockBetValue, false, &p, Some(zeroed)),
            SyncPolicy::LockBetValue
        );
    }

    #[test]
    fn test_auto_detects_changed_side() {
        let last = LastSyncedPair {
            multiplier: dec!(1.98),
            bet_value: dec!(49.99),
        };

        let edited_multiplier = pair(Rule::Under, dec!(2.5), dec!(49.99), 2);
        assert_eq!(
            resolve_policy(SyncPolicy::Auto, SyncPolicy::None, false, &edited_multiplier, Some(last)),
            SyncPolicy::LockMultiplier
        );

        let edited_bet_value = pair(Rule::Under, dec!(1.98), dec!(30), 2);
        assert_eq!(
            resolve_policy(SyncPolicy::Auto, SyncPolicy::None, false, &edited_bet_value, Some(last)),
            SyncPolicy::LockBetValue
        );

        let both = pair(Rule::Under, dec!(3), dec!(30), 2);
        assert_eq!(
            resolve_policy(SyncPolicy::Auto, SyncPolicy::None, false, &both, Some(last)),
            SyncPolicy::None
        );

        // Differences below the configured precision do not count.
        let unchanged = pair(Rule::Under, dec!(1.98001), dec!(49.991), 2);
        assert_eq!(
            resolve_policy(SyncPolicy::Auto, SyncPolicy::LockMultiplier, false, &unchanged, Some(last)),
            SyncPolicy::LockMultiplier
        );
    }

    #[test]
    fn test_force_overrides_policy() {
        let p = pair(Rule::Under, dec!(2), dec!(49.5), 2);
        let mut sync = PairSynchronizer::new(SyncPolicy::Auto, SyncPolicy::LockBetValue, false, &p, None);
        assert_eq!(sync.policy(), SyncPolicy::LockBetValue);
        sync.force(SyncPolicy::LockMultiplier);
        assert_eq!(sync.policy(), SyncPolicy::LockMultiplier);
        let synced = sync.sync(&p).unwrap();
        assert_eq!(synced.multiplier, dec!(2.0000));
        assert_eq!(synced.bet_value, dec!(49.50));
    }

    #[test]
    fn test_sync_policy_from_str() {
        assert_eq!("lock-multiplier".parse::<SyncPolicy>().unwrap(), SyncPolicy::LockMultiplier);
        assert_eq!("LOCK_BET_VALUE".parse::<SyncPolicy>().unwrap(), SyncPolicy::LockBetValue);
        assert_eq!("auto".parse::<SyncPolicy>().unwrap(), SyncPolicy::Auto);
        assert!("sideways".parse::<SyncPolicy>().is_err());
    }
}
