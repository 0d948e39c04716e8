//! Step-ladder presets (mining, mining v2, pro safe, pro recovery).
//!
//! A ladder tracks an integer step in `[0, max_steps]`. Losses climb one
//! step, wins retreat `recovery_steps_on_win`, and the wager is
//! `base * loss_multiplier^step` capped at `max_scale`. Cooldown and shield
//! force a run of base-sized bets after a losing streak.

use rust_decimal::Decimal;

use super::StrategyContext;
use crate::types::Outcome;

/// Loss-scaling ladder parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Ladder {
    pub loss_multiplier: Decimal,
    pub max_steps: u32,
    pub recovery_steps_on_win: u32,
    pub max_scale: Decimal,
}

impl Ladder {
    /// Step after one outcome, clamped to `[0, max_steps]`.
    pub fn next_step(&self, step: u32, outcome: Outcome) -> u32 {
        match outcome {
            Outcome::Loss => step.saturating_add(1).min(self.max_steps),
            Outcome::Win => step.saturating_sub(self.recovery_steps_on_win),
        }
    }

    /// `loss_multiplier^step`, never above `max_scale`.
    ///
    /// Assumes `loss_multiplier >= 1`, which configuration enforces.
    pub fn scale(&self, step: u32) -> Decimal {
        let mut scale = Decimal::ONE;
        for _ in 0..step {
            scale = match scale.checked_mul(self.loss_multiplier) {
                Some(s) if s <= self.max_scale => s,
                _ => return self.max_scale,
            };
        }
        scale.min(self.max_scale)
    }
}

/// Loss-streak trigger for a run of base-sized bets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    /// Consecutive losses that engage it. 0 disables.
    pub trigger_losses: u32,
    /// Base-sized bets it lasts. 0 disables.
    pub rounds: u32,
}

impl Cooldown {
    pub fn triggered(&self, consecutive_losses: u32) -> bool {
        self.trigger_losses > 0 && self.rounds > 0 && consecutive_losses >= self.trigger_losses
    }
}

/// Mining: shield lasts `rounds` bets counting the one that triggered it.
pub fn shielded(
    ladder: &Ladder,
    shield: &Cooldown,
    step: u32,
    shield_remaining: u32,
    outcome: Outcome,
    ctx: &StrategyContext,
) -> (u32, u32, Decimal) {
    let step = ladder.next_step(step, outcome);
    if shield_remaining > 0 {
        return (step, shield_remaining - 1, ctx.base_amount);
    }
    if outcome == Outcome::Loss && shield.triggered(ctx.consecutive_losses) {
        return (step, shield.rounds - 1, ctx.base_amount);
    }
    (step, 0, ctx.base_amount * ladder.scale(step))
}

/// Cooldown presets: the triggering bet resets to base, then `rounds`
/// further bets stay at base.
pub fn cooled(
    ladder: &Ladder,
    cooldown: &Cooldown,
    step: u32,
    cooldown_remaining: u32,
    outcome: Outcome,
    ctx: &StrategyContext,
) -> (u32, u32, Decimal) {
    let step = ladder.next_step(step, outcome);
    if cooldown_remaining > 0 {
        return (step, cooldown_remaining - 1, ctx.base_amount);
    }
    if outcome == Outcome::Loss && cooldown.triggered(ctx.consecutive_losses) {
        return (step, cooldown.rounds, ctx.base_amount);
    }
    (step, 0, ctx.base_amount * ladder.scale(step))
}
