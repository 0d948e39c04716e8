//! Balance-aware presets: premium guard, premium compound, premium.
//!
//! These extend the step ladder with caps derived from the live balance
//! and, for premium, the remaining session profit target.

use rust_decimal::Decimal;

use super::scaling::{Cooldown, Ladder};
use super::{PremiumParams, StrategyContext};
use crate::types::Outcome;

/// Ladder with a fixed balance-percentage cap and a one-step retreat per win.
pub fn guard(
    ladder: &Ladder,
    cooldown: &Cooldown,
    risk_percent: Decimal,
    step: u32,
    cooldown_remaining: u32,
    outcome: Outcome,
    ctx: &StrategyContext,
) -> (u32, u32, Decimal) {
    if ctx.current_balance <= Decimal::ZERO {
        return (step, cooldown_remaining, ctx.base_amount);
    }

    let step = match outcome {
        Outcome::Loss => step.saturating_add(1).min(ladder.max_steps),
        Outcome::Win => step.saturating_sub(1),
    };
    if cooldown_remaining > 0 {
        return (step, cooldown_remaining - 1, ctx.base_amount);
    }
    if outcome == Outcome::Loss && cooldown.triggered(ctx.consecutive_losses) {
        return (step, cooldown.rounds, ctx.base_amount);
    }

    let mut amount = ctx.base_amount * ladder.scale(step);
    let risk_cap = ctx.current_balance * risk_percent / Decimal::ONE_HUNDRED;
    if risk_cap > Decimal::ZERO {
        amount = amount.min(risk_cap);
    }
    (step, 0, amount.max(ctx.base_amount))
}

/// Ladder whose scale is boosted by session profit relative to the start
/// balance: `scale * (1 + profit / start * boost / 100)`, capped.
pub fn compound(
    ladder: &Ladder,
    profit_boost_percent: Decimal,
    step: u32,
    outcome: Outcome,
    ctx: &StrategyContext,
) -> (u32, Decimal) {
    let step = ladder.next_step(step, outcome);
    let mut boost = Decimal::ONE;
    if ctx.start_balance > Decimal::ZERO
        && ctx.total_profit > Decimal::ZERO
        && profit_boost_percent > Decimal::ZERO
    {
        boost += ctx.total_profit / ctx.start_balance * profit_boost_percent / Decimal::ONE_HUNDRED;
    }
    let scale = (ladder.scale(step) * boost).min(ladder.max_scale);
    (step, ctx.base_amount * scale)
}

/// Ladder with cooldown, a scale-proportional balance cap and a cap that
/// never overshoots the remaining daily target.
pub fn premium(
    params: &PremiumParams,
    step: u32,
    cooldown_remaining: u32,
    outcome: Outcome,
    ctx: &StrategyContext,
) -> (u32, u32, Decimal) {
    if ctx.current_balance <= Decimal::ZERO {
        return (step, cooldown_remaining, ctx.base_amount);
    }

    let ladder = &params.ladder;
    let step = ladder.next_step(step, outcome);
    if cooldown_remaining > 0 {
        return (step, cooldown_remaining - 1, ctx.base_amount);
    }
    if outcome == Outcome::Loss && params.cooldown.triggered(ctx.consecutive_losses) {
        return (step, params.cooldown.rounds, ctx.base_amount);
    }

    let scale = ladder.scale(step);
    let scaled = ctx.base_amount * scale;

    let risk_percent = (params.risk_percent * scale).min(params.max_risk_percent);
    let risk_cap = ctx.current_balance * risk_percent / Decimal::ONE_HUNDRED;

    let mut target_cap = scaled;
    let target = params.target_abs(ctx.start_balance);
    if target > Decimal::ZERO {
        let remaining = target - ctx.total_profit;
        if remaining > Decimal::ZERO && ctx.multiplier > Decimal::ONE {
            let to_target = remaining / (ctx.multiplier - Decimal::ONE);
            if to_target > Decimal::ZERO {
                target_cap = target_cap.min(to_target);
            }
        }
    }

    let mut capped = scaled;
    if risk_cap > Decimal::ZERO {
        capped = capped.min(risk_cap);
    }
    capped = capped.min(target_cap);
    (step, 0, capped.max(ctx.base_amount))
}
