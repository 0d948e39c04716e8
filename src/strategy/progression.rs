//! Classic progressions: custom, martingale, fibonacci, win-streak
//! (paroli, anti-martingale, pro scalper) and d'alembert.

use rust_decimal::Decimal;

use super::{CustomPlan, StrategyContext};
use crate::types::{BotError, Outcome};

fn overflow(what: &str) -> BotError {
    BotError::Strategy(format!("{what} overflowed the decimal range"))
}

/// Custom mode: reset to base or `amount * multiplier + addition`.
pub fn custom(plan: &CustomPlan, outcome: Outcome, ctx: &StrategyContext) -> Result<Decimal, BotError> {
    let reaction = match outcome {
        Outcome::Win => &plan.on_win,
        Outcome::Loss => &plan.on_loss,
    };
    if reaction.reset_to_base {
        return Ok(ctx.base_amount);
    }
    ctx.current_amount
        .checked_mul(reaction.multiplier)
        .and_then(|a| a.checked_add(reaction.addition))
        .ok_or_else(|| overflow("Custom wager"))
}

/// Win resets to base, loss multiplies the current wager.
pub fn martingale(multiplier: Decimal, outcome: Outcome, ctx: &StrategyContext) -> Result<Decimal, BotError> {
    match outcome {
        Outcome::Win => Ok(ctx.base_amount),
        Outcome::Loss => ctx
            .current_amount
            .checked_mul(multiplier)
            .ok_or_else(|| overflow("Martingale wager")),
    }
}

/// `fib(0) = fib(1) = 1`.
pub fn fib(index: u32) -> Option<Decimal> {
    let (mut a, mut b) = (Decimal::ONE, Decimal::ONE);
    for _ in 1..index {
        let next = a.checked_add(b)?;
        a = b;
        b = next;
    }
    Some(b)
}

/// Loss advances the index by one; win steps back `step_back_on_win`.
pub fn fibonacci(
    unit: Decimal,
    step_back_on_win: u32,
    index: u32,
    outcome: Outcome,
    ctx: &StrategyContext,
) -> Result<(u32, Decimal), BotError> {
    let index = match outcome {
        Outcome::Loss => index.saturating_add(1),
        Outcome::Win => index.saturating_sub(step_back_on_win),
    };
    let amount = fib(index)
        .and_then(|f| ctx.base_amount.checked_mul(unit)?.checked_mul(f))
        .ok_or_else(|| overflow("Fibonacci wager"))?;
    Ok((index, amount))
}

/// Shared by paroli, anti-martingale and pro scalper: press wins until
/// `max_win_streak`, any loss or a completed streak returns to base.
pub fn win_streak(
    multiplier: Decimal,
    max_win_streak: u32,
    streak: u32,
    outcome: Outcome,
    ctx: &StrategyContext,
) -> Result<(u32, Decimal), BotError> {
    if outcome == Outcome::Loss {
        return Ok((0, ctx.base_amount));
    }
    let streak = streak.saturating_add(1);
    if streak >= max_win_streak {
        return Ok((0, ctx.base_amount));
    }
    let amount = ctx
        .current_amount
        .checked_mul(multiplier)
        .ok_or_else(|| overflow("Win-streak wager"))?;
    Ok((streak, amount))
}

/// Loss raises the level, win lowers it; wager is `base + base * step * level`.
pub fn dalembert(step: Decimal, level: u32, outcome: Outcome, ctx: &StrategyContext) -> (u32, Decimal) {
    let level = match outcome {
        Outcome::Loss => level.saturating_add(1),
        Outcome::Win => level.saturating_sub(1),
    };
    let amount = ctx.base_amount + ctx.base_amount * step * Decimal::from(level);
    (level, amount)
}
