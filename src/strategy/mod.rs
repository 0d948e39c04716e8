//! Staking engine: per-preset state machines that size the next wager.
//!
//! Every preset is a variant of [`Preset`] (parameters) paired with a
//! variant of [`StrategyState`] (counters). [`advance`] is the single
//! dispatch point; it is pure, so each preset can be tested in isolation.

pub mod premium;
pub mod progression;
pub mod scaling;

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::types::{quantize_down, smallest_unit, BotError, Outcome};
use scaling::{Cooldown, Ladder};

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

/// On-win or on-loss rule for custom mode.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomReaction {
    pub reset_to_base: bool,
    pub multiplier: Decimal,
    pub addition: Decimal,
}

/// Custom (non-preset) staking: one reaction per outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomPlan {
    pub on_win: CustomReaction,
    pub on_loss: CustomReaction,
}

/// Parameters of the premium preset.
#[derive(Debug, Clone, PartialEq)]
pub struct PremiumParams {
    pub ladder: Ladder,
    pub cooldown: Cooldown,
    /// Balance percentage risked per unit of scale.
    pub risk_percent: Decimal,
    pub max_risk_percent: Decimal,
    /// Session profit target as a percentage of the start balance.
    pub daily_target_percent: Decimal,
    /// Session loss limit as a percentage of the start balance.
    pub stop_loss_percent: Decimal,
}

impl PremiumParams {
    /// Absolute daily target for a session started at `start_balance`.
    pub fn target_abs(&self, start_balance: Decimal) -> Decimal {
        start_balance * self.daily_target_percent / Decimal::ONE_HUNDRED
    }

    /// Absolute loss limit for a session started at `start_balance`.
    pub fn stop_loss_abs(&self, start_balance: Decimal) -> Decimal {
        start_balance * self.stop_loss_percent / Decimal::ONE_HUNDRED
    }
}

/// A named staking preset with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Preset {
    Flat,
    Martingale { multiplier: Decimal },
    Fibonacci { unit: Decimal, step_back_on_win: u32 },
    Paroli { multiplier: Decimal, max_win_streak: u32 },
    AntiMartingale { multiplier: Decimal, max_win_streak: u32 },
    Dalembert { step: Decimal },
    Mining { ladder: Ladder, shield: Cooldown },
    MiningV2 { ladder: Ladder, cooldown: Cooldown },
    ProSafe { ladder: Ladder },
    ProRecovery { ladder: Ladder, cooldown: Cooldown },
    ProScalper { win_multiplier: Decimal, max_win_streak: u32 },
    PremiumGuard { ladder: Ladder, cooldown: Cooldown, risk_percent: Decimal },
    PremiumCompound { ladder: Ladder, profit_boost_percent: Decimal },
    Premium(PremiumParams),
}

impl Preset {
    pub fn name(&self) -> &'static str {
        match self {
            Preset::Flat => "flat",
            Preset::Martingale { .. } => "martingale",
            Preset::Fibonacci { .. } => "fibonacci",
            Preset::Paroli { .. } => "paroli",
            Preset::AntiMartingale { .. } => "anti_martingale",
            Preset::Dalembert { .. } => "dalembert",
            Preset::Mining { .. } => "mining",
            Preset::MiningV2 { .. } => "mining_v2",
            Preset::ProSafe { .. } => "pro_safe",
            Preset::ProRecovery { .. } => "pro_recovery",
            Preset::ProScalper { .. } => "pro_scalper",
            Preset::PremiumGuard { .. } => "premium_guard",
            Preset::PremiumCompound { .. } => "premium_compound",
            Preset::Premium(_) => "premium",
        }
    }

    /// Counters at the start of a session.
    pub fn initial_state(&self) -> StrategyState {
        match self {
            Preset::Flat => StrategyState::Flat,
            Preset::Martingale { .. } => StrategyState::Martingale,
            Preset::Fibonacci { .. } => StrategyState::Fibonacci { index: 0 },
            Preset::Paroli { .. } => StrategyState::Paroli { streak: 0 },
            Preset::AntiMartingale { .. } => StrategyState::AntiMartingale { streak: 0 },
            Preset::Dalembert { .. } => StrategyState::Dalembert { level: 0 },
            Preset::Mining { .. } => StrategyState::Mining { step: 0, shield_remaining: 0 },
            Preset::MiningV2 { .. } => StrategyState::MiningV2 { step: 0, cooldown_remaining: 0 },
            Preset::ProSafe { .. } => StrategyState::ProSafe { step: 0 },
            Preset::ProRecovery { .. } => StrategyState::ProRecovery { step: 0, cooldown_remaining: 0 },
            Preset::ProScalper { .. } => StrategyState::ProScalper { streak: 0 },
            Preset::PremiumGuard { .. } => StrategyState::PremiumGuard { step: 0, cooldown_remaining: 0 },
            Preset::PremiumCompound { .. } => StrategyState::PremiumCompound { step: 0 },
            Preset::Premium(_) => StrategyState::Premium { step: 0, cooldown_remaining: 0 },
        }
    }

    /// Premium parameters when this preset carries session-level limits.
    pub fn premium_params(&self) -> Option<&PremiumParams> {
        match self {
            Preset::Premium(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every accepted preset name, canonical spelling.
pub const PRESET_NAMES: &[&str] = &[
    "flat",
    "martingale",
    "fibonacci",
    "paroli",
    "anti_martingale",
    "dalembert",
    "mining",
    "mining_v2",
    "pro_safe",
    "pro_recovery",
    "pro_scalper",
    "premium_guard",
    "premium_compound",
    "premium",
];

/// Map a user-supplied preset name to its canonical spelling.
///
/// `Ok(None)` selects custom mode. Hyphens and the apostrophe in
/// `d'alembert` are accepted, as are the legacy `mining` names
/// `long_run_guard` and `anti_losstrack`.
pub fn canonical_preset_name(raw: &str) -> Result<Option<&'static str>, BotError> {
    let key = raw.trim().to_lowercase().replace('-', "_").replace('\'', "");
    if matches!(key.as_str(), "" | "custom" | "none" | "off" | "manual") {
        return Ok(None);
    }
    if matches!(key.as_str(), "long_run_guard" | "anti_losstrack") {
        return Ok(Some("mining"));
    }
    PRESET_NAMES
        .iter()
        .find(|name| **name == key)
        .map(|name| Some(*name))
        .ok_or_else(|| {
            BotError::Config(format!(
                "Unknown preset '{raw}'. Supported: custom, {}",
                PRESET_NAMES.join(", ")
            ))
        })
}

/// What drives the wager size for a session.
#[derive(Debug, Clone, PartialEq)]
pub enum StakingPlan {
    Custom(CustomPlan),
    Preset(Preset),
}

impl StakingPlan {
    pub fn initial_state(&self) -> StrategyState {
        match self {
            StakingPlan::Custom(_) => StrategyState::Custom,
            StakingPlan::Preset(p) => p.initial_state(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StakingPlan::Custom(_) => "custom",
            StakingPlan::Preset(p) => p.name(),
        }
    }

    pub fn premium_params(&self) -> Option<&PremiumParams> {
        match self {
            StakingPlan::Preset(p) => p.premium_params(),
            StakingPlan::Custom(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// State & context
// ---------------------------------------------------------------------------

/// Progression counters of the active preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StrategyState {
    Custom,
    Flat,
    Martingale,
    Fibonacci { index: u32 },
    Paroli { streak: u32 },
    AntiMartingale { streak: u32 },
    Dalembert { level: u32 },
    Mining { step: u32, shield_remaining: u32 },
    MiningV2 { step: u32, cooldown_remaining: u32 },
    ProSafe { step: u32 },
    ProRecovery { step: u32, cooldown_remaining: u32 },
    ProScalper { streak: u32 },
    PremiumGuard { step: u32, cooldown_remaining: u32 },
    PremiumCompound { step: u32 },
    Premium { step: u32, cooldown_remaining: u32 },
}

/// Session values a transition may read. Counters are taken after the
/// outcome has been recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyContext {
    pub base_amount: Decimal,
    pub current_amount: Decimal,
    pub consecutive_losses: u32,
    pub current_balance: Decimal,
    pub total_profit: Decimal,
    pub start_balance: Decimal,
    /// Multiplier of the pair the last bet was placed with.
    pub multiplier: Decimal,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Advance `state` by one outcome and return the raw next wager.
///
/// The amount is not yet quantized; see [`normalize_amount`].
pub fn advance(
    plan: &StakingPlan,
    state: StrategyState,
    outcome: Outcome,
    ctx: &StrategyContext,
) -> Result<(StrategyState, Decimal), BotError> {
    use StrategyState as S;

    let preset = match plan {
        StakingPlan::Custom(custom) => {
            return Ok((S::Custom, progression::custom(custom, outcome, ctx)?));
        }
        StakingPlan::Preset(p) => p,
    };

    match (preset, state) {
        (Preset::Flat, S::Flat) => Ok((S::Flat, ctx.base_amount)),
        (Preset::Martingale { multiplier }, S::Martingale) => Ok((
            S::Martingale,
            progression::martingale(*multiplier, outcome, ctx)?,
        )),
        (Preset::Fibonacci { unit, step_back_on_win }, S::Fibonacci { index }) => {
            let (index, amount) = progression::fibonacci(*unit, *step_back_on_win, index, outcome, ctx)?;
            Ok((S::Fibonacci { index }, amount))
        }
        (Preset::Paroli { multiplier, max_win_streak }, S::Paroli { streak }) => {
            let (streak, amount) =
                progression::win_streak(*multiplier, *max_win_streak, streak, outcome, ctx)?;
            Ok((S::Paroli { streak }, amount))
        }
        (Preset::AntiMartingale { multiplier, max_win_streak }, S::AntiMartingale { streak }) => {
            let (streak, amount) =
                progression::win_streak(*multiplier, *max_win_streak, streak, outcome, ctx)?;
            Ok((S::AntiMartingale { streak }, amount))
        }
        (Preset::ProScalper { win_multiplier, max_win_streak }, S::ProScalper { streak }) => {
            let (streak, amount) =
                progression::win_streak(*win_multiplier, *max_win_streak, streak, outcome, ctx)?;
            Ok((S::ProScalper { streak }, amount))
        }
        (Preset::Dalembert { step }, S::Dalembert { level }) => {
            let (level, amount) = progression::dalembert(*step, level, outcome, ctx);
            Ok((S::Dalembert { level }, amount))
        }
        (Preset::Mining { ladder, shield }, S::Mining { step, shield_remaining }) => {
            let (step, shield_remaining, amount) =
                scaling::shielded(ladder, shield, step, shield_remaining, outcome, ctx);
            Ok((S::Mining { step, shield_remaining }, amount))
        }
        (Preset::MiningV2 { ladder, cooldown }, S::MiningV2 { step, cooldown_remaining }) => {
            let (step, cooldown_remaining, amount) =
                scaling::cooled(ladder, cooldown, step, cooldown_remaining, outcome, ctx);
            Ok((S::MiningV2 { step, cooldown_remaining }, amount))
        }
        (Preset::ProSafe { ladder }, S::ProSafe { step }) => {
            let step = ladder.next_step(step, outcome);
            Ok((S::ProSafe { step }, ctx.base_amount * ladder.scale(step)))
        }
        (Preset::ProRecovery { ladder, cooldown }, S::ProRecovery { step, cooldown_remaining }) => {
            let (step, cooldown_remaining, amount) =
                scaling::cooled(ladder, cooldown, step, cooldown_remaining, outcome, ctx);
            Ok((S::ProRecovery { step, cooldown_remaining }, amount))
        }
        (
            Preset::PremiumGuard { ladder, cooldown, risk_percent },
            S::PremiumGuard { step, cooldown_remaining },
        ) => {
            let (step, cooldown_remaining, amount) = premium::guard(
                ladder,
                cooldown,
                *risk_percent,
                step,
                cooldown_remaining,
                outcome,
                ctx,
            );
            Ok((S::PremiumGuard { step, cooldown_remaining }, amount))
        }
        (Preset::PremiumCompound { ladder, profit_boost_percent }, S::PremiumCompound { step }) => {
            let (step, amount) = premium::compound(ladder, *profit_boost_percent, step, outcome, ctx);
            Ok((S::PremiumCompound { step }, amount))
        }
        (Preset::Premium(params), S::Premium { step, cooldown_remaining }) => {
            let (step, cooldown_remaining, amount) =
                premium::premium(params, step, cooldown_remaining, outcome, ctx);
            Ok((S::Premium { step, cooldown_remaining }, amount))
        }
        (preset, state) => Err(BotError::Strategy(format!(
            "State {state:?} does not belong to preset '{preset}'"
        ))),
    }
}

/// Quantize a wager down to the coin's decimal places. A positive amount
/// that collapses to zero is floored to the smallest unit.
pub fn normalize_amount(amount: Decimal, coin_places: u32) -> Decimal {
    let normalized = quantize_down(amount, coin_places);
    if amount > Decimal::ZERO && normalized <= Decimal::ZERO {
        return smallest_unit(coin_places);
    }
    normalized
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns the plan and the live counters for one session.
#[derive(Debug, Clone)]
pub struct StakingEngine {
    plan: StakingPlan,
    state: StrategyState,
    coin_places: u32,
}

impl StakingEngine {
    pub fn new(plan: StakingPlan, coin_places: u32) -> Self {
        let state = plan.initial_state();
        Self {
            plan,
            state,
            coin_places,
        }
    }

    pub fn plan(&self) -> &StakingPlan {
        &self.plan
    }

    pub fn state(&self) -> StrategyState {
        self.state
    }

    /// Return every counter to its initial value.
    pub fn reset(&mut self) {
        self.state = self.plan.initial_state();
    }

    /// Apply one outcome and return the normalized next wager.
    ///
    /// On error the counters are left untouched.
    pub fn advance(&mut self, outcome: Outcome, ctx: &StrategyContext) -> Result<Decimal, BotError> {
        let (state, raw) = advance(&self.plan, self.state, outcome, ctx)?;
        let amount = normalize_amount(raw, self.coin_places);
        if amount <= Decimal::ZERO {
            return Err(BotError::Strategy(format!(
                "Next wager {amount} is not positive after '{}' ({outcome}); check the on_win/on_loss settings",
                self.plan.name()
            )));
        }
        debug!(preset = self.plan.name(), ?state, raw = %raw, amount = %amount, "Strategy advanced");
        self.state = state;
        Ok(amount)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
