//! Shared types for the WAGERBOT engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that platform, strategy,
//! and engine modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which side of the roll counts as a win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rule {
    Under,
    Over,
}

impl Rule {
    /// The opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Rule::Under => Rule::Over,
            Rule::Over => Rule::Under,
        }
    }

    /// Wire name expected by the dice API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::Under => "under",
            Rule::Over => "over",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a rule (case-insensitive). HI/LO spellings are accepted.
impl std::str::FromStr for Rule {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "under" | "low" | "lo" => Ok(Rule::Under),
            "over" | "high" | "hi" => Ok(Rule::Over),
            _ => Err(BotError::Config(format!("Unknown rule: {s} (expected under/over)"))),
        }
    }
}

/// Result of a single bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
}

impl Outcome {
    /// Map the API `state` field. Returns `None` for anything unrecognised;
    /// callers treat that as a loss.
    pub fn from_state(state: &str) -> Option<Self> {
        match state.trim().to_lowercase().as_str() {
            "win" => Some(Outcome::Win),
            "loss" => Some(Outcome::Loss),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win => write!(f, "WIN"),
            Outcome::Loss => write!(f, "LOSS"),
        }
    }
}

/// Where the current balance figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceSource {
    Api,
    Estimated,
}

impl fmt::Display for BalanceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceSource::Api => write!(f, "API"),
            BalanceSource::Estimated => write!(f, "EST"),
        }
    }
}

// ---------------------------------------------------------------------------
// Bet pair & orders
// ---------------------------------------------------------------------------

/// The (bet value, multiplier) pair submitted with every bet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetPair {
    pub rule: Rule,
    pub multiplier: Decimal,
    /// Roll threshold, strictly within (0, 99.99).
    pub bet_value: Decimal,
    pub multiplier_precision: u32,
    pub bet_value_precision: u32,
}

impl fmt::Display for BetPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} @ x{}",
            self.rule,
            decimal_to_plain(self.bet_value),
            decimal_to_plain(self.multiplier),
        )
    }
}

/// A fully specified bet ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetOrder {
    pub currency: String,
    pub amount: Decimal,
    pub rule: Rule,
    pub multiplier: Decimal,
    pub bet_value: Decimal,
}

impl BetOrder {
    pub fn new(currency: &str, amount: Decimal, pair: &BetPair) -> Self {
        Self {
            currency: currency.to_lowercase(),
            amount,
            rule: pair.rule,
            multiplier: pair.multiplier,
            bet_value: pair.bet_value,
        }
    }
}

/// Parsed response to a placed bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetReceipt {
    pub outcome: Outcome,
    pub profit: Decimal,
    pub result_value: String,
    /// Balance reported alongside the bet, if the API included one.
    pub reported_balance: Option<Decimal>,
}

impl fmt::Display for BetReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} roll={} profit={}",
            self.outcome,
            self.result_value,
            decimal_to_plain(self.profit),
        )
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Running state of one betting session.
///
/// Owned by the session controller and mutated only once a bet outcome
/// is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub base_amount: Decimal,
    pub current_amount: Decimal,
    pub start_balance: Decimal,
    pub current_balance: Decimal,
    pub api_balance: Decimal,
    pub estimated_balance: Decimal,
    pub balance_source: BalanceSource,
    pub total_profit: Decimal,
    pub bet_count: u64,
    pub win_count: u64,
    pub loss_count: u64,
    pub consecutive_wins: u32,
    pub consecutive_losses: u32,
    pub api_error_count: u32,
    pub started_at: DateTime<Utc>,
}

impl SessionState {
    /// Fresh session wagering `base_amount`.
    pub fn new(base_amount: Decimal) -> Self {
        Self {
            base_amount,
            current_amount: base_amount,
            start_balance: Decimal::ZERO,
            current_balance: Decimal::ZERO,
            api_balance: Decimal::ZERO,
            estimated_balance: Decimal::ZERO,
            balance_source: BalanceSource::Api,
            total_profit: Decimal::ZERO,
            bet_count: 0,
            win_count: 0,
            loss_count: 0,
            consecutive_wins: 0,
            consecutive_losses: 0,
            api_error_count: 0,
            started_at: Utc::now(),
        }
    }

    /// Zero every counter for a replay. Base amount and balances carry over
    /// until the next start-balance fetch.
    pub fn reset(&mut self) {
        self.current_amount = self.base_amount;
        self.total_profit = Decimal::ZERO;
        self.bet_count = 0;
        self.win_count = 0;
        self.loss_count = 0;
        self.consecutive_wins = 0;
        self.consecutive_losses = 0;
        self.api_error_count = 0;
        self.started_at = Utc::now();
    }

    /// Count a settled bet and its profit.
    pub fn record_outcome(&mut self, outcome: Outcome, profit: Decimal) {
        self.total_profit += profit;
        self.bet_count += 1;
        match outcome {
            Outcome::Win => {
                self.win_count += 1;
                self.consecutive_wins += 1;
                self.consecutive_losses = 0;
            }
            Outcome::Loss => {
                self.loss_count += 1;
                self.consecutive_losses += 1;
                self.consecutive_wins = 0;
            }
        }
    }

    /// Win rate as a percentage (0-100).
    pub fn win_rate(&self) -> f64 {
        if self.bet_count == 0 {
            return 0.0;
        }
        self.win_count as f64 / self.bet_count as f64 * 100.0
    }
}

// ---------------------------------------------------------------------------
// Stop & halt reasons
// ---------------------------------------------------------------------------

/// Why the stop-condition evaluator halted the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    MaxBets,
    PremiumDailyTarget,
    PremiumStopLoss,
    TargetProfit,
    StopLoss,
    BalanceFloor,
    MaxConsecutiveLosses,
    MaxConsecutiveWins,
    AmountAboveMax,
    AmountAboveBalance,
}

impl StopReason {
    pub fn is_take_profit(&self) -> bool {
        matches!(self, StopReason::TargetProfit | StopReason::PremiumDailyTarget)
    }

    pub fn is_stop_loss(&self) -> bool {
        matches!(self, StopReason::StopLoss | StopReason::PremiumStopLoss)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::MaxBets => "max bets reached",
            StopReason::PremiumDailyTarget => "premium daily target reached",
            StopReason::PremiumStopLoss => "premium stop-loss reached",
            StopReason::TargetProfit => "target profit reached",
            StopReason::StopLoss => "stop-loss reached",
            StopReason::BalanceFloor => "balance at or below floor",
            StopReason::MaxConsecutiveLosses => "max consecutive losses reached",
            StopReason::MaxConsecutiveWins => "max consecutive wins reached",
            StopReason::AmountAboveMax => "wager exceeds max amount",
            StopReason::AmountAboveBalance => "wager exceeds current balance",
        };
        f.write_str(text)
    }
}

/// Why a session ended, as seen by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    Stop(StopReason),
    ApiErrorLimit,
    StartFailed(String),
    SyncFailed(String),
    StrategyFailed(String),
    Interrupted,
}

impl HaltReason {
    pub fn is_take_profit(&self) -> bool {
        matches!(self, HaltReason::Stop(r) if r.is_take_profit())
    }

    pub fn is_stop_loss(&self) -> bool {
        matches!(self, HaltReason::Stop(r) if r.is_stop_loss())
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::Stop(r) => write!(f, "{r}"),
            HaltReason::ApiErrorLimit => write!(f, "API error limit reached"),
            HaltReason::StartFailed(e) => write!(f, "failed to start session: {e}"),
            HaltReason::SyncFailed(e) => write!(f, "pair synchronisation failed: {e}"),
            HaltReason::StrategyFailed(e) => write!(f, "strategy error: {e}"),
            HaltReason::Interrupted => write!(f, "interrupted by user"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session summary
// ---------------------------------------------------------------------------

/// End-of-session report handed to the display layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub currency: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub bets: u64,
    pub wins: u64,
    pub losses: u64,
    pub start_balance: Decimal,
    pub final_balance: Decimal,
    pub balance_source: BalanceSource,
    pub api_balance: Decimal,
    pub estimated_balance: Decimal,
    pub total_profit: Decimal,
    pub reason: HaltReason,
}

impl SessionSummary {
    pub fn from_state(state: &SessionState, currency: &str, reason: HaltReason) -> Self {
        Self {
            currency: currency.to_uppercase(),
            started_at: state.started_at,
            ended_at: Utc::now(),
            bets: state.bet_count,
            wins: state.win_count,
            losses: state.loss_count,
            start_balance: state.start_balance,
            final_balance: state.current_balance,
            balance_source: state.balance_source,
            api_balance: state.api_balance,
            estimated_balance: state.estimated_balance,
            total_profit: state.total_profit,
            reason,
        }
    }

    pub fn duration_secs(&self) -> i64 {
        (self.ended_at - self.started_at).num_seconds()
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.total_profit >= Decimal::ZERO { "+" } else { "" };
        write!(
            f,
            "Session ({}s): bets={} (W{}/L{}) | start={} {cur} | final={} {cur} ({}) | api={} | est={} | pnl={sign}{} {cur} | {}",
            self.duration_secs(),
            self.bets,
            self.wins,
            self.losses,
            decimal_to_plain(self.start_balance),
            decimal_to_plain(self.final_balance),
            self.balance_source,
            decimal_to_plain(self.api_balance),
            decimal_to_plain(self.estimated_balance),
            decimal_to_plain(self.total_profit),
            self.reason,
            cur = self.currency,
        )
    }
}

// ---------------------------------------------------------------------------
// Decimal helpers
// ---------------------------------------------------------------------------

/// Round half-up (away from zero on ties) to `places` decimals.
pub fn quantize_half_up(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
}

/// Truncate toward zero to `places` decimals.
pub fn quantize_down(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, RoundingStrategy::ToZero)
}

/// The smallest positive amount representable with `places` decimals.
pub fn smallest_unit(places: u32) -> Decimal {
    Decimal::new(1, places)
}

/// Plain decimal text: no exponent, no trailing zeros, `-0` folded to `0`.
pub fn decimal_to_plain(value: Decimal) -> String {
    let text = value.normalize().to_string();
    if text == "-0" {
        "0".to_string()
    } else {
        text
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Top-level error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Invalid or out-of-range parameter. Always fatal, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// Fatal to the current session only.
    #[error("Strategy error: {0}")]
    Strategy(String),
}

/// Failures talking to the dice API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error after {attempts} attempt(s): {message}")]
    Network { attempts: u32, message: String },

    #[error("Rate limited (HTTP 429) after {attempts} attempt(s)")]
    RateLimited { attempts: u32 },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    #[error("Currency '{currency}' not found in balances (available: {})", .available.join(", "))]
    CurrencyNotFound {
        currency: String,
        available: Vec<String>,
    },
}

/// Corrections the controller applies instead of propagating an API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectiveAction {
    /// Wager has too many decimals for the coin.
    RenormalizeAmount,
    /// Chance and multiplier disagree; resync with the multiplier locked.
    ForceResync,
}

impl ApiError {
    /// Classify the two messages the controller knows how to repair.
    pub fn corrective_action(&self) -> Option<CorrectiveAction> {
        let text = self.to_string().to_lowercase();
        if text.contains("amount scale is too high") {
            Some(CorrectiveAction::RenormalizeAmount)
        } else if text.contains("incorrect win chance given") {
            Some(CorrectiveAction::ForceResync)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
