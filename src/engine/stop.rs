//! Stop-condition evaluator.
//!
//! Pure check run before every bet. Rules are tested in a fixed order and
//! the first match wins; every threshold is disabled by a zero value.

use rust_decimal::Decimal;

use crate::strategy::PremiumParams;
use crate::types::{SessionState, StopReason};

/// Session risk limits. Zero disables a rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopLimits {
    pub max_bets: u64,
    pub target_profit: Decimal,
    pub stop_loss: Decimal,
    pub balance_floor: Decimal,
    pub max_consecutive_losses: u32,
    pub max_consecutive_wins: u32,
    pub max_amount: Decimal,
    /// Absolute premium daily target, fixed when the session starts.
    pub premium_target: Decimal,
    /// Absolute premium loss limit, fixed when the session starts.
    pub premium_stop_loss: Decimal,
}

impl StopLimits {
    /// Derive the premium limits from the session's start balance.
    pub fn with_premium(mut self, params: Option<&PremiumParams>, start_balance: Decimal) -> Self {
        match params {
            Some(p) => {
                self.premium_target = p.target_abs(start_balance);
                self.premium_stop_loss = p.stop_loss_abs(start_balance);
            }
            None => {
                self.premium_target = Decimal::ZERO;
                self.premium_stop_loss = Decimal::ZERO;
            }
        }
        self
    }

    /// First matching stop reason, or `None` to keep betting.
    pub fn evaluate(&self, s: &SessionState) -> Option<StopReason> {
        let zero = Decimal::ZERO;

        if self.max_bets > 0 && s.bet_count >= self.max_bets {
            return Some(StopReason::MaxBets);
        }
        if self.premium_target > zero && s.total_profit >= self.premium_target {
            return Some(StopReason::PremiumDailyTarget);
        }
        if self.premium_stop_loss > zero && s.total_profit <= -self.premium_stop_loss {
            return Some(StopReason::PremiumStopLoss);
        }
        if self.target_profit > zero && s.total_profit >= self.target_profit {
            return Some(StopReason::TargetProfit);
        }
        if self.stop_loss > zero && s.total_profit <= -self.stop_loss {
            return Some(StopReason::StopLoss);
        }
        if self.balance_floor > zero && s.current_balance <= self.balance_floor {
            return Some(StopReason::BalanceFloor);
        }
        if self.max_consecutive_losses > 0 && s.consecutive_losses >= self.max_consecutive_losses {
            return Some(StopReason::MaxConsecutiveLosses);
        }
        if self.max_consecutive_wins > 0 && s.consecutive_wins >= self.max_consecutive_wins {
            return Some(StopReason::MaxConsecutiveWins);
        }
        if self.max_amount > zero && s.current_amount > self.max_amount {
            return Some(StopReason::AmountAboveMax);
        }
        if s.current_amount > s.current_balance {
            return Some(StopReason::AmountAboveBalance);
        }
        None
    }
}
