//! Balance reconciler: merges API-reported balances with a local estimate.
//!
//! The estimate always accumulates bet profit. The sync mode decides which
//! figure becomes the session's current balance, and a periodic refresh
//! resets both sides to a freshly fetched authoritative value.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{BalanceSource, BotError, SessionState};

/// How the current balance is chosen after each bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceSyncMode {
    /// Always the last API-reported value.
    Api,
    /// Always the locally accumulated estimate.
    Estimated,
    /// API value when it changes, otherwise the estimate.
    #[default]
    Hybrid,
}

impl std::str::FromStr for BalanceSyncMode {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "api" => Ok(BalanceSyncMode::Api),
            "estimated" | "est" => Ok(BalanceSyncMode::Estimated),
            "hybrid" => Ok(BalanceSyncMode::Hybrid),
            _ => Err(BotError::Config(format!(
                "Unknown balance sync mode: {s} (expected api, estimated, hybrid)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BalanceReconciler {
    mode: BalanceSyncMode,
    /// Force an authoritative fetch every N bets. 0 disables.
    refresh_every: u64,
}

impl BalanceReconciler {
    pub fn new(mode: BalanceSyncMode, refresh_every: u64) -> Self {
        Self {
            mode,
            refresh_every,
        }
    }

    pub fn mode(&self) -> BalanceSyncMode {
        self.mode
    }

    /// Seed every balance figure from the session's start balance.
    pub fn seed(&self, state: &mut SessionState, start_balance: Decimal) {
        state.start_balance = start_balance;
        self.apply_refresh(state, start_balance);
    }

    /// Fold one settled bet into the balances.
    pub fn update(
        &self,
        state: &mut SessionState,
        reported: Option<Decimal>,
        profit: Decimal,
    ) -> (Decimal, BalanceSource) {
        state.estimated_balance += profit;

        let mut api_updated = false;
        if let Some(api) = reported {
            api_updated = api != state.api_balance;
            state.api_balance = api;
        }

        let (balance, source) = match self.mode {
            BalanceSyncMode::Api => (state.api_balance, BalanceSource::Api),
            BalanceSyncMode::Estimated => (state.estimated_balance, BalanceSource::Estimated),
            BalanceSyncMode::Hybrid if api_updated => {
                state.estimated_balance = state.api_balance;
                (state.api_balance, BalanceSource::Api)
            }
            BalanceSyncMode::Hybrid => (state.estimated_balance, BalanceSource::Estimated),
        };

        state.current_balance = balance;
        state.balance_source = source;
        (balance, source)
    }

    /// Whether the bet just counted should trigger an authoritative fetch.
    pub fn refresh_due(&self, bet_count: u64) -> bool {
        self.refresh_every > 0 && bet_count > 0 && bet_count % self.refresh_every == 0
    }

    /// Reset API, estimate, and current balance to a freshly fetched value.
    pub fn apply_refresh(&self, state: &mut SessionState, live: Decimal) {
        debug!(
            balance = %live,
            drift = %(live - state.estimated_balance),
            "Balance refreshed from API"
        );
        state.api_balance = live;
        state.estimated_balance = live;
        state.current_balance = live;
        state.balance_source = BalanceSource::Api;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
