//! Remote dice API integrations.
//!
//! Defines the `DiceApi` trait the session controller drives, the
//! resilient request executor, and the Wolfbet implementation.

pub mod executor;
pub mod wolfbet;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{ApiError, BetOrder, BetReceipt};

/// Abstraction over a dice-game account.
///
/// Seed refreshes are advisory: callers log their failures and carry on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiceApi: Send + Sync {
    /// Balance of one currency. Fails with `CurrencyNotFound` when the
    /// account does not hold it.
    async fn get_balance(&self, currency: &str) -> Result<Decimal, ApiError>;

    /// Place one bet. The bet only counts as placed once this returns `Ok`.
    async fn place_bet(&self, order: &BetOrder) -> Result<BetReceipt, ApiError>;

    /// Rotate the server seed; returns the new seed hash.
    async fn refresh_server_seed(&self) -> Result<String, ApiError>;

    /// Submit a new client seed; returns the seed the server confirmed.
    async fn refresh_client_seed(&self, seed: &str) -> Result<String, ApiError>;
}
