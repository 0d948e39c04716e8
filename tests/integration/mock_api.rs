//! In-memory dice backends for integration testing.
//!
//! `MockDice` implements `DiceApi` directly and settles bets from a
//! scripted outcome queue. `FakeWolfbet` sits one layer lower and answers
//! raw HTTP requests the way the Wolfbet API does, so the real client and
//! request executor are exercised too.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use wagerbot::platforms::executor::{ApiRequest, RawResponse, Transport, TransportError};
use wagerbot::platforms::DiceApi;
use wagerbot::types::*;

/// Profit of a settled bet at the order's multiplier.
pub fn settle(outcome: Outcome, amount: Decimal, multiplier: Decimal) -> Decimal {
    match outcome {
        Outcome::Win => amount * (multiplier - Decimal::ONE),
        Outcome::Loss => -amount,
    }
}

/// A mock dice account for deterministic testing.
///
/// Clones share state, so a test keeps one handle and gives another to
/// the controller.
#[derive(Clone)]
pub struct MockDice {
    currency: String,
    balance: Arc<Mutex<Decimal>>,
    outcomes: Arc<Mutex<VecDeque<Outcome>>>,
    /// Errors returned by the next `place_bet` calls, in order.
    errors: Arc<Mutex<VecDeque<ApiError>>>,
    orders: Arc<Mutex<Vec<BetOrder>>>,
    /// Include `user_balance` in every bet response.
    report_balance: bool,
}

impl MockDice {
    pub fn new(currency: &str, balance: Decimal, outcomes: Vec<Outcome>) -> Self {
        Self {
            currency: currency.to_lowercase(),
            balance: Arc::new(Mutex::new(balance)),
            outcomes: Arc::new(Mutex::new(outcomes.into())),
            errors: Arc::new(Mutex::new(VecDeque::new())),
            orders: Arc::new(Mutex::new(Vec::new())),
            report_balance: false,
        }
    }

    pub fn reporting_balance(mut self) -> Self {
        self.report_balance = true;
        self
    }

    /// Fail the next `place_bet` call with `error`.
    pub fn push_error(&self, error: ApiError) {
        self.errors.lock().unwrap().push_back(error);
    }

    pub fn orders(&self) -> Vec<BetOrder> {
        self.orders.lock().unwrap().clone()
    }

    pub fn amounts(&self) -> Vec<Decimal> {
        self.orders().iter().map(|o| o.amount).collect()
    }

    pub fn balance(&self) -> Decimal {
        *self.balance.lock().unwrap()
    }
}

#[async_trait]
impl DiceApi for MockDice {
    async fn get_balance(&self, currency: &str) -> Result<Decimal, ApiError> {
        if currency.to_lowercase() != self.currency {
            return Err(ApiError::CurrencyNotFound {
                currency: currency.to_lowercase(),
                available: vec![self.currency.clone()],
            });
        }
        Ok(self.balance())
    }

    async fn place_bet(&self, order: &BetOrder) -> Result<BetReceipt, ApiError> {
        if let Some(error) = self.errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.orders.lock().unwrap().push(order.clone());

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Loss);
        let profit = settle(outcome, order.amount, order.multiplier);

        let mut balance = self.balance.lock().unwrap();
        *balance += profit;

        Ok(BetReceipt {
            outcome,
            profit,
            result_value: "50.00".to_string(),
            reported_balance: self.report_balance.then_some(*balance),
        })
    }

    async fn refresh_server_seed(&self) -> Result<String, ApiError> {
        Ok("mock-server-seed-hash".to_string())
    }

    async fn refresh_client_seed(&self, seed: &str) -> Result<String, ApiError> {
        Ok(seed.to_string())
    }
}

/// Fake Wolfbet HTTP endpoint.
///
/// Serves `/user/balances` and `/bet/place` with string-typed numbers,
/// like the live API, and records every request body.
pub struct FakeWolfbet {
    balance: Mutex<Decimal>,
    outcomes: Mutex<VecDeque<Outcome>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeWolfbet {
    pub fn new(balance: Decimal, outcomes: Vec<Outcome>) -> Arc<Self> {
        Arc::new(Self {
            balance: Mutex::new(balance),
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Parsed bodies of every bet request.
    pub fn bet_bodies(&self) -> Vec<Value> {
        self.requests()
            .iter()
            .filter(|r| r.path == "/bet/place")
            .filter_map(|r| r.body.as_deref())
            .filter_map(|b| serde_json::from_str(b).ok())
            .collect()
    }

    fn reply(body: Value) -> Result<RawResponse, TransportError> {
        Ok(RawResponse {
            status: 200,
            rate_limit_remaining: Some("100".to_string()),
            body: body.to_string(),
        })
    }

    fn place(&self, body: &str) -> Result<RawResponse, TransportError> {
        let request: Value =
            serde_json::from_str(body).map_err(|e| TransportError(e.to_string()))?;
        let number = |key: &str| {
            request[key]
                .as_f64()
                .and_then(|f| Decimal::from_str(&f.to_string()).ok())
                .unwrap_or_default()
        };
        let amount = number("amount");
        let multiplier = number("multiplier");

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Loss);
        let profit = settle(outcome, amount, multiplier);
        let mut balance = self.balance.lock().unwrap();
        *balance += profit;

        let state = match outcome {
            Outcome::Win => "win",
            Outcome::Loss => "loss",
        };
        Self::reply(json!({
            "bet": {
                "state": state,
                "profit": profit.to_string(),
                "result_value": "12.34",
            },
            "user_balance": { "amount": balance.to_string() },
        }))
    }
}

#[async_trait]
impl Transport for FakeWolfbet {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        match request.path.as_str() {
            "/user/balances" => Self::reply(json!({
                "balances": [
                    { "currency": "btc", "amount": "0.5" },
                    { "currency": "trx", "amount": self.balance.lock().unwrap().to_string() },
                ]
            })),
            "/bet/place" => self.place(request.body.as_deref().unwrap_or("{}")),
            other => Ok(RawResponse {
                status: 404,
                rate_limit_remaining: None,
                body: json!({ "message": format!("no route {other}") }).to_string(),
            }),
        }
    }
}
