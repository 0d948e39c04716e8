//! Wolfbet dice integration.
//!
//! Base URL: https://wolfbet.com/api/v1
//! Auth: `Authorization: Bearer {token}` on every request.
//!
//! Numeric fields may arrive as strings or numbers; both are accepted.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use super::executor::{
    ApiRequest, Method, RawResponse, RequestExecutor, RetryPolicy, Transport, TransportError,
};
use super::DiceApi;
use crate::types::{decimal_to_plain, ApiError, BetOrder, BetReceipt, Outcome};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://wolfbet.com/api/v1";

const USER_AGENT: &str = concat!("wagerbot/", env!("CARGO_PKG_VERSION"));

const BALANCES_PATH: &str = "/user/balances";
const BET_PATH: &str = "/bet/place";
const SERVER_SEED_PATH: &str = "/game/seed/refresh";
const CLIENT_SEED_PATH: &str = "/user/seed/refresh";

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------

/// reqwest-backed transport with the Wolfbet headers preset.
pub struct ReqwestTransport {
    http: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, token: &SecretString, timeout: Duration) -> Result<Self> {
        let raw = token.expose_secret().trim();
        let bearer = if raw.to_lowercase().starts_with("bearer ") {
            raw.to_string()
        } else {
            format!("Bearer {raw}")
        };
        let mut auth = HeaderValue::from_str(&bearer).context("API token contains invalid header characters")?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .context("Failed to build Wolfbet HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = match request.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
        };
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        let status = response.status().as_u16();
        let rate_limit_remaining = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(format!("failed to read response body: {e}")))?;

        Ok(RawResponse {
            status,
            rate_limit_remaining,
            body,
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Wolfbet dice client.
pub struct WolfbetClient<T = ReqwestTransport> {
    executor: RequestExecutor<T>,
}

impl WolfbetClient<ReqwestTransport> {
    /// Client over HTTPS with the given retry policy.
    pub fn connect(
        base_url: &str,
        token: &SecretString,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let transport = ReqwestTransport::new(base_url, token, timeout)?;
        Ok(Self::new(transport, policy))
    }
}

impl<T: Transport> WolfbetClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            executor: RequestExecutor::new(transport, policy),
        }
    }
}

#[async_trait]
impl<T: Transport> DiceApi for WolfbetClient<T> {
    async fn get_balance(&self, currency: &str) -> Result<Decimal, ApiError> {
        let data = self.executor.execute(&ApiRequest::get(BALANCES_PATH)).await?;
        let balances = data
            .get("balances")
            .and_then(Value::as_array)
            .ok_or_else(|| ApiError::MalformedResponse("missing 'balances' list".into()))?;

        let wanted = currency.to_lowercase();
        let mut available = Vec::new();
        for item in balances.iter().filter(|i| i.is_object()) {
            let code = text_field(item.get("currency")).to_lowercase();
            if code == wanted {
                return decimal_field(item.get("amount"), "balance amount");
            }
            available.push(code);
        }

        Err(ApiError::CurrencyNotFound {
            currency: wanted,
            available,
        })
    }

    async fn place_bet(&self, order: &BetOrder) -> Result<BetReceipt, ApiError> {
        let request = ApiRequest::post(BET_PATH, bet_body(order));
        debug!(body = request.body.as_deref().unwrap_or_default(), "Placing bet");
        let data = self.executor.execute(&request).await?;
        parse_bet_response(&data)
    }

    async fn refresh_server_seed(&self) -> Result<String, ApiError> {
        let data = self.executor.execute(&ApiRequest::get(SERVER_SEED_PATH)).await?;
        Ok(data
            .get("server_seed_hashed")
            .map(|v| text_field(Some(v)))
            .unwrap_or_else(|| "-".to_string()))
    }

    async fn refresh_client_seed(&self, seed: &str) -> Result<String, ApiError> {
        let body = serde_json::json!({ "client_seed": seed }).to_string();
        let data = self.executor.execute(&ApiRequest::post(CLIENT_SEED_PATH, body)).await?;
        Ok(data
            .get("seed")
            .map(|v| text_field(Some(v)))
            .unwrap_or_else(|| seed.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Wire helpers
// ---------------------------------------------------------------------------

/// Bet body with numbers written as plain decimals (no exponent, no
/// trailing zeros).
pub fn bet_body(order: &BetOrder) -> String {
    let currency = Value::String(order.currency.to_lowercase()).to_string();
    format!(
        r#"{{"currency":{currency},"game":"dice","amount":{},"rule":"{}","multiplier":{},"bet_value":{}}}"#,
        decimal_to_plain(order.amount),
        order.rule.as_str(),
        decimal_to_plain(order.multiplier),
        decimal_to_plain(order.bet_value),
    )
}

fn parse_bet_response(data: &Value) -> Result<BetReceipt, ApiError> {
    let bet = data
        .get("bet")
        .filter(|b| b.is_object())
        .ok_or_else(|| ApiError::MalformedResponse("missing 'bet' object".into()))?;

    let state = text_field(bet.get("state"));
    let outcome = Outcome::from_state(&state).unwrap_or_else(|| {
        warn!(state = %state, "Unrecognised bet state, counting it as a loss");
        Outcome::Loss
    });

    let profit = match bet.get("profit") {
        None | Some(Value::Null) => Decimal::ZERO,
        value => decimal_field(value, "bet profit")?,
    };

    let result_value = match bet.get("result_value") {
        None | Some(Value::Null) => "-".to_string(),
        value => text_field(value),
    };

    let reported_balance = match data.get("user_balance").and_then(|b| b.get("amount")) {
        None | Some(Value::Null) => None,
        Some(v) => match parse_decimal(v) {
            Some(d) => Some(d),
            None => {
                warn!(value = %v, "Ignoring unparseable user_balance amount");
                None
            }
        },
    };

    Ok(BetReceipt {
        outcome,
        profit,
        result_value,
        reported_balance,
    })
}

fn text_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Decimal from a JSON string or number, accepting scientific notation.
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn decimal_field(value: Option<&Value>, name: &str) -> Result<Decimal, ApiError> {
    match value {
        None | Some(Value::Null) => Ok(Decimal::ZERO),
        Some(v) => parse_decimal(v)
            .ok_or_else(|| ApiError::MalformedResponse(format!("{name} is not a number: {v}"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::executor::tests::{ok, status, ScriptedTransport};
    use crate::types::{BetPair, Rule};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn client(script: Vec<Result<RawResponse, TransportError>>) -> (WolfbetClient<Arc<ScriptedTransport>>, Arc<ScriptedTransport>) {
        let transport = ScriptedTransport::new(script);
        (WolfbetClient::new(transport.clone(), RetryPolicy::immediate(0)), transport)
    }

    fn order() -> BetOrder {
        let pair = BetPair {
            rule: Rule::Under,
            multiplier: dec!(1.9804),
            bet_value: dec!(49.99),
            multiplier_precision: 4,
            bet_value_precision: 2,
        };
        BetOrder::new("TRX", dec!(0.00010000), &pair)
    }

    // -- Body tests --

    #[test]
    fn test_bet_body_plain_decimals() {
        assert_eq!(
            bet_body(&order()),
            r#"{"currency":"trx","game":"dice","amount":0.0001,"rule":"under","multiplier":1.9804,"bet_value":49.99}"#
        );
    }

    #[test]
    fn test_bet_body_is_valid_json() {
        let value: Value = serde_json::from_str(&bet_body(&order())).unwrap();
        assert_eq!(value["game"], "dice");
        assert_eq!(value["rule"], "under");
    }

    // -- Parse tests --

    #[test]
    fn test_parse_decimal_forms() {
        assert_eq!(parse_decimal(&Value::String("0.00012".into())), Some(dec!(0.00012)));
        assert_eq!(parse_decimal(&serde_json::json!(1.5)), Some(dec!(1.5)));
        assert_eq!(parse_decimal(&Value::String("1e-8".into())), Some(dec!(0.00000001)));
        assert_eq!(parse_decimal(&Value::String("abc".into())), None);
        assert_eq!(parse_decimal(&Value::Bool(true)), None);
    }

    #[test]
    fn test_parse_bet_response_win() {
        let data = serde_json::json!({
            "bet": {"state": "win", "profit": "0.00009804", "result_value": "12.34"},
            "user_balance": {"amount": "10.00009804"}
        });
        let receipt = parse_bet_response(&data).unwrap();
        assert_eq!(receipt.outcome, Outcome::Win);
        assert_eq!(receipt.profit, dec!(0.00009804));
        assert_eq!(receipt.result_value, "12.34");
        assert_eq!(receipt.reported_balance, Some(dec!(10.00009804)));
    }

    #[test]
    fn test_parse_bet_response_unknown_state_is_loss() {
        let data = serde_json::json!({"bet": {"state": "void", "profit": -0.0001, "result_value": 77.1}});
        let receipt = parse_bet_response(&data).unwrap();
        assert_eq!(receipt.outcome, Outcome::Loss);
        assert_eq!(receipt.profit, dec!(-0.0001));
        assert_eq!(receipt.result_value, "77.1");
        assert_eq!(receipt.reported_balance, None);
    }

    #[test]
    fn test_parse_bet_response_requires_bet() {
        let data = serde_json::json!({"user_balance": {"amount": "1"}});
        assert!(matches!(parse_bet_response(&data), Err(ApiError::MalformedResponse(_))));
    }

    // -- Client tests --

    #[tokio::test]
    async fn test_get_balance_case_insensitive() {
        let (c, transport) = client(vec![ok(
            r#"{"balances":[{"currency":"btc","amount":"0.5"},{"currency":"TRX","amount":"12.25"}]}"#,
        )]);
        assert_eq!(c.get_balance("trx").await.unwrap(), dec!(12.25));
        let sent = transport.sent();
        assert_eq!(sent[0].method, Method::Get);
        assert_eq!(sent[0].path, "/user/balances");
    }

    #[tokio::test]
    async fn test_get_balance_missing_currency() {
        let (c, _) = client(vec![ok(r#"{"balances":[{"currency":"btc","amount":"0.5"},{"currency":"eth","amount":1}]}"#)]);
        let err = c.get_balance("DOGE").await.unwrap_err();
        assert_eq!(
            err,
            ApiError::CurrencyNotFound {
                currency: "doge".into(),
                available: vec!["btc".into(), "eth".into()],
            }
        );
    }

    #[tokio::test]
    async fn test_place_bet_posts_body() {
        let (c, transport) = client(vec![ok(
            r#"{"bet":{"state":"loss","profit":"-0.0001","result_value":"88.01"},"user_balance":{"amount":"9.9999"}}"#,
        )]);
        let receipt = c.place_bet(&order()).await.unwrap();
        assert_eq!(receipt.outcome, Outcome::Loss);
        let sent = transport.sent();
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(sent[0].path, "/bet/place");
        assert_eq!(sent[0].body.as_deref(), Some(bet_body(&order()).as_str()));
    }

    #[tokio::test]
    async fn test_place_bet_surfaces_api_message() {
        let (c, _) = client(vec![status(422, r#"{"error":"Incorrect win chance given."}"#)]);
        let err = c.place_bet(&order()).await.unwrap_err();
        assert_eq!(err.corrective_action(), Some(crate::types::CorrectiveAction::ForceResync));
    }

    #[tokio::test]
    async fn test_seed_refresh() {
        let (c, transport) = client(vec![ok(r#"{"server_seed_hashed":"abc123"}"#), ok("{}")]);
        assert_eq!(c.refresh_server_seed().await.unwrap(), "abc123");
        assert_eq!(c.refresh_client_seed("myseed").await.unwrap(), "myseed");
        let sent = transport.sent();
        assert_eq!(sent[1].body.as_deref(), Some(r#"{"client_seed":"myseed"}"#));
    }

    #[test]
    fn test_transport_builds_with_bearer_prefix() {
        let token = SecretString::new("Bearer abc".to_string());
        assert!(ReqwestTransport::new(DEFAULT_BASE_URL, &token, Duration::from_secs(5)).is_ok());
        let bad = SecretString::new("bad\ntoken".to_string());
        assert!(ReqwestTransport::new(DEFAULT_BASE_URL, &bad, Duration::from_secs(5)).is_err());
    }
}
