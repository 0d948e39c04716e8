//! End-to-end session scenarios.

use rust_decimal_macros::dec;
use std::time::Duration;

use wagerbot::config::{AppConfig, Settings};
use wagerbot::engine::session::SessionController;
use wagerbot::platforms::executor::RetryPolicy;
use wagerbot::platforms::wolfbet::WolfbetClient;
use wagerbot::platforms::DiceApi;
use wagerbot::types::*;

use crate::mock_api::{FakeWolfbet, MockDice};

use wagerbot::types::Outcome::{Loss, Win};

/// Settings with no inter-bet delay and no periodic balance refresh.
fn settings(extra: &str) -> Settings {
    let toml = format!("[bot]\ndelay_secs = 0.0\nbalance_refresh_every = 0\n{extra}");
    AppConfig::from_toml(&toml)
        .expect("test config parses")
        .into_settings()
        .expect("test config is valid")
}

// -- Progression --

#[tokio::test]
async fn test_martingale_wagers_reset_after_win() {
    let api = MockDice::new("trx", dec!(1), vec![Loss, Loss, Win]);
    let s = settings(
        "base_amount = 0.0001\nrule = \"under\"\nbet_value = 49.99\n\
         [stop]\nmax_bets = 3\n[strategy]\npreset = \"martingale\"\n\
         [strategy.presets]\nmartingale_multiplier = 2.0\n",
    );
    let mut controller = SessionController::new(api.clone(), s).unwrap();

    let summaries = controller.run().await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].reason, HaltReason::Stop(StopReason::MaxBets));

    assert_eq!(api.amounts(), vec![dec!(0.0001), dec!(0.0002), dec!(0.0004)]);
    assert_eq!(controller.state().current_amount, dec!(0.0001));
    assert!(api.orders().iter().all(|o| o.rule == Rule::Under));
}

#[tokio::test]
async fn test_fibonacci_wagers_follow_sequence() {
    let api = MockDice::new("trx", dec!(10), vec![Loss; 5]);
    let s = settings(
        "base_amount = 0.001\n[stop]\nmax_bets = 6\n[strategy]\npreset = \"fibonacci\"\n",
    );
    let mut controller = SessionController::new(api.clone(), s).unwrap();
    controller.run().await;

    assert_eq!(
        api.amounts(),
        vec![
            dec!(0.001),
            dec!(0.001),
            dec!(0.002),
            dec!(0.003),
            dec!(0.005),
            dec!(0.008)
        ]
    );
}

#[tokio::test]
async fn test_premium_daily_target_halts_session() {
    let api = MockDice::new("trx", dec!(1), vec![Win; 20]);
    let s = settings("base_amount = 0.01\n[strategy]\npreset = \"premium\"\n");
    let mut controller = SessionController::new(api.clone(), s).unwrap();

    let summaries = controller.run().await;
    let summary = &summaries[0];
    assert_eq!(summary.reason, HaltReason::Stop(StopReason::PremiumDailyTarget));
    // 0.01 * 0.98 per win against a 10% target on a balance of 1.
    assert_eq!(summary.bets, 11);
    assert_eq!(summary.total_profit, dec!(0.1078));
}

// -- Stop conditions --

#[tokio::test]
async fn test_max_bets_takes_precedence_over_stop_loss() {
    let api = MockDice::new("trx", dec!(1), vec![Loss, Loss]);
    let s = settings("[stop]\nmax_bets = 2\nstop_loss = 0.0002\n");
    let mut controller = SessionController::new(api.clone(), s).unwrap();

    let summaries = controller.run().await;
    assert_eq!(summaries[0].total_profit, dec!(-0.0003));
    assert_eq!(summaries[0].reason, HaltReason::Stop(StopReason::MaxBets));
}

#[tokio::test]
async fn test_max_consecutive_losses() {
    let api = MockDice::new("trx", dec!(1), vec![Win, Loss, Loss, Loss]);
    let s = settings("[stop]\nmax_consecutive_losses = 3\n");
    let mut controller = SessionController::new(api.clone(), s).unwrap();

    let summaries = controller.run().await;
    assert_eq!(
        summaries[0].reason,
        HaltReason::Stop(StopReason::MaxConsecutiveLosses)
    );
    assert_eq!(summaries[0].bets, 4);
}

// -- Balance --

#[tokio::test]
async fn test_hybrid_balance_follows_reported_value() {
    let api = MockDice::new("trx", dec!(1), vec![Win, Loss, Loss]).reporting_balance();
    let s = settings("[stop]\nmax_bets = 3\n");
    let mut controller = SessionController::new(api.clone(), s).unwrap();
    let summaries = controller.run().await;

    let summary = &summaries[0];
    assert_eq!(summary.balance_source, BalanceSource::Api);
    assert_eq!(summary.final_balance, api.balance());
    assert_eq!(summary.estimated_balance, api.balance());
    assert_eq!(summary.start_balance, dec!(1));
}

#[tokio::test]
async fn test_estimated_balance_without_reports() {
    let api = MockDice::new("trx", dec!(1), vec![Win, Loss]);
    let s = settings("[stop]\nmax_bets = 2\n");
    let mut controller = SessionController::new(api.clone(), s).unwrap();
    let summaries = controller.run().await;

    let summary = &summaries[0];
    assert_eq!(summary.balance_source, BalanceSource::Estimated);
    assert_eq!(summary.final_balance, dec!(1) + summary.total_profit);
    assert_eq!(summary.final_balance, api.balance());
}

// -- API errors --

#[tokio::test]
async fn test_transient_api_errors_are_absorbed() {
    let api = MockDice::new("trx", dec!(1), vec![Win]);
    api.push_error(ApiError::Network {
        attempts: 4,
        message: "connection reset".to_string(),
    });
    api.push_error(ApiError::Http {
        status: 422,
        message: "Amount scale is too high".to_string(),
    });
    let s = settings("[stop]\nmax_bets = 1\n");
    let mut controller = SessionController::new(api.clone(), s).unwrap();

    let summaries = controller.run().await;
    assert_eq!(summaries[0].reason, HaltReason::Stop(StopReason::MaxBets));
    assert_eq!(controller.state().api_error_count, 0);
    assert_eq!(api.orders().len(), 1);
}

#[tokio::test]
async fn test_api_error_limit_halts_session() {
    let api = MockDice::new("trx", dec!(1), vec![]);
    for _ in 0..3 {
        api.push_error(ApiError::RateLimited { attempts: 4 });
    }
    let s = settings("max_api_errors = 2\n");
    let mut controller = SessionController::new(api.clone(), s).unwrap();

    let summaries = controller.run().await;
    assert_eq!(summaries[0].reason, HaltReason::ApiErrorLimit);
    assert_eq!(summaries[0].bets, 0);
    assert!(api.orders().is_empty());
}

#[tokio::test]
async fn test_unknown_currency_fails_start() {
    let api = MockDice::new("btc", dec!(1), vec![]);
    let s = settings("currency = \"doge\"\n");
    let mut controller = SessionController::new(api.clone(), s).unwrap();

    let summaries = controller.run().await;
    assert_eq!(summaries.len(), 1);
    match &summaries[0].reason {
        HaltReason::StartFailed(msg) => {
            assert!(msg.contains("doge"));
            assert!(msg.contains("btc"));
        }
        other => panic!("unexpected halt: {other:?}"),
    }
}

// -- Replay --

#[tokio::test]
async fn test_replay_after_stop_loss_refetches_balance() {
    let api = MockDice::new("trx", dec!(1), vec![Loss, Loss]);
    let s = settings(
        "[stop]\nstop_loss = 0.0001\n\
         [replay]\non_stop_loss = true\nafter_secs = 0\ncount = 1\n",
    );
    let mut controller = SessionController::new(api.clone(), s).unwrap();

    let summaries = controller.run().await;
    assert_eq!(summaries.len(), 2);
    for summary in &summaries {
        assert_eq!(summary.reason, HaltReason::Stop(StopReason::StopLoss));
        assert_eq!(summary.bets, 1);
    }
    assert_eq!(summaries[1].start_balance, summaries[0].final_balance);
    assert_eq!(api.amounts(), vec![dec!(0.0001), dec!(0.0001)]);
}

#[tokio::test]
async fn test_cancelled_run_stops_betting_and_reports_interrupted() {
    let api = MockDice::new("trx", dec!(1), vec![]);
    let toml = "[bot]\ndelay_secs = 0.02\nbalance_refresh_every = 0\n\
                [strategy]\npreset = \"flat\"\n\
                [replay]\non_stop_loss = true\nafter_secs = 0\ncount = 3\n";
    let s = AppConfig::from_toml(toml).unwrap().into_settings().unwrap();
    let mut controller = SessionController::new(api.clone(), s).unwrap();

    let cancelled = tokio::time::timeout(Duration::from_millis(150), controller.run()).await;
    assert!(cancelled.is_err());

    let placed = api.orders().len();
    assert!(placed > 0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(api.orders().len(), placed);

    let summary = controller.summary(HaltReason::Interrupted);
    assert_eq!(summary.reason, HaltReason::Interrupted);
    assert!(!summary.reason.is_stop_loss());
    assert!(!summary.reason.is_take_profit());
    assert_eq!(summary.bets as usize, placed);
    assert_eq!(summary.start_balance, dec!(1));
}

// -- Wolfbet client over a fake HTTP endpoint --

#[tokio::test]
async fn test_session_over_wolfbet_client() {
    let server = FakeWolfbet::new(dec!(2), vec![Loss, Win]);
    let client = WolfbetClient::new(server.clone(), RetryPolicy::immediate(1));
    let s = settings("[stop]\nmax_bets = 2\n[strategy]\npreset = \"martingale\"\n");
    let mut controller = SessionController::new(client, s).unwrap();

    let summaries = controller.run().await;
    let summary = &summaries[0];
    assert_eq!(summary.reason, HaltReason::Stop(StopReason::MaxBets));
    assert_eq!(summary.wins, 1);
    assert_eq!(summary.losses, 1);
    // -0.0001 then +0.0002 * 0.98
    assert_eq!(summary.total_profit, dec!(0.000096));
    assert_eq!(summary.balance_source, BalanceSource::Api);

    let bodies = server.bet_bodies();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["currency"], "trx");
    assert_eq!(bodies[0]["game"], "dice");
    assert_eq!(bodies[0]["rule"], "under");
    assert_eq!(bodies[0]["bet_value"].as_f64(), Some(50.0));
    assert_eq!(bodies[0]["multiplier"].as_f64(), Some(1.98));
    assert_eq!(bodies[1]["amount"].as_f64(), Some(0.0002));
}

#[test]
fn test_wolfbet_balance_lookup() {
    let server = FakeWolfbet::new(dec!(3.5), vec![]);
    let client = WolfbetClient::new(server.clone(), RetryPolicy::immediate(0));

    let balance = tokio_test::block_on(client.get_balance("TRX"));
    assert_eq!(balance, Ok(dec!(3.5)));

    let missing = tokio_test::block_on(client.get_balance("eth"));
    assert_eq!(
        missing,
        Err(ApiError::CurrencyNotFound {
            currency: "eth".to_string(),
            available: vec!["btc".to_string(), "trx".to_string()],
        })
    );
    assert!(server.requests().iter().all(|r| r.path == "/user/balances"));
}
