//! WAGERBOT: automated dice wager progression engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! connects to the dice API and runs betting sessions until a stop
//! condition without replay, or Ctrl+C.

use anyhow::{Context, Result};
use secrecy::SecretString;
use tracing::{info, warn};

use wagerbot::config::AppConfig;
use wagerbot::engine::session::SessionController;
use wagerbot::platforms::wolfbet::WolfbetClient;
use wagerbot::types::HaltReason;

const BANNER: &str = r#"
__        ___    ____ _____ ____  ____   ___ _____
\ \      / / \  / ___| ____|  _ \| __ ) / _ \_   _|
 \ \ /\ / / _ \| |  _|  _| | |_) |  _ \| | | || |
  \ V  V / ___ \ |_| | |___|  _ <| |_) | |_| || |
   \_/\_/_/   \_\____|_____|_| \_\____/ \___/ |_|

  Dice wager progression engine
"#;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();
    println!("{BANNER}");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let cfg = AppConfig::load(&config_path)?;
    let settings = cfg
        .into_settings()
        .with_context(|| format!("Invalid configuration in {config_path}"))?;

    info!(
        config = %config_path,
        currency = %settings.currency,
        base_amount = %settings.base_amount,
        preset = settings.plan.name(),
        balance_mode = ?settings.balance_mode,
        "WAGERBOT starting up"
    );

    let token = SecretString::new(AppConfig::resolve_env(&settings.api.token_env)?);
    let client = WolfbetClient::connect(
        &settings.api.base_url,
        &token,
        settings.api.timeout,
        settings.api.retry.clone(),
    )?;

    let mut controller = SessionController::new(client, settings)?;

    info!("Entering betting loop. Press Ctrl+C to stop.");
    let interrupted = tokio::select! {
        summaries = controller.run() => {
            info!(sessions = summaries.len(), "All sessions finished");
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };

    if interrupted {
        warn!("Shutdown signal received.");
        let summary = controller.summary(HaltReason::Interrupted);
        info!(%summary, "Session interrupted");
    }

    info!("WAGERBOT shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wagerbot=info"));

    let json_logging = std::env::var("WAGERBOT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
