//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into plain serde structs where every
//! field has a default. [`AppConfig::into_settings`] then validates the
//! numeric invariants once and produces the immutable [`Settings`] the
//! engine is built from. The API token is referenced by env-var name and
//! resolved at runtime.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::time::Duration;
use tracing::warn;

use crate::engine::balance::BalanceSyncMode;
use crate::engine::pair_sync::{LastSyncedPair, PairSynchronizer, SyncPolicy, CHANCE_CEILING};
use crate::engine::stop::StopLimits;
use crate::engine::variation::RandomChance;
use crate::platforms::executor::RetryPolicy;
use crate::platforms::wolfbet::DEFAULT_BASE_URL;
use crate::strategy::scaling::{Cooldown, Ladder};
use crate::strategy::{
    canonical_preset_name, normalize_amount, CustomPlan, CustomReaction, PremiumParams, Preset,
    StakingPlan,
};
use crate::types::{BetPair, BotError, Rule};

const MAX_PRECISION: u32 = 8;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub bot: BotConfig,
    pub stop: StopConfig,
    pub strategy: StrategyConfig,
    pub variation: VariationConfig,
    pub replay: ReplayConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API token.
    pub token_env: String,
    pub timeout_secs: u64,
    pub retry_count: u32,
    pub rate_limit_wait_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_env: "WOLFBET_API_TOKEN".to_string(),
            timeout_secs: 20,
            retry_count: 3,
            rate_limit_wait_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BotConfig {
    pub currency: String,
    pub rule: String,
    pub base_amount: Decimal,
    pub bet_value: Decimal,
    pub multiplier: Decimal,
    pub auto_multiplier: bool,
    pub sync_mode: String,
    pub sync_fallback_mode: String,
    pub multiplier_precision: u32,
    pub bet_value_precision: u32,
    /// Pair persisted by the previous run; zero means unknown.
    pub last_synced_multiplier: Decimal,
    pub last_synced_bet_value: Decimal,
    pub delay_secs: f64,
    pub continue_on_api_error: bool,
    pub max_api_errors: u32,
    pub refresh_server_seed_every: u64,
    pub refresh_client_seed_every: u64,
    pub coin_decimal_places: u32,
    pub balance_sync_mode: String,
    pub balance_refresh_every: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            currency: "trx".to_string(),
            rule: "under".to_string(),
            base_amount: dec!(0.0001),
            bet_value: dec!(49.99),
            multiplier: dec!(1.98),
            auto_multiplier: false,
            sync_mode: "auto".to_string(),
            sync_fallback_mode: "lock_multiplier".to_string(),
            multiplier_precision: 4,
            bet_value_precision: 2,
            last_synced_multiplier: Decimal::ZERO,
            last_synced_bet_value: Decimal::ZERO,
            delay_secs: 1.0,
            continue_on_api_error: true,
            max_api_errors: 5,
            refresh_server_seed_every: 0,
            refresh_client_seed_every: 0,
            coin_decimal_places: 8,
            balance_sync_mode: "hybrid".to_string(),
            balance_refresh_every: 20,
        }
    }
}

/// Session stop thresholds. Zero disables a rule.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StopConfig {
    pub max_bets: u64,
    pub target_profit: Decimal,
    pub stop_loss: Decimal,
    pub balance_floor: Decimal,
    pub max_amount: Decimal,
    pub max_consecutive_losses: u32,
    pub max_consecutive_wins: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StrategyConfig {
    /// Preset name; empty or `custom` selects the on_win/on_loss rules.
    pub preset: String,
    pub switch_rule_on_win: bool,
    pub switch_rule_on_loss: bool,
    pub on_win: ReactionConfig,
    pub on_loss: ReactionConfig,
    pub presets: PresetsConfig,
}

/// Custom-mode reaction to one outcome. Unset fields take the side's
/// default: a win resets to base, a loss doubles.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ReactionConfig {
    pub reset_to_base: Option<bool>,
    pub amount_multiplier: Option<Decimal>,
    pub amount_addition: Option<Decimal>,
}

/// Parameters for every preset, flat so a config file only lists the
/// values it overrides.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PresetsConfig {
    pub martingale_multiplier: Decimal,
    pub fibonacci_unit: Decimal,
    pub fibonacci_step_back_on_win: u32,
    pub paroli_multiplier: Decimal,
    pub paroli_max_win_streak: u32,
    pub dalembert_step: Decimal,

    pub mining_loss_multiplier: Decimal,
    pub mining_max_steps: u32,
    pub mining_recovery_steps_on_win: u32,
    pub mining_max_scale: Decimal,
    pub mining_shield_after_losses: u32,
    pub mining_shield_rounds: u32,

    pub mining_v2_loss_multiplier: Decimal,
    pub mining_v2_max_steps: u32,
    pub mining_v2_recovery_steps_on_win: u32,
    pub mining_v2_max_scale: Decimal,
    pub mining_v2_cooldown_trigger_losses: u32,
    pub mining_v2_cooldown_rounds: u32,

    pub pro_safe_loss_multiplier: Decimal,
    pub pro_safe_max_steps: u32,
    pub pro_safe_recovery_steps_on_win: u32,
    pub pro_safe_max_scale: Decimal,

    pub pro_recovery_loss_multiplier: Decimal,
    pub pro_recovery_max_steps: u32,
    pub pro_recovery_recovery_steps_on_win: u32,
    pub pro_recovery_max_scale: Decimal,
    pub pro_recovery_cooldown_trigger_losses: u32,
    pub pro_recovery_cooldown_rounds: u32,

    pub pro_scalper_win_multiplier: Decimal,
    pub pro_scalper_max_win_streak: u32,

    pub premium_guard_loss_multiplier: Decimal,
    pub premium_guard_max_steps: u32,
    pub premium_guard_max_scale: Decimal,
    pub premium_guard_risk_percent: Decimal,
    pub premium_guard_cooldown_trigger_losses: u32,
    pub premium_guard_cooldown_rounds: u32,

    pub premium_compound_loss_multiplier: Decimal,
    pub premium_compound_max_steps: u32,
    pub premium_compound_recovery_steps_on_win: u32,
    pub premium_compound_max_scale: Decimal,
    pub premium_compound_profit_boost_percent: Decimal,

    pub premium_daily_target_percent: Decimal,
    pub premium_stop_loss_percent: Decimal,
    pub premium_risk_percent: Decimal,
    pub premium_max_risk_percent: Decimal,
    pub premium_loss_multiplier: Decimal,
    pub premium_max_steps: u32,
    pub premium_recovery_steps_on_win: u32,
    pub premium_max_scale: Decimal,
    pub premium_cooldown_trigger_losses: u32,
    pub premium_cooldown_rounds: u32,
}

impl Default for PresetsConfig {
    fn default() -> Self {
        Self {
            martingale_multiplier: dec!(2.0),
            fibonacci_unit: dec!(1.0),
            fibonacci_step_back_on_win: 2,
            paroli_multiplier: dec!(2.0),
            paroli_max_win_streak: 3,
            dalembert_step: dec!(1.0),

            mining_loss_multiplier: dec!(1.08),
            mining_max_steps: 8,
            mining_recovery_steps_on_win: 2,
            mining_max_scale: dec!(2.0),
            mining_shield_after_losses: 5,
            mining_shield_rounds: 2,

            mining_v2_loss_multiplier: dec!(1.03),
            mining_v2_max_steps: 6,
            mining_v2_recovery_steps_on_win: 3,
            mining_v2_max_scale: dec!(1.50),
            mining_v2_cooldown_trigger_losses: 4,
            mining_v2_cooldown_rounds: 2,

            pro_safe_loss_multiplier: dec!(1.02),
            pro_safe_max_steps: 5,
            pro_safe_recovery_steps_on_win: 2,
            pro_safe_max_scale: dec!(1.25),

            pro_recovery_loss_multiplier: dec!(1.06),
            pro_recovery_max_steps: 6,
            pro_recovery_recovery_steps_on_win: 1,
            pro_recovery_max_scale: dec!(2.0),
            pro_recovery_cooldown_trigger_losses: 4,
            pro_recovery_cooldown_rounds: 2,

            pro_scalper_win_multiplier: dec!(1.35),
            pro_scalper_max_win_streak: 3,

            premium_guard_loss_multiplier: dec!(1.04),
            premium_guard_max_steps: 5,
            premium_guard_max_scale: dec!(1.40),
            premium_guard_risk_percent: dec!(0.03),
            premium_guard_cooldown_trigger_losses: 4,
            premium_guard_cooldown_rounds: 2,

            premium_compound_loss_multiplier: dec!(1.03),
            premium_compound_max_steps: 5,
            premium_compound_recovery_steps_on_win: 2,
            premium_compound_max_scale: dec!(1.60),
            premium_compound_profit_boost_percent: dec!(15.0),

            premium_daily_target_percent: dec!(10),
            premium_stop_loss_percent: dec!(5),
            premium_risk_percent: dec!(0.05),
            premium_max_risk_percent: dec!(0.25),
            premium_loss_multiplier: dec!(1.06),
            premium_max_steps: 5,
            premium_recovery_steps_on_win: 2,
            premium_max_scale: dec!(1.35),
            premium_cooldown_trigger_losses: 4,
            premium_cooldown_rounds: 2,
        }
    }
}

/// Per-bet randomization of the rule and the win chance.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VariationConfig {
    pub randomize_rule: bool,
    pub random_chance: bool,
    pub chance_min: Decimal,
    pub chance_max: Decimal,
    pub chance_precision: u32,
}

impl Default for VariationConfig {
    fn default() -> Self {
        Self {
            randomize_rule: false,
            random_chance: false,
            chance_min: dec!(40),
            chance_max: dec!(60),
            chance_precision: 2,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReplayConfig {
    pub on_take_profit: bool,
    pub on_stop_loss: bool,
    pub after_secs: u64,
    pub count: u32,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            on_take_profit: false,
            on_stop_loss: false,
            after_secs: 5,
            count: 0,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Used for the API token referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Validate everything and build the engine settings.
    pub fn into_settings(&self) -> Result<Settings, BotError> {
        let bot = &self.bot;

        let currency = bot.currency.trim().to_lowercase();
        ensure(!currency.is_empty(), "bot.currency must not be empty")?;

        ensure(
            bot.coin_decimal_places <= MAX_PRECISION,
            "bot.coin_decimal_places must be 0-8",
        )?;
        ensure(bot.base_amount > Decimal::ZERO, "bot.base_amount must be > 0")?;
        let base_amount = normalize_amount(bot.base_amount, bot.coin_decimal_places);
        if base_amount != bot.base_amount {
            warn!(
                configured = %bot.base_amount,
                normalized = %base_amount,
                places = bot.coin_decimal_places,
                "Base amount adjusted to coin decimal places"
            );
        }

        ensure(
            bot.bet_value > Decimal::ZERO && bot.bet_value < CHANCE_CEILING,
            "bot.bet_value must be > 0 and < 99.99",
        )?;
        ensure(
            bot.multiplier_precision <= MAX_PRECISION,
            "bot.multiplier_precision must be 0-8",
        )?;
        ensure(
            bot.bet_value_precision <= MAX_PRECISION,
            "bot.bet_value_precision must be 0-8",
        )?;

        let rule: Rule = bot.rule.parse()?;
        let requested: SyncPolicy = bot.sync_mode.parse()?;
        let fallback: SyncPolicy = bot.sync_fallback_mode.parse()?;
        ensure(
            fallback != SyncPolicy::Auto,
            "bot.sync_fallback_mode must be lock_multiplier, lock_bet_value or none",
        )?;
        if !bot.auto_multiplier
            && matches!(requested, SyncPolicy::LockMultiplier | SyncPolicy::None)
        {
            ensure(
                bot.multiplier > Decimal::ONE,
                "bot.multiplier must be > 1 when the multiplier is not derived from bet_value",
            )?;
        }

        ensure(
            bot.delay_secs.is_finite() && bot.delay_secs >= 0.0,
            "bot.delay_secs must be >= 0",
        )?;
        let delay = Duration::try_from_secs_f64(bot.delay_secs)
            .map_err(|e| BotError::Config(format!("bot.delay_secs is out of range: {e}")))?;

        let pair = BetPair {
            rule,
            multiplier: bot.multiplier,
            bet_value: bot.bet_value,
            multiplier_precision: bot.multiplier_precision,
            bet_value_precision: bot.bet_value_precision,
        };
        let last = (bot.last_synced_multiplier > Decimal::ZERO
            && bot.last_synced_bet_value > Decimal::ZERO)
            .then_some(LastSyncedPair {
                multiplier: bot.last_synced_multiplier,
                bet_value: bot.last_synced_bet_value,
            });
        let sync = SyncSettings {
            requested,
            fallback,
            auto_multiplier: bot.auto_multiplier,
            last,
        };
        // Reject a pair that cannot be synchronized before any bet is sent.
        sync.synchronizer(&pair).sync(&pair)?;

        let balance_mode: BalanceSyncMode = bot.balance_sync_mode.parse()?;

        let api = ApiSettings {
            base_url: self.api.base_url.trim_end_matches('/').to_string(),
            token_env: self.api.token_env.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs.max(1)),
            retry: RetryPolicy {
                retry_count: self.api.retry_count,
                rate_limit_wait: Duration::from_secs(self.api.rate_limit_wait_secs),
                ..RetryPolicy::default()
            },
        };

        let stop = &self.stop;
        for (name, value) in [
            ("stop.target_profit", stop.target_profit),
            ("stop.stop_loss", stop.stop_loss),
            ("stop.balance_floor", stop.balance_floor),
            ("stop.max_amount", stop.max_amount),
        ] {
            ensure(value >= Decimal::ZERO, &format!("{name} must be >= 0"))?;
        }
        let limits = StopLimits {
            max_bets: stop.max_bets,
            target_profit: stop.target_profit,
            stop_loss: stop.stop_loss,
            balance_floor: stop.balance_floor,
            max_consecutive_losses: stop.max_consecutive_losses,
            max_consecutive_wins: stop.max_consecutive_wins,
            max_amount: stop.max_amount,
            ..StopLimits::default()
        };

        let plan = self.strategy.staking_plan()?;

        let v = &self.variation;
        let random_chance = if v.random_chance {
            ensure(
                v.chance_min > Decimal::ZERO && v.chance_min < CHANCE_CEILING,
                "variation.chance_min must be > 0 and < 99.99",
            )?;
            ensure(
                v.chance_max > Decimal::ZERO && v.chance_max < CHANCE_CEILING,
                "variation.chance_max must be > 0 and < 99.99",
            )?;
            ensure(
                v.chance_min <= v.chance_max,
                "variation.chance_min must be <= variation.chance_max",
            )?;
            ensure(
                v.chance_precision <= MAX_PRECISION,
                "variation.chance_precision must be 0-8",
            )?;
            Some(RandomChance {
                min: v.chance_min,
                max: v.chance_max,
                precision: v.chance_precision,
            })
        } else {
            None
        };

        Ok(Settings {
            api,
            currency,
            base_amount,
            pair,
            sync,
            coin_places: bot.coin_decimal_places,
            delay,
            continue_on_api_error: bot.continue_on_api_error,
            max_api_errors: bot.max_api_errors,
            refresh_server_seed_every: bot.refresh_server_seed_every,
            refresh_client_seed_every: bot.refresh_client_seed_every,
            balance_mode,
            balance_refresh_every: bot.balance_refresh_every,
            limits,
            plan,
            switch_rule_on_win: self.strategy.switch_rule_on_win,
            switch_rule_on_loss: self.strategy.switch_rule_on_loss,
            randomize_rule: v.randomize_rule,
            random_chance,
            replay: ReplaySettings {
                on_take_profit: self.replay.on_take_profit,
                on_stop_loss: self.replay.on_stop_loss,
                after: Duration::from_secs(self.replay.after_secs),
                count: self.replay.count,
            },
        })
    }
}

impl StrategyConfig {
    /// Resolve the selected preset, or custom mode, with validated parameters.
    pub fn staking_plan(&self) -> Result<StakingPlan, BotError> {
        let Some(name) = canonical_preset_name(&self.preset)? else {
            let on_win = self.on_win.reaction(
                "on_win",
                CustomReaction {
                    reset_to_base: true,
                    multiplier: Decimal::ONE,
                    addition: Decimal::ZERO,
                },
            )?;
            let on_loss = self.on_loss.reaction(
                "on_loss",
                CustomReaction {
                    reset_to_base: false,
                    multiplier: dec!(2),
                    addition: Decimal::ZERO,
                },
            )?;
            return Ok(StakingPlan::Custom(CustomPlan { on_win, on_loss }));
        };

        let p = &self.presets;
        let preset = match name {
            "flat" => Preset::Flat,
            "martingale" => {
                positive("martingale_multiplier", p.martingale_multiplier)?;
                Preset::Martingale {
                    multiplier: p.martingale_multiplier,
                }
            }
            "fibonacci" => {
                positive("fibonacci_unit", p.fibonacci_unit)?;
                Preset::Fibonacci {
                    unit: p.fibonacci_unit,
                    step_back_on_win: p.fibonacci_step_back_on_win,
                }
            }
            "paroli" | "anti_martingale" => {
                positive("paroli_multiplier", p.paroli_multiplier)?;
                ensure(
                    p.paroli_max_win_streak >= 1,
                    "strategy.presets.paroli_max_win_streak must be >= 1",
                )?;
                if name == "paroli" {
                    Preset::Paroli {
                        multiplier: p.paroli_multiplier,
                        max_win_streak: p.paroli_max_win_streak,
                    }
                } else {
                    Preset::AntiMartingale {
                        multiplier: p.paroli_multiplier,
                        max_win_streak: p.paroli_max_win_streak,
                    }
                }
            }
            "dalembert" => {
                positive("dalembert_step", p.dalembert_step)?;
                Preset::Dalembert {
                    step: p.dalembert_step,
                }
            }
            "mining" => Preset::Mining {
                ladder: ladder(
                    "mining",
                    p.mining_loss_multiplier,
                    p.mining_max_steps,
                    p.mining_recovery_steps_on_win,
                    p.mining_max_scale,
                )?,
                shield: Cooldown {
                    trigger_losses: p.mining_shield_after_losses,
                    rounds: p.mining_shield_rounds,
                },
            },
            "mining_v2" => Preset::MiningV2 {
                ladder: ladder(
                    "mining_v2",
                    p.mining_v2_loss_multiplier,
                    p.mining_v2_max_steps,
                    p.mining_v2_recovery_steps_on_win,
                    p.mining_v2_max_scale,
                )?,
                cooldown: Cooldown {
                    trigger_losses: p.mining_v2_cooldown_trigger_losses,
                    rounds: p.mining_v2_cooldown_rounds,
                },
            },
            "pro_safe" => Preset::ProSafe {
                ladder: ladder(
                    "pro_safe",
                    p.pro_safe_loss_multiplier,
                    p.pro_safe_max_steps,
                    p.pro_safe_recovery_steps_on_win,
                    p.pro_safe_max_scale,
                )?,
            },
            "pro_recovery" => Preset::ProRecovery {
                ladder: ladder(
                    "pro_recovery",
                    p.pro_recovery_loss_multiplier,
                    p.pro_recovery_max_steps,
                    p.pro_recovery_recovery_steps_on_win,
                    p.pro_recovery_max_scale,
                )?,
                cooldown: Cooldown {
                    trigger_losses: p.pro_recovery_cooldown_trigger_losses,
                    rounds: p.pro_recovery_cooldown_rounds,
                },
            },
            "pro_scalper" => {
                ensure(
                    p.pro_scalper_win_multiplier > Decimal::ONE,
                    "strategy.presets.pro_scalper_win_multiplier must be > 1",
                )?;
                ensure(
                    p.pro_scalper_max_win_streak >= 1,
                    "strategy.presets.pro_scalper_max_win_streak must be >= 1",
                )?;
                Preset::ProScalper {
                    win_multiplier: p.pro_scalper_win_multiplier,
                    max_win_streak: p.pro_scalper_max_win_streak,
                }
            }
            "premium_guard" => {
                positive("premium_guard_risk_percent", p.premium_guard_risk_percent)?;
                Preset::PremiumGuard {
                    ladder: ladder(
                        "premium_guard",
                        p.premium_guard_loss_multiplier,
                        p.premium_guard_max_steps,
                        1,
                        p.premium_guard_max_scale,
                    )?,
                    cooldown: Cooldown {
                        trigger_losses: p.premium_guard_cooldown_trigger_losses,
                        rounds: p.premium_guard_cooldown_rounds,
                    },
                    risk_percent: p.premium_guard_risk_percent,
                }
            }
            "premium_compound" => {
                ensure(
                    p.premium_compound_profit_boost_percent >= Decimal::ZERO,
                    "strategy.presets.premium_compound_profit_boost_percent must be >= 0",
                )?;
                Preset::PremiumCompound {
                    ladder: ladder(
                        "premium_compound",
                        p.premium_compound_loss_multiplier,
                        p.premium_compound_max_steps,
                        p.premium_compound_recovery_steps_on_win,
                        p.premium_compound_max_scale,
                    )?,
                    profit_boost_percent: p.premium_compound_profit_boost_percent,
                }
            }
            "premium" => {
                positive("premium_risk_percent", p.premium_risk_percent)?;
                positive("premium_max_risk_percent", p.premium_max_risk_percent)?;
                ensure(
                    p.premium_max_risk_percent >= p.premium_risk_percent,
                    "strategy.presets.premium_max_risk_percent must be >= premium_risk_percent",
                )?;
                ensure(
                    p.premium_daily_target_percent >= Decimal::ZERO,
                    "strategy.presets.premium_daily_target_percent must be >= 0",
                )?;
                ensure(
                    p.premium_stop_loss_percent >= Decimal::ZERO,
                    "strategy.presets.premium_stop_loss_percent must be >= 0",
                )?;
                Preset::Premium(PremiumParams {
                    ladder: ladder(
                        "premium",
                        p.premium_loss_multiplier,
                        p.premium_max_steps,
                        p.premium_recovery_steps_on_win,
                        p.premium_max_scale,
                    )?,
                    cooldown: Cooldown {
                        trigger_losses: p.premium_cooldown_trigger_losses,
                        rounds: p.premium_cooldown_rounds,
                    },
                    risk_percent: p.premium_risk_percent,
                    max_risk_percent: p.premium_max_risk_percent,
                    daily_target_percent: p.premium_daily_target_percent,
                    stop_loss_percent: p.premium_stop_loss_percent,
                })
            }
            other => {
                return Err(BotError::Config(format!("Preset '{other}' is not available")));
            }
        };
        Ok(StakingPlan::Preset(preset))
    }
}

impl ReactionConfig {
    fn reaction(&self, side: &str, default: CustomReaction) -> Result<CustomReaction, BotError> {
        let reaction = CustomReaction {
            reset_to_base: self.reset_to_base.unwrap_or(default.reset_to_base),
            multiplier: self.amount_multiplier.unwrap_or(default.multiplier),
            addition: self.amount_addition.unwrap_or(default.addition),
        };
        ensure(
            reaction.multiplier >= Decimal::ZERO,
            &format!("strategy.{side}.amount_multiplier must be >= 0"),
        )?;
        Ok(reaction)
    }
}

fn ensure(condition: bool, message: &str) -> Result<(), BotError> {
    if condition {
        Ok(())
    } else {
        Err(BotError::Config(message.to_string()))
    }
}

fn positive(field: &str, value: Decimal) -> Result<(), BotError> {
    ensure(
        value > Decimal::ZERO,
        &format!("strategy.presets.{field} must be > 0"),
    )
}

fn ladder(
    prefix: &str,
    loss_multiplier: Decimal,
    max_steps: u32,
    recovery_steps_on_win: u32,
    max_scale: Decimal,
) -> Result<Ladder, BotError> {
    ensure(
        loss_multiplier >= Decimal::ONE,
        &format!("strategy.presets.{prefix}_loss_multiplier must be >= 1"),
    )?;
    ensure(
        max_scale >= Decimal::ONE,
        &format!("strategy.presets.{prefix}_max_scale must be >= 1"),
    )?;
    Ok(Ladder {
        loss_multiplier,
        max_steps,
        recovery_steps_on_win,
        max_scale,
    })
}

// ---------------------------------------------------------------------------
// Validated settings
// ---------------------------------------------------------------------------

/// Immutable, validated settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    /// Lowercase currency code.
    pub currency: String,
    /// Base wager, already quantized to `coin_places`.
    pub base_amount: Decimal,
    /// Configured pair before synchronization.
    pub pair: BetPair,
    pub sync: SyncSettings,
    pub coin_places: u32,
    pub delay: Duration,
    pub continue_on_api_error: bool,
    pub max_api_errors: u32,
    pub refresh_server_seed_every: u64,
    pub refresh_client_seed_every: u64,
    pub balance_mode: BalanceSyncMode,
    pub balance_refresh_every: u64,
    pub limits: StopLimits,
    pub plan: StakingPlan,
    pub switch_rule_on_win: bool,
    pub switch_rule_on_loss: bool,
    pub randomize_rule: bool,
    pub random_chance: Option<RandomChance>,
    pub replay: ReplaySettings,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub token_env: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// Inputs for resolving the synchronization policy.
#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub requested: SyncPolicy,
    pub fallback: SyncPolicy,
    pub auto_multiplier: bool,
    pub last: Option<LastSyncedPair>,
}

impl SyncSettings {
    pub fn synchronizer(&self, configured: &BetPair) -> PairSynchronizer {
        PairSynchronizer::new(
            self.requested,
            self.fallback,
            self.auto_multiplier,
            configured,
            self.last,
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReplaySettings {
    pub on_take_profit: bool,
    pub on_stop_loss: bool,
    pub after: Duration,
    /// Maximum replays per run. 0 disables.
    pub count: u32,
}
