//! Session controller.
//!
//! Drives one betting loop at a time: check stops, vary and synchronize
//! the pair, place the bet, reconcile the balance, advance the staking
//! preset, repeat. Sessions that end on a take-profit or stop-loss reason
//! may be replayed with fresh counters.

use tokio::time::sleep;
use tracing::{error, info, warn};

use super::balance::BalanceReconciler;
use super::pair_sync::{synchronize, PairSynchronizer, SyncPolicy};
use super::stop::StopLimits;
use super::variation::PairVariation;
use crate::config::Settings;
use crate::platforms::DiceApi;
use crate::strategy::{normalize_amount, StakingEngine, StrategyContext};
use crate::types::{
    ApiError, BetOrder, BetPair, BotError, CorrectiveAction, HaltReason, Outcome, SessionState,
    SessionSummary,
};

pub struct SessionController<A> {
    api: A,
    settings: Settings,
    state: SessionState,
    /// Synchronized pair carried from bet to bet. Variation works on a copy.
    pair: BetPair,
    synchronizer: PairSynchronizer,
    staking: StakingEngine,
    reconciler: BalanceReconciler,
    variation: PairVariation,
    limits: StopLimits,
    replays: u32,
}

impl<A: DiceApi> SessionController<A> {
    /// Build a controller. Fails if the configured pair cannot be
    /// synchronized under the resolved policy.
    pub fn new(api: A, settings: Settings) -> Result<Self, BotError> {
        let synchronizer = settings.sync.synchronizer(&settings.pair);
        let pair = synchronizer.sync(&settings.pair)?;
        info!(
            policy = %synchronizer.policy(),
            pair = %pair,
            preset = settings.plan.name(),
            "Bet pair synchronized"
        );

        let variation = PairVariation::from_os_rng(
            settings.randomize_rule,
            settings.pair.rule,
            settings.random_chance.clone(),
        );

        Ok(Self {
            api,
            state: SessionState::new(settings.base_amount),
            pair,
            synchronizer,
            staking: StakingEngine::new(settings.plan.clone(), settings.coin_places),
            reconciler: BalanceReconciler::new(settings.balance_mode, settings.balance_refresh_every),
            variation,
            limits: settings.limits.clone(),
            replays: 0,
            settings,
        })
    }

    /// Replace the pair variation, e.g. with a seeded generator.
    pub fn with_variation(mut self, variation: PairVariation) -> Self {
        self.variation = variation;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn pair(&self) -> &BetPair {
        &self.pair
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        self.synchronizer.policy()
    }

    /// Summary of the current session, ending now.
    pub fn summary(&self, reason: HaltReason) -> SessionSummary {
        SessionSummary::from_state(&self.state, &self.settings.currency, reason)
    }

    /// Run sessions until one ends without qualifying for a replay.
    /// Returns one summary per session.
    pub async fn run(&mut self) -> Vec<SessionSummary> {
        let mut summaries = Vec::new();
        loop {
            let reason = self.run_session().await;
            let summary = self.summary(reason.clone());
            info!(
                reason = %summary.reason,
                bets = summary.bets,
                wins = summary.wins,
                losses = summary.losses,
                total_profit = %summary.total_profit,
                final_balance = %summary.final_balance,
                source = %summary.balance_source,
                duration_secs = summary.duration_secs(),
                "Session finished"
            );
            summaries.push(summary);

            if !self.should_replay(&reason) {
                break;
            }
            self.replays += 1;
            info!(
                replay = self.replays,
                of = self.settings.replay.count,
                after_secs = self.settings.replay.after.as_secs_f64(),
                "Replaying session"
            );
            sleep(self.settings.replay.after).await;
        }
        summaries
    }

    fn should_replay(&self, reason: &HaltReason) -> bool {
        let replay = &self.settings.replay;
        if replay.count == 0 || self.replays >= replay.count {
            return false;
        }
        (replay.on_take_profit && reason.is_take_profit())
            || (replay.on_stop_loss && reason.is_stop_loss())
    }

    /// One betting loop from a fresh start balance to a halt.
    pub async fn run_session(&mut self) -> HaltReason {
        if let Err(e) = self.start().await {
            error!(error = %e, "Could not start session");
            return HaltReason::StartFailed(e.to_string());
        }

        let currency = self.settings.currency.clone();
        let coin_places = self.settings.coin_places;

        loop {
            self.state.current_amount = normalize_amount(self.state.current_amount, coin_places);

            if let Some(reason) = self.limits.evaluate(&self.state) {
                warn!(
                    reason = %reason,
                    bets = self.state.bet_count,
                    amount = %self.state.current_amount,
                    balance = %self.state.current_balance,
                    total_profit = %self.state.total_profit,
                    "Stop condition reached"
                );
                return HaltReason::Stop(reason);
            }

            let pair = match self.next_pair() {
                Ok(p) => p,
                Err(e) => {
                    error!(error = %e, "Pair synchronization failed");
                    return HaltReason::SyncFailed(e.to_string());
                }
            };

            let order = BetOrder::new(&currency, self.state.current_amount, &pair);
            let receipt = match self.api.place_bet(&order).await {
                Ok(r) => r,
                Err(e) => {
                    if let Some(halt) = self.on_api_error(e) {
                        return halt;
                    }
                    sleep(self.settings.delay).await;
                    continue;
                }
            };
            self.state.api_error_count = 0;

            self.state.record_outcome(receipt.outcome, receipt.profit);
            let (balance, source) =
                self.reconciler
                    .update(&mut self.state, receipt.reported_balance, receipt.profit);
            info!(
                bet = self.state.bet_count,
                outcome = %receipt.outcome,
                amount = %order.amount,
                rule = %order.rule,
                bet_value = %order.bet_value,
                multiplier = %order.multiplier,
                result = %receipt.result_value,
                profit = %receipt.profit,
                total_profit = %self.state.total_profit,
                balance = %balance,
                source = %source,
                "Bet settled"
            );

            if self.reconciler.refresh_due(self.state.bet_count) {
                match self.api.get_balance(&currency).await {
                    Ok(live) => self.reconciler.apply_refresh(&mut self.state, live),
                    Err(e) => warn!(error = %e, "Periodic balance refresh failed"),
                }
            }

            let switch = match receipt.outcome {
                Outcome::Win => self.settings.switch_rule_on_win,
                Outcome::Loss => self.settings.switch_rule_on_loss,
            };
            if switch {
                self.pair.rule = self.pair.rule.opposite();
            }

            let ctx = StrategyContext {
                base_amount: self.state.base_amount,
                current_amount: self.state.current_amount,
                consecutive_losses: self.state.consecutive_losses,
                current_balance: self.state.current_balance,
                total_profit: self.state.total_profit,
                start_balance: self.state.start_balance,
                multiplier: pair.multiplier,
            };
            match self.staking.advance(receipt.outcome, &ctx) {
                Ok(amount) => self.state.current_amount = amount,
                Err(e) => {
                    error!(error = %e, "Strategy failed");
                    return HaltReason::StrategyFailed(e.to_string());
                }
            }

            if switch {
                match self.synchronizer.sync(&self.pair) {
                    Ok(p) => self.pair = p,
                    Err(e) => return HaltReason::SyncFailed(e.to_string()),
                }
            }

            self.refresh_seeds().await;
            sleep(self.settings.delay).await;
        }
    }

    /// Reset counters, fetch the start balance and fix the premium limits.
    async fn start(&mut self) -> Result<(), ApiError> {
        self.state.reset();
        self.staking.reset();

        let balance = self.api.get_balance(&self.settings.currency).await?;
        self.reconciler.seed(&mut self.state, balance);
        self.limits = self
            .settings
            .limits
            .clone()
            .with_premium(self.staking.plan().premium_params(), balance);

        info!(
            currency = %self.settings.currency,
            start_balance = %balance,
            base_amount = %self.state.base_amount,
            preset = self.staking.plan().name(),
            "Session started"
        );
        Ok(())
    }

    /// Pair for the next bet: the carried pair, varied and resynchronized
    /// when variation is active.
    fn next_pair(&mut self) -> Result<BetPair, BotError> {
        let mut pair = self.pair.clone();
        match self.variation.apply(&mut pair)? {
            Some(policy) => synchronize(&pair, policy),
            None => Ok(pair),
        }
    }

    /// Count a failed bet and apply any correction. Returns a halt reason
    /// when the session must stop.
    fn on_api_error(&mut self, err: ApiError) -> Option<HaltReason> {
        self.state.api_error_count += 1;
        error!(error = %err, errors = self.state.api_error_count, "Bet request failed");

        match err.corrective_action() {
            Some(CorrectiveAction::RenormalizeAmount) => {
                let before = self.state.current_amount;
                self.state.current_amount =
                    normalize_amount(before, self.settings.coin_places);
                warn!(
                    from = %before,
                    to = %self.state.current_amount,
                    "Amount renormalized to coin decimal places"
                );
                self.state.api_error_count = 0;
            }
            Some(CorrectiveAction::ForceResync) => {
                warn!("Chance/multiplier mismatch, resyncing with lock_multiplier");
                self.synchronizer.force(SyncPolicy::LockMultiplier);
                match self.synchronizer.sync(&self.pair) {
                    Ok(p) => {
                        info!(pair = %p, "Pair resynchronized");
                        self.pair = p;
                        self.state.api_error_count = 0;
                    }
                    Err(e) => {
                        error!(error = %e, "Forced resync failed");
                        return Some(HaltReason::SyncFailed(e.to_string()));
                    }
                }
            }
            None => {}
        }

        if !self.settings.continue_on_api_error
            || self.state.api_error_count > self.settings.max_api_errors
        {
            warn!(errors = self.state.api_error_count, "API error limit reached");
            return Some(HaltReason::ApiErrorLimit);
        }
        None
    }

    /// Rotate seeds on their configured cadence. Failures are advisory.
    async fn refresh_seeds(&mut self) {
        let bets = self.state.bet_count;
        let due = |every: u64| every > 0 && bets % every == 0;

        if due(self.settings.refresh_server_seed_every) {
            match self.api.refresh_server_seed().await {
                Ok(hash) => info!(server_seed_hashed = %hash, "Server seed refreshed"),
                Err(e) => warn!(error = %e, "Server seed refresh failed"),
            }
        }
        if due(self.settings.refresh_client_seed_every) {
            let seed = self.variation.client_seed();
            match self.api.refresh_client_seed(&seed).await {
                Ok(confirmed) => info!(client_seed = %confirmed, "Client seed refreshed"),
                Err(e) => warn!(error = %e, "Client seed refresh failed"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
