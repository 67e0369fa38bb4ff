//! The auto-hedge control loop: project → decide → select → execute under
//! safety caps, once per tick.
//!
//! One call per scheduler wakeup; internal state is guarded by a single
//! lock, and no work carries over between ticks beyond that state.

use crate::constants::{self, ExpiryType, HedgeConfig, MarginLookup};
use crate::selector::{select_pair, HedgeSelection, OptionChainSource, OptionType};
use async_trait::async_trait;
use basso_core::notifier::{Notification, NotificationContext, NotificationKind, Notifier};
use basso_execution::executor::{execute_progressive, ExecutionError, ProgressiveConfig};
use basso_execution::gateway::BrokerGateway;
use basso_markets::clock::Clock;
use basso_markets::exchange::ExchangeId;
use basso_markets::instrument::Instrument;
use basso_markets::side::Side;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HedgeError {
    #[error("safety gate rejected the action: {0:?}")]
    SafetyGate(SafetyViolation),
    #[error("no eligible hedge candidate in the option chain")]
    NoCandidate,
    #[error(transparent)]
    Gateway(#[from] basso_execution::gateway::GatewayError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// A single leg held as part of an active hedge on one index.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveLeg {
    pub symbol: String,
    pub exchange: ExchangeId,
    pub strike: Decimal,
    pub option_type: OptionType,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub otm_distance: Decimal,
    pub entered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveHedge {
    pub call: Option<ActiveLeg>,
    pub put: Option<ActiveLeg>,
}

impl ActiveHedge {
    pub fn is_empty(&self) -> bool {
        self.call.is_none() && self.put.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HedgeAction {
    Buy,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HedgeTransaction {
    pub recorded_at: DateTime<Utc>,
    pub index: Instrument,
    pub action: HedgeAction,
    pub option_type: OptionType,
    pub symbol: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub cost: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyViolation {
    DailySpendCapExceeded,
    CooldownActive,
    ExitValueTooLow,
    HedgeExceedsUnhedgedShort,
}

/// What the "decide" step resolved to, before safety gates or selection
/// run. Pure and synchronous so it is independently testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HedgeDecision {
    Buy,
    Exit,
    NoAction,
}

pub fn decide(
    current_utilization_pct: Decimal,
    projected_utilization_pct: Decimal,
    config: &HedgeConfig,
    should_hold_hedges: bool,
    has_active_hedge: bool,
) -> HedgeDecision {
    if projected_utilization_pct > config.entry_trigger_pct {
        HedgeDecision::Buy
    } else if current_utilization_pct < config.exit_trigger_pct && !should_hold_hedges && has_active_hedge {
        HedgeDecision::Exit
    } else {
        HedgeDecision::NoAction
    }
}

/// The "margin calculator" step: projects utilisation after `num_baskets`
/// more baskets at `index`/`expiry_type`, without hedge (the worst case the
/// decision should guard against).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginProjection {
    pub margin_for_next_entry: Decimal,
    pub projected_intraday_margin: Decimal,
    pub current_utilization_pct: Decimal,
    pub projected_utilization_pct: Decimal,
    /// Whether `margin_for_next_entry` came from an exact
    /// `(index, expiry_type)` table row or the 1DTE fallback — surfaced so
    /// the orchestrator can make a fallback lookup loud rather than silent
    /// (Open Question 1).
    pub lookup: MarginLookup,
}

pub fn project_margin(
    current_intraday_margin: Decimal,
    total_budget: Decimal,
    index: Instrument,
    expiry_type: ExpiryType,
    num_baskets: u32,
) -> MarginProjection {
    let basket_margin = constants::margin_per_basket(index, expiry_type, false);
    let margin_for_next_entry = basket_margin.per_basket * Decimal::from(num_baskets);
    let projected_intraday_margin = current_intraday_margin + margin_for_next_entry;
    let utilization = |margin: Decimal| -> Decimal {
        if total_budget > Decimal::ZERO {
            margin / total_budget * Decimal::from(100)
        } else {
            Decimal::ZERO
        }
    };

    MarginProjection {
        margin_for_next_entry,
        projected_intraday_margin,
        current_utilization_pct: utilization(current_intraday_margin),
        projected_utilization_pct: utilization(projected_intraday_margin),
        lookup: basket_margin.lookup,
    }
}

/// The "safety gates" step, evaluated independently of the decision so
/// every failure is visible rather than short-circuited.
#[allow(clippy::too_many_arguments)]
pub fn check_safety_gates(
    action: HedgeAction,
    planned_cost: Decimal,
    daily_hedge_spend: Decimal,
    max_hedge_cost_per_day: Decimal,
    seconds_since_last_action: Option<i64>,
    cooldown: Duration,
    exit_value: Option<Decimal>,
    min_exit_value: Decimal,
    hedge_quantity: Decimal,
    unhedged_short_quantity: Decimal,
) -> Result<(), SafetyViolation> {
    if daily_hedge_spend + planned_cost > max_hedge_cost_per_day {
        return Err(SafetyViolation::DailySpendCapExceeded);
    }
    if let Some(elapsed) = seconds_since_last_action {
        if elapsed < cooldown.as_secs() as i64 {
            return Err(SafetyViolation::CooldownActive);
        }
    }
    if action == HedgeAction::Exit {
        if exit_value.map(|v| v < min_exit_value).unwrap_or(true) {
            return Err(SafetyViolation::ExitValueTooLow);
        }
    }
    if action == HedgeAction::Buy && hedge_quantity > unhedged_short_quantity {
        return Err(SafetyViolation::HedgeExceedsUnhedgedShort);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Bought(HedgeTransaction, HedgeTransaction),
    Exited(HedgeTransaction),
    NoAction,
    Skipped(SafetyViolation),
}

struct State {
    active: HashMap<Instrument, ActiveHedge>,
    ledger: Vec<HedgeTransaction>,
    daily_hedge_spend: Decimal,
    spend_date: Option<NaiveDate>,
    last_action_at: Option<DateTime<Utc>>,
    action_pending: bool,
}

/// Everything one tick needs that the orchestrator itself does not hold:
/// the upcoming entry's sizing, the current margin picture, and the
/// capabilities to fetch the chain and place orders.
pub struct TickContext<'a> {
    pub index: Instrument,
    pub expiry: NaiveDate,
    pub expiry_type: ExpiryType,
    pub num_baskets: u32,
    pub spot: Decimal,
    pub current_intraday_margin: Decimal,
    pub total_budget: Decimal,
    pub unhedged_short_quantity: Decimal,
    pub should_hold_hedges: bool,
    pub gateway: &'a dyn BrokerGateway,
    pub option_source: &'a dyn OptionChainSource,
}

/// Periodic control loop driving hedge buys/exits under safety caps.
/// `active`/ledger/spend state live behind one lock: `ActiveHedge` and
/// daily spend counters are guarded by the orchestrator's lock.
pub struct HedgeOrchestrator {
    config: HedgeConfig,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    progressive: ProgressiveConfig,
    product: &'static str,
    state: Mutex<State>,
}

impl std::fmt::Debug for HedgeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HedgeOrchestrator").finish_non_exhaustive()
    }
}

impl HedgeOrchestrator {
    pub fn new(config: HedgeConfig, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            progressive: ProgressiveConfig {
                initial_buffer_pct: config.limit_order_buffer_pct,
                increment_pct: config.limit_order_buffer_pct,
                max_retries: 3,
                retry_interval: Duration::from_secs(5),
                market_fallback_window: None,
            },
            config,
            clock,
            notifier,
            product: "MIS",
            state: Mutex::new(State {
                active: HashMap::new(),
                ledger: Vec::new(),
                daily_hedge_spend: Decimal::ZERO,
                spend_date: None,
                last_action_at: None,
                action_pending: false,
            }),
        }
    }

    pub fn active_hedge(&self, index: Instrument) -> ActiveHedge {
        self.state.lock().active.get(&index).cloned().unwrap_or_default()
    }

    pub fn ledger(&self) -> Vec<HedgeTransaction> {
        self.state.lock().ledger.clone()
    }

    fn reset_daily_spend_if_new_day(&self, state: &mut State, today: NaiveDate) {
        if state.spend_date != Some(today) {
            state.spend_date = Some(today);
            state.daily_hedge_spend = Decimal::ZERO;
        }
    }

    /// Runs one tick: project, decide, select, execute. Returns
    /// immediately with `TickOutcome::NoAction` or `Skipped` without
    /// touching the gateway when there is nothing to do, a prior action is
    /// still pending, or a safety gate rejects the attempt — idempotent:
    /// one decision per tick, skipped if a prior action is still pending.
    pub async fn tick(&self, ctx: TickContext<'_>) -> Result<TickOutcome, HedgeError> {
        let now = self.clock.now();
        let today = now.date_naive();

        {
            let mut state = self.state.lock();
            if state.action_pending {
                return Ok(TickOutcome::NoAction);
            }
            self.reset_daily_spend_if_new_day(&mut state, today);
            state.action_pending = true;
        }

        let result = self.tick_inner(ctx, now, today).await;

        self.state.lock().action_pending = false;
        result
    }

    async fn tick_inner(
        &self,
        ctx: TickContext<'_>,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<TickOutcome, HedgeError> {
        let projection = project_margin(
            ctx.current_intraday_margin,
            ctx.total_budget,
            ctx.index,
            ctx.expiry_type,
            ctx.num_baskets,
        );

        if let MarginLookup::Fallback { requested } = projection.lookup {
            tracing::warn!(
                index = ?ctx.index,
                requested_expiry = ?requested,
                "margin-constants table has no row for this expiry type; falling back to the 1DTE row"
            );
            self.notifier
                .notify(Notification {
                    kind: NotificationKind::MarginFallback,
                    message: format!(
                        "margin lookup for {} fell back to the 1DTE row (requested {:?})",
                        ctx.index.as_str(),
                        requested
                    ),
                    context: hedge_notify_context(ctx.index, projection.margin_for_next_entry),
                })
                .await;
        }

        let active = self.active_hedge(ctx.index);
        let decision = decide(
            projection.current_utilization_pct,
            projection.projected_utilization_pct,
            &self.config,
            ctx.should_hold_hedges,
            !active.is_empty(),
        );

        match decision {
            HedgeDecision::NoAction => Ok(TickOutcome::NoAction),
            HedgeDecision::Buy => self.execute_buy(ctx, projection, now, today).await,
            HedgeDecision::Exit => self.execute_exit(ctx, active, now, today).await,
        }
    }

    async fn execute_buy(
        &self,
        ctx: TickContext<'_>,
        projection: MarginProjection,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<TickOutcome, HedgeError> {
        let lots_per_basket = constants::lots_per_basket(ctx.index);
        let lot_size = ctx.index.lot_size(today);
        let quantity = Decimal::from(lots_per_basket * lot_size * ctx.num_baskets);
        let margin_benefit = constants::hedge_benefit(ctx.index, ctx.expiry_type, ctx.num_baskets);
        let otm_band = constants::otm_band(ctx.index);

        let chain = ctx
            .option_source
            .option_chain(ctx.index.as_str(), ctx.expiry)
            .await?;

        let selection = select_pair(
            &chain,
            ctx.spot,
            self.config.min_premium,
            self.config.max_premium,
            otm_band.min,
            otm_band.max,
            margin_benefit,
            quantity,
        )
        .ok_or(HedgeError::NoCandidate)?;

        let planned_cost = (selection.call.quote.ltp + selection.put.quote.ltp) * quantity;

        let gate = {
            let state = self.state.lock();
            let seconds_since_last = state
                .last_action_at
                .map(|last| (now - last).num_seconds());
            check_safety_gates(
                HedgeAction::Buy,
                planned_cost,
                state.daily_hedge_spend,
                self.config.max_hedge_cost_per_day,
                seconds_since_last,
                self.config.cooldown,
                None,
                self.config.min_exit_value,
                quantity,
                ctx.unhedged_short_quantity,
            )
        };

        if let Err(violation) = gate {
            tracing::warn!(?violation, index = ?ctx.index, "hedge buy skipped by safety gate");
            return Ok(TickOutcome::Skipped(violation));
        }

        let call_fill = execute_progressive(
            ctx.gateway,
            &selection.call.quote.symbol,
            selection.call.quote.exchange,
            Side::Buy,
            quantity,
            selection.call.quote.ltp,
            self.product,
            self.progressive,
        )
        .await?;
        let put_fill = execute_progressive(
            ctx.gateway,
            &selection.put.quote.symbol,
            selection.put.quote.exchange,
            Side::Buy,
            quantity,
            selection.put.quote.ltp,
            self.product,
            self.progressive,
        )
        .await?;

        let call_txn = HedgeTransaction {
            recorded_at: now,
            index: ctx.index,
            action: HedgeAction::Buy,
            option_type: OptionType::Call,
            symbol: selection.call.quote.symbol.clone(),
            quantity,
            price: call_fill.average_price,
            cost: call_fill.average_price * quantity,
        };
        let put_txn = HedgeTransaction {
            recorded_at: now,
            index: ctx.index,
            action: HedgeAction::Buy,
            option_type: OptionType::Put,
            symbol: selection.put.quote.symbol.clone(),
            quantity,
            price: put_fill.average_price,
            cost: put_fill.average_price * quantity,
        };

        {
            let mut state = self.state.lock();
            state.daily_hedge_spend += call_txn.cost + put_txn.cost;
            state.last_action_at = Some(now);
            state.ledger.push(call_txn.clone());
            state.ledger.push(put_txn.clone());
            state.active.insert(
                ctx.index,
                ActiveHedge {
                    call: Some(ActiveLeg {
                        symbol: selection.call.quote.symbol,
                        exchange: selection.call.quote.exchange,
                        strike: selection.call.quote.strike,
                        option_type: OptionType::Call,
                        quantity,
                        entry_price: call_fill.average_price,
                        otm_distance: selection.call.otm_distance,
                        entered_at: now,
                    }),
                    put: Some(ActiveLeg {
                        symbol: selection.put.quote.symbol,
                        exchange: selection.put.quote.exchange,
                        strike: selection.put.quote.strike,
                        option_type: OptionType::Put,
                        quantity,
                        entry_price: put_fill.average_price,
                        otm_distance: selection.put.otm_distance,
                        entered_at: now,
                    }),
                },
            );
        }

        let mut context = hedge_notify_context(ctx.index, planned_cost);
        context.insert(
            "projected_utilization_pct".to_string(),
            projection.projected_utilization_pct.to_string(),
        );
        self.notifier
            .notify(Notification {
                kind: NotificationKind::HedgeBuy,
                message: format!("bought hedge pair for {}", ctx.index.as_str()),
                context,
            })
            .await;

        Ok(TickOutcome::Bought(call_txn, put_txn))
    }

    async fn execute_exit(
        &self,
        ctx: TickContext<'_>,
        active: ActiveHedge,
        now: DateTime<Utc>,
        _today: NaiveDate,
    ) -> Result<TickOutcome, HedgeError> {
        let lowest_otm_leg = [active.call.as_ref(), active.put.as_ref()]
            .into_iter()
            .flatten()
            .min_by_key(|leg| leg.otm_distance)
            .cloned();

        let Some(leg) = lowest_otm_leg else {
            return Ok(TickOutcome::NoAction);
        };

        let quote = ctx.gateway.quote(&leg.symbol, leg.exchange).await?;
        let exit_value = quote.ltp * leg.quantity;

        let gate = {
            let state = self.state.lock();
            let seconds_since_last = state
                .last_action_at
                .map(|last| (now - last).num_seconds());
            check_safety_gates(
                HedgeAction::Exit,
                Decimal::ZERO,
                state.daily_hedge_spend,
                self.config.max_hedge_cost_per_day,
                seconds_since_last,
                self.config.cooldown,
                Some(exit_value),
                self.config.min_exit_value,
                leg.quantity,
                ctx.unhedged_short_quantity,
            )
        };

        if let Err(violation) = gate {
            tracing::warn!(?violation, index = ?ctx.index, "hedge exit skipped by safety gate");
            return Ok(TickOutcome::Skipped(violation));
        }

        let fill = execute_progressive(
            ctx.gateway,
            &leg.symbol,
            leg.exchange,
            Side::Sell,
            leg.quantity,
            quote.ltp,
            self.product,
            self.progressive,
        )
        .await?;

        let txn = HedgeTransaction {
            recorded_at: now,
            index: ctx.index,
            action: HedgeAction::Exit,
            option_type: leg.option_type,
            symbol: leg.symbol.clone(),
            quantity: leg.quantity,
            price: fill.average_price,
            cost: fill.average_price * leg.quantity,
        };

        {
            let mut state = self.state.lock();
            state.last_action_at = Some(now);
            state.ledger.push(txn.clone());
            if let Some(hedge) = state.active.get_mut(&ctx.index) {
                if hedge.call.as_ref().map(|l| l.symbol == leg.symbol).unwrap_or(false) {
                    hedge.call = None;
                } else if hedge.put.as_ref().map(|l| l.symbol == leg.symbol).unwrap_or(false) {
                    hedge.put = None;
                }
            }
        }

        self.notifier
            .notify(Notification {
                kind: NotificationKind::HedgeSell,
                message: format!("exited hedge leg for {}", ctx.index.as_str()),
                context: hedge_notify_context(ctx.index, txn.cost),
            })
            .await;

        Ok(TickOutcome::Exited(txn))
    }
}

fn hedge_notify_context(index: Instrument, amount: Decimal) -> NotificationContext {
    let mut context = NotificationContext::new();
    context.insert("index".to_string(), index.as_str().to_string());
    context.insert("amount".to_string(), amount.to_string());
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decide_buys_when_projected_utilisation_exceeds_entry_trigger() {
        let config = HedgeConfig::default();
        let decision = decide(dec!(60), dec!(96), &config, false, false);
        assert_eq!(decision, HedgeDecision::Buy);
    }

    #[test]
    fn decide_exits_when_current_low_and_no_imminent_entry_and_hedge_active() {
        let config = HedgeConfig::default();
        let decision = decide(dec!(50), dec!(60), &config, false, true);
        assert_eq!(decision, HedgeDecision::Exit);
    }

    #[test]
    fn decide_holds_hedges_through_imminent_entry() {
        let config = HedgeConfig::default();
        let decision = decide(dec!(50), dec!(60), &config, true, true);
        assert_eq!(decision, HedgeDecision::NoAction);
    }

    #[test]
    fn decide_no_action_without_an_active_hedge_to_exit() {
        let config = HedgeConfig::default();
        let decision = decide(dec!(50), dec!(60), &config, false, false);
        assert_eq!(decision, HedgeDecision::NoAction);
    }

    #[test]
    fn safety_gate_rejects_spend_over_daily_cap() {
        let result = check_safety_gates(
            HedgeAction::Buy,
            dec!(10_000),
            dec!(45_000),
            dec!(50_000),
            None,
            Duration::from_secs(120),
            None,
            dec!(0.5),
            dec!(75),
            dec!(750),
        );
        assert_eq!(result, Err(SafetyViolation::DailySpendCapExceeded));
    }

    #[test]
    fn safety_gate_rejects_within_cooldown() {
        let result = check_safety_gates(
            HedgeAction::Buy,
            dec!(1_000),
            dec!(0),
            dec!(50_000),
            Some(30),
            Duration::from_secs(120),
            None,
            dec!(0.5),
            dec!(75),
            dec!(750),
        );
        assert_eq!(result, Err(SafetyViolation::CooldownActive));
    }

    #[test]
    fn safety_gate_rejects_hedge_quantity_over_unhedged_short() {
        let result = check_safety_gates(
            HedgeAction::Buy,
            dec!(1_000),
            dec!(0),
            dec!(50_000),
            None,
            Duration::from_secs(120),
            None,
            dec!(0.5),
            dec!(1_000),
            dec!(750),
        );
        assert_eq!(result, Err(SafetyViolation::HedgeExceedsUnhedgedShort));
    }

    #[test]
    fn safety_gate_rejects_exit_below_min_value() {
        let result = check_safety_gates(
            HedgeAction::Exit,
            dec!(0),
            dec!(0),
            dec!(50_000),
            None,
            Duration::from_secs(120),
            Some(dec!(0.20)),
            dec!(0.50),
            dec!(75),
            dec!(750),
        );
        assert_eq!(result, Err(SafetyViolation::ExitValueTooLow));
    }

    #[test]
    fn margin_projection_flags_hedge_required_over_trigger() {
        let projection = project_margin(
            dec!(4_100_000),
            dec!(5_000_000),
            Instrument::Nifty,
            ExpiryType::ZeroDte,
            1,
        );
        assert!(projection.projected_utilization_pct > dec!(95));
    }
}
