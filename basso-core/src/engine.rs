//! `SignalEngine`: the end-to-end processor for one externally generated
//! [`Signal`]. Orchestrates every other `basso-core`/`basso-risk`
//! /`basso-execution` component in strict sequence for a single signal;
//! different signals run concurrently — across signals for different
//! instruments, processing is independent and concurrent.
//!
//! A struct built once from injected `Arc<dyn Trait>` capabilities,
//! exposing one `async fn` entry point that drives this pipeline's nine
//! fixed steps.

use crate::audit::{AgeBucketLabel, AuditRecord, AuditStore, ExecutionDecisionLabel};
use crate::confirmation::{ConfirmationBus, ConfirmationKind, Context as ConfirmationContext, Decision};
use crate::duplicate::DuplicateDetector;
use crate::error::{AuditOutcome, Outcome};
use crate::notifier::{Notification, NotificationContext, NotificationKind, Notifier};
use crate::system::config::{PortfolioConfig, ValidatorConfig};
use crate::validator::{self, ExistingSlots};
use basso_execution::executor::{
    execute_simple_limit, round_to_strike, run_synthetic, ExecutionError, PartialFillStrategy,
    SimpleLimitConfig, SyntheticLeg, SyntheticState,
};
use basso_execution::gateway::BrokerGateway;
use basso_markets::clock::Clock;
use basso_markets::exchange::ExchangeId;
use basso_markets::instrument::{Instrument, InstrumentConfig, Limiter};
use basso_markets::position::{Position, PositionId};
use basso_markets::side::Side;
use basso_markets::signal::{Signal, SignalKind, Slot};
use basso_risk::pyramid::{self, PyramidGateInput, PORTFOLIO_GATE_ESTIMATED_LOTS};
use basso_risk::sizer::{size_position, SizingInput};
use basso_risk::stop::initial_stop;
use basso_risk::{PortfolioSnapshot, PortfolioState};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SIMPLE_LIMIT: SimpleLimitConfig = SimpleLimitConfig {
    limit_order_buffer: dec!(1.0),
    poll_interval: Duration::from_millis(500),
    order_timeout: Duration::from_secs(10),
    partial_fill_strategy: PartialFillStrategy::Cancel,
};

const PRODUCT: &str = "MIS";

/// NSE Bank Nifty option strikes trade in multiples of 500, with tie-breaks
/// preferring multiples of 1000.
const SYNTHETIC_STRIKE_INTERVAL: Decimal = dec!(500);
const SYNTHETIC_STRIKE_PREFER_MULTIPLE: Decimal = dec!(1000);

/// Everything [`SignalEngine`] needs injected at construction (Design Note
/// "global singletons": built once, passed down, never a process-global).
pub struct SignalEngineDeps {
    pub clock: Arc<dyn Clock>,
    pub duplicate_detector: Arc<DuplicateDetector>,
    pub portfolio: Arc<PortfolioState>,
    pub gateway: Arc<dyn BrokerGateway>,
    pub audit: Arc<dyn AuditStore>,
    pub notifier: Arc<dyn Notifier>,
    pub confirmation: ConfirmationBus,
    pub validator_config: ValidatorConfig,
    pub portfolio_config: PortfolioConfig,
}

/// Tracks which slot of which instrument a still-open [`PositionId`]
/// occupies. `Position` itself carries no slot field; the engine is the
/// only component that needs the mapping, so
/// it owns it rather than pushing it onto the shared aggregate.
#[derive(Debug, Default)]
struct SlotRegistry {
    by_slot: HashMap<(Instrument, Slot), PositionId>,
}

impl SlotRegistry {
    fn open_slots_for(&self, instrument: Instrument) -> Vec<Slot> {
        self.by_slot
            .keys()
            .filter(|(i, _)| *i == instrument)
            .map(|(_, slot)| *slot)
            .collect()
    }

    fn position_for(&self, instrument: Instrument, slot: Slot) -> Option<PositionId> {
        self.by_slot.get(&(instrument, slot)).copied()
    }

    fn insert(&mut self, instrument: Instrument, slot: Slot, id: PositionId) {
        self.by_slot.insert((instrument, slot), id);
    }

    fn remove(&mut self, instrument: Instrument, slot: Slot) {
        self.by_slot.remove(&(instrument, slot));
    }
}

pub struct SignalEngine {
    clock: Arc<dyn Clock>,
    duplicate_detector: Arc<DuplicateDetector>,
    portfolio: Arc<PortfolioState>,
    gateway: Arc<dyn BrokerGateway>,
    audit: Arc<dyn AuditStore>,
    notifier: Arc<dyn Notifier>,
    confirmation: ConfirmationBus,
    validator_config: ValidatorConfig,
    portfolio_config: PortfolioConfig,
    slots: parking_lot::Mutex<SlotRegistry>,
    /// ATM strike locked in at synthetic entry, keyed by position, so a
    /// later EXIT closes the same options rather than a freshly rounded
    /// strike (Bank Nifty's spot can drift between entry and exit).
    synthetic_strikes: parking_lot::Mutex<HashMap<PositionId, Decimal>>,
    next_position_id: AtomicU64,
}

impl SignalEngine {
    pub fn new(deps: SignalEngineDeps) -> Self {
        Self {
            clock: deps.clock,
            duplicate_detector: deps.duplicate_detector,
            portfolio: deps.portfolio,
            gateway: deps.gateway,
            audit: deps.audit,
            notifier: deps.notifier,
            confirmation: deps.confirmation,
            validator_config: deps.validator_config,
            portfolio_config: deps.portfolio_config,
            slots: parking_lot::Mutex::new(SlotRegistry::default()),
            synthetic_strikes: parking_lot::Mutex::new(HashMap::new()),
            next_position_id: AtomicU64::new(1),
        }
    }

    /// Runs the nine-step pipeline for one signal and returns
    /// its terminal [`Outcome`]. Never panics on a rejected/blocked signal —
    /// every negative path is a plain `Outcome` variant, not a propagated
    /// error, matching the Design Note "exceptions for control flow".
    pub async fn process(&self, signal: Signal) -> Outcome {
        let recorded_at = self.clock.now();

        // Step 1: duplicate check short-circuits before anything else runs.
        if self.duplicate_detector.is_duplicate(&signal) {
            self.record_audit(
                &signal,
                recorded_at,
                AuditOutcome::Duplicate,
                None,
                None,
                None,
                None,
                None,
                false,
                None,
            )
            .await;
            return Outcome::Duplicate;
        }

        // Step 2: condition validation.
        let existing = ExistingSlots {
            open_slots: self.slots.lock().open_slots_for(signal.instrument),
        };
        let condition = match validator::check_condition(&signal, &existing, &self.validator_config) {
            Ok(accepted) => accepted,
            Err(rejected) => {
                self.duplicate_detector.forget(&signal);
                self.record_audit(
                    &signal,
                    recorded_at,
                    AuditOutcome::RejectedValidation,
                    None,
                    None,
                    None,
                    None,
                    Some(rejected.to_string()),
                    false,
                    None,
                )
                .await;
                return Outcome::Rejected;
            }
        };

        // Step 3: for PYRAMID, consult the three-predicate gate.
        let snapshot = self.portfolio.current_state();
        if signal.kind == SignalKind::Pyramid {
            if let Some(gate_input) = self.pyramid_gate_input(&signal, &snapshot) {
                let result = pyramid::evaluate(gate_input);
                if !result.admitted() {
                    self.duplicate_detector.forget(&signal);
                    self.record_audit(
                        &signal,
                        recorded_at,
                        AuditOutcome::RejectedRisk,
                        Some(condition.age_bucket_outcome.into()),
                        None,
                        None,
                        None,
                        Some(format!("pyramid gate failures: {:?}", result.failures)),
                        false,
                        None,
                    )
                    .await;
                    return Outcome::Blocked;
                }
            }
        }

        // Step 4: fetch broker LTP with retry.
        let symbol = signal.instrument.as_str();
        let exchange = signal.instrument.exchange();
        let ltp = validator::fetch_ltp_with_retry(self.gateway.as_ref(), symbol, exchange).await;
        let (effective_price, bypassed, execution_decision) = match ltp {
            Some(price) => {
                let decision = validator::check_execution(
                    &signal,
                    price,
                    true,
                    condition.age_bucket_outcome,
                    &self.validator_config,
                );
                (price, false, decision)
            }
            None => (signal.price, true, validator::ExecutionDecision::Bypass),
        };

        // Step 5: act on the execution-validation decision.
        let sized_lots_cap = match &execution_decision {
            validator::ExecutionDecision::Reject { reason } => {
                let reason = *reason;
                self.duplicate_detector.forget(&signal);
                self.record_audit(
                    &signal,
                    recorded_at,
                    AuditOutcome::RejectedValidation,
                    Some(condition.age_bucket_outcome.into()),
                    Some((&execution_decision).into()),
                    None,
                    None,
                    Some(format!("{reason:?}")),
                    bypassed,
                    None,
                )
                .await;
                return Outcome::Rejected;
            }
            validator::ExecutionDecision::Resize { adjusted_lots } => Some(*adjusted_lots),
            validator::ExecutionDecision::Accept { .. } | validator::ExecutionDecision::Bypass => None,
        };

        if signal.kind == SignalKind::Exit {
            return self
                .execute_exit(&signal, recorded_at, effective_price, condition.age_bucket_outcome, &execution_decision, bypassed)
                .await;
        }

        // Step 6: position sizing (BASE_ENTRY / PYRAMID only).
        let Some(instrument_config) = InstrumentConfig::for_instrument(signal.instrument) else {
            self.duplicate_detector.forget(&signal);
            self.record_audit(
                &signal,
                recorded_at,
                AuditOutcome::RejectedValidation,
                Some(condition.age_bucket_outcome.into()),
                Some((&execution_decision).into()),
                None,
                None,
                Some("instrument is not sized by the signal engine".to_string()),
                bypassed,
                None,
            )
            .await;
            return Outcome::Rejected;
        };

        let (risk_percent, vol_percent) = match signal.kind {
            SignalKind::BaseEntry => (
                instrument_config.initial_risk_percent,
                instrument_config.initial_vol_percent,
            ),
            _ => (
                instrument_config.ongoing_risk_percent,
                instrument_config.ongoing_vol_percent,
            ),
        };

        let funds = match self.gateway.funds().await {
            Ok(funds) => funds,
            Err(err) => {
                self.duplicate_detector.forget(&signal);
                self.record_audit(
                    &signal,
                    recorded_at,
                    AuditOutcome::FailedOrder,
                    Some(condition.age_bucket_outcome.into()),
                    Some((&execution_decision).into()),
                    None,
                    None,
                    Some(err.to_string()),
                    bypassed,
                    None,
                )
                .await;
                return Outcome::Error;
            }
        };

        let sizing = size_position(
            &signal,
            instrument_config,
            risk_percent,
            vol_percent,
            SizingInput {
                equity_high: snapshot.equity,
                available_margin: funds.available_cash,
                max_margin_util_percent: self.portfolio_config.max_margin_utilization_percent,
            },
        );

        let mut final_lots = sizing.final_lots;
        if let Some(cap) = sized_lots_cap {
            final_lots = final_lots.min(cap);
        }

        if final_lots == 0 {
            let mut context = ConfirmationContext::new();
            context.insert("instrument".to_string(), signal.instrument.as_str().to_string());
            context.insert("kind".to_string(), signal.kind.to_string());
            let decision = self
                .confirmation
                .request(
                    ConfirmationKind::ManualOverrideRequested,
                    context,
                    Duration::from_secs(30),
                    Decision::Deny,
                )
                .await;

            if decision != Decision::Approve {
                self.record_audit(
                    &signal,
                    recorded_at,
                    AuditOutcome::RejectedRisk,
                    Some(condition.age_bucket_outcome.into()),
                    Some((&execution_decision).into()),
                    Some(0),
                    None,
                    Some("sizer produced zero lots".to_string()),
                    bypassed,
                    None,
                )
                .await;
                return Outcome::Rejected;
            }
            final_lots = 1;
        }

        let quantity = final_lots * signal.instrument.lot_size(self.clock.now().date_naive());
        let limiter = sizing.limiter.unwrap_or(Limiter::Risk);
        let stop = initial_stop(effective_price, signal.atr, instrument_config);

        // Step 7: portfolio admission.
        let position_id = PositionId(self.next_position_id.fetch_add(1, Ordering::SeqCst));
        let position = Position::new(
            position_id,
            signal.instrument,
            recorded_at,
            effective_price,
            final_lots,
            quantity,
            stop,
            signal.atr,
            limiter,
        );

        if let Err(admission_err) = self.portfolio.add_position(position) {
            self.duplicate_detector.forget(&signal);
            self.record_audit(
                &signal,
                recorded_at,
                AuditOutcome::RejectedRisk,
                Some(condition.age_bucket_outcome.into()),
                Some((&execution_decision).into()),
                Some(final_lots),
                Some(limiter),
                Some(admission_err.to_string()),
                bypassed,
                None,
            )
            .await;
            return Outcome::Blocked;
        }

        // Step 8: delegate to the order executor. Bank Nifty routes through
        // the synthetic two-leg state machine; every other
        // instrument places a single SimpleLimit order.
        let (outcome, audit_outcome, order_id) = if signal.instrument == Instrument::BankNifty {
            self.execute_synthetic_entry(
                symbol,
                exchange,
                quantity,
                effective_price,
                position_id,
                final_lots,
                &signal,
            )
            .await
        } else {
            match execute_simple_limit(
                self.gateway.as_ref(),
                symbol,
                exchange,
                Side::Buy,
                Decimal::from(quantity),
                effective_price,
                PRODUCT,
                DEFAULT_SIMPLE_LIMIT,
            )
            .await
            {
                Ok(fill) => {
                    self.slots.lock().insert(signal.instrument, signal.slot, position_id);
                    self.notifier
                        .notify(Notification {
                            kind: NotificationKind::EntryImminent,
                            message: format!(
                                "{} {} filled {} lots @ {}",
                                signal.instrument, signal.kind, final_lots, fill.average_price
                            ),
                            context: NotificationContext::new(),
                        })
                        .await;
                    (Outcome::Executed, AuditOutcome::Processed, Some(fill.order_id.0))
                }
                Err(err) => {
                    // Undo the admission: this position was never actually filled.
                    self.portfolio.close_position(position_id, Decimal::ZERO);
                    self.duplicate_detector.forget(&signal);
                    self.notify_execution_failure(&signal, &err).await;
                    (Outcome::Error, AuditOutcome::FailedOrder, None)
                }
            }
        };

        // Step 9: audit regardless of outcome.
        self.record_audit(
            &signal,
            recorded_at,
            audit_outcome,
            Some(condition.age_bucket_outcome.into()),
            Some((&execution_decision).into()),
            Some(final_lots),
            Some(limiter),
            None,
            bypassed,
            order_id,
        )
        .await;

        outcome
    }

    /// Bank Nifty entry: `SELL PE_at_ATM` + `BUY CE_at_ATM`. The
    /// strike is rounded from `effective_price` and latched for the matching
    /// EXIT to close the same options. `PortfolioState` already admitted
    /// `position_id` on the assumption of a clean fill (step 7 runs before
    /// this); every non-`Complete` terminal state reconciles that admission.
    async fn execute_synthetic_entry(
        &self,
        symbol: &str,
        exchange: ExchangeId,
        quantity: u32,
        effective_price: Decimal,
        position_id: PositionId,
        final_lots: u32,
        signal: &Signal,
    ) -> (Outcome, AuditOutcome, Option<u64>) {
        let strike = round_to_strike(
            effective_price,
            SYNTHETIC_STRIKE_INTERVAL,
            SYNTHETIC_STRIKE_PREFER_MULTIPLE,
        );
        let qty = Decimal::from(quantity);
        let leg1 = SyntheticLeg {
            symbol: format!("{symbol}{strike}PE"),
            exchange,
            side: Side::Sell,
            quantity: qty,
        };
        let leg2 = SyntheticLeg {
            symbol: format!("{symbol}{strike}CE"),
            exchange,
            side: Side::Buy,
            quantity: qty,
        };

        match run_synthetic(self.gateway.as_ref(), leg1, leg2, PRODUCT).await {
            SyntheticState::Complete { leg1_fill, leg2_fill } => {
                self.synthetic_strikes.lock().insert(position_id, strike);
                self.slots.lock().insert(signal.instrument, signal.slot, position_id);
                self.notifier
                    .notify(Notification {
                        kind: NotificationKind::EntryImminent,
                        message: format!(
                            "{} synthetic entry complete: {} lots, PE {} / CE {} @ strike {strike}",
                            signal.instrument, final_lots, leg1_fill.average_price, leg2_fill.average_price
                        ),
                        context: NotificationContext::new(),
                    })
                    .await;
                (Outcome::Executed, AuditOutcome::Processed, Some(leg2_fill.order_id.0))
            }
            SyntheticState::AbortNoLeg => {
                // No leg ever opened: the admitted position never existed in the market.
                self.portfolio.close_position(position_id, Decimal::ZERO);
                self.duplicate_detector.forget(signal);
                (Outcome::Error, AuditOutcome::FailedOrder, None)
            }
            SyntheticState::RolledBack { leg1_fill, rollback_fill } => {
                // Leg 1 filled then was unwound: net flat; ROLLED_BACK
                // leaves PortfolioState consistent.
                let realized = (leg1_fill.average_price - rollback_fill.average_price) * leg1_fill.filled_qty;
                self.portfolio.close_position(position_id, realized);
                self.duplicate_detector.forget(signal);
                (Outcome::Error, AuditOutcome::FailedOrder, Some(rollback_fill.order_id.0))
            }
            SyntheticState::RollbackFailed { leg1_fill, error } => {
                self.portfolio.mark_requires_attention(position_id);
                let mut context = ConfirmationContext::new();
                context.insert("instrument".to_string(), signal.instrument.as_str().to_string());
                context.insert("leg1_order_id".to_string(), leg1_fill.order_id.to_string());
                context.insert("error".to_string(), error.to_string());
                let _ = self
                    .confirmation
                    .request(
                        ConfirmationKind::SyntheticRollbackFailed,
                        context,
                        Duration::from_secs(30),
                        Decision::Deny,
                    )
                    .await;
                self.notify_execution_failure(signal, &error).await;
                (Outcome::Error, AuditOutcome::RollbackFailed, Some(leg1_fill.order_id.0))
            }
            SyntheticState::New
            | SyntheticState::L1Pending { .. }
            | SyntheticState::L1Filled { .. }
            | SyntheticState::L2Pending { .. }
            | SyntheticState::Rollback { .. } => {
                unreachable!("run_synthetic always drives to a terminal state")
            }
        }
    }

    async fn execute_exit(
        &self,
        signal: &Signal,
        recorded_at: chrono::DateTime<chrono::Utc>,
        effective_price: Decimal,
        age_bucket: validator::AgeBucket,
        execution_decision: &validator::ExecutionDecision,
        bypassed: bool,
    ) -> Outcome {
        let targets: Vec<Slot> = if signal.slot == Slot::All {
            self.slots.lock().open_slots_for(signal.instrument)
        } else {
            vec![signal.slot]
        };

        let mut any_executed = false;
        let mut last_audit_outcome = AuditOutcome::FailedOrder;
        let mut last_order_id = None;
        for slot in targets {
            let Some(position_id) = self.slots.lock().position_for(signal.instrument, slot) else {
                continue;
            };
            let snapshot = self.portfolio.current_state();
            let Some(position) = snapshot.positions.get(&position_id).cloned() else {
                continue;
            };
            if !position.is_open() {
                continue;
            }

            let symbol = signal.instrument.as_str();
            let exchange = signal.instrument.exchange();

            if signal.instrument == Instrument::BankNifty {
                let (executed, audit_outcome, order_id) = self
                    .execute_synthetic_exit(symbol, exchange, position_id, &position, signal)
                    .await;
                if executed {
                    self.slots.lock().remove(signal.instrument, slot);
                    any_executed = true;
                }
                last_audit_outcome = audit_outcome;
                last_order_id = order_id;
                continue;
            }

            let fill = execute_simple_limit(
                self.gateway.as_ref(),
                symbol,
                exchange,
                Side::Sell,
                Decimal::from(position.quantity),
                effective_price,
                PRODUCT,
                DEFAULT_SIMPLE_LIMIT,
            )
            .await;

            match fill {
                Ok(fill) => {
                    let realized = (fill.average_price - position.entry_price) * Decimal::from(position.quantity);
                    self.portfolio.close_position(position_id, realized);
                    self.slots.lock().remove(signal.instrument, slot);
                    any_executed = true;
                    last_audit_outcome = AuditOutcome::Processed;
                    last_order_id = Some(fill.order_id.0);
                }
                Err(err) => {
                    self.portfolio.mark_requires_attention(position_id);
                    self.notify_execution_failure(signal, &err).await;
                    last_audit_outcome = AuditOutcome::FailedOrder;
                }
            }
        }

        let audit_outcome = if any_executed && last_audit_outcome != AuditOutcome::RollbackFailed {
            AuditOutcome::Processed
        } else {
            last_audit_outcome
        };
        self.duplicate_detector.forget(signal);
        self.record_audit(
            signal,
            recorded_at,
            audit_outcome,
            Some(age_bucket.into()),
            Some(execution_decision.into()),
            None,
            None,
            None,
            bypassed,
            last_order_id,
        )
        .await;

        if any_executed {
            Outcome::Executed
        } else {
            Outcome::Error
        }
    }

    /// Bank Nifty exit: reverses each leg's side (`BUY` to close the short
    /// PE, `SELL` to close the long CE) at the strike latched during entry,
    /// driving the same state machine. If no strike was latched (e.g. the
    /// position predates this process, such as after a restart with no
    /// durable store wired in) the current ATM strike is used as a
    /// best-effort fallback.
    async fn execute_synthetic_exit(
        &self,
        symbol: &str,
        exchange: ExchangeId,
        position_id: PositionId,
        position: &Position,
        signal: &Signal,
    ) -> (bool, AuditOutcome, Option<u64>) {
        let strike = self
            .synthetic_strikes
            .lock()
            .get(&position_id)
            .copied()
            .unwrap_or_else(|| {
                round_to_strike(
                    position.entry_price,
                    SYNTHETIC_STRIKE_INTERVAL,
                    SYNTHETIC_STRIKE_PREFER_MULTIPLE,
                )
            });
        let qty = Decimal::from(position.quantity);
        let leg1 = SyntheticLeg {
            symbol: format!("{symbol}{strike}PE"),
            exchange,
            side: Side::Buy,
            quantity: qty,
        };
        let leg2 = SyntheticLeg {
            symbol: format!("{symbol}{strike}CE"),
            exchange,
            side: Side::Sell,
            quantity: qty,
        };

        match run_synthetic(self.gateway.as_ref(), leg1, leg2, PRODUCT).await {
            SyntheticState::Complete { leg1_fill, leg2_fill } => {
                // PE bought back (cost) and CE sold (proceeds); net against
                // the original synthetic entry price, point-for-point.
                let realized = (leg2_fill.average_price - leg1_fill.average_price - position.entry_price)
                    * Decimal::from(position.quantity);
                self.portfolio.close_position(position_id, realized);
                self.synthetic_strikes.lock().remove(&position_id);
                (true, AuditOutcome::Processed, Some(leg2_fill.order_id.0))
            }
            SyntheticState::AbortNoLeg => {
                // Neither leg moved: the held position is unchanged, still open.
                (false, AuditOutcome::FailedOrder, None)
            }
            SyntheticState::RolledBack { leg1_fill, rollback_fill } => {
                // The exit's first leg was unwound back to the original side:
                // the position is still open, exactly as it was before this
                // EXIT signal arrived.
                self.notifier
                    .notify(Notification {
                        kind: NotificationKind::HedgeFailure,
                        message: format!(
                            "{} synthetic exit rolled back, position remains open",
                            signal.instrument
                        ),
                        context: NotificationContext::new(),
                    })
                    .await;
                (false, AuditOutcome::FailedOrder, Some(rollback_fill.order_id.0))
            }
            SyntheticState::RollbackFailed { leg1_fill, error } => {
                self.portfolio.mark_requires_attention(position_id);
                let mut context = ConfirmationContext::new();
                context.insert("instrument".to_string(), signal.instrument.as_str().to_string());
                context.insert("leg1_order_id".to_string(), leg1_fill.order_id.to_string());
                context.insert("error".to_string(), error.to_string());
                let _ = self
                    .confirmation
                    .request(
                        ConfirmationKind::SyntheticRollbackFailed,
                        context,
                        Duration::from_secs(30),
                        Decision::Deny,
                    )
                    .await;
                self.notify_execution_failure(signal, &error).await;
                (false, AuditOutcome::RollbackFailed, Some(leg1_fill.order_id.0))
            }
            SyntheticState::New
            | SyntheticState::L1Pending { .. }
            | SyntheticState::L1Filled { .. }
            | SyntheticState::L2Pending { .. }
            | SyntheticState::Rollback { .. } => {
                unreachable!("run_synthetic always drives to a terminal state")
            }
        }
    }

    fn pyramid_gate_input(&self, signal: &Signal, snapshot: &PortfolioSnapshot) -> Option<PyramidGateInput> {
        let registry = self.slots.lock();
        let base_id = registry.position_for(signal.instrument, Slot::Long(1))?;
        let base = snapshot.positions.get(&base_id)?;

        let mut last_pyramid_price = base.entry_price;
        let mut instrument_unrealized_pnl = Decimal::ZERO;
        for (instrument, slot) in registry.by_slot.keys() {
            if *instrument != signal.instrument {
                continue;
            }
            if let Some(id) = registry.position_for(*instrument, *slot) {
                if let Some(position) = snapshot.positions.get(&id) {
                    if !position.is_open() {
                        continue;
                    }
                    instrument_unrealized_pnl += position.unrealized_pnl;
                    if position.entry_price > last_pyramid_price {
                        last_pyramid_price = position.entry_price;
                    }
                }
            }
        }

        let estimated_added_risk = signal.initial_risk() * Decimal::from(PORTFOLIO_GATE_ESTIMATED_LOTS);
        let projected_amount = snapshot.total_risk_amount + estimated_added_risk;
        let projected_risk_percent = if snapshot.equity.is_zero() {
            Decimal::ZERO
        } else {
            projected_amount / snapshot.equity * dec!(100)
        };

        Some(PyramidGateInput {
            price: signal.price,
            base_entry_price: base.entry_price,
            initial_risk: base.initial_risk(),
            last_pyramid_price,
            atr: signal.atr,
            atr_pyramid_spacing: self.portfolio_config.atr_pyramid_spacing,
            projected_risk_percent,
            projected_vol_percent: snapshot.total_vol_percent,
            pyramid_risk_block_percent: self.portfolio_config.pyramid_risk_block_percent,
            pyramid_vol_block_percent: self.portfolio_config.pyramid_vol_block_percent,
            instrument_unrealized_pnl,
        })
    }

    async fn notify_execution_failure(&self, signal: &Signal, err: &ExecutionError) {
        let mut context = NotificationContext::new();
        context.insert("instrument".to_string(), signal.instrument.as_str().to_string());
        context.insert("error".to_string(), err.to_string());
        self.notifier
            .notify(Notification {
                kind: NotificationKind::HedgeFailure,
                message: format!("order execution failed for {}: {err}", signal.instrument),
                context,
            })
            .await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_audit(
        &self,
        signal: &Signal,
        recorded_at: chrono::DateTime<chrono::Utc>,
        outcome: AuditOutcome,
        age_bucket: Option<AgeBucketLabel>,
        execution_decision: Option<ExecutionDecisionLabel>,
        sized_lots: Option<u32>,
        limiter: Option<Limiter>,
        rejection_reason: Option<String>,
        validation_bypassed: bool,
        order_id: Option<u64>,
    ) {
        self.audit
            .append(AuditRecord {
                recorded_at,
                signal: signal.clone(),
                fingerprint: signal.fingerprint(),
                outcome,
                age_bucket,
                execution_decision,
                sized_lots,
                limiter,
                risk_percent_after: None,
                order_id,
                rejection_reason,
                validation_bypassed,
            })
            .await;
    }
}
