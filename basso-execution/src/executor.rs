//! Order execution strategies and the synthetic multi-leg state machine.
//!
//! The synthetic leg state machine is an explicit Rust enum with one variant
//! per state in the diagram it models — no stringly-typed state, matching
//! the invariant that a single leg must never be left open without reaching
//! `RolledBack` or escalating through `RollbackFailed`.

use crate::gateway::{BrokerGateway, GatewayError, OrderId, OrderKind, OrderStatus};
use basso_markets::exchange::ExchangeId;
use basso_markets::side::Side;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Failure taxonomy propagated to the engine and audit trail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("broker gateway unreachable")]
    GatewayUnreachable,
    #[error("order rejected by broker")]
    OrderRejected,
    #[error("order timed out")]
    Timeout,
    #[error("partial fill could not be resolved")]
    PartialFillUnresolved,
    #[error("synthetic rollback failed, position requires manual attention")]
    RollbackFailed,
}

impl From<GatewayError> for ExecutionError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unreachable(_) => ExecutionError::GatewayUnreachable,
            GatewayError::OrderRejected(_) => ExecutionError::OrderRejected,
            GatewayError::Timeout(_) => ExecutionError::Timeout,
        }
    }
}

/// What to do with an unfilled remainder when `SimpleLimit` times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialFillStrategy {
    Cancel,
    Wait,
    Reattempt,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleLimitConfig {
    pub limit_order_buffer: Decimal,
    pub poll_interval: Duration,
    pub order_timeout: Duration,
    pub partial_fill_strategy: PartialFillStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressiveConfig {
    pub initial_buffer_pct: Decimal,
    pub increment_pct: Decimal,
    pub max_retries: u32,
    pub retry_interval: Duration,
    pub market_fallback_window: Option<Duration>,
}

/// The result of a single-instrument (non-synthetic) execution attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub order_id: OrderId,
    pub filled_qty: Decimal,
    pub average_price: Decimal,
}

/// Places one limit order at `ltp ± limit_order_buffer` (favouring fill),
/// polling until `order_timeout`, then escalating per `partial_fill_strategy`.
pub async fn execute_simple_limit(
    gateway: &dyn BrokerGateway,
    symbol: &str,
    exchange: ExchangeId,
    side: Side,
    quantity: Decimal,
    ltp: Decimal,
    product: &str,
    config: SimpleLimitConfig,
) -> Result<Fill, ExecutionError> {
    let limit_price = match side {
        Side::Buy => ltp + config.limit_order_buffer,
        Side::Sell => ltp - config.limit_order_buffer,
    };

    let ack = gateway
        .place_order(
            symbol,
            exchange,
            side,
            quantity,
            OrderKind::Limit,
            product,
            Some(limit_price),
        )
        .await?;

    let deadline = tokio::time::Instant::now() + config.order_timeout;
    loop {
        let report = gateway.order_status(ack.order_id).await?;
        match report.status {
            OrderStatus::Complete => {
                return Ok(Fill {
                    order_id: ack.order_id,
                    filled_qty: report.filled_qty,
                    average_price: report.price,
                })
            }
            OrderStatus::Rejected | OrderStatus::Cancelled => {
                return Err(ExecutionError::OrderRejected)
            }
            OrderStatus::Pending | OrderStatus::Partial => {
                if tokio::time::Instant::now() >= deadline {
                    return resolve_timeout(gateway, ack.order_id, report, config).await;
                }
                tokio::time::sleep(config.poll_interval).await;
            }
        }
    }
}

async fn resolve_timeout(
    gateway: &dyn BrokerGateway,
    order_id: OrderId,
    report: crate::gateway::OrderStatusReport,
    config: SimpleLimitConfig,
) -> Result<Fill, ExecutionError> {
    match config.partial_fill_strategy {
        PartialFillStrategy::Wait => Err(ExecutionError::Timeout),
        PartialFillStrategy::Cancel => {
            gateway.cancel_order(order_id).await?;
            if report.filled_qty.is_zero() {
                Err(ExecutionError::Timeout)
            } else {
                Ok(Fill {
                    order_id,
                    filled_qty: report.filled_qty,
                    average_price: report.price,
                })
            }
        }
        PartialFillStrategy::Reattempt => Err(ExecutionError::PartialFillUnresolved),
    }
}

/// Starts tight, widens the limit price in discrete steps, modifying the
/// live order rather than cancel/replace. Falls back to market within a
/// configured final window if every retry times out.
#[allow(clippy::too_many_arguments)]
pub async fn execute_progressive(
    gateway: &dyn BrokerGateway,
    symbol: &str,
    exchange: ExchangeId,
    side: Side,
    quantity: Decimal,
    ltp: Decimal,
    product: &str,
    config: ProgressiveConfig,
) -> Result<Fill, ExecutionError> {
    let initial_offset = ltp * config.initial_buffer_pct / Decimal::from(100);
    let mut limit_price = match side {
        Side::Buy => ltp + initial_offset,
        Side::Sell => ltp - initial_offset,
    };

    let ack = gateway
        .place_order(
            symbol,
            exchange,
            side,
            quantity,
            OrderKind::Limit,
            product,
            Some(limit_price),
        )
        .await?;

    for _ in 0..config.max_retries {
        tokio::time::sleep(config.retry_interval).await;
        let report = gateway.order_status(ack.order_id).await?;
        if report.status == OrderStatus::Complete {
            return Ok(Fill {
                order_id: ack.order_id,
                filled_qty: report.filled_qty,
                average_price: report.price,
            });
        }
        let step = ltp * config.increment_pct / Decimal::from(100);
        limit_price = match side {
            Side::Buy => limit_price + step,
            Side::Sell => limit_price - step,
        };
        gateway.modify_order(ack.order_id, limit_price).await?;
    }

    if config.market_fallback_window.is_some() {
        gateway.cancel_order(ack.order_id).await.ok();
        let market_ack = gateway
            .place_order(symbol, exchange, side, quantity, OrderKind::Market, product, None)
            .await?;
        let report = gateway.order_status(market_ack.order_id).await?;
        return Ok(Fill {
            order_id: market_ack.order_id,
            filled_qty: report.filled_qty,
            average_price: report.price,
        });
    }

    Err(ExecutionError::Timeout)
}

/// One leg of a synthetic Bank Nifty entry/exit: `SELL PE_at_ATM` and
/// `BUY CE_at_ATM` (or the sign-reversed pair on exit).
#[derive(Debug, Clone)]
pub struct SyntheticLeg {
    pub symbol: String,
    pub exchange: ExchangeId,
    pub side: Side,
    pub quantity: Decimal,
}

/// Explicit state machine for synthetic multi-leg execution. Every variant
/// maps 1:1 onto a node in the execution diagram it models.
#[derive(Debug, Clone)]
pub enum SyntheticState {
    New,
    L1Pending { leg1: SyntheticLeg },
    AbortNoLeg,
    L1Filled { leg1_fill: Fill, leg2: SyntheticLeg },
    L2Pending { leg1_fill: Fill, leg2: SyntheticLeg },
    Complete { leg1_fill: Fill, leg2_fill: Fill },
    Rollback { leg1_fill: Fill },
    RolledBack { leg1_fill: Fill, rollback_fill: Fill },
    RollbackFailed { leg1_fill: Fill, error: ExecutionError },
}

impl SyntheticState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyntheticState::AbortNoLeg
                | SyntheticState::Complete { .. }
                | SyntheticState::RolledBack { .. }
                | SyntheticState::RollbackFailed { .. }
        )
    }
}

/// Drives the synthetic two-leg state machine to a terminal state.
///
/// `leg2` is the reverse-sign leg of an exit when `is_exit` is true — the
/// caller is responsible for constructing `leg1`/`leg2` with the correct
/// sides; the state machine logic itself is identical for entry and exit.
pub async fn run_synthetic(
    gateway: &dyn BrokerGateway,
    leg1: SyntheticLeg,
    leg2: SyntheticLeg,
    product: &str,
) -> SyntheticState {
    // L1_PENDING
    let leg1_ack = match gateway
        .place_order(
            &leg1.symbol,
            leg1.exchange,
            leg1.side,
            leg1.quantity,
            OrderKind::Limit,
            product,
            None,
        )
        .await
    {
        Ok(ack) => ack,
        Err(_) => return SyntheticState::AbortNoLeg,
    };

    let leg1_fill = match await_fill(gateway, leg1_ack.order_id).await {
        Some(fill) => fill,
        None => return SyntheticState::AbortNoLeg,
    };

    // L1_FILLED -> L2_PENDING
    let leg2_ack = gateway
        .place_order(
            &leg2.symbol,
            leg2.exchange,
            leg2.side,
            leg2.quantity,
            OrderKind::Limit,
            product,
            None,
        )
        .await;

    let leg2_ack = match leg2_ack {
        Ok(ack) => ack,
        Err(_) => return rollback(gateway, leg1_fill, &leg1, product).await,
    };

    match await_fill(gateway, leg2_ack.order_id).await {
        Some(leg2_fill) => SyntheticState::Complete {
            leg1_fill,
            leg2_fill,
        },
        None => rollback(gateway, leg1_fill, &leg1, product).await,
    }
}

async fn rollback(
    gateway: &dyn BrokerGateway,
    leg1_fill: Fill,
    leg1: &SyntheticLeg,
    product: &str,
) -> SyntheticState {
    let closing_side = match leg1.side {
        Side::Buy => Side::Sell,
        Side::Sell => Side::Buy,
    };

    let close_result = gateway
        .place_order(
            &leg1.symbol,
            leg1.exchange,
            closing_side,
            leg1_fill.filled_qty,
            OrderKind::Market,
            product,
            None,
        )
        .await;

    match close_result {
        Ok(ack) => match await_fill(gateway, ack.order_id).await {
            Some(rollback_fill) => SyntheticState::RolledBack {
                leg1_fill,
                rollback_fill,
            },
            None => SyntheticState::RollbackFailed {
                leg1_fill,
                error: ExecutionError::Timeout,
            },
        },
        Err(err) => SyntheticState::RollbackFailed {
            leg1_fill,
            error: err.into(),
        },
    }
}

async fn await_fill(gateway: &dyn BrokerGateway, order_id: OrderId) -> Option<Fill> {
    for _ in 0..20 {
        match gateway.order_status(order_id).await {
            Ok(report) if report.status == OrderStatus::Complete => {
                return Some(Fill {
                    order_id,
                    filled_qty: report.filled_qty,
                    average_price: report.price,
                })
            }
            Ok(report) if report.status == OrderStatus::Rejected => return None,
            Ok(_) => tokio::time::sleep(Duration::from_millis(200)).await,
            Err(_) => return None,
        }
    }
    None
}

/// An ATM strike rounded to the nearest `strike_interval`, tie-broken toward
/// `prefer_multiple_of` when exactly between two candidates.
pub fn round_to_strike(price: Decimal, strike_interval: Decimal, prefer_multiple_of: Decimal) -> Decimal {
    let lower = (price / strike_interval).floor() * strike_interval;
    let upper = lower + strike_interval;
    let dist_lower = price - lower;
    let dist_upper = upper - price;

    if dist_lower < dist_upper {
        lower
    } else if dist_upper < dist_lower {
        upper
    } else if (lower % prefer_multiple_of).is_zero() {
        lower
    } else {
        upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn strike_rounds_to_nearest_interval_with_tiebreak() {
        assert_eq!(round_to_strike(dec!(52340), dec!(500), dec!(1000)), dec!(52500));
        assert_eq!(round_to_strike(dec!(52250), dec!(500), dec!(1000)), dec!(52000));
    }

    #[test]
    fn synthetic_state_terminal_classification() {
        assert!(SyntheticState::AbortNoLeg.is_terminal());
        assert!(!SyntheticState::New.is_terminal());
    }
}
