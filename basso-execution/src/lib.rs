#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments, type_alias_bounds)]

//! # Execution
//!
//! Order execution against the abstract `BrokerGateway` capability: simple
//! limit orders, a progressive-widening retry strategy, and the explicit
//! synthetic multi-leg state machine Bank Nifty entries/exits require.
//!
//! ## Modules
//! - `gateway`: the `BrokerGateway` trait and its wire-neutral DTOs
//! - `executor`: `SimpleLimit`/`Progressive` strategies and the synthetic
//!   leg state machine
//! - `simulator`: an in-memory `BrokerGateway` for tests and `backtest`

pub mod executor;
pub mod gateway;
pub mod simulator;

pub use executor::{
    execute_progressive, execute_simple_limit, round_to_strike, run_synthetic, ExecutionError,
    Fill, PartialFillStrategy, ProgressiveConfig, SimpleLimitConfig, SyntheticLeg, SyntheticState,
};
pub use gateway::{
    BrokerGateway, BrokerPosition, Funds, GatewayError, OrderId, OrderKind, OrderStatus,
    OrderStatusReport, PlaceOrderAck, Quote,
};
pub use simulator::SimulatedBrokerGateway;
