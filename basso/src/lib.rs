//! `basso` facade crate
//!
//! Re-exports every crate of the basso derivatives trading-automation
//! platform under one namespace, so a caller who only wants to wire up an
//! engine doesn't have to depend on eight path crates individually. The
//! `basso` binary (`src/bin/basso.rs`) is the platform's CLI entry point.
//!
//! # Example
//! ```rust
//! use basso::markets::exchange::ExchangeId;
//! let _exchange: ExchangeId = ExchangeId::Nse;
//! ```

pub use basso_analytics as analytics;
pub use basso_broker as broker;
pub use basso_core as core;
pub use basso_execution as execution;
pub use basso_hedge as hedge;
pub use basso_markets as markets;
pub use basso_risk as risk;

// Flat re-export of the symbols most callers reach for first.
pub use basso_core::engine::{SignalEngine, SignalEngineDeps};
pub use basso_markets::exchange::ExchangeId;
pub use basso_markets::side::Side;
pub use basso_markets::signal::Signal;

/// Single import for wiring up a full engine.
pub mod prelude {
    pub use crate::core::engine::{SignalEngine, SignalEngineDeps};
    pub use crate::core::system::config::SystemConfig;
    pub use crate::execution::gateway::BrokerGateway;
    pub use crate::execution::SimulatedBrokerGateway;
    pub use crate::hedge::{HedgeOrchestrator, TickContext};
    pub use crate::markets::clock::{Clock, FixedClock, SystemClock};
    pub use crate::markets::exchange::ExchangeId;
    pub use crate::markets::side::Side;
    pub use crate::markets::signal::Signal;
}
