//! # Broker
//!
//! Hosts the `live` broker-gateway and option-chain-source implementations
//! behind a cargo feature (the broker HTTP wire format is out of scope here)
//! and re-exports the simulated equivalents so callers only need to depend
//! on one crate to pick either backend.

#[cfg(feature = "live")]
pub mod live;

#[cfg(feature = "live")]
pub use live::{LiveBrokerConfig, LiveBrokerGateway, LiveOptionChainSource};

pub use basso_execution::SimulatedBrokerGateway;
pub use basso_hedge::SimulatedOptionChainSource;
