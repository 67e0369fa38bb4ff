#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments, type_alias_bounds)]

//! Margin-aware auto-hedge orchestrator for the Basso trading-automation
//! platform: the margin-constants table (L), strategy schedule with
//! lookahead (M), and the periodic project→decide→select→execute control
//! loop (N).
//!
//! One tick per scheduler wakeup: project post-entry margin, decide whether
//! to buy or exit a hedge, select candidate strikes, and execute.
//!
//! ## Modules
//! - `constants`: per-basket margin table, hedge/selection/safety config (L/N)
//! - `margin`: `MarginMonitor`, intraday utilisation snapshots (L)
//! - `schedule`: `StrategySchedule`, today's entries with lookahead (M)
//! - `selector`: option-chain candidate ranking by MBPR (N step 5)
//! - `orchestrator`: `HedgeOrchestrator`, the per-tick control loop (N)

pub mod constants;
pub mod margin;
pub mod orchestrator;
pub mod schedule;
pub mod selector;

pub use constants::{ExpiryType, HedgeConfig};
pub use margin::{DailySummary, MarginMonitor, MarginSnapshot};
pub use orchestrator::{HedgeError, HedgeOrchestrator, TickContext, TickOutcome};
pub use schedule::{ScheduledEntry, StrategySchedule, UpcomingEntry};
pub use selector::{
    HedgeCandidate, HedgeSelection, OptionChainSource, OptionQuote, OptionType,
    SimulatedOptionChainSource,
};
