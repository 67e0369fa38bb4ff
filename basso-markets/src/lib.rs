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

//! # Markets
//!
//! Domain model shared across the Basso platform: exchanges, instruments,
//! signals, positions, and the time/calendar abstractions the rest of the
//! workspace is built against.
//!
//! ## Modules
//! - `exchange`: exchange identity (`NSE`, `MCX`, `Simulated`)
//! - `side`: buy/sell
//! - `instrument`: the five tradeable instruments, lot sizing, per-instrument
//!   risk/vol/margin configuration
//! - `signal`: externally generated trading intentions and their validation
//! - `position`: executed exposures
//! - `clock`: injectable time source (`SystemClock`, `FixedClock`)
//! - `calendar`: market-hour and holiday predicates

pub mod calendar;
pub mod clock;
pub mod exchange;
pub mod instrument;
pub mod position;
pub mod side;
pub mod signal;

pub use calendar::{Calendar, StaticCalendar, BUSINESS_TZ};
pub use clock::{Clock, FixedClock, SystemClock};
pub use exchange::ExchangeId;
pub use instrument::{Instrument, InstrumentConfig, Limiter, UnknownInstrument};
pub use position::{Position, PositionId, PositionStatus};
pub use side::Side;
pub use signal::{Signal, SignalFingerprint, SignalKind, SignalParseError, SignalValidationError, Slot};
