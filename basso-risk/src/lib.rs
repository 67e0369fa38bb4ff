// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
//! # Risk
//!
//! Position sizing, stop management, pyramid admission, and the portfolio
//! aggregate for the Basso signal engine.
//!
//! ## Modules
//! - `check`: generic [`RiskCheck`] trait and a `CheckHigherThan` building
//!   block, reused by the portfolio and pyramid gates below
//! - `sizer`: Tom-Basso triple-constraint position sizing
//! - `stop`: per-position ATR trailing-stop ratchet
//! - `pyramid`: instrument/portfolio/profit pyramid gates
//! - `portfolio`: the singleton `PortfolioState` aggregate

pub mod check;
pub mod portfolio;
pub mod pyramid;
pub mod sizer;
pub mod stop;

pub use check::{CheckHigherThan, CheckHigherThanError, RiskCheck};
pub use portfolio::{AdmissionError, EquityMode, PortfolioSnapshot, PortfolioState};
pub use pyramid::{GateFailure, PyramidGateInput, PyramidGateResult};
pub use sizer::{SizingInput, SizingResult};
pub use stop::StopUpdate;
