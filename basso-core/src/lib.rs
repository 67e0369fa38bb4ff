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

//! The signal-processing pipeline for the Basso trading-automation platform:
//! duplicate detection, two-stage validation, the orchestrating
//! `SignalEngine`, the append-only audit trail, the human-confirmation gate,
//! and the ambient process stack (configuration, logging, shutdown).
//!
//! ## Modules
//! - `duplicate`: rolling-window fingerprint dedup (C)
//! - `validator`: condition/execution validation stages (D)
//! - `engine`: `SignalEngine`, the nine-step orchestrator (J)
//! - `audit`: append-only `AuditStore` (K)
//! - `confirmation`: `ConfirmationBus` human/default decision gate (O)
//! - `notifier`: best-effort operator notification capability
//! - `error`: the `AppError`/`Outcome`/`AuditOutcome` taxonomy
//! - `system`: process configuration
//! - `logging`, `shutdown`: ambient process stack

pub mod audit;
pub mod confirmation;
pub mod duplicate;
pub mod engine;
pub mod error;
pub mod logging;
pub mod notifier;
pub mod shutdown;
pub mod system;
pub mod validator;

pub use audit::{AuditRecord, AuditStore, InMemoryAuditStore};
pub use confirmation::{ConfirmationBus, ConfirmationKind, Decision};
pub use duplicate::{DuplicateDetector, DuplicateDetectorStats};
pub use engine::{SignalEngine, SignalEngineDeps};
pub use error::{AppError, AuditOutcome, Outcome};
pub use notifier::{LoggingNotifier, Notification, Notifier};
