//! Central error type aggregating failures from every subsystem the
//! `SignalEngine` touches.
//!
//! One `thiserror`-derived enum per crate boundary, `#[from]` conversions at
//! each seam so `?` composes end-to-end without a generic `anyhow`-style
//! catch-all.

use basso_execution::gateway::GatewayError;
use basso_execution::executor::ExecutionError;
use basso_risk::portfolio::AdmissionError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every outcome the `SignalEngine` can produce for one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Outcome {
    Executed,
    Rejected,
    Blocked,
    Duplicate,
    Error,
    ConfirmedOverride,
}

/// The `AuditRecord` outcome enum, distinct from [`Outcome`]: this is the
/// persisted, more granular classification written to the audit trail,
/// while `Outcome` is what the webhook envelope reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum AuditOutcome {
    Processed,
    RejectedValidation,
    RejectedRisk,
    Duplicate,
    FailedOrder,
    PartialFill,
    RollbackFailed,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("signal validation rejected: {0}")]
    ValidationRejected(String),

    #[error("position sizer produced zero lots")]
    ZeroLots,

    #[error("portfolio admission rejected: {0}")]
    PortfolioCap(#[from] AdmissionError),

    #[error("broker gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("order execution failed: {0}")]
    Execution(#[from] ExecutionError),

    #[error("confirmation bus request timed out or queue saturated")]
    ConfirmationUnavailable,
}

impl AppError {
    /// Maps this error onto the `AuditOutcome` classification.
    pub fn audit_outcome(&self) -> AuditOutcome {
        match self {
            AppError::ValidationRejected(_) => AuditOutcome::RejectedValidation,
            AppError::ZeroLots | AppError::PortfolioCap(_) => AuditOutcome::RejectedRisk,
            AppError::Gateway(_) => AuditOutcome::FailedOrder,
            AppError::Execution(err) => match err {
                ExecutionError::PartialFillUnresolved => AuditOutcome::PartialFill,
                ExecutionError::RollbackFailed => AuditOutcome::RollbackFailed,
                _ => AuditOutcome::FailedOrder,
            },
            AppError::ConfirmationUnavailable => AuditOutcome::FailedOrder,
        }
    }
}
