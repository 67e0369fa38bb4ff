//! Standardised `tracing` initialisers for the platform: a human-readable
//! subscriber for interactive use and a JSON subscriber for production.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use basso_core::logging::init_logging;
//!
//! fn main() {
//!     init_logging();
//!     tracing::info!("signal engine started");
//! }
//! ```
//!
//! `RUST_LOG` selects verbosity per the usual `tracing_subscriber::EnvFilter`
//! syntax, e.g. `RUST_LOG=basso_core=debug,basso_hedge=info`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialises human-readable logging, defaulting to `INFO` when `RUST_LOG`
/// is unset.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialises JSON logging, for ingestion by an aggregator.
pub fn init_json_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
        .init();
}
