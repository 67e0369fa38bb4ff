//! Process-level configuration and system assembly. Everything here is
//! constructed once at startup and passed down explicitly, never a
//! process-global.

pub mod config;
