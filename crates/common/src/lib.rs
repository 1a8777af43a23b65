//! Shared infrastructure for the Planforce execution harness.
//!
//! This crate holds the pieces every other Planforce crate leans on:
//!
//! - **Config**: backend and dispatch configuration, loaded from a file
//!   plus `PLANFORCE`-prefixed environment overrides.
//! - **Telemetry**: `tracing` subscriber initialization.
//! - **Scrubber**: credential redaction for DSNs before they reach logs
//!   or backend identities.

pub mod config;
pub mod scrubber;
pub mod telemetry;
