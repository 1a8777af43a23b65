//! Dispatch and reconciliation for hinted SQL execution.
//!
//! This crate ties a hinted query to a verified outcome:
//!
//! - [`backend`] - the [`backend::Backend`] capability trait plus the
//!   Postgres and DuckDB implementations
//! - [`dispatch`] - submits `(SQL, hint)` pairs with timeout
//!   enforcement; timeouts are a normal Result state, not an error
//! - [`reconcile`] - compares the executed plan's canonical hint
//!   against the intended one and produces a latency/diagnostic report
//!
//! Queries are dispatched independently and concurrently; within one
//! query, parse -> canonicalize -> reconcile is strictly sequential.

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod reconcile;
pub mod result;

pub use backend::{backend_from_config, Backend, RawRun};
pub use dispatch::{Dispatcher, QueryJob};
pub use error::ExecError;
pub use reconcile::{
    CandidateAnnotation, CandidatePlan, Intent, ReconcileStatus, Reconciler, Report,
};
pub use result::ExecResult;
