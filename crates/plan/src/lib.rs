//! Execution-plan intermediate representation for Planforce.
//!
//! This crate owns the pieces of the verification loop that never touch
//! a database:
//!
//! - [`node`] - the recursive [`node::PlanNode`] tree one plan parses into
//! - [`parse`] - recursive-descent parser over a backend's
//!   `EXPLAIN (FORMAT JSON)` output
//! - [`hint`] - the canonical hint-string serialization used both to
//!   request a forced plan and to verify the plan that actually ran
//!
//! Trees are immutable once parsed; a fresh tree is built per parse
//! call. Child order is preserved exactly as the backend reported it,
//! because join side is load-bearing for hint canonicalization.

pub mod error;
pub mod hint;
pub mod node;
pub mod parse;

pub use error::PlanError;
pub use node::{OperatorAttrs, PlanNode, TableRef};
