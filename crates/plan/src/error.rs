use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    /// A required field is absent from a plan record. Fatal to that
    /// parse, never to the surrounding batch.
    #[error("malformed plan: missing field '{field}' ({context})")]
    MalformedPlan {
        field: &'static str,
        context: String,
    },

    /// The plan shape violates a documented assumption. This guards
    /// against backend plan shapes the parser does not yet understand
    /// and is treated as a data-quality signal about the backend/query.
    #[error("plan invariant violated: {message}")]
    InvariantViolation { message: String },
}
