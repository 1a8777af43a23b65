use planforce_plan::PlanError;
use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ExecError {
    /// Connection loss, syntax error or any other hard backend failure.
    /// Propagated to the caller as-is; retry policy lives there, not here.
    #[error("backend '{backend}' execution failed: {source}")]
    Backend {
        backend: String,
        #[source]
        source: BoxedSource,
    },

    /// The backend cannot provide a requested capability (hint comments,
    /// statement timeouts, plan parsing) or the backend kind is unknown.
    /// A configuration error, not a runtime surprise on first call.
    #[error("backend '{backend}' does not support {feature}")]
    NotSupported {
        backend: String,
        feature: &'static str,
    },

    /// Backend configuration is missing a required field.
    #[error("invalid configuration for backend '{backend}': {message}")]
    Config { backend: String, message: String },

    /// A verification step expected a plan document that is absent.
    #[error("backend '{backend}' returned no plan to verify")]
    MissingPlan { backend: String },

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("dispatch worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl ExecError {
    pub fn backend(name: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        Self::Backend {
            backend: name.into(),
            source: source.into(),
        }
    }
}
