use thiserror::Error;

/// Errors returned to callers of the inference service.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NnEvalError {
    #[error("Backend failure: {0}")]
    Backend(String),

    #[error("Unsupported rules: {0}")]
    UnsupportedRules(String),

    #[error("Board {x_size}x{y_size} does not fit a {nn_x_len}x{nn_y_len} net")]
    BoardTooLarge {
        x_size: usize,
        y_size: usize,
        nn_x_len: usize,
        nn_y_len: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No server threads are running")]
    NoServerThreads,

    #[error("Inference service stopped")]
    ServiceStopped,

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
}

impl From<crate::backend::BackendError> for NnEvalError {
    fn from(e: crate::backend::BackendError) -> Self {
        NnEvalError::Backend(e.to_string())
    }
}
