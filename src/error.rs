use thiserror::Error;

/// Errors returned to callers of the core operations.
///
/// Degraded dependencies (display-name lookup) and publish failures are
/// recovered or logged at the call site and never surface here.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}
