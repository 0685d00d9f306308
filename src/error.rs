//! Error types.
//!
//! Two layers:
//! - [`FitError`]: the fitting core's taxonomy (returned by `fit` / `render`)
//! - [`AppError`]: what the binary reports, carrying a process exit code
//!
//! Exit codes: `2` input/IO/usage, `3` unusable data, `4` numerical failure.

/// Failures of the fitting core.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum FitError {
    /// Malformed or insufficient series, zero heating rate, bad bounds.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unrecognized optimization strategy name.
    #[error("invalid method '{0}' (expected one of: minimize, least squares, differential evolution)")]
    InvalidMethod(String),

    /// Integrals or model values that are zero/non-finite where they must not be.
    #[error("numerically degenerate input: {0}")]
    NumericDegenerate(String),

    /// `render` was called before a successful `fit`.
    #[error("no fitted parameters available; run a fit first")]
    NotFitted,
}

impl FitError {
    pub fn exit_code(&self) -> u8 {
        match self {
            FitError::InvalidInput(_) | FitError::InvalidMethod(_) => 3,
            FitError::NumericDegenerate(_) | FitError::NotFitted => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
