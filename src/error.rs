//! Error types for Mantic.
//!
//! All errors are strongly typed using thiserror. Provider failures are a
//! closed enum with an explicit retry classification so the dispatcher can
//! branch with a total match instead of inspecting error messages.

use std::time::Duration;

use thiserror::Error;

/// Validation errors that occur during input or configuration validation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error(
        "Birth date is incomplete: year, month and day must all be present (missing {missing})"
    )]
    IncompleteBirthDate {
        missing: String,
    },

    #[error("Invalid birth date: {reason}")]
    InvalidBirthDate {
        reason: String,
    },

    #[error("Expected 3 or 6 numbers, got {count}")]
    InvalidNumberCount {
        count: usize,
    },

    #[error("Value {value} for '{field}' is out of range [0.0, 1.0]")]
    OutOfUnitRange {
        field: String,
        value: f64,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Invalid selection bounds: min {min} must be >= 1 and <= max {max}")]
    InvalidSelectionBounds {
        min: usize,
        max: usize,
    },

    #[error("Theory '{name}' is registered twice")]
    DuplicateTheory {
        name: String,
    },

    #[error("Provider '{name}' is not registered")]
    UnknownProvider {
        name: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Failure returned by a single provider attempt.
///
/// Each variant carries a fixed retry classification (see [`ProviderError::is_retryable`]).
/// `EmptyResponse` is special-cased by the dispatcher: retried once, then fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Request timed out after {}ms", .after.as_millis())]
    Timeout {
        after: Duration,
    },

    #[error("Connection error: {message}")]
    ConnectionError {
        message: String,
    },

    #[error("Rate limited{}", format_retry_after(.retry_after.as_ref()))]
    RateLimited {
        retry_after: Option<Duration>,
    },

    #[error("Authentication failed: {message}")]
    AuthError {
        message: String,
    },

    #[error("Malformed request: {message}")]
    MalformedRequest {
        message: String,
    },

    #[error("Server error (status {status}): {message}")]
    ServerError {
        status: u16,
        message: String,
    },

    #[error("Provider returned an empty response")]
    EmptyResponse,
}

impl ProviderError {
    /// Classifies an HTTP status code returned by a backend.
    ///
    /// Returns `None` for success codes.
    #[must_use]
    pub fn from_status(
        status: u16,
        retry_after: Option<Duration>,
        body: impl Into<String>,
    ) -> Option<Self> {
        let message = body.into();
        match status {
            200..=299 => None,
            401 | 403 => Some(Self::AuthError { message }),
            408 => Some(Self::Timeout {
                after: Duration::ZERO,
            }),
            429 => Some(Self::RateLimited { retry_after }),
            500..=599 => Some(Self::ServerError { status, message }),
            _ => Some(Self::MalformedRequest {
                message: format!("status {status}: {message}"),
            }),
        }
    }

    /// Returns true if retrying the same provider may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. }
            | Self::ConnectionError { .. }
            | Self::RateLimited { .. }
            | Self::ServerError { .. }
            | Self::EmptyResponse => true,
            Self::AuthError { .. } | Self::MalformedRequest { .. } => false,
        }
    }

    /// Short stable label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::ConnectionError { .. } => "connection",
            Self::RateLimited { .. } => "rate_limited",
            Self::AuthError { .. } => "auth",
            Self::MalformedRequest { .. } => "malformed_request",
            Self::ServerError { .. } => "server",
            Self::EmptyResponse => "empty_response",
        }
    }
}

/// Last failure observed on one provider during a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// Provider name.
    pub provider: String,
    /// Number of attempts made against this provider.
    pub attempts: u32,
    /// The terminal error.
    pub error: ProviderError,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} attempts): {}", self.provider, self.attempts, self.error)
    }
}

/// Dispatch-level failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("All providers exhausted for task '{task}': {}", format_failures(.failures))]
    AllProvidersExhausted {
        task: String,
        failures: Vec<ProviderFailure>,
    },

    #[error("No provider is available for task '{task}'")]
    NoProviderAvailable {
        task: String,
    },
}

fn format_retry_after(retry_after: Option<&Duration>) -> String {
    retry_after
        .map(|d| format!(", retry after {}ms", d.as_millis()))
        .unwrap_or_default()
}

fn format_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Stage of the analysis pipeline an error surfaced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Calculate,
    StandardAnswer,
    Interpret,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Calculate => write!(f, "calculate"),
            Self::StandardAnswer => write!(f, "standard_answer"),
            Self::Interpret => write!(f, "interpret"),
        }
    }
}

/// Execution errors that occur while running an analysis.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Conflict resolution requires at least one theory result")]
    EmptyResultSet,

    #[error("No theory in the catalog can analyze this input")]
    NoApplicableTheory,

    #[error("Theory not found: {name}")]
    UnknownTheory {
        name: String,
    },

    #[error("Theory '{theory}' failed during {stage}: {message}")]
    TheoryFailed {
        theory: String,
        stage: Stage,
        message: String,
    },

    #[error("Theory '{theory}' failed during {stage}: {source}")]
    Interpretation {
        theory: String,
        stage: Stage,
        #[source]
        source: DispatchError,
    },

    #[error("Interpretation task for theory '{theory}' was aborted: {message}")]
    TaskAborted {
        theory: String,
        message: String,
    },
}

/// Top-level error type for Mantic.
#[derive(Debug, Error)]
pub enum ManticError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl ManticError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if every provider was tried and failed while
    /// interpreting a theory.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(
            self,
            Self::Execution(ExecutionError::Interpretation {
                source: DispatchError::AllProvidersExhausted { .. },
                ..
            })
        )
    }

    /// Returns true if the whole analysis may succeed when retried later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.is_exhausted()
    }
}

/// Result type alias for Mantic operations.
pub type ManticResult<T> = Result<T, ManticError>;
