use thiserror::Error;

use crate::domain::OptimizationStatus;

/// Out-of-range or inconsistent configuration, detected before any feed is read.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("Invalid value for {field}: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    #[error("Configuration validation failed: {0}")]
    Validation(String),

    #[error("Configuration could not be loaded: {0}")]
    Load(String),
}

impl From<validator::ValidationErrors> for ConfigurationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ConfigurationError::Validation(errors.to_string())
    }
}

impl From<figment::Error> for ConfigurationError {
    fn from(error: figment::Error) -> Self {
        ConfigurationError::Load(error.to_string())
    }
}

/// Missing or invalid input data with no fallback available.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScenarioError {
    #[error("{feed} feed unavailable and no fallback defaults are configured: {reason}")]
    FeedUnavailable { feed: &'static str, reason: String },

    #[error("Invalid {field} at hour {hour}: {value}")]
    InvalidValue {
        hour: usize,
        field: &'static str,
        value: f64,
    },

    #[error("Horizon must contain at least one hour")]
    EmptyHorizon,
}

/// Solver-side failure. Maps onto the infeasible/error run statuses.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OptimizationError {
    #[error("Problem infeasible (constraint {constraint}{})", hour_suffix(.hour))]
    Infeasible {
        hour: Option<usize>,
        constraint: &'static str,
    },

    #[error("Solver exceeded its time limit after {after_seconds:.3}s without an incumbent")]
    TimedOut { after_seconds: f64 },

    #[error("Optimization cancelled")]
    Cancelled,

    #[error("Solver error: {0}")]
    Solver(String),
}

fn hour_suffix(hour: &Option<usize>) -> String {
    match hour {
        Some(h) => format!(" at hour {h}"),
        None => String::new(),
    }
}

impl OptimizationError {
    pub fn status(&self) -> OptimizationStatus {
        match self {
            OptimizationError::Infeasible { .. } => OptimizationStatus::Infeasible,
            OptimizationError::TimedOut { .. }
            | OptimizationError::Cancelled
            | OptimizationError::Solver(_) => OptimizationStatus::Error,
        }
    }
}

/// Errors that abort a run before a summary can be produced.
///
/// Optimization failures are not among them: they end up in the summary's status and message.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error("Optimization worker failed: {0}")]
    Worker(String),
}
