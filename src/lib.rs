pub mod baseline;
pub mod config;
pub mod cost;
pub mod domain;
pub mod error;
pub mod optimizer;
pub mod physics;
pub mod repo;
pub mod runner;
pub mod scenario;
pub mod summary;
pub mod telemetry;

pub use config::Config;
pub use error::{ConfigurationError, DispatchError, OptimizationError, ScenarioError};
pub use runner::{run_optimization, spawn_optimization, RunRequest};
