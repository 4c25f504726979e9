pub mod checks;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infra;
pub mod runner;

// Available to integration tests. A production crate might hide this behind
// a "test-utils" feature.
pub mod test_support;

pub use config::HarnessConfig;
pub use domain::{CommandExecutor, ExecError, ExecResult};
pub use infra::HostExecutor;
pub use runner::{ImageRunner, RunnerError};
