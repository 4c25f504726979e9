use super::{ExecError, ExecResult};
use std::fmt::Debug;
use std::time::Duration;

/// Trait for spawning external commands.
///
/// Every runtime invocation the harness performs goes through this seam, so
/// tests can script responses without a container runtime on the host.
pub trait CommandExecutor: Send + Sync + Debug {
    /// Run `argv` to completion or abort at `timeout`.
    ///
    /// Single attempt, no retries. A nonzero exit is an `Ok` result; only a
    /// timeout or a failure to launch the process at all is an error.
    fn execute(&self, argv: &[String], timeout: Duration) -> Result<ExecResult, ExecError>;
}
