pub mod exec;
pub mod traits;

pub use exec::{ExecError, ExecResult};
pub use traits::CommandExecutor;
