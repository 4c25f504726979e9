mod host_executor;

pub use host_executor::{HostExecutor, command_available};
