use crate::domain::{CommandExecutor, ExecError, ExecResult};
use std::sync::RwLock;
use std::time::Duration;

#[derive(Debug, Clone)]
enum MockBehavior {
    Respond(ExecResult),
    Timeout,
    FailLaunch,
}

/// Recording executor with scriptable responses.
///
/// Rules match when their needle occurs in the space-joined argv; the most
/// recently registered matching rule wins. Unmatched invocations succeed with
/// empty output.
#[derive(Debug, Default)]
pub struct MockExecutor {
    calls: RwLock<Vec<Vec<String>>>,
    rules: RwLock<Vec<(String, MockBehavior)>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responds with `result` for commands whose argv contains `needle`.
    pub fn on(&self, needle: &str, result: ExecResult) {
        self.push_rule(needle, MockBehavior::Respond(result));
    }

    pub fn on_exit(&self, needle: &str, exit_code: i32, stdout: &str) {
        self.on(needle, ExecResult::new(exit_code, stdout, ""));
    }

    /// Simulates the timeout elapsing for matching commands.
    pub fn timeout_on(&self, needle: &str) {
        self.push_rule(needle, MockBehavior::Timeout);
    }

    /// Simulates the executable failing to launch for matching commands.
    pub fn launch_failure_on(&self, needle: &str) {
        self.push_rule(needle, MockBehavior::FailLaunch);
    }

    /// Every argv executed so far, in order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.read().unwrap().clone()
    }

    fn push_rule(&self, needle: &str, behavior: MockBehavior) {
        self.rules
            .write()
            .unwrap()
            .push((needle.to_string(), behavior));
    }
}

impl CommandExecutor for MockExecutor {
    fn execute(&self, argv: &[String], timeout: Duration) -> Result<ExecResult, ExecError> {
        self.calls.write().unwrap().push(argv.to_vec());

        let joined = argv.join(" ");
        let behavior = self
            .rules
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|(needle, _)| joined.contains(needle))
            .map(|(_, behavior)| behavior.clone());

        match behavior {
            Some(MockBehavior::Respond(result)) => Ok(result),
            Some(MockBehavior::Timeout) => Err(ExecError::Timeout {
                command: joined,
                timeout,
            }),
            Some(MockBehavior::FailLaunch) => Err(ExecError::Launch {
                command: joined,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "mock launch failure"),
            }),
            None => Ok(ExecResult::ok("")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn records_calls_in_order() {
        let mock = MockExecutor::new();
        mock.execute(&argv(&["podman", "stop"]), Duration::from_secs(1))
            .unwrap();
        mock.execute(&argv(&["podman", "run"]), Duration::from_secs(1))
            .unwrap();

        let calls = mock.calls();
        assert_eq!(calls[0][1], "stop");
        assert_eq!(calls[1][1], "run");
    }

    #[test]
    fn most_recent_matching_rule_wins() {
        let mock = MockExecutor::new();
        mock.on_exit("run", 0, "first");
        mock.on_exit("run", 0, "second");

        let result = mock
            .execute(&argv(&["podman", "run"]), Duration::from_secs(1))
            .unwrap();
        assert_eq!(result.stdout, "second");
    }

    #[test]
    fn unmatched_commands_succeed_empty() {
        let mock = MockExecutor::new();
        let result = mock
            .execute(&argv(&["podman", "exec"]), Duration::from_secs(1))
            .unwrap();
        assert!(result.success());
        assert!(result.stdout.is_empty());
    }
}
