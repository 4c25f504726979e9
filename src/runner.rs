use crate::domain::{CommandExecutor, ExecError, ExecResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(30);
const START_TIMEOUT: Duration = Duration::from_secs(60);
const STOP_TIMEOUT: Duration = Duration::from_secs(30);
const INSPECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to start container from {image}: {detail}")]
    Start { image: String, detail: String },

    #[error("container not started; call start() first")]
    NotStarted,

    #[error("invalid environment variable name: {0:?}")]
    InvalidEnvName(String),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Session-scoped runner for one image variant.
///
/// Starts a single container kept alive with `sleep infinity` and routes
/// every probe through `podman exec`, avoiding the cost of a fresh container
/// per check. All probes against a shared runner must be read-only: checks
/// may run in any order and must not leave state behind.
#[derive(Debug)]
pub struct ImageRunner {
    image: String,
    container_id: Option<String>,
    executor: Arc<dyn CommandExecutor>,
}

impl ImageRunner {
    pub fn new(image: impl Into<String>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            image: image.into(),
            container_id: None,
            executor,
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn is_running(&self) -> bool {
        self.container_id.is_some()
    }

    /// Launches a detached, auto-removing container running `sleep infinity`
    /// and records the runtime-assigned id.
    ///
    /// Calling `start` twice without an intervening `stop` is not guarded;
    /// the runner has a single owner and that owner must not do so.
    pub fn start(&mut self) -> Result<(), RunnerError> {
        let argv = podman(&["run", "-d", "--rm", &self.image, "sleep", "infinity"]);
        let result =
            self.executor
                .execute(&argv, START_TIMEOUT)
                .map_err(|e| RunnerError::Start {
                    image: self.image.clone(),
                    detail: e.to_string(),
                })?;

        if !result.success() {
            return Err(RunnerError::Start {
                image: self.image.clone(),
                detail: result.stderr.trim().to_string(),
            });
        }

        let id = result.stdout.trim().to_string();
        debug!(image = %self.image, id = %id, "container started");
        self.container_id = Some(id);
        Ok(())
    }

    /// Stops the container with a 1 second grace period.
    ///
    /// Best-effort cleanup: failures are logged and swallowed, and the owned
    /// id is cleared either way. No-op when nothing is running.
    pub fn stop(&mut self) {
        let Some(id) = self.container_id.take() else {
            return;
        };

        let argv = podman(&["stop", "-t", "1", &id]);
        match self.executor.execute(&argv, STOP_TIMEOUT) {
            Ok(result) if !result.success() => {
                warn!(id = %id, stderr = %result.stderr.trim(), "container stop exited nonzero");
            }
            Ok(_) => debug!(id = %id, "container stopped"),
            Err(e) => warn!(id = %id, error = %e, "container stop failed"),
        }
    }

    /// Executes `command` inside the running container via `bash -c`.
    ///
    /// The result is returned unmodified; callers interpret exit codes and
    /// output themselves.
    pub fn run(&self, command: &str) -> Result<ExecResult, RunnerError> {
        self.run_with_timeout(command, DEFAULT_EXEC_TIMEOUT)
    }

    pub fn run_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecResult, RunnerError> {
        let id = self.container_id.as_deref().ok_or(RunnerError::NotStarted)?;
        let argv = podman(&["exec", id, "bash", "-c", command]);
        Ok(self.executor.execute(&argv, timeout)?)
    }

    /// Reads an environment variable from inside the container.
    ///
    /// The name must match `[A-Za-z0-9_]+` and is validated before any
    /// command is built. Returns the trimmed value, or an empty string when
    /// the variable is unset or the probe exited nonzero.
    pub fn get_env(&self, name: &str) -> Result<String, RunnerError> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(RunnerError::InvalidEnvName(name.to_string()));
        }

        let result = self.run(&format!("printenv {name}"))?;
        if result.success() {
            Ok(result.stdout.trim().to_string())
        } else {
            Ok(String::new())
        }
    }

    pub fn file_exists(&self, path: &str) -> Result<bool, RunnerError> {
        let result = self.run(&format!("test -f {}", shell_quote(path)))?;
        Ok(result.success())
    }

    pub fn dir_exists(&self, path: &str) -> Result<bool, RunnerError> {
        let result = self.run(&format!("test -d {}", shell_quote(path)))?;
        Ok(result.success())
    }

    /// Image labels, normalized so callers can always look keys up.
    ///
    /// podman prints `null` for an image without labels; that, a non-object
    /// value, malformed JSON, and a nonzero inspect exit all collapse to an
    /// empty map rather than an error.
    pub fn get_labels(&self) -> Result<HashMap<String, String>, RunnerError> {
        let argv = podman(&[
            "inspect",
            "--format",
            "{{json .Config.Labels}}",
            &self.image,
        ]);
        let result = self.executor.execute(&argv, INSPECT_TIMEOUT)?;

        if !result.success() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&result.stdout).unwrap_or_default())
    }

    /// Reads an arbitrary image config field by name.
    ///
    /// `None` covers absent fields, JSON `null`, malformed output, and a
    /// failed inspect alike; a missing and a malformed value are deliberately
    /// indistinguishable here.
    pub fn get_config(&self, key: &str) -> Result<Option<Value>, RunnerError> {
        let format = format!("{{{{json .Config.{key}}}}}");
        let argv = podman(&["inspect", "--format", &format, &self.image]);
        let result = self.executor.execute(&argv, INSPECT_TIMEOUT)?;

        if !result.success() {
            return Ok(None);
        }
        Ok(serde_json::from_str::<Value>(&result.stdout)
            .ok()
            .filter(|v| !v.is_null()))
    }
}

impl Drop for ImageRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn podman(args: &[&str]) -> Vec<String> {
    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push("podman".to_string());
    argv.extend(args.iter().map(ToString::to_string));
    argv
}

/// POSIX single-quoting, safe for paths containing spaces or quotes.
fn shell_quote(input: &str) -> String {
    if input.is_empty() {
        return "''".to_string();
    }
    format!("'{}'", input.replace('\'', "'\"'\"'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockExecutor;

    fn started_runner(mock: Arc<MockExecutor>) -> ImageRunner {
        mock.on_exit("run -d --rm", 0, "abc123\n");
        let mut runner = ImageRunner::new("quay.io/example/base:latest", mock);
        runner.start().unwrap();
        runner
    }

    #[test]
    fn shell_quote_handles_spaces_and_quotes() {
        assert_eq!(shell_quote("/tmp/a b"), "'/tmp/a b'");
        assert_eq!(shell_quote("it's"), "'it'\"'\"'s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn start_records_trimmed_container_id() {
        let mock = Arc::new(MockExecutor::new());
        let runner = started_runner(mock.clone());

        assert!(runner.is_running());
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            vec![
                "podman",
                "run",
                "-d",
                "--rm",
                "quay.io/example/base:latest",
                "sleep",
                "infinity",
            ]
        );
    }

    #[test]
    fn start_failure_carries_stderr() {
        let mock = Arc::new(MockExecutor::new());
        mock.on("run -d --rm", ExecResult::new(125, "", "image not known\n"));

        let mut runner = ImageRunner::new("quay.io/example/base:latest", mock);
        let err = runner.start().unwrap_err();
        assert!(matches!(err, RunnerError::Start { .. }));
        assert!(err.to_string().contains("image not known"));
        assert!(!runner.is_running());
    }

    #[test]
    fn missing_runtime_binary_is_a_start_error() {
        let mock = Arc::new(MockExecutor::new());
        mock.launch_failure_on("run -d --rm");

        let mut runner = ImageRunner::new("quay.io/example/base:latest", mock);
        assert!(matches!(
            runner.start().unwrap_err(),
            RunnerError::Start { .. }
        ));
    }

    #[test]
    fn start_timeout_is_a_start_error() {
        let mock = Arc::new(MockExecutor::new());
        mock.timeout_on("run -d --rm");

        let mut runner = ImageRunner::new("quay.io/example/base:latest", mock);
        assert!(matches!(
            runner.start().unwrap_err(),
            RunnerError::Start { .. }
        ));
    }

    #[test]
    fn run_requires_started_container() {
        let mock = Arc::new(MockExecutor::new());
        let runner = ImageRunner::new("quay.io/example/base:latest", mock.clone());

        let err = runner.run("id -u").unwrap_err();
        assert!(matches!(err, RunnerError::NotStarted));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn run_wraps_command_in_bash() {
        let mock = Arc::new(MockExecutor::new());
        let runner = started_runner(mock.clone());

        runner.run("id -u").unwrap();
        let calls = mock.calls();
        assert_eq!(
            calls[1],
            vec!["podman", "exec", "abc123", "bash", "-c", "id -u"]
        );
    }

    #[test]
    fn stop_clears_id_and_is_idempotent() {
        let mock = Arc::new(MockExecutor::new());
        let mut runner = started_runner(mock.clone());

        runner.stop();
        assert!(!runner.is_running());
        let calls = mock.calls();
        assert_eq!(calls[1], vec!["podman", "stop", "-t", "1", "abc123"]);

        // Second stop is a no-op.
        runner.stop();
        assert_eq!(mock.calls().len(), 2);
    }

    #[test]
    fn stop_failure_is_swallowed() {
        let mock = Arc::new(MockExecutor::new());
        let mut runner = started_runner(mock.clone());
        mock.on("stop -t 1", ExecResult::new(1, "", "no such container\n"));

        runner.stop();
        assert!(!runner.is_running());
    }

    #[test]
    fn handle_is_startable_again_after_stop() {
        let mock = Arc::new(MockExecutor::new());
        let mut runner = started_runner(mock.clone());

        runner.stop();
        runner.start().unwrap();
        assert!(runner.is_running());
    }

    #[test]
    fn drop_stops_running_container() {
        let mock = Arc::new(MockExecutor::new());
        let runner = started_runner(mock.clone());
        drop(runner);

        let calls = mock.calls();
        assert_eq!(calls.last().unwrap()[1], "stop");
    }

    #[test]
    fn get_env_returns_trimmed_value() {
        let mock = Arc::new(MockExecutor::new());
        let runner = started_runner(mock.clone());
        mock.on_exit("printenv HOME", 0, "/opt/app-root/src\n");

        assert_eq!(runner.get_env("HOME").unwrap(), "/opt/app-root/src");
    }

    #[test]
    fn get_env_unset_variable_is_empty() {
        let mock = Arc::new(MockExecutor::new());
        let runner = started_runner(mock.clone());
        mock.on("printenv NO_SUCH_VAR", ExecResult::new(1, "", ""));

        assert_eq!(runner.get_env("NO_SUCH_VAR").unwrap(), "");
    }

    #[test]
    fn get_env_rejects_unsafe_names_before_any_exec() {
        let mock = Arc::new(MockExecutor::new());
        let runner = started_runner(mock.clone());
        let before = mock.calls().len();

        for name in ["bad name", "a;b", "$(reboot)", "a-b", "", "A\"B"] {
            let err = runner.get_env(name).unwrap_err();
            assert!(matches!(err, RunnerError::InvalidEnvName(_)), "{name:?}");
        }
        assert_eq!(mock.calls().len(), before);
    }

    #[test]
    fn get_env_accepts_alphanumeric_and_underscore() {
        let mock = Arc::new(MockExecutor::new());
        let runner = started_runner(mock.clone());

        for name in ["PATH", "_private", "UV_CONFIG_FILE", "x86_64"] {
            assert!(runner.get_env(name).is_ok(), "{name:?}");
        }
    }

    #[test]
    fn file_exists_follows_exit_code() {
        let mock = Arc::new(MockExecutor::new());
        let runner = started_runner(mock.clone());
        mock.on_exit("test -f '/etc/pip.conf'", 0, "");
        mock.on("test -f '/etc/missing'", ExecResult::new(1, "", ""));

        assert!(runner.file_exists("/etc/pip.conf").unwrap());
        assert!(!runner.file_exists("/etc/missing").unwrap());
    }

    #[test]
    fn exists_probes_quote_hostile_paths() {
        let mock = Arc::new(MockExecutor::new());
        let runner = started_runner(mock.clone());

        runner.dir_exists("/tmp/with space/and'quote").unwrap();
        let calls = mock.calls();
        assert_eq!(
            calls.last().unwrap()[5],
            "test -d '/tmp/with space/and'\"'\"'quote'"
        );
    }

    #[test]
    fn get_labels_parses_object() {
        let mock = Arc::new(MockExecutor::new());
        let runner = started_runner(mock.clone());
        mock.on_exit(
            "{{json .Config.Labels}}",
            0,
            r#"{"com.opendatahub.accelerator":"cpu","name":"python-base"}"#,
        );

        let labels = runner.get_labels().unwrap();
        assert_eq!(
            labels.get("com.opendatahub.accelerator").map(String::as_str),
            Some("cpu")
        );
    }

    #[test]
    fn get_labels_normalizes_null_and_garbage() {
        for stdout in ["null", "", "not json", "[1,2]", "\"text\""] {
            let mock = Arc::new(MockExecutor::new());
            let runner = started_runner(mock.clone());
            mock.on_exit("{{json .Config.Labels}}", 0, stdout);

            assert!(runner.get_labels().unwrap().is_empty(), "{stdout:?}");
        }
    }

    #[test]
    fn get_labels_normalizes_inspect_failure() {
        let mock = Arc::new(MockExecutor::new());
        let runner = started_runner(mock.clone());
        mock.on(
            "{{json .Config.Labels}}",
            ExecResult::new(125, "", "no such image\n"),
        );

        assert!(runner.get_labels().unwrap().is_empty());
    }

    #[test]
    fn get_config_returns_parsed_value() {
        let mock = Arc::new(MockExecutor::new());
        let runner = started_runner(mock.clone());
        mock.on_exit("{{json .Config.WorkingDir}}", 0, "\"/opt/app-root/src\"");

        let value = runner.get_config("WorkingDir").unwrap();
        assert_eq!(value.as_ref().and_then(Value::as_str), Some("/opt/app-root/src"));
    }

    #[test]
    fn get_config_normalizes_null_garbage_and_failure() {
        let mock = Arc::new(MockExecutor::new());
        let runner = started_runner(mock.clone());
        mock.on_exit("{{json .Config.Entrypoint}}", 0, "null");
        mock.on_exit("{{json .Config.Cmd}}", 0, "not json");
        mock.on("{{json .Config.User}}", ExecResult::new(125, "", ""));

        assert_eq!(runner.get_config("Entrypoint").unwrap(), None);
        assert_eq!(runner.get_config("Cmd").unwrap(), None);
        assert_eq!(runner.get_config("User").unwrap(), None);
    }

    #[test]
    fn accessors_are_idempotent_against_unchanged_state() {
        let mock = Arc::new(MockExecutor::new());
        let runner = started_runner(mock.clone());
        mock.on_exit("printenv HOME", 0, "/opt/app-root/src\n");
        mock.on_exit("{{json .Config.Labels}}", 0, r#"{"name":"base"}"#);
        mock.on_exit("test -f '/etc/pip.conf'", 0, "");

        for _ in 0..3 {
            assert_eq!(runner.get_env("HOME").unwrap(), "/opt/app-root/src");
            assert!(runner.file_exists("/etc/pip.conf").unwrap());
            assert_eq!(runner.get_labels().unwrap().len(), 1);
        }
    }
}
