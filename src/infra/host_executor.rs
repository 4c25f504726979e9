use crate::domain::{CommandExecutor, ExecError, ExecResult};
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Checks that an executable responds to `--version`.
pub fn command_available(cmd: &str) -> bool {
    Command::new(cmd)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Executor backed by real OS processes.
#[derive(Debug, Default)]
pub struct HostExecutor;

impl HostExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for HostExecutor {
    fn execute(&self, argv: &[String], timeout: Duration) -> Result<ExecResult, ExecError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(ExecError::Launch {
                command: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argv"),
            });
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Launch {
                command: argv.join(" "),
                source,
            })?;

        // Drain both pipes off-thread before waiting: a child writing more
        // than the OS pipe buffer would otherwise block and never exit.
        let stdout = drain_pipe(child.stdout.take());
        let stderr = drain_pipe(child.stderr.take());

        let status = child
            .wait_timeout(timeout)
            .map_err(|source| ExecError::Launch {
                command: argv.join(" "),
                source,
            })?;

        let Some(status) = status else {
            // Timeout expired: kill and reap so no zombie is left behind.
            // Killing closes the pipes, so the reader threads finish too.
            let _ = child.kill();
            let _ = child.wait();
            let _ = stdout.join();
            let _ = stderr.join();
            return Err(ExecError::Timeout {
                command: argv.join(" "),
                timeout,
            });
        };

        Ok(ExecResult {
            exit_code: status.code(),
            stdout: join_captured(stdout),
            stderr: join_captured(stderr),
        })
    }
}

fn drain_pipe(pipe: Option<impl Read + Send + 'static>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn join_captured(reader: JoinHandle<Vec<u8>>) -> String {
    let buf = reader.join().unwrap_or_default();
    String::from_utf8_lossy(&buf).into_owned()
}
