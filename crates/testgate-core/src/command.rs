//! External command execution
//!
//! Everything the engine runs outside its own process (coverage tool, example
//! commands, case commands, signing tools, worker processes) goes through a
//! [`CommandRunner`], so tests can substitute a scripted runner.

use crate::error::{GateError, GateResult};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use tracing::debug;

/// Status reported when a process was terminated without an exit code
pub const SIGNALLED_STATUS: i32 = -1;

/// A command line to execute, with optional environment, stdin and directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    stdin: Option<String>,
    current_dir: Option<PathBuf>,
}

impl ExternalCommand {
    /// Create a command for the given program
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
            current_dir: None,
        }
    }

    /// Build a command from a flat argument vector (program first)
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
        let (program, rest) = argv.split_first()?;
        Some(Self::new(program.as_ref()).args(rest.iter().map(|a| a.as_ref())))
    }

    /// Run a line through `sh -c`
    pub fn shell(line: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(line)
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Feed text to the child's stdin
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Run the child in a specific directory
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Program name
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments after the program name
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Extra environment variables
    pub fn environment(&self) -> &[(String, String)] {
        &self.env
    }

    /// Flat argument vector, program first
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Human-readable command line for messages and logs
    pub fn command_line(&self) -> String {
        self.argv().join(" ")
    }
}

/// Captured result of an external command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit status ([`SIGNALLED_STATUS`] when killed by a signal)
    pub status: i32,
}

impl CommandOutput {
    /// Check if the command exited with status 0
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs external commands
pub trait CommandRunner: Send + Sync {
    /// Run a command and capture its output; a non-zero exit is not an error here
    fn run(&self, command: &ExternalCommand) -> GateResult<CommandOutput>;

    /// Run a command, failing on a non-zero exit status
    fn run_checked(&self, command: &ExternalCommand) -> GateResult<CommandOutput> {
        let output = self.run(command)?;
        if !output.success() {
            return Err(GateError::CommandFailed {
                command: command.command_line(),
                status: output.status,
                stderr: output.stderr.trim_end().to_string(),
            });
        }
        Ok(output)
    }

    /// Run a command and return its stdout, failing on a non-zero exit status
    fn output(&self, command: &ExternalCommand) -> GateResult<String> {
        Ok(self.run_checked(command)?.stdout)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for Arc<R> {
    fn run(&self, command: &ExternalCommand) -> GateResult<CommandOutput> {
        (**self).run(command)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, command: &ExternalCommand) -> GateResult<CommandOutput> {
        (**self).run(command)
    }
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ExternalCommand) -> GateResult<CommandOutput> {
        debug!(command = %command.command_line(), "running external command");

        let spawn_error = |e: std::io::Error| GateError::CommandSpawn {
            command: command.command_line(),
            error: e.to_string(),
        };

        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k, v)))
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &command.current_dir {
            process.current_dir(dir);
        }

        let mut child = process.spawn().map_err(spawn_error)?;
        let stdin = child.stdin.take();

        // stdin is fed from its own thread while the output pipes drain
        let output = thread::scope(|scope| {
            let writer = match (stdin, &command.stdin) {
                (Some(mut pipe), Some(input)) => {
                    Some(scope.spawn(move || pipe.write_all(input.as_bytes())))
                }
                _ => None,
            };
            let output = child.wait_with_output();
            let written = match writer.map(|handle| handle.join()) {
                Some(Ok(Err(e))) if e.kind() != io::ErrorKind::BrokenPipe => Err(e),
                Some(Err(_)) => Err(io::Error::other("stdin writer panicked")),
                _ => Ok(()),
            };
            written.and(output)
        })
        .map_err(spawn_error)?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code().unwrap_or(SIGNALLED_STATUS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_argv() {
        let cmd = ExternalCommand::new("futility")
            .arg("gbb_utility")
            .args(["-c", "0x100"])
            .env("LANG", "C");
        assert_eq!(cmd.argv(), vec!["futility", "gbb_utility", "-c", "0x100"]);
        assert_eq!(cmd.command_line(), "futility gbb_utility -c 0x100");
        assert_eq!(cmd.environment(), &[("LANG".to_string(), "C".to_string())]);
    }

    #[test]
    fn test_from_argv_empty() {
        let empty: [&str; 0] = [];
        assert!(ExternalCommand::from_argv(&empty).is_none());
        let cmd = ExternalCommand::from_argv(&["echo", "hi"]).unwrap();
        assert_eq!(cmd.program(), "echo");
        assert_eq!(cmd.arguments(), &["hi".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_stdout() {
        let output = SystemRunner
            .run(&ExternalCommand::shell("echo hello; echo oops >&2"))
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "oops\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_feeds_stdin() {
        let output = SystemRunner
            .run(&ExternalCommand::new("cat").stdin("piped text"))
            .unwrap();
        assert_eq!(output.stdout, "piped text");
    }

    #[cfg(unix)]
    #[test]
    fn test_large_stdin_echoed_back() {
        let input = "x".repeat(1 << 20);
        let (tx, rx) = std::sync::mpsc::channel();
        let command = ExternalCommand::new("cat").stdin(input.clone());
        std::thread::spawn(move || {
            let _ = tx.send(SystemRunner.run(&command));
        });

        let output = rx
            .recv_timeout(std::time::Duration::from_secs(30))
            .expect("cat did not finish")
            .unwrap();
        assert_eq!(output.stdout.len(), input.len());
    }

    #[cfg(unix)]
    #[test]
    fn test_unread_stdin_is_not_an_error() {
        let output = SystemRunner
            .run(&ExternalCommand::new("true").stdin("y".repeat(1 << 20)))
            .unwrap();
        assert!(output.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_checked_fails_on_nonzero() {
        let err = SystemRunner
            .run_checked(&ExternalCommand::shell("echo bad >&2; exit 3"))
            .unwrap_err();
        match err {
            GateError::CommandFailed { status, stderr, .. } => {
                assert_eq!(status, 3);
                assert_eq!(stderr, "bad");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_spawn_failure() {
        let err = SystemRunner
            .run(&ExternalCommand::new("/nonexistent/testgate-no-such-binary"))
            .unwrap_err();
        assert!(matches!(err, GateError::CommandSpawn { .. }));
    }
}
