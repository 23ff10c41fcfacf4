//! Command dispatch
//!
//! The engine never knows what a command does. Every resolved command line
//! is handed to a [`CommandDispatcher`], which runs it to completion and
//! reports success, captured output and an error message.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::Serialize;

use crate::context::EnvironmentContext;

/// Outcome of one dispatched command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl DispatchOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Capability to execute a single resolved command line.
///
/// Implementations block until the command finishes. `env` carries the
/// variables exported by the script so far; they must be visible to the
/// command.
pub trait CommandDispatcher {
    fn dispatch(&mut self, name: &str, args: &[String], env: &EnvironmentContext) -> DispatchOutcome;
}

/// Dispatcher that runs each command as a child process.
///
/// With a configured program the command line runs as
/// `<program> <name> <args...>`; without one `name` itself is executed.
#[derive(Debug, Clone, Default)]
pub struct ProcessDispatcher {
    program: Option<PathBuf>,
    working_dir: Option<PathBuf>,
}

impl ProcessDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route every command through an automation CLI
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn build(&self, name: &str, args: &[String]) -> Command {
        let mut cmd = match &self.program {
            Some(program) => {
                let mut cmd = Command::new(program);
                cmd.arg(name);
                cmd
            }
            None => Command::new(name),
        };
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl CommandDispatcher for ProcessDispatcher {
    fn dispatch(&mut self, name: &str, args: &[String], env: &EnvironmentContext) -> DispatchOutcome {
        let mut cmd = self.build(name, args);
        cmd.envs(env.exported());

        tracing::debug!(command = name, ?args, "spawning process");

        let output = match cmd.output() {
            Ok(output) => output,
            Err(e) => {
                let program = self
                    .program
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| name.to_string());
                return DispatchOutcome::failed(format!("failed to start '{}': {}", program, e));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();

        if output.status.success() {
            DispatchOutcome::ok(stdout)
        } else {
            let error = if stderr.is_empty() {
                match output.status.code() {
                    Some(code) => format!("exited with status {}", code),
                    None => "terminated by signal".to_string(),
                }
            } else {
                stderr
            };
            DispatchOutcome {
                success: false,
                output: stdout,
                error: Some(error),
            }
        }
    }
}
