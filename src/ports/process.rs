use std::{fmt, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

/// Error type for external command execution
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProcessError {
    /// The configured command line has no program
    #[error("Empty command line")]
    EmptyCommand,

    /// The program could not be started
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program was started but its output could not be collected
    #[error("I/O error while running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program did not finish in time and was killed
    #[error("'{program}' timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

/// Result type alias for command execution
pub type ProcessResult<T> = Result<T, ProcessError>;

/// A program plus its argument vector. Arguments are handed to the OS as-is and never
/// pass through a shell, so values such as domain names cannot change the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    /// Build from a configured argument vector (`["nginx", "-t"]`).
    pub fn from_argv(argv: &[String], timeout: Duration) -> ProcessResult<Self> {
        let (program, args) = argv.split_first().ok_or(ProcessError::EmptyCommand)?;
        if program.trim().is_empty() {
            return Err(ProcessError::EmptyCommand);
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// What a finished command left behind.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was terminated by a signal
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    /// Last non-empty stderr line (falling back to stdout), trimmed for error messages.
    pub fn summary(&self) -> String {
        let last_line = |text: &str| {
            text.lines()
                .rev()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
        };
        let line = last_line(&self.stderr)
            .or_else(|| last_line(&self.stdout))
            .unwrap_or_else(|| match self.status_code {
                Some(code) => format!("exit status {code}"),
                None => "terminated by signal".to_string(),
            });
        line.chars().take(240).collect()
    }
}

/// CommandRunner defines the port (interface) for running external programs
#[async_trait]
pub trait CommandRunner: Send + Sync + 'static {
    /// Run a command to completion, bounded by `spec.timeout`
    ///
    /// # Arguments
    /// * `spec` - Program, arguments and timeout
    ///
    /// # Returns
    /// The collected output for any exit status, or an error when the program could not
    /// be run or exceeded its timeout
    async fn run(&self, spec: &CommandSpec) -> ProcessResult<CommandOutput>;
}
