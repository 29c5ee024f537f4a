//! Command description and exit report.

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

/// An external program invocation: program name plus argument vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program to execute, resolved through `PATH`.
    pub program: String,
    /// Argument vector, passed verbatim.
    pub args: Vec<String>,
    /// Working directory for the child process.
    #[serde(default)]
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    /// Creates a command with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends a path argument.
    #[must_use]
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends `flag value`.
    #[must_use]
    pub fn flag(self, flag: &str, value: impl Into<String>) -> Self {
        self.arg(flag).arg(value)
    }

    /// Sets the working directory.
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Returns the value following `flag`, if present.
    #[must_use]
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|index| self.args.get(index + 1))
            .map(String::as_str)
    }

    /// Returns true if `arg` appears anywhere in the argument vector.
    #[must_use]
    pub fn has_arg(&self, arg: impl AsRef<OsStr>) -> bool {
        let arg = arg.as_ref();
        self.args.iter().any(|candidate| OsStr::new(candidate) == arg)
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

/// How a finished process exited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitReport {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

impl ExitReport {
    /// A zero exit.
    #[must_use]
    pub fn ok(duration_ms: f64) -> Self {
        Self {
            code: Some(0),
            duration_ms,
        }
    }

    /// A nonzero exit.
    #[must_use]
    pub fn failed(code: i32, duration_ms: f64) -> Self {
        Self {
            code: Some(code),
            duration_ms,
        }
    }

    /// Returns true only for exit status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}
