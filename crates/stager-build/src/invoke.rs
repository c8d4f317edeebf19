//! External tool invocation.
//!
//! Every compiler, linker, and converter call is described as a
//! [`ToolInvocation`] and handed to a [`ToolRunner`]. The runner is the only
//! place that starts processes, which keeps the stages testable without a
//! cross toolchain installed.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use crate::error::BuildError;

/// Which toolchain executable an invocation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tool {
    Compiler,
    Linker,
    ObjCopy,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tool::Compiler => "compiler",
            Tool::Linker => "linker",
            Tool::ObjCopy => "objcopy",
        })
    }
}

/// A fully described external tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Tool role.
    pub tool: Tool,
    /// Executable path.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<OsString>,
    /// Working directory of the child process. `None` inherits ours.
    pub current_dir: Option<PathBuf>,
}

impl ToolInvocation {
    /// Start describing a call to `program`.
    pub fn new(tool: Tool, program: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Run the child in `dir` instead of our working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Value following the first occurrence of `flag`, if any.
    pub fn flag_value(&self, flag: &str) -> Option<&OsStr> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(OsString::as_os_str)
    }

    /// Shell-like rendering for logs.
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        if let Some(dir) = &self.current_dir {
            line.push_str(&format!("  (in {})", dir.display()));
        }
        line
    }
}

/// Executes tool invocations.
pub trait ToolRunner {
    /// Run one invocation to completion. Non-zero exit is an error.
    fn run(&self, invocation: &ToolInvocation) -> Result<(), BuildError>;
}

/// Runs tools as child processes, streaming their output to our terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<(), BuildError> {
        log::debug!("running {}", invocation.command_line());

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }

        let status = command.status().map_err(|source| BuildError::ToolLaunch {
            tool: invocation.tool,
            program: invocation.program.clone(),
            source,
        })?;

        if !status.success() {
            return Err(BuildError::ToolFailed {
                tool: invocation.tool,
                program: invocation.program.clone(),
                status,
            });
        }

        Ok(())
    }
}

/// Bare file name of `path`, for invocations run inside its directory.
pub(crate) fn file_name_of(path: &Path) -> Result<&OsStr, BuildError> {
    path.file_name().ok_or_else(|| BuildError::Config {
        message: format!("{} has no file name", path.display()),
    })
}
