use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

use crate::environment::{Environment, Shell};

/// Which set of statements to request from the tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Setup,
    Cleanup,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Setup => "setup",
            Mode::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to run {}: {source}", .program.display())]
    Unavailable {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} exited with {}", .program.display(), exit_code(.code))]
    Exited { program: PathBuf, code: Option<i32> },

    #[error("{} produced no output", .program.display())]
    EmptyOutput { program: PathBuf },
}

fn exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// Arguments of a setup/cleanup request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequest {
    pub mode: Mode,
    pub package: String,
    pub version: String,
    pub path: PathBuf,
    pub shell: Shell,
    pub no_cleanup: bool,
    pub extra_args: Vec<String>,
}

impl ToolRequest {
    /// Command line for the request, pass-through arguments last
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            self.mode.as_str().to_string(),
            self.shell.tool_flag().to_string(),
            format!("-pack={}", self.package),
            format!("-version={}", self.version),
            format!("-path={}", self.path.display()),
        ];
        if self.no_cleanup && self.mode == Mode::Setup {
            args.push("-no_cleanup".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// The external configuration-management tool
pub trait CmtTool {
    /// Ask the tool for a unique temporary file name
    fn generate_temp_name(&self, root: &Path, env: &Environment) -> Result<PathBuf, ToolError>;

    /// Write the assignment statements for `request` to `out`
    fn compute_assignments(
        &self,
        root: &Path,
        env: &Environment,
        request: &ToolRequest,
        out: File,
    ) -> Result<(), ToolError>;
}

/// The cmt executable found under the tool root
#[derive(Debug, Clone, Default)]
pub struct CmtExecutable {
    program: Option<PathBuf>,
}

impl CmtExecutable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed program instead of `<root>/mgr/cmt`
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    pub fn program(&self, root: &Path) -> PathBuf {
        self.program
            .clone()
            .unwrap_or_else(|| root.join("mgr").join("cmt"))
    }

    fn command(&self, program: &Path, env: &Environment) -> Command {
        let mut command = Command::new(program);
        command.env_clear().envs(env.iter()).stdin(Stdio::null());
        command
    }
}

impl CmtTool for CmtExecutable {
    fn generate_temp_name(&self, root: &Path, env: &Environment) -> Result<PathBuf, ToolError> {
        let program = self.program(root);
        debug!(program = %program.display(), "requesting temporary name");

        let output = self
            .command(&program, env)
            .args(["-quiet", "build", "temporary_name"])
            .stderr(Stdio::null())
            .output()
            .map_err(|source| ToolError::Unavailable {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ToolError::Exited {
                program,
                code: output.status.code(),
            });
        }

        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if name.is_empty() {
            return Err(ToolError::EmptyOutput { program });
        }
        Ok(PathBuf::from(name))
    }

    fn compute_assignments(
        &self,
        root: &Path,
        env: &Environment,
        request: &ToolRequest,
        out: File,
    ) -> Result<(), ToolError> {
        let program = self.program(root);
        let args = request.args();
        debug!(program = %program.display(), ?args, "computing assignments");

        let status = self
            .command(&program, env)
            .args(&args)
            .stdout(Stdio::from(out))
            .status()
            .map_err(|source| ToolError::Unavailable {
                program: program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(ToolError::Exited {
                program,
                code: status.code(),
            })
        }
    }
}
