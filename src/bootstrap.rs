use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::BootstrapConfiguration;
use crate::environment::{Assignment, Environment, EnvironmentDelta};
use crate::script;
use crate::tool::{CmtTool, ToolError, ToolRequest};

/// Variable holding the tool installation root
pub const TOOL_ROOT_VAR: &str = "CMTROOT";

/// Recoverable problems met during a bootstrap
#[derive(Debug, Error)]
pub enum Degradation {
    /// Temporary name request failed; the pid-derived fallback was used
    #[error("temporary name unavailable: {0}")]
    TempNameUnavailable(#[source] ToolError),

    /// The tool's temporary name could not be created; the fallback was used
    #[error("cannot stage in {}: {source}", .path.display())]
    TempNameUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The tool failed computing assignments; its output was sourced anyway
    #[error("tool invocation failed: {0}")]
    ToolInvocationFailed(#[source] ToolError),
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to stage assignments in {}: {source}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    /// Every step ran on its primary path
    Applied,
    /// The temporary name fell back to `<scratch>/cmt.<pid>`
    Degraded,
}

/// Result of one bootstrap run
#[derive(Debug)]
pub struct Bootstrap {
    pub environment: Environment,
    pub delta: EnvironmentDelta,
    pub staging_path: PathBuf,
    pub state: BootstrapState,
    pub degradations: Vec<Degradation>,
}

impl Bootstrap {
    /// Whether the setup/cleanup request itself failed
    pub fn tool_failed(&self) -> bool {
        self.degradations
            .iter()
            .any(|d| matches!(d, Degradation::ToolInvocationFailed(_)))
    }
}

/// Staging file removed on every exit path
struct StagingFile {
    path: PathBuf,
}

impl StagingFile {
    fn create(path: PathBuf) -> Result<(Self, File), BootstrapError> {
        match File::create(&path) {
            Ok(file) => Ok((Self { path }, file)),
            Err(source) => Err(BootstrapError::Staging { path, source }),
        }
    }

    /// Staged contents, with undecodable bytes replaced
    fn read(&self) -> Result<String, BootstrapError> {
        let bytes = fs::read(&self.path).map_err(|source| BootstrapError::Staging {
            path: self.path.clone(),
            source,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed staging file"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), %err, "failed to remove staging file"),
        }
    }
}

/// Path used when the tool cannot provide a temporary name
pub fn fallback_temp_path(scratch_dir: &Path) -> PathBuf {
    scratch_dir.join(format!("cmt.{}", std::process::id()))
}

/// `CMTROOT` from the environment when set, otherwise `default`
///
/// Returns whether the default was taken.
pub fn resolve_tool_root(env: &Environment, default: &Path) -> (PathBuf, bool) {
    match env.get(TOOL_ROOT_VAR).filter(|root| !root.is_empty()) {
        Some(root) => (PathBuf::from(root), false),
        None => (default.to_path_buf(), true),
    }
}

/// Applies the tool's setup/cleanup statements to an environment
pub struct Bootstrapper<T> {
    tool: T,
    scratch_dir: PathBuf,
    self_setup: bool,
}

impl<T: CmtTool> Bootstrapper<T> {
    pub fn new(tool: T, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            scratch_dir: scratch_dir.into(),
            self_setup: false,
        }
    }

    /// Source `<root>/mgr/setup.<shell>` before asking the tool
    pub fn with_self_setup(mut self, enabled: bool) -> Self {
        self.self_setup = enabled;
        self
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    /// Run one bootstrap against `env`, returning the modified environment
    pub fn run(
        &self,
        config: &BootstrapConfiguration,
        mut env: Environment,
    ) -> Result<Bootstrap, BootstrapError> {
        let mut delta = EnvironmentDelta::new();
        let mut degradations = Vec::new();

        let (root, defaulted) = resolve_tool_root(&env, &config.tool_root);
        if defaulted {
            let assignment = Assignment::set(TOOL_ROOT_VAR, root.to_string_lossy());
            env.apply(&assignment);
            delta.push(assignment);
        }
        debug!(root = %root.display(), defaulted, "resolved tool root");

        if self.self_setup {
            self.source_tool_setup(&root, config, &mut env, &mut delta);
        }

        let (staging, file, state) = self.stage(&root, &env, &mut degradations)?;
        let staging_path = staging.path.clone();

        let request = ToolRequest {
            mode: config.mode,
            package: config.package_name.clone(),
            version: config.package_version.clone(),
            path: config.package_path.clone(),
            shell: config.shell,
            no_cleanup: config.no_cleanup,
            extra_args: config.extra_args.clone(),
        };
        if let Err(err) = self.tool.compute_assignments(&root, &env, &request, file) {
            warn!(%err, mode = %config.mode, "tool failed; sourcing its output anyway");
            degradations.push(Degradation::ToolInvocationFailed(err));
        }

        let contents = staging.read()?;
        let statements = script::parse(&contents, config.shell);
        delta.extend(script::source(&mut env, &statements));
        drop(staging);

        info!(
            mode = %config.mode,
            package = %config.package_name,
            changes = delta.len(),
            "environment bootstrapped"
        );

        Ok(Bootstrap {
            environment: env,
            delta,
            staging_path,
            state,
            degradations,
        })
    }

    /// Create the staging file at the tool's temporary name, or at the
    /// pid-derived fallback when that name is unavailable or unwritable
    fn stage(
        &self,
        root: &Path,
        env: &Environment,
        degradations: &mut Vec<Degradation>,
    ) -> Result<(StagingFile, File, BootstrapState), BootstrapError> {
        match self.tool.generate_temp_name(root, env) {
            Ok(path) => match File::create(&path) {
                Ok(file) => return Ok((StagingFile { path }, file, BootstrapState::Applied)),
                Err(source) => {
                    debug!(path = %path.display(), %source, "temporary name unwritable");
                    degradations.push(Degradation::TempNameUnwritable { path, source });
                }
            },
            Err(err) => {
                debug!(%err, "temporary name unavailable");
                degradations.push(Degradation::TempNameUnavailable(err));
            }
        }

        let path = fallback_temp_path(&self.scratch_dir);
        debug!(fallback = %path.display(), "using fallback staging path");
        let (staging, file) = StagingFile::create(path)?;
        Ok((staging, file, BootstrapState::Degraded))
    }

    fn source_tool_setup(
        &self,
        root: &Path,
        config: &BootstrapConfiguration,
        env: &mut Environment,
        delta: &mut EnvironmentDelta,
    ) {
        let path = root
            .join("mgr")
            .join(format!("setup.{}", config.shell.script_extension()));
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(path = %path.display(), "sourcing tool setup");
                let contents = String::from_utf8_lossy(&bytes);
                let statements = script::parse(&contents, config.shell);
                delta.extend(script::source(env, &statements));
            }
            Err(err) => debug!(path = %path.display(), %err, "no tool setup script"),
        }
    }
}
