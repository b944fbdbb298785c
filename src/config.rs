use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::environment::{Environment, Shell};
use crate::tool::Mode;

/// Tool root used when neither `CMTROOT` nor any configuration names one
pub const DEFAULT_TOOL_ROOT: &str = "/usr/local/CMT";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "CMTENV_CONFIG";

const LOCAL_CONFIG: &str = "cmtenv.toml";
const DEFAULT_SCRATCH_DIR: &str = "/tmp";

/// On-disk configuration (`cmtenv.toml`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    #[serde(default)]
    pub tool: ToolSection,
    #[serde(default)]
    pub package: PackageSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSection {
    /// Default tool root, used when `CMTROOT` is not set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    /// Program to run instead of `<root>/mgr/cmt`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<PathBuf>,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    /// Source `<root>/mgr/setup.<shell>` before asking the tool
    #[serde(default)]
    pub self_setup: bool,
    #[serde(default = "default_true")]
    pub no_cleanup: bool,
}

impl Default for ToolSection {
    fn default() -> Self {
        Self {
            root: None,
            command: None,
            scratch_dir: default_scratch_dir(),
            self_setup: false,
            no_cleanup: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SCRATCH_DIR)
}

fn default_true() -> bool {
    true
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {:?}", path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let contents =
            toml::to_string_pretty(self).context("Failed to serialize cmtenv config file")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {:?}", path))?;
        Ok(())
    }

    /// Locate and load the configuration
    ///
    /// Looks at `explicit`, then `$CMTENV_CONFIG`, then `./cmtenv.toml`, then
    /// `$XDG_CONFIG_HOME/cmtenv/config.toml`. Missing files fall back to the
    /// defaults, except an explicitly requested one.
    pub fn discover(explicit: Option<&Path>, env: &Environment) -> Result<(Self, Option<PathBuf>)> {
        Self::discover_in(Path::new(""), explicit, env)
    }

    /// Like [`ConfigFile::discover`], looking for `cmtenv.toml` in `dir`
    pub fn discover_in(
        dir: &Path,
        explicit: Option<&Path>,
        env: &Environment,
    ) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        if let Some(path) = env.get(CONFIG_ENV).filter(|value| !value.is_empty()) {
            let path = PathBuf::from(path);
            return Ok((Self::load(&path)?, Some(path)));
        }

        let mut candidates = vec![dir.join(LOCAL_CONFIG)];
        if let Some(dir) = config_dir(env) {
            candidates.push(dir.join("config.toml"));
        }

        for path in candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "using config file");
                return Ok((Self::load(&path)?, Some(path)));
            }
        }

        Ok((Self::default(), None))
    }
}

/// `$XDG_CONFIG_HOME/cmtenv` or `~/.config/cmtenv`
pub fn config_dir(env: &Environment) -> Option<PathBuf> {
    let base = match env.get("XDG_CONFIG_HOME").filter(|value| !value.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => directories::BaseDirs::new()?.home_dir().join(".config"),
    };
    Some(base.join("cmtenv"))
}

/// Values given on the command line, taking precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub shell: Option<String>,
    pub tool_root: Option<PathBuf>,
    pub package_name: Option<String>,
    pub package_version: Option<String>,
    pub package_path: Option<PathBuf>,
}

/// Everything one bootstrap invocation needs, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapConfiguration {
    /// Default tool root; `CMTROOT` in the environment wins over it
    pub tool_root: PathBuf,
    pub package_name: String,
    pub package_version: String,
    pub package_path: PathBuf,
    pub shell: Shell,
    pub mode: Mode,
    pub no_cleanup: bool,
    pub extra_args: Vec<String>,
}

impl BootstrapConfiguration {
    /// Combine command-line overrides, the config file and built-in defaults
    pub fn resolve(
        file: &ConfigFile,
        overrides: &Overrides,
        mode: Mode,
        extra_args: Vec<String>,
        env: &Environment,
    ) -> Result<Self> {
        let shell = match overrides.shell.as_deref().or(file.shell.as_deref()) {
            Some(name) => Shell::from_name(name)
                .with_context(|| format!("Unsupported shell '{name}' (expected sh or csh)"))?,
            None => Shell::detect(env),
        };

        Ok(Self {
            tool_root: overrides
                .tool_root
                .clone()
                .or_else(|| file.tool.root.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOOL_ROOT)),
            package_name: overrides
                .package_name
                .clone()
                .or_else(|| file.package.name.clone())
                .unwrap_or_default(),
            package_version: overrides
                .package_version
                .clone()
                .or_else(|| file.package.version.clone())
                .unwrap_or_default(),
            package_path: overrides
                .package_path
                .clone()
                .or_else(|| file.package.path.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            shell,
            mode,
            no_cleanup: file.tool.no_cleanup,
            extra_args,
        })
    }
}
