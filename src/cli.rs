use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Overrides;
use crate::tool::Mode;

/// CMT environment bootstrapper
///
/// cmtenv asks the CMT tool for the environment of a package/version and
/// prints it as statements for the calling shell to evaluate, e.g.
/// `eval "$(cmtenv setup --pack Foo --pack-version v1r2 --path /work)"`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to $CMTENV_CONFIG, ./cmtenv.toml or the XDG config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the statements that set up a package environment
    Setup(ApplyArgs),

    /// Print the statements that remove a package environment
    Cleanup(ApplyArgs),

    /// Show the resolved configuration
    Show {
        #[command(flatten)]
        package: PackageArgs,
    },

    /// Print a setup/cleanup wrapper script with the configuration baked in
    Script {
        /// Which script to generate
        #[arg(short, long, value_enum, default_value = "setup")]
        mode: ModeArg,

        #[command(flatten)]
        package: PackageArgs,
    },

    /// Write a configuration file recording the given values
    Init {
        #[command(flatten)]
        package: PackageArgs,

        /// Where to write the file
        #[arg(short, long, value_name = "PATH", default_value = "cmtenv.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub package: PackageArgs,

    /// Fail when the tool reports an error instead of applying its output
    #[arg(long)]
    pub strict: bool,

    /// Arguments passed through to the tool unchanged
    #[arg(last = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PackageArgs {
    /// Shell dialect (sh or csh; auto-detects from $SHELL if not specified)
    #[arg(short, long, value_name = "SHELL")]
    pub shell: Option<String>,

    /// Default tool root, used when CMTROOT is not set
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Package name
    #[arg(long, value_name = "NAME")]
    pub pack: Option<String>,

    /// Package version (empty for no specific version)
    #[arg(long, value_name = "VERSION")]
    pub pack_version: Option<String>,

    /// Path where the package lives
    #[arg(long, value_name = "DIR")]
    pub path: Option<PathBuf>,
}

impl PackageArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            shell: self.shell.clone(),
            tool_root: self.root.clone(),
            package_name: self.pack.clone(),
            package_version: self.pack_version.clone(),
            package_path: self.path.clone(),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Setup,
    Cleanup,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Setup => Mode::Setup,
            ModeArg::Cleanup => Mode::Cleanup,
        }
    }
}
