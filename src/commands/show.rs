use crate::bootstrap::resolve_tool_root;
use crate::cli::PackageArgs;
use crate::config::{BootstrapConfiguration, ConfigFile};
use crate::environment::Environment;
use crate::tool::Mode;
use anyhow::{Context, Result};
use std::path::Path;

pub fn execute(
    file: &ConfigFile,
    source: Option<&Path>,
    env: &Environment,
    package: &PackageArgs,
) -> Result<()> {
    let config =
        BootstrapConfiguration::resolve(file, &package.overrides(), Mode::Setup, Vec::new(), env)?;
    let (root, defaulted) = resolve_tool_root(env, &config.tool_root);

    match source {
        Some(path) => println!("# config file: {}", path.display()),
        None => println!("# config file: none (built-in defaults)"),
    }
    println!(
        "# effective tool root: {} ({})",
        root.display(),
        if defaulted { "default" } else { "from CMTROOT" }
    );

    let rendered =
        toml::to_string_pretty(&config).context("Failed to serialize resolved configuration")?;
    print!("{rendered}");

    Ok(())
}
