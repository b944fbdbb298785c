use crate::cli::PackageArgs;
use crate::config::ConfigFile;
use crate::environment::Shell;
use crate::ui;
use anyhow::{Context, Result};
use std::path::Path;

pub fn execute(file: &ConfigFile, package: &PackageArgs, output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }
    if output.exists() {
        ui::info(format!("Overwriting {}", output.display()));
    }

    let mut config = file.clone();
    if let Some(name) = &package.shell {
        let shell = Shell::from_name(name)
            .with_context(|| format!("Unsupported shell '{name}' (expected sh or csh)"))?;
        config.shell = Some(shell.as_str().to_string());
    }
    if let Some(root) = &package.root {
        config.tool.root = Some(root.clone());
    }
    if let Some(name) = &package.pack {
        config.package.name = Some(name.clone());
    }
    if let Some(version) = &package.pack_version {
        config.package.version = Some(version.clone());
    }
    if let Some(path) = &package.path {
        config.package.path = Some(path.clone());
    }

    config.save(output)?;
    ui::success("Created", output.display());
    Ok(())
}
