use crate::cli::PackageArgs;
use crate::config::{BootstrapConfiguration, ConfigFile};
use crate::environment::{quote, Environment, Shell};
use crate::tool::Mode;
use anyhow::Result;

pub fn execute(file: &ConfigFile, env: &Environment, mode: Mode, package: &PackageArgs) -> Result<()> {
    let config = BootstrapConfiguration::resolve(file, &package.overrides(), mode, Vec::new(), env)?;
    let program = std::env::current_exe()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| "cmtenv".to_string());

    println!("{}", render(&config, &program));
    Ok(())
}

/// Wrapper script in the style of the generated `setup.sh`/`cleanup.csh` files
fn render(config: &BootstrapConfiguration, program: &str) -> String {
    let invocation = format!(
        "{} {} --shell {} --root {} --pack {} --pack-version {} --path {}",
        quote(program),
        config.mode,
        config.shell.as_str(),
        quote(&config.tool_root.to_string_lossy()),
        quote(&config.package_name),
        quote(&config.package_version),
        quote(&config.package_path.to_string_lossy()),
    );

    let header = format!(
        "# {} script for package {} {}, generated by cmtenv",
        config.mode, config.package_name, config.package_version
    );

    match config.shell {
        Shell::Sh => format!("{header}\neval \"$({invocation} -- \"$@\")\""),
        Shell::Csh => format!("{header}\neval `{invocation} -- $*:q`"),
    }
}
