use crate::bootstrap::{Bootstrapper, Degradation};
use crate::cli::ApplyArgs;
use crate::config::{BootstrapConfiguration, ConfigFile};
use crate::environment::Environment;
use crate::tool::{CmtExecutable, Mode};
use crate::ui;
use anyhow::Result;

pub fn execute(file: &ConfigFile, env: &Environment, mode: Mode, args: ApplyArgs) -> Result<()> {
    let config =
        BootstrapConfiguration::resolve(file, &args.package.overrides(), mode, args.args, env)?;

    let tool = match &file.tool.command {
        Some(program) => CmtExecutable::with_program(program),
        None => CmtExecutable::new(),
    };
    let bootstrapper =
        Bootstrapper::new(tool, &file.tool.scratch_dir).with_self_setup(file.tool.self_setup);

    let outcome = bootstrapper.run(&config, env.clone())?;

    for degradation in &outcome.degradations {
        match degradation {
            Degradation::TempNameUnavailable(err) => tracing::debug!(%err, "temporary name fallback"),
            Degradation::TempNameUnwritable { .. } => tracing::warn!(%degradation, "temporary name fallback"),
            Degradation::ToolInvocationFailed(err) if args.strict => ui::error(err),
            Degradation::ToolInvocationFailed(err) => ui::warn(err),
        }
    }

    if args.strict && outcome.tool_failed() {
        anyhow::bail!(
            "cmt {} failed for package '{}'; no changes applied",
            mode,
            config.package_name
        );
    }

    if !outcome.delta.is_empty() {
        println!("{}", outcome.delta.format_for_shell(config.shell));
    }

    Ok(())
}
