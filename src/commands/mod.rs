use crate::cli::{Cli, Commands};
use crate::config::ConfigFile;
use crate::environment::Environment;
use crate::tool::Mode;
use anyhow::Result;

mod apply;
mod init;
mod show;
mod wrapper;

pub fn execute(cli: Cli) -> Result<()> {
    // Snapshot the process environment once; everything below works on the model
    let env = Environment::from_process();
    let (file, source) = ConfigFile::discover(cli.config.as_deref(), &env)?;

    match cli.command {
        Commands::Setup(args) => apply::execute(&file, &env, Mode::Setup, args),

        Commands::Cleanup(args) => apply::execute(&file, &env, Mode::Cleanup, args),

        Commands::Show { package } => show::execute(&file, source.as_deref(), &env, &package),

        Commands::Script { mode, package } => wrapper::execute(&file, &env, mode.into(), &package),

        Commands::Init {
            package,
            output,
            force,
        } => init::execute(&file, &package, &output, force),
    }
}
