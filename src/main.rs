use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use kslice::explorer::Explorer;
use kslice::settings::{self, CliArgs};

fn main() -> Result<()> {
    let args = CliArgs::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let settings = settings::load_config(&args)?;
    log::info!("{}", settings);

    let mut explorer = Explorer::new(settings)?;
    explorer.solve()?;
    explorer.writeup()?;

    Ok(())
}
