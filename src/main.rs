use anyhow::Result;
use clap::Parser;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

use cli::command::{Cli, Commands};

mod cli;
mod input;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let progress = init_logging(&cli)?;

    match cli.command {
        Commands::Info(ref args) => cli::info::cmd_info(args, &cli, progress.as_ref()),
        Commands::Demux(ref args) => cli::demux::cmd_demux(args, &cli, progress.as_ref()),
    }
}

/// Installs the global logger. With `--progress`, log records are routed
/// through a progress-bar multiplexer so bars and log lines do not tear
/// each other, and the multiplexer is returned for the command to draw on.
fn init_logging(cli: &Cli) -> Result<Option<MultiProgress>> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(cli.loglevel);
    cli.log_format.configure(&mut builder);

    if !cli.progress {
        builder.try_init()?;
        return Ok(None);
    }

    let multi = MultiProgress::new();
    LogWrapper::new(multi.clone(), builder.build()).try_init()?;
    Ok(Some(multi))
}
