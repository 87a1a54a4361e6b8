mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::run;
use tracing_subscriber::filter::LevelFilter;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub fn main() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_logging(cli.verbose);
    tracing::debug!(?cli, "parsed arguments");

    match &cli.command {
        Commands::Run(args) => run::run(args),
        Commands::FromConfig(args) => run::from_config(args),
    }
}
