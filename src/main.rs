//! CLI entry point (spec §6). Parses arguments with `clap`, loads and
//! layers configuration, initializes logging, then dispatches to
//! `cli::dispatch`, which maps every `AppError` to its documented exit
//! code.

use std::path::PathBuf;

use clap::Parser;

use shelfkeeper::cli::{self, Command};
use shelfkeeper::config::{Config, ConfigOverrides};

#[derive(Debug, Parser)]
#[command(name = "shelfkeeper", about = "Organize a large audio collection into a canonical layout")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref(), &cli.overrides) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(err.exit_code());
        }
    };

    let _log_guard = match shelfkeeper::logging::init(config.verbosity, config.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("failed to initialize logging: {err}");
            std::process::exit(err.exit_code());
        }
    };

    let exit_code = cli::dispatch(cli.command, config);
    std::process::exit(exit_code);
}
