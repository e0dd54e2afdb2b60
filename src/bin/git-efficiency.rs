use clap::Parser;
use log::LevelFilter;

use git_efficiency::app::{App, AppError};
use git_efficiency::cli::Cli;
use git_efficiency::config::Config;

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity flags
    let log_level = if cli.quiet {
        LevelFilter::Error
    } else {
        match cli.verbosity {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_target(false)
        .format_timestamp(None)
        .init();

    if let Err(err) = run(cli) {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let config = Config::load(&cli.config)?;
    log::debug!("Loaded configuration from {}", cli.config.display());
    let app = App::from_config(config)?;
    app.run(cli.command)
}
