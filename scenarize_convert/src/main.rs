// scenarize_convert/src/main.rs

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use scenarize_convert::cli::Cli;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(err) = scenarize_convert::run::run(cli.dataset) {
        error!("{err:#}");
        std::process::exit(1);
    }
}
