//! Themekit - asset pipeline for themed web projects
//!
//! Compiles Sass, downlevels and bundles theme scripts, copies fonts,
//! optimizes images behind a persistent cache, and serves a live-reload
//! channel while watching the source trees.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod config;
mod server;
mod tasks;
mod transform;
mod utils;
mod watch;

pub use cli::Cli;
pub use config::Profile;

/// Exit code for fatal configuration errors
const CONFIG_ERROR_EXIT: u8 = 2;

/// Initialize the logging/tracing system
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("themekit=debug,tower_http=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("themekit=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match cli.execute().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if err.downcast_ref::<config::ConfigError>().is_some() {
                ExitCode::from(CONFIG_ERROR_EXIT)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
