//! Command-line interface for Themekit
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `build`: run every asset task once
//! - `watch`: build, serve and rebuild on change
//! - `clean`: delete the destination tree
//! - `clear-cache`: delete the image-optimization cache

mod build;
mod clean;
mod watch;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

pub use build::BuildCommand;
pub use clean::{CleanCommand, ClearCacheCommand};
pub use watch::WatchCommand;

use crate::config::Profile;

/// Themekit - asset pipeline for themed web projects
#[derive(Parser, Debug)]
#[command(name = "themekit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration profile name (resolves to config-<name>.toml)
    #[arg(short, long, global = true, default_value = "default")]
    pub config: String,

    /// Directory holding profile files
    #[arg(long, global = true, default_value = "configs")]
    pub configs_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full build once
    Build(BuildCommand),

    /// Run the build, start the dev server and watch for changes
    Watch(WatchCommand),

    /// Delete the theme's destination tree
    Clean(CleanCommand),

    /// Delete the image-optimization cache
    ClearCache(ClearCacheCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        print_banner();

        let profile = Profile::load(&self.configs_dir, &self.config)?;

        match &self.command {
            Commands::Build(cmd) => cmd.execute(profile).await,
            Commands::Watch(cmd) => cmd.execute(profile).await,
            Commands::Clean(cmd) => cmd.execute(profile).await,
            Commands::ClearCache(cmd) => cmd.execute(profile).await,
        }
    }
}

/// Print the Themekit banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "⚡".cyan(),
        "Themekit".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
