//! Clean and cache-clear command implementations

use std::fs;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::config::Profile;

/// Delete the theme's destination tree
#[derive(Args, Debug)]
pub struct CleanCommand {}

impl CleanCommand {
    pub async fn execute(&self, profile: Profile) -> Result<()> {
        let assets = profile.assets_dir();
        if assets.is_dir() {
            fs::remove_dir_all(&assets)
                .with_context(|| format!("Failed to remove {}", assets.display()))?;
            eprintln!("{} Removed {}", "✓".green().bold(), assets.display());
        } else {
            eprintln!("{} Nothing to clean", "•".dimmed());
        }
        Ok(())
    }
}

/// Delete the image-optimization cache; the next image run reprocesses
/// every source
#[derive(Args, Debug)]
pub struct ClearCacheCommand {}

impl ClearCacheCommand {
    pub async fn execute(&self, profile: Profile) -> Result<()> {
        let cache = profile.image_cache_path();
        if cache.is_file() {
            fs::remove_file(&cache)
                .with_context(|| format!("Failed to remove {}", cache.display()))?;
            eprintln!("{} Cleared image cache", "✓".green().bold());
        } else {
            eprintln!("{} Image cache already empty", "•".dimmed());
        }
        Ok(())
    }
}
