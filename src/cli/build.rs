//! Build command implementation

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::config::Profile;
use crate::tasks::{run_notified, FontTask, ImageTask, ScriptTask, StyleTask};

/// Run the full build once
#[derive(Args, Debug)]
pub struct BuildCommand {}

impl BuildCommand {
    pub async fn execute(&self, profile: Profile) -> Result<()> {
        let start = Instant::now();
        let profile = Arc::new(profile);

        info!("Building theme at {}", profile.theme_dir.display());
        eprintln!("{} Building theme assets...\n", "→".blue());

        let styles = StyleTask::new(profile.clone());
        let scripts = ScriptTask::new(profile.clone());
        let fonts = FontTask::new(profile.clone());
        let images = ImageTask::new(profile.clone());

        // All categories run concurrently; each fails independently.
        let (styles, scripts, fonts, images) = tokio::join!(
            run_notified(&styles),
            run_notified(&scripts),
            run_notified(&fonts),
            run_notified(&images),
        );

        let completed = [&styles, &scripts, &fonts, &images]
            .iter()
            .filter(|r| r.is_some())
            .count();

        let duration = start.elapsed();
        eprintln!(
            "\n{} {}/4 tasks completed in {:.2}s\n",
            "✓".green().bold(),
            completed,
            duration.as_secs_f64()
        );

        Ok(())
    }
}
