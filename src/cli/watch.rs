//! Watch command implementation

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::config::Profile;
use crate::server::DevServer;
use crate::tasks::{run_notified, FontTask, ImageTask, ScriptTask, StyleTask};
use crate::watch::Watcher;

/// Run the build, start the dev server and watch for changes
#[derive(Args, Debug)]
pub struct WatchCommand {
    /// Do not open a browser tab on start
    #[arg(long)]
    pub no_open: bool,
}

impl WatchCommand {
    pub async fn execute(&self, mut profile: Profile) -> Result<()> {
        if self.no_open {
            profile.dev.open = false;
        }
        let profile = Arc::new(profile);

        info!("Watching theme at {}", profile.theme_dir.display());
        eprintln!(
            "{} Starting dev session for profile {}\n",
            "→".blue(),
            profile.name.cyan()
        );
        eprintln!("  {} Press {} to stop\n", "•".dimmed(), "Ctrl+C".yellow());

        // Server startup is part of the initial phase; the reload handle it
        // returns feeds the style task and the watcher.
        let server = DevServer::new(profile.clone());
        let reload = server.start().await?;

        let styles = Arc::new(StyleTask::with_reload(profile.clone(), reload.clone()));
        let scripts = Arc::new(ScriptTask::new(profile.clone()));
        let fonts = Arc::new(FontTask::new(profile.clone()));
        let images = Arc::new(ImageTask::new(profile.clone()));

        // Initial build: all categories at once, failures isolated.
        tokio::join!(
            run_notified(styles.as_ref()),
            run_notified(scripts.as_ref()),
            run_notified(fonts.as_ref()),
            run_notified(images.as_ref()),
        );

        let watcher = Watcher::new(
            profile.clone(),
            reload,
            styles,
            scripts,
            fonts,
            images,
        );
        watcher.watch().await
    }
}
