//! Font task: plain copy of the font tree, no transformation

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::Profile;
use crate::tasks::{Task, TaskReport};

pub struct FontTask {
    profile: Arc<Profile>,
}

impl FontTask {
    pub fn new(profile: Arc<Profile>) -> Self {
        Self { profile }
    }

    fn copy_tree(&self) -> Result<TaskReport> {
        let src = self.profile.fonts_src();
        if !src.is_dir() {
            debug!("No fonts under {}", src.display());
            return Ok(TaskReport::default());
        }

        let dest = self.profile.fonts_dest();
        let mut report = TaskReport::default();

        for entry in WalkDir::new(&src).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&src)
                .expect("walked path is under its root");
            let target = dest.join(rel);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
            report.written += 1;
        }

        Ok(report)
    }
}

#[async_trait]
impl Task for FontTask {
    fn name(&self) -> &'static str {
        "fonts"
    }

    async fn run(&self) -> Result<TaskReport> {
        let task = Self {
            profile: self.profile.clone(),
        };
        tokio::task::spawn_blocking(move || task.copy_tree())
            .await
            .context("font task panicked")?
    }
}
