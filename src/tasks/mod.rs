//! Build tasks
//!
//! Each asset category (styles, scripts, fonts, images) is a [`Task`]. Tasks
//! are isolated: a failing run is reported through the notification helpers
//! and never terminates the process or other categories.

mod fonts;
mod groups;
mod images;
mod scripts;
mod styles;

use anyhow::Result;
use async_trait::async_trait;
use colored::Colorize;

pub use fonts::FontTask;
pub use groups::{scan_groups, AssetGroup, MAIN_BUNDLE};
pub use images::ImageTask;
pub use scripts::ScriptTask;
pub use styles::StyleTask;

/// Terminal bell, the audible half of an error notification
const BELL: &str = "\x07";

/// Outcome of a single task run
#[derive(Debug, Default)]
pub struct TaskReport {
    /// Files written this run
    pub written: usize,

    /// Inputs skipped because nothing changed
    pub skipped: usize,

    /// Inputs that failed and were reported individually
    pub failed: usize,
}

impl TaskReport {
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} written", self.written)];
        if self.skipped > 0 {
            parts.push(format!("{} unchanged", self.skipped));
        }
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed));
        }
        parts.join(", ")
    }
}

/// A build task for one asset category
#[async_trait]
pub trait Task: Send + Sync {
    /// Category name used in notifications
    fn name(&self) -> &'static str;

    /// Run the task once over the current source tree
    async fn run(&self) -> Result<TaskReport>;
}

/// Run a task, notifying success or failure. Errors are consumed here;
/// callers only learn whether the run succeeded.
pub async fn run_notified(task: &dyn Task) -> Option<TaskReport> {
    match task.run().await {
        Ok(report) => {
            notify_done(task.name(), &report.summary());
            Some(report)
        }
        Err(err) => {
            notify_error(task.name(), &err);
            None
        }
    }
}

/// Success notification for a completed task run
pub fn notify_done(task: &str, detail: &str) {
    eprintln!(
        "{} {} — {}",
        "✓".green().bold(),
        task.to_uppercase().bold(),
        detail
    );
}

/// Error notification: colored message plus an audible alert
pub fn notify_error(task: &str, err: &anyhow::Error) {
    eprintln!(
        "{}{} {} — {:#}",
        BELL,
        "✗".red().bold(),
        task.to_uppercase().bold(),
        err
    );
}
