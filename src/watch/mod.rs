//! Watch orchestrator
//!
//! A single debounced recursive watcher on the theme root classifies each
//! change into an asset category and re-runs that category's task chain.
//! Events under the output and state subtrees are suppressed so the
//! pipeline's own writes never retrigger it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use tokio::sync::mpsc;
use tracing::error;

use crate::config::Profile;
use crate::server::ReloadHandle;
use crate::tasks::{run_notified, FontTask, ImageTask, ScriptTask, StyleTask, Task};

/// Watched asset categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Styles,
    Scripts,
    Fonts,
    Images,
    /// Template changes only need a reload
    Php,
}

/// Classify a changed path, or `None` for paths no category watches
pub fn classify(profile: &Profile, path: &Path) -> Option<Category> {
    // Our own outputs and state are not sources.
    if path.starts_with(profile.assets_dir()) || path.starts_with(profile.state_dir()) {
        return None;
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if path.starts_with(profile.style_src_dir()) && matches!(ext.as_str(), "scss" | "sass") {
        return Some(Category::Styles);
    }
    if path.starts_with(profile.js_dir()) && ext == "js" {
        return Some(Category::Scripts);
    }
    if path.starts_with(profile.fonts_src()) {
        return Some(Category::Fonts);
    }
    if path.starts_with(profile.images_src())
        && matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "gif" | "svg")
    {
        return Some(Category::Images);
    }
    if ext == "php" {
        return Some(Category::Php);
    }

    None
}

/// Long-running watch phase. Entered after the initial build; runs until
/// the process is interrupted.
pub struct Watcher {
    profile: Arc<Profile>,
    reload: ReloadHandle,

    styles: Arc<StyleTask>,
    scripts: Arc<ScriptTask>,
    fonts: Arc<FontTask>,
    images: Arc<ImageTask>,
}

impl Watcher {
    pub fn new(
        profile: Arc<Profile>,
        reload: ReloadHandle,
        styles: Arc<StyleTask>,
        scripts: Arc<ScriptTask>,
        fonts: Arc<FontTask>,
        images: Arc<ImageTask>,
    ) -> Self {
        Self {
            profile,
            reload,
            styles,
            scripts,
            fonts,
            images,
        }
    }

    /// Watch the theme root and dispatch category task chains until the
    /// channel dies (process shutdown).
    pub async fn watch(self) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();
        let root = self.profile.theme_dir.clone();

        // The debouncer lives on its own thread; events cross into the
        // async world through the unbounded channel.
        std::thread::spawn(move || {
            let (raw_tx, raw_rx) = std::sync::mpsc::channel();

            let mut debouncer = match new_debouncer(std::time::Duration::from_millis(150), raw_tx)
            {
                Ok(d) => d,
                Err(e) => {
                    error!("Failed to create watcher: {e}");
                    return;
                }
            };
            if let Err(e) = debouncer.watcher().watch(&root, RecursiveMode::Recursive) {
                error!("Failed to watch {}: {e}", root.display());
                return;
            }

            loop {
                match raw_rx.recv() {
                    Ok(Ok(events)) => {
                        for event in events {
                            if tx.send(event.path).is_err() {
                                return;
                            }
                        }
                    }
                    Ok(Err(e)) => error!("Watch error: {e:?}"),
                    Err(_) => return,
                }
            }
        });

        eprintln!(
            "\n{} Watching {} for changes\n",
            "👁".cyan(),
            self.profile.theme_dir.display().to_string().cyan()
        );

        while let Some(path) = rx.recv().await {
            let Some(category) = classify(&self.profile, &path) else {
                continue;
            };

            eprintln!(
                "  {} {} changed: {}",
                "↻".yellow(),
                format!("{category:?}").to_lowercase(),
                path.display().to_string().dimmed()
            );

            self.dispatch(category);
        }

        Ok(())
    }

    /// Run one category's chain. Chains for different categories run
    /// concurrently; their destinations are disjoint.
    fn dispatch(&self, category: Category) {
        let reload = self.reload.clone();

        match category {
            Category::Styles => {
                // The style task injects CSS itself; no full reload.
                let task = self.styles.clone();
                tokio::spawn(async move {
                    if run_notified(task.as_ref() as &dyn Task).await.is_none() {
                        reload.build_error("styles build failed");
                    }
                });
            }
            Category::Scripts => {
                let task = self.scripts.clone();
                tokio::spawn(async move {
                    match run_notified(task.as_ref() as &dyn Task).await {
                        Some(_) => reload.full_reload("scripts changed"),
                        None => reload.build_error("scripts build failed"),
                    }
                });
            }
            Category::Fonts => {
                let task = self.fonts.clone();
                tokio::spawn(async move {
                    match run_notified(task.as_ref() as &dyn Task).await {
                        Some(_) => reload.full_reload("fonts changed"),
                        None => reload.build_error("fonts build failed"),
                    }
                });
            }
            Category::Images => {
                let task = self.images.clone();
                tokio::spawn(async move {
                    match run_notified(task.as_ref() as &dyn Task).await {
                        Some(_) => reload.full_reload("images changed"),
                        None => reload.build_error("images build failed"),
                    }
                });
            }
            Category::Php => {
                reload.full_reload("templates changed");
            }
        }
    }
}
