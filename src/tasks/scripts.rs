//! Script task
//!
//! Downlevels theme scripts, groups them into directory-derived bundles and
//! emits plain plus minified variants. A persistent record of content hash
//! and transpiled output lets re-runs process only changed files while
//! unchanged files still contribute to the bundles.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Profile;
use crate::tasks::{notify_error, scan_groups, Task, TaskReport};
use crate::transform::{minify_js, Transformer};
use crate::utils;

/// One processed input file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordEntry {
    /// Content hash of the source when it was last processed
    hash: String,

    /// Downleveled output, reused while the hash matches
    code: String,
}

/// Persistent path -> entry record (the changed-since-last-run set is the
/// complement of the hash matches)
#[derive(Debug, Default, Serialize, Deserialize)]
struct ScriptRecord {
    files: HashMap<PathBuf, RecordEntry>,
}

impl ScriptRecord {
    /// Load the record, treating a missing or unreadable file as empty
    fn load(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec(self).context("Failed to serialize script record")?;
        utils::write_file(path, &json)
    }
}

/// Builds `<bundle>.js` / `<bundle>.min.js` from the script tree
pub struct ScriptTask {
    profile: Arc<Profile>,
    transformer: Transformer,

    /// Record shared across runs within a watch session
    record: Arc<Mutex<ScriptRecord>>,
}

impl ScriptTask {
    pub fn new(profile: Arc<Profile>) -> Self {
        let transformer = Transformer::new(&profile.browsers);
        let record = Arc::new(Mutex::new(ScriptRecord::load(&profile.script_record_path())));
        Self {
            profile,
            transformer,
            record,
        }
    }

    fn build(&self) -> Result<TaskReport> {
        let js_dir = self.profile.js_dir();
        let groups = scan_groups(&js_dir)?;
        if groups.iter().all(|g| g.files.is_empty()) {
            debug!("No scripts under {}", js_dir.display());
            return Ok(TaskReport::default());
        }

        let mut report = TaskReport::default();
        let mut record = self.record.lock();

        // Pass 1: bring the record up to date for every current input.
        for group in &groups {
            for path in &group.files {
                let bytes = fs::read(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let hash = utils::hash_content(&bytes);

                if record
                    .files
                    .get(path)
                    .map(|entry| entry.hash == hash)
                    .unwrap_or(false)
                {
                    report.skipped += 1;
                    continue;
                }

                let source = String::from_utf8_lossy(&bytes);
                match self.transformer.transpile(&source, path) {
                    Ok(code) => {
                        record.files.insert(path.clone(), RecordEntry { hash, code });
                    }
                    Err(err) => {
                        // Skip the offending file: report it, drop any stale
                        // entry so old code cannot linger in a bundle, and
                        // keep building the rest.
                        notify_error(self.name(), &anyhow!(err));
                        record.files.remove(path);
                        report.failed += 1;
                    }
                }
            }
        }

        // Entries for deleted files must not resurface in bundles.
        let current: HashSet<&PathBuf> = groups.iter().flat_map(|g| &g.files).collect();
        record.files.retain(|path, _| current.contains(path));

        // Pass 2: concatenate each group and fan out to the two sinks.
        let dest = self.profile.js_dest();
        for group in &groups {
            let members: Vec<&RecordEntry> = group
                .files
                .iter()
                .filter_map(|path| record.files.get(path))
                .collect();
            if members.is_empty() {
                continue;
            }

            let mut bundle = String::new();
            for entry in &members {
                bundle.push_str(&entry.code);
                if !entry.code.ends_with('\n') {
                    bundle.push('\n');
                }
            }
            let bundle = utils::normalize_line_endings(&bundle);

            let plain_path = dest.join(group.output_name());
            utils::write_file(&plain_path, bundle.as_bytes())?;
            report.written += 1;

            let minified = utils::normalize_line_endings(&minify_js(&bundle));
            utils::write_file(&utils::min_sibling(&plain_path), minified.as_bytes())?;
            report.written += 1;
        }

        record.save(&self.profile.script_record_path())?;

        Ok(report)
    }
}

#[async_trait]
impl Task for ScriptTask {
    fn name(&self) -> &'static str {
        "scripts"
    }

    async fn run(&self) -> Result<TaskReport> {
        let task = Self {
            profile: self.profile.clone(),
            transformer: self.transformer.clone(),
            record: self.record.clone(),
        };
        tokio::task::spawn_blocking(move || task.build())
            .await
            .context("script task panicked")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn profile(theme: &Path) -> Arc<Profile> {
        let configs = theme.join("configs");
        fs::create_dir_all(&configs).unwrap();
        fs::write(
            configs.join("config-test.toml"),
            format!(
                "theme_dir = {:?}\nproject_url = \"http://localhost\"\n",
                theme.display().to_string()
            ),
        )
        .unwrap();
        Arc::new(Profile::load(&configs, "test").unwrap())
    }

    fn write_js(theme: &Path, rel: &str, body: &str) {
        let path = theme.join("src/js").join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn groups_produce_expected_bundles() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = profile(tmp.path());
        write_js(tmp.path(), "app.js", "const app = 1;\n");
        write_js(tmp.path(), "lib/slider/slide.js", "const slide = 2;\n");
        write_js(tmp.path(), "lib/modal/modal.js", "const modal = 3;\n");

        let task = ScriptTask::new(profile.clone());
        let report = task.run().await.unwrap();
        // Three bundles, each with a minified sibling.
        assert_eq!(report.written, 6);

        let dest = profile.js_dest();
        for name in ["main.js", "main.min.js", "slider.js", "modal.js"] {
            assert!(dest.join(name).is_file(), "{name} missing");
        }

        let main = fs::read_to_string(dest.join("main.js")).unwrap();
        assert!(main.contains("var app = 1;"));
        assert!(!main.contains("slide"));
        assert!(!main.contains("modal"));
    }

    #[tokio::test]
    async fn second_run_reprocesses_nothing_and_keeps_bundles() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = profile(tmp.path());
        write_js(tmp.path(), "a.js", "const a = 1;\n");
        write_js(tmp.path(), "b.js", "const b = 2;\n");

        let task = ScriptTask::new(profile.clone());
        let first = task.run().await.unwrap();
        assert_eq!(first.skipped, 0);

        let before = fs::read(profile.js_dest().join("main.js")).unwrap();

        let second = task.run().await.unwrap();
        assert_eq!(second.skipped, 2);
        assert_eq!(second.failed, 0);

        let after = fs::read(profile.js_dest().join("main.js")).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn record_survives_process_restart() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = profile(tmp.path());
        write_js(tmp.path(), "a.js", "const a = 1;\n");

        ScriptTask::new(profile.clone()).run().await.unwrap();

        // Fresh task instance reloads the persisted record.
        let report = ScriptTask::new(profile.clone()).run().await.unwrap();
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn changed_file_is_reprocessed_others_reused() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = profile(tmp.path());
        write_js(tmp.path(), "a.js", "const a = 1;\n");
        write_js(tmp.path(), "b.js", "const b = 2;\n");

        let task = ScriptTask::new(profile.clone());
        task.run().await.unwrap();

        write_js(tmp.path(), "b.js", "const b = 20;\n");
        let report = task.run().await.unwrap();
        assert_eq!(report.skipped, 1);

        let main = fs::read_to_string(profile.js_dest().join("main.js")).unwrap();
        assert!(main.contains("var a = 1;"));
        assert!(main.contains("var b = 20;"));
    }

    #[tokio::test]
    async fn syntax_error_skips_file_but_bundles_the_rest() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = profile(tmp.path());
        for (name, body) in [
            ("a.js", "const a = 1;\n"),
            ("b.js", "const b = 2;\n"),
            ("c.js", "function broken() { if (x) {\n"),
            ("d.js", "const d = 4;\n"),
            ("e.js", "const e = 5;\n"),
        ] {
            write_js(tmp.path(), name, body);
        }

        let task = ScriptTask::new(profile.clone());
        let report = task.run().await.unwrap();
        assert_eq!(report.failed, 1);

        let main = fs::read_to_string(profile.js_dest().join("main.js")).unwrap();
        for ok in ["var a = 1;", "var b = 2;", "var d = 4;", "var e = 5;"] {
            assert!(main.contains(ok));
        }
        assert!(!main.contains("broken"));
    }

    #[tokio::test]
    async fn deleted_file_leaves_bundles() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = profile(tmp.path());
        write_js(tmp.path(), "a.js", "const a = 1;\n");
        write_js(tmp.path(), "b.js", "const b = 2;\n");

        let task = ScriptTask::new(profile.clone());
        task.run().await.unwrap();

        fs::remove_file(tmp.path().join("src/js/b.js")).unwrap();
        task.run().await.unwrap();

        let main = fs::read_to_string(profile.js_dest().join("main.js")).unwrap();
        assert!(main.contains("var a = 1;"));
        assert!(!main.contains("var b"));
    }

    #[tokio::test]
    async fn minified_bundle_keeps_logical_content() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = profile(tmp.path());
        write_js(
            tmp.path(),
            "a.js",
            "// attribution header\nfunction greet(name) {\n    return \"hi \" + name;\n}\n",
        );

        let task = ScriptTask::new(profile.clone());
        task.run().await.unwrap();

        let plain = fs::read_to_string(profile.js_dest().join("main.js")).unwrap();
        let min = fs::read_to_string(profile.js_dest().join("main.min.js")).unwrap();
        assert!(min.len() < plain.len());
        assert!(!min.contains("attribution"));
        assert!(min.contains("\"hi \""));
        // Identical modulo whitespace and comments.
        let squash = |s: &str| {
            s.lines()
                .map(|l| l.split("//").next().unwrap_or(""))
                .collect::<String>()
                .split_whitespace()
                .collect::<String>()
        };
        assert_eq!(squash(&plain), squash(&min));
    }

    #[tokio::test]
    async fn missing_js_dir_is_empty_run() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = profile(tmp.path());
        let task = ScriptTask::new(profile.clone());
        let report = task.run().await.unwrap();
        assert_eq!(report.written, 0);
        assert!(!profile.js_dest().exists());
    }
}
