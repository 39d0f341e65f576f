//! Asset group derivation for script bundles
//!
//! The bundle layout is read off the script tree on every run: one bundle
//! per immediate subdirectory of `src/js/lib`, plus a catch-all `main`
//! bundle for every script outside `lib/`. Nothing is cached between runs
//! so directory changes are picked up immediately.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Name of the catch-all bundle
pub const MAIN_BUNDLE: &str = "main";

/// A named output bundle and the source files that feed it
#[derive(Debug, Clone)]
pub struct AssetGroup {
    /// Bundle name; the output file is `<name>.js`
    pub name: String,

    /// Member files in deterministic (sorted) order
    pub files: Vec<PathBuf>,
}

impl AssetGroup {
    /// Output filename for this group
    pub fn output_name(&self) -> String {
        format!("{}.js", self.name)
    }
}

/// Derive the bundle mapping from the script directory structure.
///
/// A missing `js_dir` yields an empty mapping rather than an error.
pub fn scan_groups(js_dir: &Path) -> Result<Vec<AssetGroup>> {
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

    if !js_dir.is_dir() {
        return Ok(Vec::new());
    }

    let lib_dir = js_dir.join("lib");

    if lib_dir.is_dir() {
        let entries = fs::read_dir(&lib_dir)
            .with_context(|| format!("Failed to list {}", lib_dir.display()))?;

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let files = list_js_files(&entry.path(), false)?;
            groups.insert(name, files);
        }
    }

    // Everything outside lib/ lands in the catch-all bundle.
    let main_files: Vec<PathBuf> = list_js_files(js_dir, true)?
        .into_iter()
        .filter(|p| !p.starts_with(&lib_dir))
        .collect();
    groups.insert(MAIN_BUNDLE.to_string(), main_files);

    Ok(groups
        .into_iter()
        .map(|(name, files)| AssetGroup { name, files })
        .collect())
}

/// List `.js` files under `dir`, sorted; optionally recursing
fn list_js_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("js"))
        .collect();
    files.sort();
    Ok(files)
}
