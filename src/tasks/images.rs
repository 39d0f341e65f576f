//! Image task
//!
//! Optimizes theme images per format and remembers the content hash of every
//! source it has processed, so unchanged images are skipped until the cache
//! is explicitly cleared.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use globset::{Glob, GlobSet, GlobSetBuilder};
use image::AnimationDecoder;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::Profile;
use crate::tasks::{notify_error, Task, TaskReport};
use crate::utils;

static IMAGE_GLOBS: Lazy<GlobSet> = Lazy::new(|| {
    let mut builder = GlobSetBuilder::new();
    for pattern in ["*.png", "*.jpg", "*.jpeg", "*.gif", "*.svg"] {
        builder.add(Glob::new(pattern).expect("static glob"));
    }
    builder.build().expect("static glob set")
});

/// Content-hash cache of optimized sources. Reads and inserts may happen
/// from concurrent task runs; persistence is a JSON snapshot.
#[derive(Debug)]
struct ImageCache {
    entries: DashMap<PathBuf, String>,
}

impl ImageCache {
    fn load(path: &Path) -> Self {
        let entries = DashMap::new();
        if let Ok(bytes) = fs::read(path) {
            if let Ok(map) = serde_json::from_slice::<HashMap<PathBuf, String>>(&bytes) {
                for (k, v) in map {
                    entries.insert(k, v);
                }
            }
        }
        Self { entries }
    }

    fn save(&self, path: &Path) -> Result<()> {
        let map: HashMap<PathBuf, String> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let json = serde_json::to_vec(&map).context("Failed to serialize image cache")?;
        utils::write_file(path, &json)
    }

    fn is_current(&self, rel: &Path, hash: &str) -> bool {
        self.entries
            .get(rel)
            .map(|entry| entry.value().as_str() == hash)
            .unwrap_or(false)
    }

    fn insert(&self, rel: PathBuf, hash: String) {
        self.entries.insert(rel, hash);
    }
}

/// Optimizes PNG/JPEG/GIF/SVG sources into the image destination tree
pub struct ImageTask {
    profile: Arc<Profile>,
    cache: Arc<ImageCache>,
}

impl ImageTask {
    pub fn new(profile: Arc<Profile>) -> Self {
        let cache = Arc::new(ImageCache::load(&profile.image_cache_path()));
        Self { profile, cache }
    }

    fn optimize_all(&self) -> Result<TaskReport> {
        let src = self.profile.images_src();
        if !src.is_dir() {
            debug!("No images under {}", src.display());
            return Ok(TaskReport::default());
        }

        let dest = self.profile.images_dest();
        let mut report = TaskReport::default();

        for entry in WalkDir::new(&src).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().to_lowercase();
            if !IMAGE_GLOBS.is_match(Path::new(&file_name)) {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(&src)
                .expect("walked path is under its root")
                .to_path_buf();
            let target = dest.join(&rel);

            let bytes = fs::read(entry.path())
                .with_context(|| format!("Failed to read {}", entry.path().display()))?;
            let hash = utils::hash_content(&bytes);

            if self.cache.is_current(&rel, &hash) && target.is_file() {
                report.skipped += 1;
                continue;
            }

            match optimize(&bytes, &file_name) {
                Ok(optimized) => {
                    utils::write_file(&target, &optimized)?;
                    self.cache.insert(rel, hash);
                    report.written += 1;
                }
                Err(err) => {
                    notify_error(
                        self.name(),
                        &err.context(format!("{} not optimized", entry.path().display())),
                    );
                    report.failed += 1;
                }
            }
        }

        self.cache.save(&self.profile.image_cache_path())?;

        Ok(report)
    }
}

#[async_trait]
impl Task for ImageTask {
    fn name(&self) -> &'static str {
        "images"
    }

    async fn run(&self) -> Result<TaskReport> {
        let task = Self {
            profile: self.profile.clone(),
            cache: self.cache.clone(),
        };
        tokio::task::spawn_blocking(move || task.optimize_all())
            .await
            .context("image task panicked")?
    }
}

/// Format-appropriate optimization, dispatched on the (lowercased) filename
fn optimize(bytes: &[u8], file_name: &str) -> Result<Vec<u8>> {
    if file_name.ends_with(".png") {
        optimize_png(bytes)
    } else if file_name.ends_with(".jpg") || file_name.ends_with(".jpeg") {
        optimize_jpeg(bytes)
    } else if file_name.ends_with(".gif") {
        optimize_gif(bytes)
    } else {
        Ok(cleanup_svg(&String::from_utf8_lossy(bytes)).into_bytes())
    }
}

fn optimize_png(bytes: &[u8]) -> Result<Vec<u8>> {
    oxipng::optimize_from_memory(bytes, &oxipng::Options::from_preset(3))
        .map_err(|e| anyhow!("PNG optimization failed: {e}"))
}

/// Near-lossless JPEG re-encode
fn optimize_jpeg(bytes: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).map_err(|e| anyhow!("JPEG decode failed: {e}"))?;
    let mut out = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut out), 90);
    img.write_with_encoder(encoder)
        .map_err(|e| anyhow!("JPEG encode failed: {e}"))?;
    Ok(out)
}

/// Frame-preserving GIF re-encode
fn optimize_gif(bytes: &[u8]) -> Result<Vec<u8>> {
    let decoder = image::codecs::gif::GifDecoder::new(Cursor::new(bytes))
        .map_err(|e| anyhow!("GIF decode failed: {e}"))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| anyhow!("GIF decode failed: {e}"))?;

    let mut out = Vec::new();
    {
        let mut encoder = image::codecs::gif::GifEncoder::new(&mut out);
        encoder
            .encode_frames(frames)
            .map_err(|e| anyhow!("GIF encode failed: {e}"))?;
    }
    Ok(out)
}

static SVG_COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static SVG_METADATA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<metadata[\s>].*?</metadata>").unwrap());
static SVG_INTERTAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r">\s+<").unwrap());
static SVG_OPEN_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<svg[^>]*>").unwrap());
static SVG_WIDTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bwidth\s*=\s*"([0-9.]+)(?:px)?""#).unwrap());
static SVG_HEIGHT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bheight\s*=\s*"([0-9.]+)(?:px)?""#).unwrap());
static SVG_VIEW_BOX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\s*viewBox\s*=\s*"0 0 ([0-9.]+) ([0-9.]+)""#).unwrap());

/// Text-level SVG cleanup: comments and metadata go, inter-tag whitespace
/// collapses, a `viewBox` that duplicates `0 0 width height` is dropped.
/// `id` attributes are never touched.
fn cleanup_svg(source: &str) -> String {
    let cleaned = SVG_COMMENT_RE.replace_all(source, "");
    let cleaned = SVG_METADATA_RE.replace_all(&cleaned, "");
    let cleaned = SVG_INTERTAG_RE.replace_all(&cleaned, "><");
    drop_redundant_view_box(cleaned.trim())
}

fn drop_redundant_view_box(svg: &str) -> String {
    let Some(open) = SVG_OPEN_TAG_RE.find(svg) else {
        return svg.to_string();
    };
    let tag = open.as_str();

    let dims = |re: &Regex| {
        re.captures(tag)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    };
    let (Some(width), Some(height)) = (dims(&SVG_WIDTH_RE), dims(&SVG_HEIGHT_RE)) else {
        return svg.to_string();
    };
    let Some(vb) = SVG_VIEW_BOX_RE.captures(tag) else {
        return svg.to_string();
    };
    let vb_w: f64 = vb[1].parse().unwrap_or(f64::NAN);
    let vb_h: f64 = vb[2].parse().unwrap_or(f64::NAN);

    if vb_w == width && vb_h == height {
        let stripped = SVG_VIEW_BOX_RE.replace(tag, "");
        svg.replacen(tag, &stripped, 1)
    } else {
        svg.to_string()
    }
}
