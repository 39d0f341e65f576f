//! Style task
//!
//! Compiles the theme stylesheet with grass, vendor-prefixes it for the
//! profile's browser matrix, and writes the plain and minified variants.
//! The compiled CSS is produced once and fanned out to the two sinks.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use tracing::{debug, warn};

use crate::config::{OutputStyle, Profile};
use crate::server::ReloadHandle;
use crate::tasks::{Task, TaskReport};
use crate::utils;

/// Compiles Sass and emits `style.css` / `style.min.css`
pub struct StyleTask {
    profile: Arc<Profile>,

    /// Present under watch mode; successful runs inject updated CSS
    reload: Option<ReloadHandle>,
}

impl StyleTask {
    pub fn new(profile: Arc<Profile>) -> Self {
        Self {
            profile,
            reload: None,
        }
    }

    pub fn with_reload(profile: Arc<Profile>, reload: ReloadHandle) -> Self {
        Self {
            profile,
            reload: Some(reload),
        }
    }

    /// Resolve the profile's browserslist into lightningcss targets
    fn targets(&self) -> Result<Targets> {
        let browsers = Browsers::from_browserslist(self.profile.browsers.iter().map(String::as_str))
            .map_err(|e| anyhow!("invalid browsers list: {e}"))?;
        Ok(Targets::from(browsers.unwrap_or_default()))
    }

    fn compile(&self) -> Result<TaskReport> {
        let src = self.profile.style_src();
        if !src.is_file() {
            debug!("No stylesheet at {}", src.display());
            return Ok(TaskReport::default());
        }

        if self.profile.style.precision != 10 {
            warn!(
                "style.precision = {} has no effect; output precision is fixed at 10 digits",
                self.profile.style.precision
            );
        }

        let style = match self.profile.style.output_style {
            OutputStyle::Expanded => grass::OutputStyle::Expanded,
            OutputStyle::Compressed => grass::OutputStyle::Compressed,
        };
        let options = grass::Options::default()
            .style(style)
            .load_path(self.profile.style_src_dir());

        let css = grass::from_path(&src, &options)
            .map_err(|e| anyhow!("Sass compile failed: {e}"))?;

        let targets = self.targets()?;
        let dest = self.profile.style_dest();
        let plain_path = dest.join("style.css");
        let min_path = utils::min_sibling(&plain_path);
        let mut written = 0;

        // One parse, two independent sinks.
        {
            let mut sheet = StyleSheet::parse(&css, ParserOptions::default())
                .map_err(|e| anyhow!("CSS parse failed: {e}"))?;

            // Plain variant, source map in development mode.
            if self.profile.is_dev {
                let mut source_map = SourceMap::new("/");
                let source_idx = source_map.add_source(&src.display().to_string());
                source_map
                    .set_source_content(source_idx as usize, &css)
                    .map_err(|e| anyhow!("source map failed: {e}"))?;

                let printed = sheet
                    .to_css(PrinterOptions {
                        targets: targets.clone(),
                        source_map: Some(&mut source_map),
                        ..Default::default()
                    })
                    .map_err(|e| anyhow!("CSS print failed: {e}"))?;

                let map_json = source_map
                    .to_json(None)
                    .map_err(|e| anyhow!("source map failed: {e}"))?;
                let map_path = dest.join("style.css.map");
                utils::write_file(&map_path, map_json.as_bytes())?;
                written += 1;

                let code = format!("{}\n/*# sourceMappingURL=style.css.map */\n", printed.code);
                utils::write_file(&plain_path, utils::normalize_line_endings(&code).as_bytes())?;
                written += 1;
            } else {
                let printed = sheet
                    .to_css(PrinterOptions {
                        targets: targets.clone(),
                        ..Default::default()
                    })
                    .map_err(|e| anyhow!("CSS print failed: {e}"))?;
                utils::write_file(
                    &plain_path,
                    utils::normalize_line_endings(&printed.code).as_bytes(),
                )?;
                written += 1;
            }

            // Minified variant; minify() also merges matching rules and
            // media queries before printing.
            sheet
                .minify(MinifyOptions {
                    targets: targets.clone(),
                    ..Default::default()
                })
                .map_err(|e| anyhow!("CSS minify failed: {e}"))?;
            let minified = sheet
                .to_css(PrinterOptions {
                    targets,
                    minify: true,
                    ..Default::default()
                })
                .map_err(|e| anyhow!("CSS print failed: {e}"))?;
            utils::write_file(
                &min_path,
                utils::normalize_line_endings(&minified.code).as_bytes(),
            )?;
            written += 1;
        }

        if let Some(reload) = &self.reload {
            reload.css_update("style.css");
            reload.css_update("style.min.css");
        }

        Ok(TaskReport {
            written,
            ..Default::default()
        })
    }
}

#[async_trait]
impl Task for StyleTask {
    fn name(&self) -> &'static str {
        "styles"
    }

    async fn run(&self) -> Result<TaskReport> {
        let task = Self {
            profile: self.profile.clone(),
            reload: self.reload.clone(),
        };
        tokio::task::spawn_blocking(move || task.compile())
            .await
            .context("style task panicked")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn profile(theme: &Path, is_dev: bool) -> Arc<Profile> {
        let configs = theme.join("configs");
        fs::create_dir_all(&configs).unwrap();
        fs::write(
            configs.join("config-test.toml"),
            format!(
                "theme_dir = {:?}\nproject_url = \"http://localhost\"\nis_dev = {}\n",
                theme.display().to_string(),
                is_dev
            ),
        )
        .unwrap();
        Arc::new(Profile::load(&configs, "test").unwrap())
    }

    fn write_scss(theme: &Path, body: &str) {
        let scss = theme.join("src/scss");
        fs::create_dir_all(&scss).unwrap();
        fs::write(scss.join("style.scss"), body).unwrap();
    }

    #[tokio::test]
    async fn compiles_plain_and_minified_variants() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = profile(tmp.path(), false);
        write_scss(
            tmp.path(),
            "$accent: #336699;\nbody {\n  color: $accent;\n  .inner { margin: 0; }\n}\n",
        );

        let report = StyleTask::new(profile.clone()).run().await.unwrap();
        assert_eq!(report.written, 2);

        let plain = fs::read_to_string(profile.style_dest().join("style.css")).unwrap();
        let min = fs::read_to_string(profile.style_dest().join("style.min.css")).unwrap();
        assert!(plain.contains("#369") || plain.contains("#336699"));
        assert!(min.len() < plain.len());
        assert!(!plain.contains('\r'));
        assert!(!min.contains('\r'));
    }

    #[tokio::test]
    async fn dev_mode_writes_source_map() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = profile(tmp.path(), true);
        write_scss(tmp.path(), "body { margin: 0; }\n");

        StyleTask::new(profile.clone()).run().await.unwrap();

        let plain = fs::read_to_string(profile.style_dest().join("style.css")).unwrap();
        assert!(plain.contains("sourceMappingURL=style.css.map"));
        assert!(profile.style_dest().join("style.css.map").is_file());
    }

    #[tokio::test]
    async fn missing_source_is_empty_run() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = profile(tmp.path(), false);

        let report = StyleTask::new(profile.clone()).run().await.unwrap();
        assert_eq!(report.written, 0);
        assert!(!profile.style_dest().exists());
    }

    #[tokio::test]
    async fn compile_error_is_reported_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = profile(tmp.path(), false);
        write_scss(tmp.path(), "body { color: $undefined-variable; }\n");

        let err = StyleTask::new(profile.clone()).run().await.unwrap_err();
        assert!(err.to_string().contains("Sass compile failed"));
        assert!(!profile.style_dest().join("style.css").exists());
    }
}
