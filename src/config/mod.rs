//! Configuration profiles for Themekit
//!
//! A profile is a `config-<name>.toml` file in the configs directory,
//! selected with `--config <name>` (falling back to `config-default.toml`).
//! It is loaded once at startup and passed by `Arc` into every task; nothing
//! re-reads configuration after that.

mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use schema::*;

/// Fatal configuration errors. These abort the process before any task runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration not found: no profile '{name}' at {path}")]
    NotFound { name: String, path: PathBuf },

    #[error("failed to read profile {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid profile {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// A fully resolved build profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Theme root; every source and destination path lives under it
    pub theme_dir: PathBuf,

    /// Externally reachable URL the dev server proxies
    pub project_url: String,

    /// Development mode (source maps, reload channel)
    #[serde(default)]
    pub is_dev: bool,

    /// Sass compiler options
    #[serde(default)]
    pub style: StyleConfig,

    /// Dev server settings
    #[serde(default)]
    pub dev: DevConfig,

    /// Browser compatibility matrix
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,

    /// Name this profile was loaded as
    #[serde(skip)]
    pub name: String,
}

impl Profile {
    /// Load the profile `config-<name>.toml` from `configs_dir`.
    pub fn load(configs_dir: &Path, name: &str) -> Result<Self, ConfigError> {
        let path = configs_dir.join(format!("config-{name}.toml"));

        if !path.is_file() {
            return Err(ConfigError::NotFound {
                name: name.to_string(),
                path,
            });
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        let mut profile: Profile =
            toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })?;
        profile.name = name.to_string();

        // Watch events carry absolute paths; anchor the theme root so path
        // classification works regardless of where the tool was invoked.
        if profile.theme_dir.is_relative() {
            profile.theme_dir = std::env::current_dir()
                .map_err(|source| ConfigError::Io {
                    path: profile.theme_dir.clone(),
                    source,
                })?
                .join(&profile.theme_dir);
        }

        Ok(profile)
    }

    // Style paths

    pub fn style_src(&self) -> PathBuf {
        self.theme_dir.join("src/scss/style.scss")
    }

    pub fn style_src_dir(&self) -> PathBuf {
        self.theme_dir.join("src/scss")
    }

    pub fn style_dest(&self) -> PathBuf {
        self.theme_dir.join("assets/css")
    }

    // Script paths

    pub fn js_dir(&self) -> PathBuf {
        self.theme_dir.join("src/js")
    }

    pub fn js_dest(&self) -> PathBuf {
        self.theme_dir.join("assets/js")
    }

    // Font paths

    pub fn fonts_src(&self) -> PathBuf {
        self.theme_dir.join("src/fonts")
    }

    pub fn fonts_dest(&self) -> PathBuf {
        self.theme_dir.join("assets/fonts")
    }

    // Image paths

    pub fn images_src(&self) -> PathBuf {
        self.theme_dir.join("src/images")
    }

    pub fn images_dest(&self) -> PathBuf {
        self.theme_dir.join("assets/img")
    }

    /// Destination root, removed wholesale by `clean`
    pub fn assets_dir(&self) -> PathBuf {
        self.theme_dir.join("assets")
    }

    /// Persistent pipeline state (script record, image cache)
    pub fn state_dir(&self) -> PathBuf {
        self.theme_dir.join(".themekit")
    }

    pub fn script_record_path(&self) -> PathBuf {
        self.state_dir().join("scripts.json")
    }

    pub fn image_cache_path(&self) -> PathBuf {
        self.state_dir().join("images.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_profile(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(format!("config-{name}.toml")), body).unwrap();
    }

    #[test]
    fn load_default_profile() {
        let tmp = tempfile::tempdir().unwrap();
        write_profile(
            tmp.path(),
            "default",
            r#"
theme_dir = "/srv/theme"
project_url = "http://localhost:8080"
is_dev = true
"#,
        );

        let profile = Profile::load(tmp.path(), "default").unwrap();
        assert_eq!(profile.name, "default");
        assert!(profile.is_dev);
        assert_eq!(profile.style.precision, 10);
        assert_eq!(profile.style.output_style, OutputStyle::Expanded);
        assert_eq!(profile.dev.port, 3000);
        assert_eq!(profile.browsers.len(), 11);
    }

    #[test]
    fn destinations_rooted_under_theme_dir() {
        let tmp = tempfile::tempdir().unwrap();
        write_profile(
            tmp.path(),
            "staging",
            r#"
theme_dir = "/var/www/site/wp-content/themes/acme"
project_url = "http://staging.local"
"#,
        );

        let profile = Profile::load(tmp.path(), "staging").unwrap();
        for dest in [
            profile.style_dest(),
            profile.js_dest(),
            profile.fonts_dest(),
            profile.images_dest(),
            profile.assets_dir(),
            profile.state_dir(),
        ] {
            assert!(
                dest.starts_with(&profile.theme_dir),
                "{} escapes the theme root",
                dest.display()
            );
        }
    }

    #[test]
    fn missing_profile_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Profile::load(tmp.path(), "staging").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
        assert!(err.to_string().contains("configuration not found"));
    }

    #[test]
    fn malformed_profile_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_profile(tmp.path(), "broken", "theme_dir = [nope");
        let err = Profile::load(tmp.path(), "broken").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn output_style_parses_lowercase() {
        let tmp = tempfile::tempdir().unwrap();
        write_profile(
            tmp.path(),
            "min",
            r#"
theme_dir = "/srv/theme"
project_url = "http://localhost"

[style]
output_style = "compressed"
precision = 10
"#,
        );
        let profile = Profile::load(tmp.path(), "min").unwrap();
        assert_eq!(profile.style.output_style, OutputStyle::Compressed);
    }
}
