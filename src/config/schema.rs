//! Profile schema definitions

use serde::{Deserialize, Serialize};

/// Sass compiler options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Output style for the unminified stylesheet
    #[serde(default)]
    pub output_style: OutputStyle,

    /// Numeric precision. Kept for profile compatibility; the compiler
    /// targets dart-sass, which fixes precision at 10 digits.
    #[serde(default = "default_precision")]
    pub precision: u8,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            output_style: OutputStyle::default(),
            precision: default_precision(),
        }
    }
}

fn default_precision() -> u8 {
    10
}

/// CSS output style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    #[default]
    Expanded,
    Compressed,
}

/// Dev server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevConfig {
    /// Port the proxy listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Port the reload channel listens on
    #[serde(default = "default_reload_port")]
    pub reload_port: u16,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Open browser automatically
    #[serde(default = "default_true")]
    pub open: bool,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            reload_port: default_reload_port(),
            host: default_host(),
            open: default_true(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_reload_port() -> u16 {
    35729
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_true() -> bool {
    true
}

/// Browser compatibility matrix used for vendor prefixing and the
/// script downlevel target.
pub fn default_browsers() -> Vec<String> {
    [
        "last 2 version",
        "> 1%",
        "ie >= 11",
        "last 1 Android versions",
        "last 1 ChromeAndroid versions",
        "last 2 Chrome versions",
        "last 2 Firefox versions",
        "last 2 Safari versions",
        "last 2 iOS versions",
        "last 2 Edge versions",
        "last 2 Opera versions",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
