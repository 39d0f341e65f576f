//! End-to-end CLI checks

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn write_profile(dir: &Path, name: &str, theme: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join(format!("config-{name}.toml")),
        format!(
            "theme_dir = {:?}\nproject_url = \"http://localhost:8080\"\n",
            theme.display().to_string()
        ),
    )
    .unwrap();
}

#[test]
fn missing_profile_fails_fast_with_config_exit_code() {
    let tmp = tempfile::tempdir().unwrap();
    let configs = tmp.path().join("configs");
    fs::create_dir_all(&configs).unwrap();
    let theme = tmp.path().join("theme");

    Command::cargo_bin("themekit")
        .unwrap()
        .args(["--config", "staging", "build"])
        .arg("--configs-dir")
        .arg(&configs)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("configuration not found"));

    // Nothing may be written on a configuration failure.
    assert!(!theme.exists());
}

#[test]
fn build_writes_assets_under_theme_root() {
    let tmp = tempfile::tempdir().unwrap();
    let theme = tmp.path().join("theme");
    let configs = tmp.path().join("configs");
    write_profile(&configs, "default", &theme);

    fs::create_dir_all(theme.join("src/scss")).unwrap();
    fs::write(theme.join("src/scss/style.scss"), "body { margin: 0; }\n").unwrap();
    fs::create_dir_all(theme.join("src/js")).unwrap();
    fs::write(theme.join("src/js/app.js"), "const x = 1;\n").unwrap();

    Command::cargo_bin("themekit")
        .unwrap()
        .arg("build")
        .arg("--configs-dir")
        .arg(&configs)
        .assert()
        .success();

    assert!(theme.join("assets/css/style.css").is_file());
    assert!(theme.join("assets/css/style.min.css").is_file());
    assert!(theme.join("assets/js/main.js").is_file());
    assert!(theme.join("assets/js/main.min.js").is_file());
}

#[test]
fn clean_removes_destination_tree() {
    let tmp = tempfile::tempdir().unwrap();
    let theme = tmp.path().join("theme");
    let configs = tmp.path().join("configs");
    write_profile(&configs, "default", &theme);

    fs::create_dir_all(theme.join("assets/css")).unwrap();
    fs::write(theme.join("assets/css/style.css"), "body{}").unwrap();

    Command::cargo_bin("themekit")
        .unwrap()
        .arg("clean")
        .arg("--configs-dir")
        .arg(&configs)
        .assert()
        .success();

    assert!(!theme.join("assets").exists());
}
