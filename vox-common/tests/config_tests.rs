//! Config file loading through the public API

use serial_test::serial;
use std::path::PathBuf;
use tempfile::TempDir;
use vox_common::config::{load_or_default, DirResolver};
use vox_common::Error;

#[test]
fn test_explicit_config_file_loaded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vox.toml");
    std::fs::write(
        &path,
        "processed_dir = \"/srv/processed\"\nworkers = 8\n\n[logging]\nlevel = \"warn\"\n",
    )
    .unwrap();

    let config = load_or_default(Some(&path)).unwrap();
    assert_eq!(config.processed_dir, Some(PathBuf::from("/srv/processed")));
    assert_eq!(config.workers, Some(8));
    assert_eq!(config.logging.level, "warn");
}

#[test]
fn test_explicit_broken_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vox.toml");
    std::fs::write(&path, "workers = \"many\"\n").unwrap();

    assert!(matches!(load_or_default(Some(&path)), Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_blank_env_value_falls_through() {
    std::env::set_var("VOX_TEST_FEATURES_DIR", "   ");
    let default = PathBuf::from("data/features");
    let resolver = DirResolver::new("VOX_TEST_FEATURES_DIR", None, &default);
    assert_eq!(resolver.resolve(None), default);
    std::env::remove_var("VOX_TEST_FEATURES_DIR");
}
