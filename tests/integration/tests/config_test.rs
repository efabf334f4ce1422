//! Configuration files on disk

use anyhow::Result;
use std::fs;
use tempfile::TempDir;
use vistream::backend::BackendKind;
use vistream::stream::{Resolution, ResolutionSetting, StreamFormat};
use vistream::utils::Config;

#[test]
fn test_load_explicit_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("vistream.toml");
    fs::write(
        &path,
        r#"
        [[instances]]
        id = "piped-main"
        backend = "piped"
        url = "https://pipedapi.example.org"

        [[quality.profiles]]
        name = "Low data"
        backend = "piped"
        resolution = "480p"
        formats = ["stream", "mp4"]

        [player]
        seek_tolerance_after_ms = 3000

        [segments]
        categories = ["sponsor", "intro"]
        "#,
    )?;

    let config = Config::load_from(Some(&path))?;

    assert_eq!(config.instances.len(), 1);
    assert_eq!(config.instances[0].backend, BackendKind::Piped);
    assert_eq!(config.player.seek_tolerance_after_ms, 3000);
    assert_eq!(config.player.seek_tolerance_before_ms, 500);
    assert_eq!(config.segments.categories, vec!["sponsor", "intro"]);

    let profile = config.quality.for_backend(Some(BackendKind::Piped));
    assert_eq!(profile.name, "Low data");
    assert_eq!(profile.resolution, ResolutionSetting::Max(Resolution::SD480));
    assert_eq!(profile.formats, vec![StreamFormat::Stream, StreamFormat::Mp4]);
    Ok(())
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    assert!(Config::load_from(Some(&dir.path().join("absent.toml"))).is_err());
}

#[test]
fn test_invalid_file_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("vistream.toml");
    fs::write(
        &path,
        r#"
        [[instances]]
        id = "inv"
        backend = "invidious"
        url = "inv.example"
        "#,
    )?;

    assert!(Config::load_from(Some(&path)).is_err());
    Ok(())
}

#[test]
fn test_save_and_reload() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("nested").join("vistream.toml");

    let mut config = Config::default();
    config.player.history_limit = 25;
    config.save_to(&path)?;

    let reloaded = Config::load_from(Some(&path))?;
    assert_eq!(reloaded.player.history_limit, 25);
    assert_eq!(reloaded.quality, config.quality);
    Ok(())
}
