//! Config files on disk: round trips and override merging

use std::path::PathBuf;

use vk_boilerplate::config::{Config, ConfigError, SampleConfig};

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("vk_boilerplate_config_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

#[test]
fn test_toml_and_ron_round_trip() {
    let mut config = SampleConfig::new("Round trip", 1024, 768);
    config.renderer.frames_in_flight = 3;
    config.renderer.clear_color = [0.1, 0.2, 0.3, 1.0];
    config.camera.fov_degrees = 75.0;
    config.paths.asset_dir = "assets".into();

    for name in ["round_trip.toml", "round_trip.ron"] {
        let path = scratch(name);
        config.save_to_file(&path).unwrap();
        let loaded = SampleConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config, "{name}");
        std::fs::remove_file(&path).unwrap();
    }
}

#[test]
fn test_partial_override_keeps_defaults_and_title() {
    let path = scratch("override.toml");
    std::fs::write(
        &path,
        "[window]\nwidth = 640\nheight = 480\ntitle = \"ignored\"\n\n[renderer]\nvsync = true\n",
    )
    .unwrap();

    let config = SampleConfig::new("Mine", 1280, 720).with_overrides_from(&path).unwrap();
    assert_eq!(config.window.width, 640);
    assert_eq!(config.window.height, 480);
    assert_eq!(config.window.title, "Mine");
    assert!(config.renderer.vsync);
    assert_eq!(config.log_level, "info");
    assert_eq!(config.camera, SampleConfig::default().camera);
    config.validate().unwrap();

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_invalid_override_is_rejected_by_validate() {
    let path = scratch("bad_frames.toml");
    std::fs::write(&path, "[renderer]\nframes_in_flight = 7\n").unwrap();

    let config = SampleConfig::new("Bad", 800, 600).with_overrides_from(&path).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    std::fs::remove_file(&path).unwrap();
}
