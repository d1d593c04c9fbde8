//! Configuration loading from files and the environment.

mod support;

use std::io::Write;

use crew_dispatch::config::{ConfigError, DriveTimeProviderKind, OptimizerConfig, ZonePolicy};
use support::with_scoped_env;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_reads_dispatch_config_path() {
    let file = write_config(
        r#"
[weights]
zone_mismatch = 45.0

[routing]
travel_buffer_minutes = 0
zone_policy = "require"
"#,
    );
    let path = file.path().to_str().unwrap().to_string();

    let config = with_scoped_env(
        &[("DISPATCH_CONFIG", Some(&path)), ("MAPBOX_TOKEN", None)],
        OptimizerConfig::load,
    )
    .unwrap();

    assert_eq!(config.weights.zone_mismatch, 45.0);
    assert_eq!(config.routing.travel_buffer_minutes, 0);
    assert_eq!(config.routing.zone_policy, ZonePolicy::Require);
    assert_eq!(config.drive_time.provider, DriveTimeProviderKind::Heuristic);
}

#[test]
fn test_mapbox_token_env_overrides_file() {
    let file = write_config("[drive_time]\nprovider = \"heuristic\"\n");
    let path = file.path().to_str().unwrap().to_string();

    let config = with_scoped_env(
        &[("DISPATCH_CONFIG", Some(&path)), ("MAPBOX_TOKEN", Some("pk.env"))],
        OptimizerConfig::load,
    )
    .unwrap();

    assert_eq!(config.drive_time.provider, DriveTimeProviderKind::Mapbox);
    assert_eq!(config.drive_time.token(), Some("pk.env"));
}

#[test]
fn test_missing_dispatch_config_file_fails() {
    let err = with_scoped_env(
        &[
            ("DISPATCH_CONFIG", Some("/no/such/dir/optimizer.toml")),
            ("MAPBOX_TOKEN", None),
        ],
        OptimizerConfig::load,
    )
    .unwrap_err();

    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_invalid_file_is_rejected_on_load() {
    let file = write_config("[drive_time]\naverage_speed_kmh = 0.0\n");
    let path = file.path().to_str().unwrap().to_string();

    let err = with_scoped_env(
        &[("DISPATCH_CONFIG", Some(&path)), ("MAPBOX_TOKEN", None)],
        OptimizerConfig::load,
    )
    .unwrap_err();

    assert!(err.to_string().contains("average_speed_kmh"));
}

#[test]
fn test_sample_config_parses() {
    let sample = include_str!("../optimizer.toml");
    let config = OptimizerConfig::from_toml_str(sample).unwrap();
    assert_eq!(config.routing.two_opt_max_iterations, 200);
    assert_eq!(config.drive_time.provider, DriveTimeProviderKind::Heuristic);
}
