//! Configuration loading and the tool status route.

mod common;

use common::TestHarness;
use std::fs;
use vidbatch::config::{load_config, load_config_or_default, HardwareMode};
use vidbatch_av::HwBackend;

#[test]
fn full_config_file_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vidbatch.toml");
    fs::write(
        &path,
        r#"
[server]
host = "0.0.0.0"
port = 9000
max_upload_mb = 512

[tools]
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"

[conversion]
output_dir = "/srv/converted"
quality = 20
x264_preset = "slow"
hw_backend = "qsv"
keep_uploads = true
"#,
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.max_upload_bytes(), 512 * 1024 * 1024);
    assert_eq!(
        config.tools.ffmpeg_path.as_deref(),
        Some(std::path::Path::new("/opt/ffmpeg/bin/ffmpeg"))
    );
    assert_eq!(config.conversion.quality, 20);
    assert_eq!(config.conversion.x264_preset, "slow");
    assert_eq!(config.conversion.x265_preset, "medium");
    assert!(config.conversion.keep_uploads);
    assert_eq!(
        config.conversion.hardware_mode().unwrap(),
        HardwareMode::Only(HwBackend::Qsv)
    );
}

#[test]
fn missing_sections_use_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.toml");
    fs::write(&path, "[server]\nport = 8080\n").unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(
        config.conversion.output_dir,
        std::path::PathBuf::from("converted_videos")
    );
    assert!(config.conversion.upload_dir.is_none());
}

#[test]
fn invalid_values_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cases = [
        ("port.toml", "[server]\nport = 0\n", "port"),
        ("quality.toml", "[conversion]\nquality = 60\n", "quality"),
        ("backend.toml", "[conversion]\nhw_backend = \"amf\"\n", "hw_backend"),
    ];

    for (name, content, needle) in cases {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(
            format!("{:#}", err).contains(needle),
            "{}: unexpected error {:#}",
            name,
            err
        );
    }
}

#[test]
fn malformed_toml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[server\nport = ").unwrap();
    assert!(load_config(&path).is_err());
}

#[test]
fn explicit_missing_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_config_or_default(Some(&dir.path().join("nope.toml"))).is_err());
}

#[tokio::test]
async fn tools_route_reports_ffmpeg_and_ffprobe() {
    let (_h, addr) = TestHarness::with_server().await;

    let resp = reqwest::get(format!("http://{addr}/api/tools")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let tools: serde_json::Value = resp.json().await.unwrap();
    let names: Vec<&str> = tools
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["ffmpeg", "ffprobe"]);
    for tool in tools.as_array().unwrap() {
        assert!(tool["available"].is_boolean());
    }
}
