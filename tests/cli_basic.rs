//! Integration tests for basic CLI behavior.
//!
//! Each test points `XDG_CONFIG_HOME` at an empty directory so a user's
//! own config file never leaks in.

#![allow(deprecated)] // cargo_bin deprecation, replacement not yet stable

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: get a Command for the `streamscout` binary.
fn scout() -> Command {
    let mut cmd = Command::cargo_bin("streamscout").expect("binary 'streamscout' should be built");
    cmd.env("XDG_CONFIG_HOME", scratch_dir("config"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("streamscout-cli-{tag}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_page(html: &str) -> PathBuf {
    let path = scratch_dir("page").join("page.html");
    std::fs::write(&path, html).unwrap();
    path
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_lists_subcommands() {
    scout()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: streamscout"))
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("classify"))
        .stdout(predicate::str::contains("deliver"))
        .stdout(predicate::str::contains("health"));
}

#[test]
fn version_flag_shows_semver() {
    scout()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^streamscout \d+\.\d+\.\d+\n$").unwrap());
}

#[test]
fn unknown_subcommand_fails() {
    scout().arg("sniff").assert().failure();
}

// ─── classify ────────────────────────────────────────────────────────────────

#[test]
fn classify_prints_type_per_url() {
    scout()
        .args([
            "classify",
            "https://cdn.example.com/live/index.m3u8",
            "https://cdn.example.com/vod/manifest.mpd",
            "wss://edge.example.com/socket",
            "https://example.com/about",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("HLS       https://cdn.example.com/live/index.m3u8"))
        .stdout(predicate::str::contains("DASH      https://cdn.example.com/vod/manifest.mpd"))
        .stdout(predicate::str::contains("WEBSOCKET wss://edge.example.com/socket"))
        .stdout(predicate::str::contains("-         https://example.com/about"));
}

#[test]
fn classify_applies_youtube_suppression() {
    scout()
        .args([
            "classify",
            "--page-host",
            "www.youtube.com",
            "https://rr3.googlevideo.com/hls/index.m3u8",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("-         https://rr3.googlevideo.com/hls/index.m3u8"))
        .stdout(predicate::str::contains("YOUTUBE   https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
}

#[test]
fn classify_requires_urls() {
    scout().arg("classify").assert().failure();
}

// ─── scan ────────────────────────────────────────────────────────────────────

#[test]
fn scan_local_file_lists_streams() {
    let page = write_page(
        r#"<html><head><title>Live</title></head><body>
           <video src="https://cdn.example.com/live/index.m3u8"></video>
           <script>var cfg = {"dash":"https:\/\/cdn.example.com\/vod\/manifest.mpd"};</script>
           </body></html>"#,
    );

    scout()
        .arg("scan")
        .arg(&page)
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 2 stream(s)"))
        .stdout(predicate::str::contains("video-element"))
        .stdout(predicate::str::contains("https://cdn.example.com/vod/manifest.mpd"));
}

#[test]
fn scan_json_output_resolves_against_page_url() {
    let page = write_page(r#"<video src="/hls/master.m3u8"></video>"#);

    let output = scout()
        .arg("scan")
        .arg(&page)
        .args(["--page-url", "https://example.com/watch/1", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let streams: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(streams[0]["url"], "https://example.com/hls/master.m3u8");
    assert_eq!(streams[0]["type"], "HLS");
    assert_eq!(streams[0]["pageUrl"], "https://example.com/watch/1");
    assert!(streams[0]["id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[test]
fn scan_page_without_streams() {
    let page = write_page("<p>nothing to see</p>");
    scout()
        .arg("scan")
        .arg(&page)
        .assert()
        .success()
        .stdout(predicate::str::contains("No streams found"));
}

#[test]
fn scan_missing_file_fails() {
    scout()
        .args(["scan", "/nonexistent/streamscout/page.html"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

// ─── companion app ───────────────────────────────────────────────────────────

#[test]
fn health_reports_disconnected_app() {
    scout()
        .args(["health", "--app", "127.0.0.1:1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("disconnected"));
}

#[test]
fn deliver_to_unreachable_app_fails() {
    scout()
        .args(["deliver", "https://cdn.example.com/a.m3u8", "--app", "127.0.0.1:1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not deliver"));
}
