use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use plurble_cache::InboundMessage;
use predicates::str::contains;
use tempfile::TempDir;

fn write_messages(dir: &Path, messages: &[InboundMessage]) -> String {
    let path = dir.join("messages.json");
    let lines: Vec<String> = messages
        .iter()
        .map(|m| serde_json::to_string(m).expect("unable to encode message"))
        .collect();
    fs::write(&path, lines.join("\n")).expect("unable to write messages");
    path.to_string_lossy().into_owned()
}

fn sample_messages() -> Vec<InboundMessage> {
    vec![
        InboundMessage::group_batch(Some(1), &[("Headspace", 0xFF, 0, &[1, 2][..])]),
        InboundMessage::frontable_batch(
            Some(3),
            &[(1, "Alex", "he/him", false, 0xF0), (2, "Robin", "they/them", false, 0xCC)],
        ),
        InboundMessage::frontable_batch(None, &[(3, "Foggy", "", true, 0xC3)]),
        InboundMessage::fronter_batch(Some(1), &[2]),
    ]
}

fn plurble_cache(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("plurble-cache").unwrap();
    cmd.arg("--data-dir").arg(data_dir);
    cmd
}

// `plurble-cache` with no args should exit with a non-zero code.
#[test]
fn cli_no_args() {
    Command::cargo_bin("plurble-cache").unwrap().assert().failure();
}

// `plurble-cache -V` should print the version
#[test]
fn cli_version() {
    Command::cargo_bin("plurble-cache")
        .unwrap()
        .args(&["-V"])
        .assert()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn cli_show_empty() {
    let temp_dir = TempDir::new().unwrap();
    plurble_cache(temp_dir.path())
        .arg("show")
        .assert()
        .success()
        .stdout(contains("nothing stored"));
}

#[test]
fn cli_replay_then_show() {
    let temp_dir = TempDir::new().unwrap();
    let messages = write_messages(temp_dir.path(), &sample_messages());

    plurble_cache(temp_dir.path())
        .args(&["replay", messages.as_str()])
        .assert()
        .success()
        .stdout(contains("members: 2"))
        .stdout(contains("custom fronts: 1"))
        .stdout(contains("current fronters: 1"))
        .stdout(contains("groups: 1"));

    plurble_cache(temp_dir.path())
        .arg("show")
        .assert()
        .success()
        .stdout(contains("Robin (they/them)"))
        .stdout(contains("Headspace parent=- members=2"));
}

#[test]
fn cli_replay_skips_malformed_fragments() {
    let temp_dir = TempDir::new().unwrap();
    let mut messages = sample_messages();
    let mut bad = InboundMessage::frontable_batch(None, &[(4, "Sky", "", false, 0xF0)]);
    bad.frontable_name = Some("Sky;Extra".to_owned());
    messages.insert(2, bad);
    let messages = write_messages(temp_dir.path(), &messages);

    plurble_cache(temp_dir.path())
        .args(&["replay", messages.as_str()])
        .assert()
        .success()
        .stdout(contains("members: 2"));
}

#[test]
fn cli_delete() {
    let temp_dir = TempDir::new().unwrap();
    let messages = write_messages(temp_dir.path(), &sample_messages());

    plurble_cache(temp_dir.path())
        .args(&["replay", messages.as_str()])
        .assert()
        .success();
    plurble_cache(temp_dir.path())
        .arg("delete")
        .assert()
        .success()
        .stdout(contains("deleted"));
    plurble_cache(temp_dir.path())
        .arg("show")
        .assert()
        .success()
        .stdout(contains("nothing stored"));
}

#[test]
fn cli_sled_engine() {
    let temp_dir = TempDir::new().unwrap();
    let messages = write_messages(temp_dir.path(), &sample_messages());

    plurble_cache(temp_dir.path())
        .args(&["--engine", "sled", "replay", messages.as_str()])
        .assert()
        .success();
    plurble_cache(temp_dir.path())
        .args(&["--engine", "sled", "show"])
        .assert()
        .success()
        .stdout(contains("members: 2"));
}

#[test]
fn cli_wrong_engine() {
    let temp_dir = TempDir::new().unwrap();
    plurble_cache(temp_dir.path())
        .args(&["--engine", "log", "show"])
        .assert()
        .success();
    plurble_cache(temp_dir.path())
        .args(&["--engine", "sled", "show"])
        .assert()
        .failure();
}

#[test]
fn cli_invalid_engine() {
    let temp_dir = TempDir::new().unwrap();
    plurble_cache(temp_dir.path())
        .args(&["--engine", "rocks", "show"])
        .assert()
        .failure();
}
