// TTD - Time-Travel Debugging identity core
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tracing::info;

fn sample_image() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata").join("image.json")
}

fn ttd() -> Command {
    let mut cmd = Command::cargo_bin("ttd").unwrap();
    // Keep the user's real config out of the tests
    cmd.env("TTD_CONFIG", sample_image().with_file_name("absent.toml"));
    cmd
}

#[test]
fn test_help_command() {
    ttd_common::logging::ensure_test_logging(None);
    info!("Testing CLI help command");

    ttd().arg("--help").assert().success().stdout(predicate::str::contains("Time-Travel Debugging"));
}

#[test]
fn test_version_command() {
    ttd_common::logging::ensure_test_logging(None);
    ttd().arg("--version").assert().success().stdout(predicate::str::contains("ttd"));
}

#[test]
fn test_missing_subcommand() {
    ttd_common::logging::ensure_test_logging(None);
    ttd().assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_paths_lists_sorted_core_paths() {
    ttd_common::logging::ensure_test_logging(None);
    info!("Running paths on the sample image");

    let output = ttd().arg("paths").arg(sample_image()).assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();

    assert_eq!(lines[0], "object\tglobal");
    assert!(lines.contains(&"object\tglobal.Array.prototype.push"));
    assert!(lines.contains(&"object\tglobal.Object.prototype.__proto__!get"));
    assert!(lines.contains(&"object\tglobal.Object.prototype.__proto__!set"));
    assert!(lines.contains(&"body\tglobal.Array.prototype.push!body"));
    assert!(lines.contains(&"scope\tglobal.Array.prototype.push!body!scope[1]"));

    // The cycle through `constructor` adds no path
    assert!(!stdout.contains("constructor"));
    assert_eq!(lines.iter().filter(|l| l.starts_with("object\t")).count(), 12);
}

#[test]
fn test_paths_with_unknown_root_fails() {
    ttd_common::logging::ensure_test_logging(None);
    ttd()
        .arg("paths")
        .arg(sample_image())
        .args(["--root", "window"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no root named `window`"));
}

#[test]
fn test_verify_sample_image() {
    ttd_common::logging::ensure_test_logging(None);
    ttd()
        .arg("verify")
        .arg(sample_image())
        .assert()
        .success()
        .stdout(predicate::str::contains("ok: 12 objects, 8 bodies, 2 scopes"));
}

#[test]
fn test_verify_rejects_broken_image() {
    ttd_common::logging::ensure_test_logging(None);
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("broken.json");
    std::fs::write(&image, r#"{ "roots": [ { "name": "global", "object": 3 } ] }"#).unwrap();

    ttd().arg("verify").arg(&image).assert().failure();
}

#[test]
fn test_config_prints_defaults() {
    ttd_common::logging::ensure_test_logging(None);
    ttd()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max_contexts = 32"))
        .stdout(predicate::str::contains("core_object_capacity = 1028"));
}

#[test]
fn test_config_reads_explicit_file() {
    ttd_common::logging::ensure_test_logging(None);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "max_contexts = 4\nfirst_log_pointer_id = 42\n").unwrap();

    ttd()
        .arg("config")
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("max_contexts = 4"))
        .stdout(predicate::str::contains("first_log_pointer_id = 42"));
}
