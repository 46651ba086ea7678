//! End-to-end tests of the `tessel` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn tessel(cwd: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tessel").unwrap();
    cmd.current_dir(cwd.path()).env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    tessel(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("resolve"));
}

#[test]
fn test_resolve_prints_every_module() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(
        src.join("main.ts"),
        "import { greet } from './greet.ts';\nconst name: string = 'tessel';\nconsole.log(greet(name));\n",
    )
    .unwrap();
    fs::write(
        src.join("greet.ts"),
        "export function greet(name: string): string { return `hi ${name}`; }\n",
    )
    .unwrap();

    tessel(&temp)
        .args(["resolve", "src", "main.ts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/__tessel/modules/").count(2))
        .stdout(predicate::str::contains("main.ts"))
        .stdout(predicate::str::contains("greet.ts"));
}

#[test]
fn test_resolve_missing_module_fails() {
    let temp = TempDir::new().unwrap();
    tessel(&temp)
        .args(["resolve", ".", "missing.js"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.js"));
}

#[test]
fn test_build_rejects_missing_root() {
    let temp = TempDir::new().unwrap();
    tessel(&temp)
        .args(["build", "no-such-site"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("root"));
}

#[test]
fn test_serve_rejects_port_zero() {
    let temp = TempDir::new().unwrap();
    tessel(&temp)
        .args(["serve", ".", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("port"));
}

#[test]
fn test_environment_is_validated() {
    let temp = TempDir::new().unwrap();
    tessel(&temp)
        .args(["build", "."])
        .env("TESSEL_DEFAULT_BROWSER", "Chrome")
        .assert()
        .failure()
        .stderr(predicate::str::contains("default_browser"));
}

#[test]
fn test_config_file_is_read_from_working_directory() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("tessel.config.json"), r#"{ "port": 0 }"#).unwrap();
    tessel(&temp)
        .args(["serve", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("port"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let temp = TempDir::new().unwrap();
    tessel(&temp)
        .args(["build", ".", "--config", "absent.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}
