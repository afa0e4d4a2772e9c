use std::io::Write;

use assert_cmd::Command;
use predicates::str::contains;

const MINIMAL: &str = r#"
environment: dev
backend:
  providerID: generic
  config:
    image: backend:dev
frontend:
  providerID: generic
  config:
    image: frontend:dev
dev:
  domains:
    frontend: app.localdev.test
    backend: api.localdev.test
"#;

fn project_with(contents: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let mut f = std::fs::File::create(dir.path().join("stagecraft.yml")).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    dir
}

#[test]
fn config_validate_accepts_a_minimal_project() {
    let dir = project_with(MINIMAL);
    Command::cargo_bin("stagecraft")
        .unwrap()
        .arg("--repo-root")
        .arg(dir.path())
        .arg("config")
        .arg("validate")
        .assert()
        .success()
        .stdout(contains("is valid"));
}

#[test]
fn config_validate_rejects_an_unknown_provider() {
    let dir = project_with(&MINIMAL.replace("generic", "nope"));
    Command::cargo_bin("stagecraft")
        .unwrap()
        .arg("--repo-root")
        .arg(dir.path())
        .arg("config")
        .arg("validate")
        .assert()
        .failure()
        .stderr(contains("nope"));
}

#[test]
fn plan_dev_renders_a_deterministic_plan() {
    let dir = project_with(MINIMAL);
    let run = || {
        Command::cargo_bin("stagecraft")
            .unwrap()
            .arg("--repo-root")
            .arg(dir.path())
            .arg("plan")
            .arg("dev")
            .output()
            .unwrap()
    };
    let first = run();
    let second = run();
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
    assert!(String::from_utf8(first.stdout).unwrap().contains("services:"));
}
