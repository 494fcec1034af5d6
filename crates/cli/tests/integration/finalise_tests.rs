use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn finalise_creates_history() {
  let env = TestEnv::new();
  env.write_file("release/app.exe", "bin");

  env
    .ensconce_cmd()
    .args(["finalise", "-t"])
    .arg(env.path("release"))
    .assert()
    .success()
    .stdout(predicate::str::contains("finalise"));

  assert!(env.path("release/.git").is_dir());
}

#[test]
fn finalise_of_missing_directory_fails_without_touching_others() {
  let env = TestEnv::new();
  env.write_file("present/app.exe", "bin");
  let targets = format!(
    "{};{}",
    env.path("present").display(),
    env.path("absent").display()
  );

  env
    .ensconce_cmd()
    .args(["finalise", "-t", &targets])
    .assert()
    .code(3)
    .stderr(predicate::str::contains("absent"));

  assert!(!env.path("present/.git").exists());
}

#[test]
fn finalise_targets_accept_tags() {
  let env = TestEnv::new();
  env.write_file("LIVE/web/index.html", "<html/>");
  let target = format!("{}/{{{{ Environment }}}}/web", env.temp.path().display());

  env
    .ensconce_cmd()
    .env("Environment", "LIVE")
    .args(["finalise", "-t", &target])
    .assert()
    .success();

  assert!(env.path("LIVE/web/.git").is_dir());
}

#[test]
fn json_output_reports_commit() {
  let env = TestEnv::new();
  env.write_file("release/a.txt", "a");

  let output = env
    .ensconce_cmd()
    .args(["finalise", "-o", "json", "-t"])
    .arg(env.path("release"))
    .output()
    .unwrap();

  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let commit = &json["targets"][0]["commit"];
  assert_eq!(commit["file_count"], 1);
  assert_eq!(commit["root"], true);
}
