use predicates::prelude::*;

use super::common::TestEnv;

fn write_package(env: &TestEnv) {
  env.write_file("package/app.exe", "v2");
  env.write_file("package/config/app.json", "{\"version\":2}");
}

#[test]
fn replace_backs_up_and_replaces_contents() {
  let env = TestEnv::new();
  write_package(&env);
  env.write_file("release/app.exe", "v1");
  env.write_file("release/legacy.dll", "old");

  env
    .ensconce_cmd()
    .args(["deploy", "--replace", "-f"])
    .arg(env.path("package"))
    .arg("-t")
    .arg(env.path("release"))
    .assert()
    .success()
    .stdout(predicate::str::contains("Backup"));

  assert_eq!(env.read_file("release/app.exe"), "v2");
  assert_eq!(env.read_file("release/config/app.json"), "{\"version\":2}");
  assert!(!env.path("release/legacy.dll").exists());
  assert!(env.path("release.old.zip").is_file());
}

#[test]
fn no_backup_flag_skips_archive() {
  let env = TestEnv::new();
  write_package(&env);
  env.write_file("release/app.exe", "v1");

  env
    .ensconce_cmd()
    .args(["deploy", "--replace", "--no-backup", "-f"])
    .arg(env.path("package"))
    .arg("-t")
    .arg(env.path("release"))
    .assert()
    .success();

  assert!(!env.path("release.old.zip").exists());
}

#[test]
fn environment_disables_backup() {
  let env = TestEnv::new();
  write_package(&env);
  env.write_file("release/app.exe", "v1");

  env
    .ensconce_cmd()
    .env("ENSCONCE_NO_BACKUP", "true")
    .args(["deploy", "--replace", "-f"])
    .arg(env.path("package"))
    .arg("-t")
    .arg(env.path("release"))
    .assert()
    .success();

  assert!(!env.path("release.old.zip").exists());
}

#[test]
fn copy_keeps_existing_files() {
  let env = TestEnv::new();
  write_package(&env);
  env.write_file("release/keep.txt", "k");

  env
    .ensconce_cmd()
    .args(["deploy", "--copy", "-f"])
    .arg(env.path("package"))
    .arg("-t")
    .arg(env.path("release"))
    .assert()
    .success();

  assert_eq!(env.read_file("release/keep.txt"), "k");
  assert_eq!(env.read_file("release/app.exe"), "v2");
  assert!(!env.path("release.old.zip").exists());
}

#[test]
fn replace_then_finalise_leaves_clean_scan() {
  let env = TestEnv::new();
  write_package(&env);

  env
    .ensconce_cmd()
    .args(["deploy", "--replace", "--finalise", "-f"])
    .arg(env.path("package"))
    .arg("-t")
    .arg(env.path("apps/release"))
    .assert()
    .success();

  env
    .ensconce_cmd()
    .arg("scan")
    .arg(env.path("apps"))
    .assert()
    .success()
    .stdout(predicate::str::contains("No changes detected"));
}

#[test]
fn drift_blocks_replace() {
  let env = TestEnv::new();
  write_package(&env);
  env.write_file("apps/release/app.exe", "v1");
  env.finalise(&env.path("apps/release"));
  env.write_file("apps/release/app.exe", "hotfix");

  env
    .ensconce_cmd()
    .arg("deploy")
    .arg("--scan")
    .arg(env.path("apps"))
    .args(["--replace", "-f"])
    .arg(env.path("package"))
    .arg("-t")
    .arg(env.path("apps/release"))
    .assert()
    .code(2)
    .stdout(predicate::str::contains("Change detected: (modified)"));

  assert_eq!(env.read_file("apps/release/app.exe"), "hotfix");
}

#[test]
fn missing_source_is_a_prerequisite_error() {
  let env = TestEnv::new();
  env.write_file("release/app.exe", "v1");

  env
    .ensconce_cmd()
    .args(["deploy", "--replace", "-f"])
    .arg(env.path("no-package"))
    .arg("-t")
    .arg(env.path("release"))
    .assert()
    .code(3);

  assert_eq!(env.read_file("release/app.exe"), "v1");
}

#[test]
fn json_output_lists_stages() {
  let env = TestEnv::new();
  write_package(&env);

  let output = env
    .ensconce_cmd()
    .args(["deploy", "--copy", "-o", "json", "-f"])
    .arg(env.path("package"))
    .arg("-t")
    .arg(env.path("release"))
    .output()
    .unwrap();

  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let stages = json["targets"][0]["stages"].as_array().unwrap();
  assert_eq!(stages.len(), 1);
  assert_eq!(stages[0]["stage"], "copy");
  assert!(stages[0]["error"].is_null());
}

#[test]
fn replace_refuses_target_that_holds_the_source() {
  let env = TestEnv::new();
  env.write_file("release/app.exe", "v1");
  env.write_file("release/incoming/app.exe", "v2");

  env
    .ensconce_cmd()
    .args(["deploy", "--replace", "--no-backup", "-f"])
    .arg(env.path("release/incoming"))
    .arg("-t")
    .arg(env.path("release"))
    .assert()
    .code(3)
    .stderr(predicate::str::contains("overlaps target"));

  assert_eq!(env.read_file("release/app.exe"), "v1");
  assert_eq!(env.read_file("release/incoming/app.exe"), "v2");
}
