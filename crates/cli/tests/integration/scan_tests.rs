use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn clean_tree_reports_no_changes() {
  let env = TestEnv::new();
  env.write_file("apps/web/index.html", "<html/>");
  env.finalise(&env.path("apps/web"));

  env
    .ensconce_cmd()
    .arg("scan")
    .arg(env.path("apps"))
    .assert()
    .success()
    .stdout(predicate::str::contains("No changes detected"));
}

#[test]
fn edited_file_is_reported_with_kind_and_exit_code() {
  let env = TestEnv::new();
  env.write_file("apps/web/app.config", "v1");
  env.write_file("apps/web/app.exe", "bin");
  env.finalise(&env.path("apps/web"));
  env.write_file("apps/web/app.config", "v2");

  let expected = format!(
    "Change detected: (modified) {}",
    env.path("apps/web").join("app.config").display()
  );
  env
    .ensconce_cmd()
    .arg("scan")
    .arg(env.path("apps"))
    .assert()
    .code(2)
    .stdout(predicate::str::contains(expected));
}

#[test]
fn untracked_and_missing_files_are_reported() {
  let env = TestEnv::new();
  env.write_file("apps/api/keep.txt", "k");
  env.write_file("apps/api/gone.txt", "g");
  env.finalise(&env.path("apps/api"));
  std::fs::remove_file(env.path("apps/api/gone.txt")).unwrap();
  env.write_file("apps/api/extra.txt", "e");

  env
    .ensconce_cmd()
    .arg("scan")
    .arg(env.path("apps"))
    .assert()
    .code(2)
    .stdout(predicate::str::contains("(missing)").and(predicate::str::contains("(untracked)")));
}

#[test]
fn json_output_lists_records() {
  let env = TestEnv::new();
  env.write_file("apps/web/a.txt", "a");
  env.finalise(&env.path("apps/web"));
  env.write_file("apps/web/a.txt", "b");

  let output = env
    .ensconce_cmd()
    .args(["scan", "-o", "json"])
    .arg(env.path("apps"))
    .output()
    .unwrap();

  assert_eq!(output.status.code(), Some(2));
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let records = json["report"]["records"].as_array().unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0]["kind"], "modified");
  assert_eq!(records[0]["file"], "a.txt");
}
