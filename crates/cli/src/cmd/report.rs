//! Text rendering of run summaries.

use ensconce_lib::deploy::RunSummary;
use ensconce_lib::replace::TargetOutcome;
use ensconce_lib::snapshot::ScanReport;

use crate::output::{
  format_bytes, print_change, print_error, print_info, print_stat, print_success, print_warning, symbols, truncate_hash,
};

pub fn print_summary(summary: &RunSummary) {
  if let Some(scan) = &summary.scan {
    print_scan(scan);
  }
  for outcome in &summary.targets {
    print_outcome(outcome);
  }
}

fn print_scan(scan: &ScanReport) {
  for repo in &scan.skipped {
    print_warning(&format!("Skipped unreadable repository: {}", repo.display()));
  }

  if scan.has_drift() {
    for record in scan.report.records() {
      print_change(&format!(
        "Change detected: ({}) {}",
        record.kind,
        record.full_path().display()
      ));
    }
    print_error(&format!("{} change(s) detected", scan.report.count()));
  } else {
    print_success("No changes detected");
  }
  print_stat("Repositories scanned", &scan.repositories.len().to_string());
}

fn print_outcome(outcome: &TargetOutcome) {
  let path = outcome.path.display();
  match outcome.error() {
    None => {
      let stages: Vec<&str> = outcome.attempted().map(|s| s.as_str()).collect();
      print_success(&format!("{} ({})", path, stages.join(&format!(" {} ", symbols::ARROW))));
    }
    Some((stage, message)) => print_error(&format!("{}: {} failed: {}", path, stage, message)),
  }

  for record in outcome.stages.iter().filter(|r| !r.succeeded()).skip(1) {
    if let Some(message) = &record.error {
      print_error(&format!("{}: {} failed: {}", path, record.stage, message));
    }
  }

  if let Some(backup) = &outcome.backup {
    print_stat(
      "Backup",
      &format!(
        "{} ({} files, {})",
        backup.archive.display(),
        backup.file_count,
        format_bytes(backup.total_bytes)
      ),
    );
  }
  if let Some(commit) = &outcome.commit {
    if commit.root {
      print_info(&format!("Started history for {}", path));
    }
    print_stat("Commit", truncate_hash(&commit.id));
  }
}
