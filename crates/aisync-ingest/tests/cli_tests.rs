//! End-to-end tests for the aisync-ingest binary

mod common;

use assert_cmd::Command;
use common::*;
use predicates::prelude::*;
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn aisync(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("aisync-ingest").unwrap();
    cmd.current_dir(dir)
        .env("AISYNC_LOG_OUTPUT", "console")
        .env("AISYNC_LOG_LEVEL", "warn")
        .env("AISYNC_SHOW_PROGRESS", "false")
        .env("AISYNC_RETRY_BASE_DELAY_MS", "1")
        .env_remove("AISYNC_LEDGER_PATH")
        .env_remove("S3_BUCKET");
    cmd
}

// ============================================================================
// Status
// ============================================================================

#[test]
fn test_status_with_empty_ledger() {
    let dir = tempfile::tempdir().unwrap();

    aisync(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Recorded archives: 0"));
}

#[test]
fn test_status_for_recorded_id() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.txt");
    std::fs::write(&ledger, "AIS_2020_01_01.zip\nAIS_2020_01_02.zip\n").unwrap();

    aisync(dir.path())
        .args(["--ledger", ledger.to_str().unwrap(), "status", "--id", "AIS_2020_01_02.zip"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Recorded archives: 2"))
        .stdout(predicate::str::contains("AIS_2020_01_02.zip: recorded"));

    aisync(dir.path())
        .args(["--ledger", ledger.to_str().unwrap(), "status", "--id", "AIS_2020_01_03.zip"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("not recorded"));
}

// ============================================================================
// Run
// ============================================================================

#[tokio::test]
async fn test_run_into_local_store() {
    let server = MockServer::start().await;
    mount_listing(&server, 2020, &["AIS_2020_01_01.zip"]).await;
    mount_archive(&server, 2020, "AIS_2020_01_01.zip", 1).await;

    let dir = tempfile::tempdir().unwrap();
    let summary_path = dir.path().join("summary.json");

    aisync(dir.path())
        .env("AISYNC_LISTING_URL", format!("{}/{{year}}/", server.uri()))
        .args([
            "run",
            "--year-start",
            "2020",
            "--year-end",
            "2020",
            "--local-store",
            "mirror",
            "--summary",
            summary_path.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 recorded"));

    assert!(dir.path().join("mirror/raw_data/2020/AIS_2020_01_01.csv").exists());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("processed_files.txt")).unwrap(),
        "AIS_2020_01_01.zip\n"
    );

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(summary["totals"]["recorded"], 1);
    assert_eq!(summary["years"][0]["year"], 2020);
}

#[tokio::test]
async fn test_failures_only_fail_the_exit_code_when_strict() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2020/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let listing_url = format!("{}/{{year}}/", server.uri());
    let args = [
        "run",
        "--year-start",
        "2020",
        "--year-end",
        "2020",
        "--local-store",
        "mirror",
    ];

    aisync(dir.path())
        .env("AISYNC_LISTING_URL", &listing_url)
        .args(args)
        .assert()
        .success();

    aisync(dir.path())
        .env("AISYNC_LISTING_URL", &listing_url)
        .args(args)
        .arg("--strict")
        .assert()
        .code(2);
}

#[test]
fn test_inverted_year_range_is_rejected() {
    let dir = tempfile::tempdir().unwrap();

    aisync(dir.path())
        .args(["run", "--year-start", "2021", "--year-end", "2020", "--local-store", "mirror"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("year_start"));
}

#[test]
fn test_run_without_bucket_or_local_store_fails() {
    let dir = tempfile::tempdir().unwrap();

    aisync(dir.path())
        .args(["run", "--year-start", "2020", "--year-end", "2020"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("S3_BUCKET"));
}
