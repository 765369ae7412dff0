use assert_cmd::Command;
use chrono::{Duration, Utc};
use cliauth::{CredentialStore, TokenInfo};
use predicates::prelude::*;

fn cliauth_cmd() -> Command {
    Command::cargo_bin("cliauth").unwrap()
}

fn saved_token(dir: &tempfile::TempDir, token: &TokenInfo) -> std::path::PathBuf {
    let path = dir.path().join("polarsignals/default_cred");
    CredentialStore::new(&path).save(token).unwrap();
    path
}

#[test]
fn status_without_credentials_reports_not_logged_in() {
    let dir = tempfile::tempdir().unwrap();
    cliauth_cmd()
        .args(["auth", "status"])
        .env("CLIAUTH_CREDENTIALS", dir.path().join("missing"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Not logged in."))
        .stdout(predicate::str::contains("cliauth auth login"));
}

#[test]
fn status_reports_token_details() {
    let dir = tempfile::tempdir().unwrap();
    let path = saved_token(
        &dir,
        &TokenInfo {
            access_token: "access".into(),
            refresh_token: Some("refresh".into()),
            token_type: "Bearer".into(),
            expiry: Some(Utc::now() + Duration::hours(1)),
        },
    );

    cliauth_cmd()
        .args(["auth", "status"])
        .env("CLIAUTH_CREDENTIALS", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged in."))
        .stdout(predicate::str::contains("Token type: Bearer"))
        .stdout(predicate::str::contains("Token expires:"))
        .stdout(predicate::str::contains("Refresh token: Present"));
}

#[test]
fn status_flags_expired_token() {
    let dir = tempfile::tempdir().unwrap();
    let path = saved_token(
        &dir,
        &TokenInfo {
            access_token: "access".into(),
            refresh_token: None,
            token_type: "Bearer".into(),
            expiry: Some(Utc::now() - Duration::hours(1)),
        },
    );

    cliauth_cmd()
        .args(["auth", "status", "--credentials"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Token status: Expired"))
        .stdout(predicate::str::contains("Refresh token").not());
}

#[test]
fn login_fails_when_discovery_is_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    cliauth_cmd()
        .args(["auth", "login", "--no-open", "--api-url", "http://127.0.0.1:1"])
        .env("CLIAUTH_CREDENTIALS", dir.path().join("cred"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("discover oauth metadata"));
}
