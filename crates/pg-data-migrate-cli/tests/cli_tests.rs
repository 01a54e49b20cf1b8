//! CLI integration tests for pg-data-migrate.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for error conditions that never reach a database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the pg-data-migrate binary.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("pg-data-migrate").unwrap();
    cmd.env_remove("PG_MIGRATE_SOURCE_URL")
        .env_remove("PG_MIGRATE_TARGET_URL");
    cmd
}

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--schema"))
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--skip-sequences"))
        .stdout(predicate::str::contains("--keep-constraints"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pg-data-migrate"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_url_flags_exist() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--source-url"))
        .stdout(predicate::str::contains("--target-url"))
        .stdout(predicate::str::contains("PG_MIGRATE_SOURCE_URL"));
}

#[test]
fn test_output_json_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_log_format_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"));
}

#[test]
fn test_verbosity_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_unknown_log_format_rejected() {
    cmd()
        .args(["--log-format", "xml", "health-check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 2)
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_2() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let file = config_file("invalid: yaml: content: [\n");

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2);
}

#[test]
fn test_empty_config_exits_with_code_2() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_required_fields_exits_with_code_2() {
    let file = config_file("source:\n  host: localhost\n");

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2);
}

#[test]
fn test_same_database_exits_with_code_2() {
    let url = "postgres://app@localhost/shop";
    cmd()
        .args(["--source-url", url, "--target-url", url, "health-check"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be the same database"));
}

#[test]
fn test_zero_batch_size_exits_with_code_2() {
    cmd()
        .args([
            "--source-url",
            "postgres://app@localhost/source",
            "--target-url",
            "postgres://app@localhost/target",
            "run",
            "--batch-size",
            "0",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("batch_size"));
}

#[test]
fn test_invalid_ssl_mode_exits_with_code_2() {
    let file = config_file(
        "source:\n  url: postgres://app@localhost/source\n\
         target:\n  url: postgres://app@localhost/target\n  ssl_mode: sometimes\n",
    );

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ssl_mode"));
}

#[test]
fn test_urls_from_environment() {
    let url = "postgres://app@localhost/shop";
    cmd()
        .env("PG_MIGRATE_SOURCE_URL", url)
        .env("PG_MIGRATE_TARGET_URL", url)
        .arg("health-check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be the same database"));
}

// =============================================================================
// Exit Code Tests - Connection Errors (Exit Code 3)
// =============================================================================

#[test]
fn test_unreachable_database_exits_with_code_3() {
    let file = config_file(
        "source:\n  url: postgres://app@127.0.0.1:1/source\n  ssl_mode: disable\n\
         target:\n  url: postgres://app@127.0.0.1:1/target\n  ssl_mode: disable\n\
         migration:\n  connect_timeout_secs: 2\n",
    );

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("UNHEALTHY"));
}

// =============================================================================
// Subcommand Existence Tests
// =============================================================================

#[test]
fn test_health_check_command_exists() {
    cmd()
        .args(["health-check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Test database connections"));
}

#[test]
fn test_validate_command_exists() {
    cmd()
        .args(["validate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Validate row counts"));
}

#[test]
fn test_plan_command_exists() {
    cmd()
        .args(["plan", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("copy order"));
}

// =============================================================================
// Config Path Tests
// =============================================================================

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

// =============================================================================
// No Subcommand Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
