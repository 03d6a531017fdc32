//! Unit tests for configuration parsing
//!
//! Tests environment variable parsing and default values.
//!
//! Note: These tests modify global environment variables and must run serially.

use rstest::rstest;
use serial_test::serial;
use std::time::Duration;

use treso_alerts::config::{Config, ScannerConfig, WorkerConfig, MAX_DEADLINE_HORIZON_DAYS};

const WORKER_VARS: [&str; 7] = [
    "WORKER_CONCURRENCY",
    "WORKER_POLL_INTERVAL_MS",
    "JOB_RETRY_ATTEMPTS",
    "JOB_BACKOFF_BASE_MS",
    "JOB_LEASE_SECS",
    "SEND_TIMEOUT_SECS",
    "ENQUEUE_TIMEOUT_MS",
];

const SCANNER_VARS: [&str; 4] = [
    "SCANNERS_ENABLED",
    "SCANNER_INTERVAL_SECS",
    "TREASURY_THRESHOLD",
    "DEADLINE_HORIZON_DAYS",
];

fn clear(vars: &[&str]) {
    for var in vars {
        std::env::remove_var(var);
    }
}

// =============================================================================
// Worker Config Tests
// =============================================================================

#[test]
#[serial]
fn test_worker_config_defaults() {
    clear(&WORKER_VARS);

    let config = WorkerConfig::from_env();

    assert_eq!(config.concurrency, 5);
    assert_eq!(config.poll_interval, Duration::from_secs(1));
    assert_eq!(config.retry_attempts, 2);
    assert_eq!(config.backoff_base, Duration::from_secs(1));
    assert_eq!(config.lease, Duration::from_secs(300));
    assert_eq!(config.send_timeout, Duration::from_secs(30));
    assert_eq!(config.enqueue_timeout, Duration::from_secs(2));
}

#[test]
#[serial]
fn test_worker_config_custom_values() {
    std::env::set_var("WORKER_CONCURRENCY", "8");
    std::env::set_var("JOB_RETRY_ATTEMPTS", "4");
    std::env::set_var("JOB_BACKOFF_BASE_MS", "250");
    std::env::set_var("SEND_TIMEOUT_SECS", "10");

    let config = WorkerConfig::from_env();

    assert_eq!(config.concurrency, 8);
    assert_eq!(config.retry_attempts, 4);
    assert_eq!(config.backoff_base, Duration::from_millis(250));
    assert_eq!(config.send_timeout, Duration::from_secs(10));

    clear(&WORKER_VARS);
}

#[test]
#[serial]
fn test_worker_config_invalid_values_use_defaults() {
    std::env::set_var("WORKER_CONCURRENCY", "many");
    std::env::set_var("JOB_RETRY_ATTEMPTS", "-1");
    std::env::set_var("ENQUEUE_TIMEOUT_MS", "soon");

    let config = WorkerConfig::from_env();

    assert_eq!(config.concurrency, 5);
    assert_eq!(config.retry_attempts, 2);
    assert_eq!(config.enqueue_timeout, Duration::from_secs(2));

    clear(&WORKER_VARS);
}

#[test]
#[serial]
fn test_worker_concurrency_is_at_least_one() {
    std::env::set_var("WORKER_CONCURRENCY", "0");

    assert_eq!(WorkerConfig::from_env().concurrency, 1);

    clear(&WORKER_VARS);
}

// =============================================================================
// Scanner Config Tests
// =============================================================================

#[test]
#[serial]
fn test_scanner_config_defaults() {
    clear(&SCANNER_VARS);

    let config = ScannerConfig::from_env();

    assert!(config.enabled);
    assert_eq!(config.interval, Duration::from_secs(3600));
    assert_eq!(config.treasury_threshold, 10_000.0);
    assert_eq!(config.deadline_horizon_days, 30);
}

#[test]
#[serial]
fn test_scanner_config_custom_values() {
    std::env::set_var("SCANNERS_ENABLED", "false");
    std::env::set_var("SCANNER_INTERVAL_SECS", "60");
    std::env::set_var("TREASURY_THRESHOLD", "2500.5");
    std::env::set_var("DEADLINE_HORIZON_DAYS", "15");

    let config = ScannerConfig::from_env();

    assert!(!config.enabled);
    assert_eq!(config.interval, Duration::from_secs(60));
    assert_eq!(config.treasury_threshold, 2500.5);
    assert_eq!(config.deadline_horizon_days, 15);

    clear(&SCANNER_VARS);
}

#[rstest]
#[case("9223372036854775807", MAX_DEADLINE_HORIZON_DAYS)]
#[case("-5", 0)]
#[case("45", 45)]
#[serial]
fn test_deadline_horizon_is_clamped(#[case] raw: &str, #[case] expected: i64) {
    clear(&SCANNER_VARS);
    std::env::set_var("DEADLINE_HORIZON_DAYS", raw);

    let config = ScannerConfig::from_env();

    assert_eq!(config.deadline_horizon_days, expected);

    clear(&SCANNER_VARS);
}

// =============================================================================
// Top-Level Config Tests
// =============================================================================

#[test]
#[serial]
fn test_missing_database_url_is_an_error() {
    let saved = std::env::var("DATABASE_URL").ok();
    std::env::remove_var("DATABASE_URL");

    assert!(Config::from_env().is_err());

    if let Some(url) = saved {
        std::env::set_var("DATABASE_URL", url);
    }
}

#[test]
#[serial]
fn test_invalid_port_is_an_error() {
    std::env::set_var("DATABASE_URL", "postgres://localhost/treso");
    std::env::set_var("PORT", "http");

    assert!(Config::from_env().is_err());

    std::env::remove_var("PORT");
    std::env::remove_var("DATABASE_URL");
}
