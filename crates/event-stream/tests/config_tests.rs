//! Environment-driven configuration tests.

use event_stream::{StreamConfig, StreamError};
use serial_test::serial;

const VARS: &[&str] = &[
    "OSMO_STREAM_MAX_RETRIES",
    "OSMO_STREAM_INITIAL_BACKOFF_MS",
    "OSMO_STREAM_MAX_BACKOFF_MS",
    "OSMO_STREAM_FLUSH_INTERVAL_MS",
    "OSMO_STREAM_FLUSH_MAX_EVENTS",
    "OSMO_STREAM_CONNECT_TIMEOUT_SECS",
    "OSMO_STREAM_STABLE_SECS",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_without_env() {
    clear_env();
    assert_eq!(StreamConfig::from_env().unwrap(), StreamConfig::default());
}

#[test]
#[serial]
fn test_env_overrides() {
    clear_env();
    std::env::set_var("OSMO_STREAM_MAX_RETRIES", "5");
    std::env::set_var("OSMO_STREAM_FLUSH_MAX_EVENTS", " 50 ");
    std::env::set_var("OSMO_STREAM_STABLE_SECS", "");

    let config = StreamConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.max_retries, 5);
    assert_eq!(config.flush_max_events, 50);
    assert_eq!(config.stable_connection_secs, 30);
}

#[test]
#[serial]
fn test_invalid_env_value() {
    clear_env();
    std::env::set_var("OSMO_STREAM_MAX_BACKOFF_MS", "soon");
    let result = StreamConfig::from_env();
    clear_env();

    let Err(StreamError::Config(message)) = result else {
        panic!("expected config error");
    };
    assert!(message.contains("OSMO_STREAM_MAX_BACKOFF_MS"));
}

#[test]
#[serial]
fn test_inconsistent_env_is_rejected() {
    clear_env();
    std::env::set_var("OSMO_STREAM_INITIAL_BACKOFF_MS", "9000");
    std::env::set_var("OSMO_STREAM_MAX_BACKOFF_MS", "1000");
    let result = StreamConfig::from_env();
    clear_env();

    assert!(matches!(result, Err(StreamError::Config(_))));
}
