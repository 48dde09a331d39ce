use super::*;

use std::sync::Mutex;

// Config::load() reads several process-global env vars; serialize access so
// parallel test threads don't trample each other's fixtures.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in ["DB_PATH", "ENCRYPTION_KEY", "PORT", "TZ", "XDG_STATE_HOME", "HOME"] {
        std::env::remove_var(key);
    }
}

#[test]
fn load_fails_without_encryption_key() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::set_var("HOME", "/tmp");

    let err = Config::load().unwrap_err();
    assert!(matches!(err, DaemonError::MissingEnv("ENCRYPTION_KEY")));
    clear_env();
}

#[test]
fn load_derives_paths_from_db_path() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::set_var("DB_PATH", "/var/lib/strmsync");
    std::env::set_var("ENCRYPTION_KEY", "test-key");

    let config = Config::load().unwrap();
    assert_eq!(config.data_dir, std::path::PathBuf::from("/var/lib/strmsync"));
    assert_eq!(
        config.wal_path,
        std::path::PathBuf::from("/var/lib/strmsync/wal.jsonl")
    );
    assert_eq!(
        config.snapshot_path,
        std::path::PathBuf::from("/var/lib/strmsync/snapshot.bin")
    );
    assert_eq!(
        config.socket_path,
        std::path::PathBuf::from("/var/lib/strmsync/daemon.sock")
    );
    assert_eq!(config.encryption_key, "test-key");
    clear_env();
}

#[test]
fn load_falls_back_to_xdg_state_home_then_home() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::set_var("ENCRYPTION_KEY", "k");
    std::env::set_var("XDG_STATE_HOME", "/xdg/state");

    let config = Config::load().unwrap();
    assert_eq!(config.data_dir, std::path::PathBuf::from("/xdg/state/strmsync"));

    std::env::remove_var("XDG_STATE_HOME");
    std::env::set_var("HOME", "/home/operator");
    let config = Config::load().unwrap();
    assert_eq!(
        config.data_dir,
        std::path::PathBuf::from("/home/operator/.local/state/strmsync")
    );
    clear_env();
}

#[test]
fn load_parses_optional_port_and_tz() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::set_var("HOME", "/tmp");
    std::env::set_var("ENCRYPTION_KEY", "k");
    std::env::set_var("PORT", "8080");
    std::env::set_var("TZ", "UTC");

    let config = Config::load().unwrap();
    assert_eq!(config.port, Some(8080));
    assert_eq!(config.tz, Some("UTC".to_string()));
    clear_env();
}

#[test]
fn load_ignores_an_unparsable_port() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::set_var("HOME", "/tmp");
    std::env::set_var("ENCRYPTION_KEY", "k");
    std::env::set_var("PORT", "not-a-port");

    let config = Config::load().unwrap();
    assert_eq!(config.port, None);
    clear_env();
}
