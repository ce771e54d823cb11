use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};

use tableside::config::{ConfigError, ConfigLoader};
use tempfile::TempDir;

const VARS: &[&str] = &[
    "TABLESIDE_PROFILE",
    "TABLESIDE_API_BIND_ADDR",
    "TABLESIDE_LOG_LEVEL",
    "TABLESIDE_JWT_SECRET",
    "TABLESIDE_SEQUENCE_RETRY_LIMIT",
    "TABLESIDE_TABLE_BATCH_LIMIT",
    "TABLESIDE_PUBLIC_BASE_URL",
];

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    for var in VARS {
        unsafe {
            env::remove_var(var);
        }
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    fs::write(dir.path().join(name), contents).unwrap();
}

fn empty_dir_loader() -> (TempDir, ConfigLoader) {
    let dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(dir.path()));
    (dir, loader)
}

#[test]
fn loads_defaults_when_no_env_present() {
    let _guard = env_guard();
    clear_env();

    let (_dir, loader) = empty_dir_loader();
    let cfg = loader.load().expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:8080");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.sequence_retry_limit, 5);
    assert_eq!(cfg.table_batch_limit, 100);
    assert_eq!(cfg.feed_recent_completed_limit, 5);
    assert!(cfg.jwt_secret.is_none());
    cfg.bind_addr().expect("default bind addr parses");
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let (dir, loader) = empty_dir_loader();
    write_env_file(&dir, ".env", "TABLESIDE_API_BIND_ADDR=127.0.0.1:3000\n");
    write_env_file(&dir, ".env.test", "TABLESIDE_API_BIND_ADDR=192.168.0.10:5000\n");
    write_env_file(&dir, ".env.test.local", "TABLESIDE_API_BIND_ADDR=10.0.0.5:6000\n");
    // Profile is chosen in .env.local, before the profile files are read.
    write_env_file(
        &dir,
        ".env.local",
        "TABLESIDE_PROFILE=test\nTABLESIDE_API_BIND_ADDR=127.0.0.1:4000\n",
    );

    let cfg = loader.load().expect("config loads with layered env files");

    assert_eq!(cfg.profile, "test");
    assert_eq!(cfg.api_bind_addr, "10.0.0.5:6000");
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let (dir, loader) = empty_dir_loader();
    write_env_file(
        &dir,
        ".env",
        "TABLESIDE_API_BIND_ADDR=127.0.0.1:3000\nTABLESIDE_TABLE_BATCH_LIMIT=20\n",
    );
    unsafe {
        env::set_var("TABLESIDE_API_BIND_ADDR", "0.0.0.0:9090");
    }

    let cfg = loader.load().expect("config loads with env override");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:9090");
    assert_eq!(cfg.table_batch_limit, 20);

    clear_env();
}

#[test]
fn production_profile_requires_jwt_secret() {
    let _guard = env_guard();
    clear_env();

    let (_dir, loader) = empty_dir_loader();
    unsafe {
        env::set_var("TABLESIDE_PROFILE", "prod");
    }
    let err = loader.load().expect_err("missing secret should fail");
    assert!(matches!(err, ConfigError::MissingJwtSecret));

    unsafe {
        env::set_var("TABLESIDE_JWT_SECRET", "s3cret-value");
    }
    let cfg = loader.load().expect("secret provided");
    assert_eq!(cfg.jwt_secret.as_deref(), Some("s3cret-value"));
    assert!(!cfg.redacted_json().unwrap().contains("s3cret-value"));

    clear_env();
}

#[test]
fn non_numeric_limits_are_rejected() {
    let _guard = env_guard();
    clear_env();

    let (_dir, loader) = empty_dir_loader();
    unsafe {
        env::set_var("TABLESIDE_SEQUENCE_RETRY_LIMIT", "lots");
    }
    let err = loader.load().expect_err("bad number should fail");
    assert!(err.to_string().contains("TABLESIDE_SEQUENCE_RETRY_LIMIT"));

    clear_env();
}

#[test]
fn invalid_bind_addr_returns_error() {
    let _guard = env_guard();
    clear_env();

    let (_dir, loader) = empty_dir_loader();
    unsafe {
        env::set_var("TABLESIDE_API_BIND_ADDR", "not-an-addr");
    }
    let err = loader.load().expect_err("invalid bind addr should fail");
    assert!(err.to_string().contains("invalid api bind address"));

    clear_env();
}

#[test]
fn public_base_url_trailing_slash_is_trimmed() {
    let _guard = env_guard();
    clear_env();

    let (_dir, loader) = empty_dir_loader();
    unsafe {
        env::set_var("TABLESIDE_PUBLIC_BASE_URL", "https://order.example.com/");
    }
    let cfg = loader.load().unwrap();
    assert_eq!(cfg.public_base_url, "https://order.example.com");

    clear_env();
}
