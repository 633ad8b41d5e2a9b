// Config loading, validation and environment override tests

use hostwatch::config::{AppConfig, Role};
use std::collections::HashMap;

const VALID_CONFIG: &str = r#"
role = "hub"

[server]
port = 8081
host = "0.0.0.0"

[auth]
api_key = "master-key"

[database]
path = "data/hostwatch.db"

[monitoring]
sample_interval_ms = 2000
stats_log_interval_secs = 60
"#;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |k| map.get(k).cloned()
}

#[test]
fn test_config_loads_from_str_with_defaults() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.role, Role::Hub);
    assert_eq!(config.server.port, 8081);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.auth.api_key, "master-key");
    assert_eq!(config.database.path, "data/hostwatch.db");
    assert_eq!(config.monitoring.sample_interval_ms, 2000);
    assert_eq!(config.monitoring.broadcast_capacity, 16);
    assert_eq!(config.disk_usage.path, "/");
    assert_eq!(config.disk_usage.refresh_interval_secs, 900);
    assert_eq!(config.disk_usage.top_n, 10);
    assert_eq!(config.disk_usage.snapshot_interval_secs, 86_400);
    assert!(config.disk_usage.snapshot_schedule.is_none());
    assert_eq!(config.pull.timeout_ms, 5_000);
    assert_eq!(config.store.max_entry_age_secs, 0);
    assert!(config.push.is_none());
}

#[test]
fn test_config_role_defaults_to_agent() {
    let cfg = VALID_CONFIG.replace("role = \"hub\"", "");
    let config = AppConfig::load_from_str(&cfg).unwrap();
    assert_eq!(config.role, Role::Agent);
}

#[test]
fn test_config_rejects_unknown_role() {
    let bad = VALID_CONFIG.replace("role = \"hub\"", "role = \"relay\"");
    assert!(AppConfig::load_from_str(&bad).is_err());
}

#[test]
fn test_config_validation_rejects_invalid_port() {
    let bad = VALID_CONFIG.replace("port = 8081", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn test_config_validation_rejects_empty_api_key() {
    let bad = VALID_CONFIG.replace("api_key = \"master-key\"", "api_key = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("auth.api_key"));
}

#[test]
fn test_config_validation_rejects_empty_db_path() {
    let bad = VALID_CONFIG.replace("path = \"data/hostwatch.db\"", "path = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("database.path"));
}

#[test]
fn test_config_validation_rejects_sample_interval_zero() {
    let bad = VALID_CONFIG.replace("sample_interval_ms = 2000", "sample_interval_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("sample_interval_ms"));
}

#[test]
fn test_config_validation_rejects_stats_log_interval_zero() {
    let bad = VALID_CONFIG.replace(
        "stats_log_interval_secs = 60",
        "stats_log_interval_secs = 0",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("stats_log_interval_secs"));
}

#[test]
fn test_config_validation_rejects_top_n_zero() {
    let cfg = format!("{VALID_CONFIG}\n[disk_usage]\ntop_n = 0\n");
    let err = AppConfig::load_from_str(&cfg).unwrap_err();
    assert!(err.to_string().contains("disk_usage.top_n"));
}

#[test]
fn test_config_accepts_valid_cron_schedule() {
    let cfg = format!("{VALID_CONFIG}\n[disk_usage]\nsnapshot_schedule = \"0 0 3 * * *\"\n");
    let config = AppConfig::load_from_str(&cfg).unwrap();
    assert_eq!(
        config.disk_usage.snapshot_schedule.as_deref(),
        Some("0 0 3 * * *")
    );
}

#[test]
fn test_config_validation_rejects_invalid_cron_schedule() {
    let cfg = format!("{VALID_CONFIG}\n[disk_usage]\nsnapshot_schedule = \"every day\"\n");
    let err = AppConfig::load_from_str(&cfg).unwrap_err();
    assert!(err.to_string().contains("snapshot_schedule"));
}

#[test]
fn test_config_validation_rejects_pull_timeout_zero() {
    let cfg = format!("{VALID_CONFIG}\n[pull]\ntimeout_ms = 0\n");
    let err = AppConfig::load_from_str(&cfg).unwrap_err();
    assert!(err.to_string().contains("pull.timeout_ms"));
}

#[test]
fn test_config_validation_rejects_long_pull_timeout() {
    let cfg = format!("{VALID_CONFIG}\n[pull]\ntimeout_ms = 30000\n");
    let err = AppConfig::load_from_str(&cfg).unwrap_err();
    assert!(err.to_string().contains("pull.timeout_ms"));

    let cfg = format!("{VALID_CONFIG}\n[pull]\ntimeout_ms = 10000\n");
    assert!(AppConfig::load_from_str(&cfg).is_err());

    let cfg = format!("{VALID_CONFIG}\n[pull]\ntimeout_ms = 9999\n");
    let config = AppConfig::load_from_str(&cfg).unwrap();
    assert_eq!(config.pull.timeout_ms, 9_999);
}

#[test]
fn test_config_push_section_parses() {
    let cfg = format!(
        "{VALID_CONFIG}\n[push]\nserver_url = \"https://hub.example\"\napi_key = \"agent-key\"\n"
    );
    let config = AppConfig::load_from_str(&cfg).unwrap();
    let push = config.push.unwrap();
    assert_eq!(push.server_url, "https://hub.example");
    assert_eq!(push.api_key, "agent-key");
    assert_eq!(push.interval_ms, 2_000);
}

#[test]
fn test_config_validation_rejects_non_http_push_url() {
    let cfg = format!(
        "{VALID_CONFIG}\n[push]\nserver_url = \"ftp://hub.example\"\napi_key = \"k\"\n"
    );
    let err = AppConfig::load_from_str(&cfg).unwrap_err();
    assert!(err.to_string().contains("push.server_url"));
}

#[test]
fn test_env_overrides_port_and_disk_path() {
    let env = env_from(&[("API_PORT", "9100"), ("DISK_USAGE_PATH", "/hostfs")]);
    let config = AppConfig::load_from_str_with_env(VALID_CONFIG, env).unwrap();
    assert_eq!(config.server.port, 9100);
    assert_eq!(config.disk_usage.path, "/hostfs");
}

#[test]
fn test_env_rejects_bad_port() {
    let env = env_from(&[("API_PORT", "eighty")]);
    let err = AppConfig::load_from_str_with_env(VALID_CONFIG, env).unwrap_err();
    assert!(err.to_string().contains("API_PORT"));
}

#[test]
fn test_env_server_url_and_api_key_enable_push() {
    let env = env_from(&[("SERVER_URL", "http://hub:8080"), ("API_KEY", "from-env")]);
    let config = AppConfig::load_from_str_with_env(VALID_CONFIG, env).unwrap();
    assert_eq!(config.auth.api_key, "from-env");
    let push = config.push.expect("push enabled by env");
    assert_eq!(push.server_url, "http://hub:8080");
    assert_eq!(push.api_key, "from-env");
}

#[test]
fn test_env_api_key_overrides_push_section_key() {
    let cfg = format!(
        "{VALID_CONFIG}\n[push]\nserver_url = \"https://hub.example\"\napi_key = \"file-key\"\n"
    );
    let env = env_from(&[("API_KEY", "env-key")]);
    let config = AppConfig::load_from_str_with_env(&cfg, env).unwrap();
    assert_eq!(config.push.unwrap().api_key, "env-key");
}

#[test]
fn test_env_blank_values_are_ignored() {
    let env = env_from(&[("API_PORT", "  "), ("SERVER_URL", "")]);
    let config = AppConfig::load_from_str_with_env(VALID_CONFIG, env).unwrap();
    assert_eq!(config.server.port, 8081);
    assert!(config.push.is_none());
}
