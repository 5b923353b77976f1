//! Configuration files on disk

use std::io::Write;

use github_sync::services::{ConfigError, SyncConfig};
use github_sync::types::GITHUB_SERVER_LABEL;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_load_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[settings]
max_concurrent_queries = 4
request_timeout_secs = 10

[[servers]]
label = "Work"
api_base_uri = "https://github.example.com/api"
auth_token_env = "GITHUB_SYNC_TEST_UNSET_VARIABLE"

[[repositories]]
node_id = "R_1"
server = "Work"
"#
    )
    .unwrap();

    let config = SyncConfig::load(file.path()).unwrap();

    assert_eq!(config.settings.max_concurrent_queries, 4);
    assert_eq!(config.settings.request_timeout().as_secs(), 10);
    let servers = config.api_servers(None);
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0].label, "Work");
    assert_eq!(servers[0].auth_token, None);
    assert_eq!(config.repositories[0].server, "Work");
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let config = SyncConfig::load_or_default(&path).unwrap();

    assert_eq!(config, SyncConfig::default());
    let servers = config.api_servers(Some("token"));
    assert_eq!(servers[0].label, GITHUB_SERVER_LABEL);
    assert!(matches!(
        SyncConfig::load(&path),
        Err(ConfigError::IoError(_))
    ));
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[[servers]]\nlabel = 7").unwrap();

    assert!(matches!(
        SyncConfig::load(file.path()),
        Err(ConfigError::ParseError(_))
    ));
}
