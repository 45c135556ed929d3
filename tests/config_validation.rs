//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use mapi_protocol::config::{
    ClientConfig, LoggingConfig, MapiConfig, TransportConfig, DEFAULT_PORT, MAX_BLOCK_SIZE,
    MAX_QUERY_CHUNK,
};
use mapi_protocol::error::MapiError;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = MapiConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
    assert_eq!(config.client.port, DEFAULT_PORT);
    assert_eq!(config.transport.query_chunk_size, MAX_QUERY_CHUNK);
}

#[test]
fn test_empty_host() {
    let mut config = MapiConfig::default();
    config.client.host = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("host cannot be empty")));
}

#[test]
fn test_separator_in_database_name() {
    let mut config = MapiConfig::default();
    config.client.database = "demo:prod".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot contain ':'")));
}

#[test]
fn test_unknown_hash_algorithm() {
    let mut config = MapiConfig::default();
    config.client.hash_algorithm = Some("CRC32".to_string());

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Unknown hash algorithm")));

    config.client.hash_algorithm = Some("sha256".to_string());
    assert!(config.validate().is_empty());

    config.client.hash_algorithm = Some("PLAIN".to_string());
    assert!(config.validate().is_empty());
}

#[test]
fn test_timeout_bounds() {
    let mut config = MapiConfig::default();
    config.client.connect_timeout = Duration::from_millis(50);
    config.client.receive_timeout = Duration::from_millis(10);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Connect timeout too short")));
    assert!(errors.iter().any(|e| e.contains("Receive timeout too short")));

    config.client.connect_timeout = Duration::from_secs(600);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Connect timeout too long")));
}

#[test]
fn test_transport_limits() {
    let config = TransportConfig {
        query_chunk_size: MAX_QUERY_CHUNK + 1,
        max_block_size: MAX_BLOCK_SIZE + 1,
    };

    let errors = config.validate();
    assert_eq!(errors.len(), 2, "{errors:?}");

    let zero = TransportConfig {
        query_chunk_size: 0,
        max_block_size: 0,
    };
    assert!(zero.validate().iter().all(|e| e.contains("cannot be 0")));
}

#[test]
fn test_empty_app_name() {
    let config = LoggingConfig {
        app_name: String::new(),
        ..LoggingConfig::default()
    };
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Application name cannot be empty")));
}

#[test]
fn test_validate_strict_collects_all_errors() {
    let config = MapiConfig::default_with_overrides(|c| {
        c.client.host.clear();
        c.client.port = 0;
    });

    match config.validate_strict() {
        Err(MapiError::ConfigError(msg)) => {
            assert!(msg.contains("host cannot be empty"));
            assert!(msg.contains("port must be greater than 0"));
        }
        other => panic!("Expected ConfigError, got {other:?}"),
    }
}

#[test]
fn test_toml_roundtrip_keeps_values() {
    let config = MapiConfig {
        client: ClientConfig {
            host: "db.internal".to_string(),
            port: 50001,
            hash_algorithm: Some("SHA512".to_string()),
            receive_timeout: Duration::from_millis(2500),
            ..ClientConfig::default()
        },
        logging: LoggingConfig {
            log_level: Level::DEBUG,
            json_format: true,
            ..LoggingConfig::default()
        },
        ..MapiConfig::default()
    };

    let text = toml::to_string_pretty(&config).expect("serialize");
    let parsed = MapiConfig::from_toml(&text).expect("parse");

    assert_eq!(parsed.client.host, "db.internal");
    assert_eq!(parsed.client.port, 50001);
    assert_eq!(parsed.client.hash_algorithm.as_deref(), Some("SHA512"));
    assert_eq!(parsed.client.receive_timeout, Duration::from_millis(2500));
    assert_eq!(parsed.logging.log_level, Level::DEBUG);
    assert!(parsed.logging.json_format);
}

#[test]
fn test_partial_toml_uses_defaults() {
    let parsed = MapiConfig::from_toml("").expect("empty document is valid");
    assert_eq!(parsed.client.host, "localhost");
    assert_eq!(parsed.transport.max_block_size, MAX_BLOCK_SIZE);
}

#[test]
fn test_malformed_toml() {
    assert!(matches!(
        MapiConfig::from_toml("client = 3"),
        Err(MapiError::ConfigError(_))
    ));
}

#[test]
fn test_save_and_load_file() {
    let path = std::env::temp_dir().join(format!("mapi-config-{}.toml", std::process::id()));
    let config = MapiConfig::default_with_overrides(|c| c.client.database = "sales".into());

    config.save_to_file(&path).expect("save");
    let loaded = MapiConfig::from_file(&path).expect("load");
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.client.database, "sales");
}

#[test]
fn test_env_overrides() {
    std::env::set_var("MAPI_HOST", "envhost");
    std::env::set_var("MAPI_PORT", "50123");
    std::env::set_var("MAPI_HASH_ALGORITHM", "SHA384");
    let config = MapiConfig::from_env().expect("env config");
    assert_eq!(config.client.host, "envhost");
    assert_eq!(config.client.port, 50123);
    assert_eq!(config.client.hash_algorithm.as_deref(), Some("SHA384"));

    std::env::set_var("MAPI_PORT", "not-a-port");
    assert!(matches!(
        MapiConfig::from_env(),
        Err(MapiError::ConfigError(_))
    ));

    for key in ["MAPI_HOST", "MAPI_PORT", "MAPI_HASH_ALGORITHM"] {
        std::env::remove_var(key);
    }
}
