//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;

use authwire_domain::AuthWireError;
use authwire_infra::{config, ClientContext};
use tempfile::NamedTempFile;

fn write_config(contents: &str, extension: &str) -> std::path::PathBuf {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(contents.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension(extension);
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");
    path
}

#[test]
fn test_load_config_from_json_file() {
    let json_content = r#"{
        "api_base_url": "https://api.integration.test/",
        "request_timeout_ms": 12000,
        "refresh_timeout_ms": 6000,
        "user_agent": "integration-suite/1.0"
    }"#;
    let path = write_config(json_content, "json");

    let result = config::load_from_file(Some(path.clone()));
    assert!(result.is_ok(), "Failed to load config from JSON file");

    let config = result.unwrap();
    assert_eq!(config.api_base_url, "https://api.integration.test");
    assert_eq!(config.request_timeout_ms, 12000);
    assert_eq!(config.refresh_timeout_ms, 6000);
    assert_eq!(config.user_agent, "integration-suite/1.0");

    // Cleanup
    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_toml_file() {
    let toml_content = r#"
api_base_url = "http://localhost:8080"
request_timeout_ms = 2500
"#;
    let path = write_config(toml_content, "toml");

    let config = config::load_from_file(Some(path.clone())).expect("valid TOML config");
    assert_eq!(config.api_base_url, "http://localhost:8080");
    assert_eq!(config.request_timeout_ms, 2500);

    // Missing keys keep their defaults
    assert_eq!(config.refresh_timeout_ms, 8000);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_nonexistent_file() {
    let result = config::load_from_file(Some("/nonexistent/path/authwire.json".into()));
    assert!(result.is_err(), "Should fail when file doesn't exist");

    match result {
        Err(AuthWireError::Config(msg)) => {
            assert!(msg.contains("not found"), "Error message should mention 'not found'");
        }
        _ => panic!("Expected Config error"),
    }
}

#[test]
fn test_load_config_with_invalid_format() {
    let path = write_config(r#"{ "this is": "not valid" "#, "json");

    let result = config::load_from_file(Some(path.clone()));
    match result {
        Err(AuthWireError::Config(msg)) => {
            assert!(msg.contains("Invalid JSON"), "Error message should mention invalid JSON");
        }
        _ => panic!("Expected Config error"),
    }

    std::fs::remove_file(path).ok();
}

#[test]
fn test_non_http_base_url_is_rejected() {
    let path = write_config("api_base_url = \"ftp://files.test\"\n", "toml");

    let result = config::load_from_file(Some(path.clone()));
    assert!(matches!(result, Err(AuthWireError::Config(_))));

    std::fs::remove_file(path).ok();
}

#[test]
fn test_loaded_config_builds_a_context() {
    let path = write_config(r#"{ "api_base_url": "https://ctx.test///" }"#, "json");

    let config = config::load_from_file(Some(path.clone())).expect("valid config");
    let context = ClientContext::new(config).expect("context from loaded config");

    assert_eq!(context.config().api_base_url, "https://ctx.test");
    assert_eq!(context.transport().config().resolve_url("/a"), "https://ctx.test/a");

    std::fs::remove_file(path).ok();
}
