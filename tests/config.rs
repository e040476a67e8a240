use std::fs;

use assert_matches::assert_matches;

use proteomics_pipeline::config::{ClientConfig, ConfigLoader, DEFAULT_BASE_URL};
use proteomics_pipeline::error::PipelineError;
use proteomics_pipeline::pride::PrideClient;

#[test]
fn resolve_reads_explicit_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("pipeline.json");
    fs::write(
        &path,
        r#"{
            "base_url": "http://localhost:9000/pride/ws/archive/v2",
            "timeout_secs": 5,
            "cache_dir": "/tmp/pride-cache",
            "output_dir": "downloads"
        }"#,
    )
    .unwrap();

    let config = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(config.base_url, "http://localhost:9000/pride/ws/archive/v2");
    assert_eq!(config.timeout_secs, 5);
    assert_eq!(config.cache_dir.as_str(), "/tmp/pride-cache");
    assert_eq!(config.output_dir.as_str(), "downloads");
    assert_eq!(config.max_retries, 3);
    assert!(config.cache_enabled);
}

#[test]
fn defaults_match_public_archive() {
    let config = ClientConfig::default();
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.timeout_secs, 30);
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.backoff_factor, 2.0);
    assert_eq!(config.cache_max_age().as_secs(), 86_400);
    assert_eq!(config.chunk_size, 8192);
}

#[test]
fn malformed_file_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();

    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, PipelineError::ConfigParse(_));
}

#[test]
fn negative_backoff_rejected() {
    let err = ConfigLoader::parse(r#"{"backoff_factor": -1.0}"#).unwrap_err();
    assert_matches!(err, PipelineError::ConfigParse(_));
}

#[test]
fn client_built_from_config() {
    let temp = tempfile::tempdir().unwrap();
    let config = ClientConfig {
        base_url: "http://localhost:9000/archive/v2/".to_string(),
        max_retries: 4,
        cache_dir: temp.path().join("cache").to_str().unwrap().into(),
        ..ClientConfig::default()
    };

    let client = PrideClient::from_config(&config).unwrap();
    assert_eq!(client.base_url(), "http://localhost:9000/archive/v2");
    assert_eq!(client.retry_policy().max_attempts, 4);
    assert!(client.cache().is_enabled());
}

#[test]
fn disabled_cache_from_config() {
    let config = ClientConfig {
        cache_enabled: false,
        ..ClientConfig::default()
    };
    let client = PrideClient::from_config(&config).unwrap();
    assert!(!client.cache().is_enabled());
}
