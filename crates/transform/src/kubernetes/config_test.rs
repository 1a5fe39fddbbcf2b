//! Tests for Kubernetes filter configuration

use super::*;
use std::io::Write;

fn options(pairs: &[(&str, toml::Value)]) -> FilterConfig {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_defaults() {
    let config = KubernetesConfig::try_from(&FilterConfig::new()).unwrap();

    assert_eq!(config.kube_url, "https://kubernetes.default.svc:443");
    assert_eq!(config.tag_prefix, "kube.");
    assert_eq!(config.tag_delimiter, '.');
    assert_eq!(config.meta_key, None);
    assert_eq!(config.cache_ttl, Duration::from_secs(300));
    assert_eq!(config.merge_log_source, "log");
    assert!(config.keep_log);
    assert!(!config.merge_log);
    assert!(!config.allow_parser_annotation);
    assert_eq!(config.marker_key, "enrichment_error");
    assert_eq!(config.parser_annotation(), "tributary.io/parser");
    assert_eq!(config.exclude_annotation(), "tributary.io/exclude");
}

#[test]
fn test_parse_options() {
    let config = KubernetesConfig::try_from(&options(&[
        ("kube_url", "http://127.0.0.1:8001".into()),
        ("tag_prefix", "svc.".into()),
        ("meta_key", "meta".into()),
        ("cache_ttl", "30s".into()),
        ("fetch_timeout", "500ms".into()),
        ("fetch_retries", toml::Value::Integer(5)),
        ("merge_log", true.into()),
        ("annotation_prefix", "example.com".into()),
    ]))
    .unwrap();

    assert_eq!(config.kube_url, "http://127.0.0.1:8001");
    assert_eq!(config.meta_key.as_deref(), Some("meta"));
    assert_eq!(config.cache_ttl, Duration::from_secs(30));
    assert_eq!(config.parser_annotation(), "example.com/parser");

    let dispatch = config.dispatch_config();
    assert_eq!(dispatch.timeout, Duration::from_millis(500));
    assert_eq!(dispatch.attempts, 5);
}

#[test]
fn test_unknown_option_rejected() {
    let err = KubernetesConfig::try_from(&options(&[("merge_logs", true.into())])).unwrap_err();
    assert!(matches!(err, FilterError::Config(_)));
    assert!(err.to_string().contains("merge_logs"));
}

#[test]
fn test_validation_errors() {
    for (key, value) in [
        ("kube_url", toml::Value::from("ftp://x")),
        ("fetch_retries", toml::Value::Integer(0)),
        ("max_concurrent_fetches", toml::Value::Integer(0)),
        ("fetch_timeout", toml::Value::from("0s")),
        ("cache_sweep_interval", toml::Value::from("0s")),
        ("meta_key", toml::Value::from("")),
        ("marker_key", toml::Value::from("")),
        ("tag_regex", toml::Value::from("(?<name>.+)")),
    ] {
        let result = KubernetesConfig::try_from(&options(&[(key, value)]));
        assert!(result.is_err(), "{} should be rejected", key);
    }
}

#[test]
fn test_zero_fetch_timeout_rejected() {
    let config = KubernetesConfig {
        fetch_timeout: Duration::ZERO,
        ..Default::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.contains("fetch_timeout"), "{}", err);
}

#[test]
fn test_tag_parser_modes() {
    let segments = KubernetesConfig::default().tag_parser().unwrap();
    assert!(matches!(segments, TagParser::Segments { .. }));

    let config = KubernetesConfig {
        tag_regex: Some(r"^(?<namespace>[^.]+)\.(?<name>[^.]+)$".into()),
        ..Default::default()
    };
    assert!(matches!(config.tag_parser().unwrap(), TagParser::Regex(_)));
}

#[test]
fn test_token_sources() {
    assert_eq!(KubernetesConfig::default().token().unwrap(), None);

    let inline = KubernetesConfig {
        kube_token: Some("abc".into()),
        ..Default::default()
    };
    assert_eq!(inline.token().unwrap().as_deref(), Some("abc"));

    let mut file = tempfile_in_target();
    writeln!(file.1, "from-file").unwrap();
    let from_file = KubernetesConfig {
        kube_token_file: Some(file.0.clone()),
        ..Default::default()
    };
    assert_eq!(from_file.token().unwrap().as_deref(), Some("from-file"));
    let _ = std::fs::remove_file(&file.0);

    let missing = KubernetesConfig {
        kube_token_file: Some("/nonexistent/token".into()),
        ..Default::default()
    };
    assert!(missing.token().is_err());
}

fn tempfile_in_target() -> (PathBuf, std::fs::File) {
    let path = std::env::temp_dir().join(format!(
        "tributary-token-{}-{:?}",
        std::process::id(),
        std::thread::current().id()
    ));
    let file = std::fs::File::create(&path).unwrap();
    (path, file)
}
