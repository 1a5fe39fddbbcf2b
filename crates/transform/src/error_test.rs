//! Tests for filter error types

use super::*;

#[test]
fn test_filter_error_display() {
    assert_eq!(
        FilterError::config("bad regex").to_string(),
        "invalid configuration: bad regex"
    );
    assert_eq!(FilterError::failed("boom").to_string(), "filter failed: boom");
    assert_eq!(FilterError::Cancelled.to_string(), "operation cancelled");
}

#[test]
fn test_fetch_error_display() {
    assert_eq!(
        FetchError::Status { status: 404 }.to_string(),
        "metadata endpoint returned HTTP 404"
    );
    assert!(
        FetchError::Timeout(Duration::from_secs(3))
            .to_string()
            .contains("3s")
    );
}

#[test]
fn test_fetch_error_retryable() {
    assert!(!FetchError::Status { status: 404 }.is_retryable());
    assert!(!FetchError::Status { status: 403 }.is_retryable());
    assert!(FetchError::Status { status: 429 }.is_retryable());
    assert!(FetchError::Status { status: 408 }.is_retryable());
    assert!(FetchError::Status { status: 503 }.is_retryable());
    assert!(FetchError::Timeout(Duration::from_millis(10)).is_retryable());
    assert!(FetchError::Request("connection refused".into()).is_retryable());
    assert!(!FetchError::decode("not an object").is_retryable());
}

#[test]
fn test_key_parse_error_display() {
    assert_eq!(
        KeyParseError::MissingPrefix("kube.".into()).to_string(),
        "tag does not start with prefix 'kube.'"
    );
    assert_eq!(
        KeyParseError::MissingSegment("namespace").to_string(),
        "tag has no namespace segment"
    );
}
