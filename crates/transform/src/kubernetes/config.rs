//! Kubernetes filter configuration
//!
//! # Example
//!
//! ```toml
//! [[routing.rules.filters]]
//! type = "kubernetes"
//! kube_url = "https://kubernetes.default.svc:443"
//! kube_token_file = "/var/run/secrets/kubernetes.io/serviceaccount/token"
//! tag_prefix = "kube."
//! meta_key = "kubernetes"
//! cache_ttl = "5m"
//! merge_log = true
//! allow_parser_annotation = true
//! ```

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::fetch::DispatchConfig;
use super::key::TagParser;
use crate::registry::{FilterConfig, parse_options};
use crate::{FilterError, FilterResult};

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

/// Configuration for the Kubernetes metadata filter
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KubernetesConfig {
    /// API server base URL
    pub kube_url: String,

    /// Bearer token sent with every request
    pub kube_token: Option<String>,

    /// File holding the bearer token (read once at startup)
    pub kube_token_file: Option<PathBuf>,

    /// Prefix stripped from tags before splitting (segments mode)
    pub tag_prefix: String,

    /// Separator between namespace, pod name and container (segments mode)
    pub tag_delimiter: char,

    /// Regex with `namespace`, `name`/`pod_name` and optional `container`
    /// groups; replaces segments mode when set
    pub tag_regex: Option<String>,

    /// Nest metadata under this key instead of merging it top-level
    pub meta_key: Option<String>,

    /// Attach pod labels
    pub labels: bool,

    /// Attach pod annotations
    pub annotations: bool,

    /// How long a fetched document stays valid
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,

    /// Maximum cached pods (0 = unbounded)
    pub cache_max_entries: usize,

    /// How often expired entries are purged
    #[serde(with = "humantime_serde")]
    pub cache_sweep_interval: Duration,

    /// Bound on a single fetch attempt
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,

    /// Attempts per fetch
    pub fetch_retries: u32,

    /// Delay before the second attempt, doubled after each failure
    #[serde(with = "humantime_serde")]
    pub fetch_backoff: Duration,

    /// Fetches allowed in flight at once
    pub max_concurrent_fetches: usize,

    /// Splice a JSON payload held in `merge_log_source` into the record
    pub merge_log: bool,

    /// Nest the spliced payload under this key instead of top-level
    pub merge_log_key: Option<String>,

    /// Field holding the payload
    pub merge_log_source: String,

    /// Keep the source field after a successful merge
    pub keep_log: bool,

    /// Prefix of the `/parser` and `/exclude` annotations
    pub annotation_prefix: String,

    /// Honour `<annotation_prefix>/parser`
    pub allow_parser_annotation: bool,

    /// Honour `<annotation_prefix>/exclude`
    pub allow_exclude_annotation: bool,

    /// Field set on records whose tag could not be parsed
    pub marker_key: String,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            kube_url: "https://kubernetes.default.svc:443".into(),
            kube_token: None,
            kube_token_file: None,
            tag_prefix: "kube.".into(),
            tag_delimiter: '.',
            tag_regex: None,
            meta_key: None,
            labels: true,
            annotations: true,
            cache_ttl: Duration::from_secs(300),
            cache_max_entries: 10_000,
            cache_sweep_interval: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(3),
            fetch_retries: 3,
            fetch_backoff: Duration::from_millis(200),
            max_concurrent_fetches: 4,
            merge_log: false,
            merge_log_key: None,
            merge_log_source: "log".into(),
            keep_log: true,
            annotation_prefix: "tributary.io".into(),
            allow_parser_annotation: false,
            allow_exclude_annotation: false,
            marker_key: "enrichment_error".into(),
        }
    }
}

impl KubernetesConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.kube_url.starts_with("http://") && !self.kube_url.starts_with("https://") {
            return Err(format!(
                "kube_url must start with http:// or https://, got '{}'",
                self.kube_url
            ));
        }
        if self.fetch_retries == 0 {
            return Err("fetch_retries must be at least 1".into());
        }
        if self.max_concurrent_fetches == 0 {
            return Err("max_concurrent_fetches must be at least 1".into());
        }
        if self.cache_sweep_interval.is_zero() {
            return Err("cache_sweep_interval must be greater than zero".into());
        }
        if self.fetch_timeout.is_zero() {
            return Err("fetch_timeout must be greater than zero".into());
        }
        for (name, value) in [
            ("meta_key", self.meta_key.as_deref()),
            ("merge_log_key", self.merge_log_key.as_deref()),
            ("merge_log_source", Some(self.merge_log_source.as_str())),
            ("annotation_prefix", Some(self.annotation_prefix.as_str())),
            ("marker_key", Some(self.marker_key.as_str())),
        ] {
            if value.is_some_and(str::is_empty) {
                return Err(format!("{} must not be empty", name));
            }
        }
        if let Some(pattern) = &self.tag_regex {
            TagParser::regex(pattern)?;
        }
        Ok(())
    }

    /// Build the tag parser for this configuration
    pub fn tag_parser(&self) -> FilterResult<TagParser> {
        match &self.tag_regex {
            Some(pattern) => TagParser::regex(pattern).map_err(FilterError::config),
            None => Ok(TagParser::segments(&self.tag_prefix, self.tag_delimiter)),
        }
    }

    /// Token from `kube_token`, or read from `kube_token_file`
    pub fn token(&self) -> FilterResult<Option<String>> {
        if let Some(token) = &self.kube_token {
            return Ok(Some(token.clone()));
        }
        match &self.kube_token_file {
            Some(path) => std::fs::read_to_string(path)
                .map(|t| Some(t.trim().to_string()))
                .map_err(|e| {
                    FilterError::config(format!(
                        "failed to read kube_token_file '{}': {}",
                        path.display(),
                        e
                    ))
                }),
            None => Ok(None),
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            max_concurrent: self.max_concurrent_fetches,
            timeout: self.fetch_timeout,
            attempts: self.fetch_retries,
            backoff: self.fetch_backoff,
        }
    }

    /// Annotation naming the parser for a pod's log lines
    pub fn parser_annotation(&self) -> String {
        format!("{}/parser", self.annotation_prefix)
    }

    /// Annotation excluding a pod's records
    pub fn exclude_annotation(&self) -> String {
        format!("{}/exclude", self.annotation_prefix)
    }
}

impl TryFrom<&FilterConfig> for KubernetesConfig {
    type Error = FilterError;

    fn try_from(config: &FilterConfig) -> FilterResult<Self> {
        let parsed: KubernetesConfig = parse_options(config)?;
        parsed.validate().map_err(FilterError::config)?;
        Ok(parsed)
    }
}
