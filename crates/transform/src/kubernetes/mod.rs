//! Kubernetes Filter - Pod metadata enrichment
//!
//! Attaches orchestration metadata to records, keyed by the pod parsed
//! from each record's tag.
//!
//! # Flow
//!
//! ```text
//! tag ──parse──▶ MetadataKey ──lookup──▶ Hit ────────▶ full metadata
//!  │                               ├──▶ Miss ──dispatch──▶ degraded
//!  │                               └──▶ Pending ─────▶ degraded
//!  └──(unparseable)──▶ marker field, record passes through
//! ```
//!
//! A degraded record carries only the identifiers parsed from the tag. The
//! filter never waits on the metadata service: a miss hands a fetch to the
//! background dispatcher and later records for the same pod pick up the
//! document once it lands in the cache.
//!
//! After metadata, an optional `merge_log` step splices a JSON payload held
//! in a string field into the record, then pod annotations may pick a
//! secondary line parser or exclude the pod's records altogether.

mod cache;
mod config;
mod document;
mod fetch;
mod key;

pub use cache::{
    CacheResult, CacheStats, CacheStatsSnapshot, EntryInfo, EntryState, FetchTicket,
    MetadataCache, Resolution, Waiter,
};
pub use config::KubernetesConfig;
pub use document::MetadataDocument;
pub use fetch::{DispatchConfig, FetchDispatcher, FetchFuture, HttpFetcher, MetadataFetcher};
pub use key::{MetadataKey, ParsedTag, TagParser};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use tributary_protocol::{Batch, Entry, Fields, Record, Tag, Value, decode_fields};

use crate::parser::ParserRegistry;
use crate::registry::{FilterConfig, FilterFactory};
use crate::util::RateLimitedLogger;
use crate::{Filter, FilterResult};

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

/// Marker value set on records whose tag could not be parsed
pub const TAG_UNPARSED: &str = "tag_unparsed";

/// Filter counters
#[derive(Debug, Default)]
pub struct KubernetesMetrics {
    /// Records seen
    pub records_processed: AtomicU64,

    /// Records enriched with a full document
    pub records_enriched: AtomicU64,

    /// Records emitted with tag identifiers only
    pub records_degraded: AtomicU64,

    /// Records whose tag did not parse
    pub records_unparsed: AtomicU64,

    /// Records dropped by the exclude annotation
    pub records_excluded: AtomicU64,

    /// Records with an embedded payload merged
    pub logs_merged: AtomicU64,

    /// Records run through an annotated parser
    pub parser_applied: AtomicU64,

    /// Parser annotations naming an unknown parser
    pub parser_missing: AtomicU64,

    /// Parser or exclude annotations ignored because they are disabled
    pub annotations_not_allowed: AtomicU64,
}

impl KubernetesMetrics {
    pub fn snapshot(&self) -> KubernetesMetricsSnapshot {
        KubernetesMetricsSnapshot {
            records_processed: self.records_processed.load(Ordering::Relaxed),
            records_enriched: self.records_enriched.load(Ordering::Relaxed),
            records_degraded: self.records_degraded.load(Ordering::Relaxed),
            records_unparsed: self.records_unparsed.load(Ordering::Relaxed),
            records_excluded: self.records_excluded.load(Ordering::Relaxed),
            logs_merged: self.logs_merged.load(Ordering::Relaxed),
            parser_applied: self.parser_applied.load(Ordering::Relaxed),
            parser_missing: self.parser_missing.load(Ordering::Relaxed),
            annotations_not_allowed: self.annotations_not_allowed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `KubernetesMetrics`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KubernetesMetricsSnapshot {
    pub records_processed: u64,
    pub records_enriched: u64,
    pub records_degraded: u64,
    pub records_unparsed: u64,
    pub records_excluded: u64,
    pub logs_merged: u64,
    pub parser_applied: u64,
    pub parser_missing: u64,
    pub annotations_not_allowed: u64,
}

/// Pod metadata enrichment filter
pub struct KubernetesFilter {
    config: KubernetesConfig,
    tag_parser: TagParser,
    cache: MetadataCache,
    dispatcher: FetchDispatcher,
    parsers: Arc<ParserRegistry>,
    parser_annotation: String,
    exclude_annotation: String,
    metrics: KubernetesMetrics,
    not_allowed: RateLimitedLogger,
    cancel: CancellationToken,
}

impl KubernetesFilter {
    /// Create a filter fetching from `config.kube_url`
    ///
    /// # Errors
    /// Returns `FilterError::Config` if the configuration is invalid, the
    /// token file cannot be read, or the HTTP client cannot be built.
    pub fn new(config: KubernetesConfig, parsers: Arc<ParserRegistry>) -> FilterResult<Self> {
        let token = config.token()?;
        let fetcher = HttpFetcher::new(config.kube_url.clone(), token, config.fetch_timeout)?;
        Self::with_fetcher(config, Arc::new(fetcher), parsers)
    }

    /// Create a filter with a custom metadata source
    pub fn with_fetcher(
        config: KubernetesConfig,
        fetcher: Arc<dyn MetadataFetcher>,
        parsers: Arc<ParserRegistry>,
    ) -> FilterResult<Self> {
        config.validate().map_err(crate::FilterError::config)?;

        let tag_parser = config.tag_parser()?;
        let cancel = CancellationToken::new();
        let cache = MetadataCache::new(config.cache_ttl, config.cache_max_entries);
        let dispatcher = FetchDispatcher::new(
            fetcher,
            cache.clone(),
            config.dispatch_config(),
            cancel.child_token(),
        );

        // The sweeper needs a runtime; without one, expired entries are
        // still replaced on lookup.
        if tokio::runtime::Handle::try_current().is_ok() {
            cache.spawn_sweeper(config.cache_sweep_interval, cancel.child_token());
        }

        info!(
            fetcher = dispatcher.fetcher_name(),
            cache_ttl = ?config.cache_ttl,
            meta_key = config.meta_key.as_deref().unwrap_or("<flattened>"),
            merge_log = config.merge_log,
            "kubernetes filter created"
        );

        Ok(Self {
            parser_annotation: config.parser_annotation(),
            exclude_annotation: config.exclude_annotation(),
            config,
            tag_parser,
            cache,
            dispatcher,
            parsers,
            metrics: KubernetesMetrics::default(),
            not_allowed: RateLimitedLogger::default(),
            cancel,
        })
    }

    /// Enrich one record
    ///
    /// Returns no record when the pod is excluded, otherwise exactly one.
    pub fn apply(&self, tag: &Tag, record: Record) -> Vec<Record> {
        self.metrics.records_processed.fetch_add(1, Ordering::Relaxed);

        let parsed = match self.tag_parser.parse(tag) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.metrics.records_unparsed.fetch_add(1, Ordering::Relaxed);
                trace!(tag = %tag, error = %e, "tag not parseable, passing through");
                return vec![record.with_field(self.config.marker_key.as_str(), TAG_UNPARSED)];
            }
        };

        let doc = match self.cache.lookup(&parsed.key) {
            CacheResult::Hit(doc) => Some(doc),
            CacheResult::Miss(ticket) => {
                self.dispatcher.dispatch(ticket);
                None
            }
            CacheResult::Pending(_) => None,
        };

        if let Some(doc) = &doc
            && self.is_excluded(doc, &parsed)
        {
            self.metrics.records_excluded.fetch_add(1, Ordering::Relaxed);
            trace!(tag = %tag, pod = %parsed.key, "record excluded by annotation");
            return Vec::new();
        }

        let metadata = match &doc {
            Some(doc) => {
                self.metrics.records_enriched.fetch_add(1, Ordering::Relaxed);
                self.document_fields(doc, &parsed)
            }
            None => {
                self.metrics.records_degraded.fetch_add(1, Ordering::Relaxed);
                parsed.identity_fields()
            }
        };

        let mut record = match &self.config.meta_key {
            Some(key) => record.with_field(key.as_str(), metadata),
            None => record.with_fields(metadata),
        };

        if self.config.merge_log {
            record = self.merge_log(record);
        }

        if let Some(doc) = &doc {
            if self.config.allow_parser_annotation {
                record = self.apply_parser_annotation(record, doc, &parsed);
            } else if annotation(doc, &self.parser_annotation, &parsed).is_some() {
                self.annotation_not_allowed(&self.parser_annotation, &parsed);
            }
        }

        vec![record]
    }

    fn document_fields(&self, doc: &MetadataDocument, parsed: &ParsedTag) -> Fields {
        let mut fields = doc.to_fields(parsed);
        if !self.config.labels {
            fields.remove("labels");
        }
        if !self.config.annotations {
            fields.remove("annotations");
        }
        fields
    }

    /// Splice the JSON object held in `merge_log_source`
    fn merge_log(&self, record: Record) -> Record {
        let source = self.config.merge_log_source.as_str();
        let Some(payload) = record.get(source).and_then(Value::as_str) else {
            return record;
        };

        let merged = match decode_fields(payload.trim()) {
            Ok(fields) => fields,
            Err(e) => {
                trace!(field = source, error = %e, "log payload is not a JSON object, left as is");
                return record;
            }
        };

        self.metrics.logs_merged.fetch_add(1, Ordering::Relaxed);
        let record = match &self.config.merge_log_key {
            Some(key) => record.with_field(key.as_str(), merged),
            None => record.with_fields(merged),
        };

        if self.config.keep_log {
            record
        } else {
            record.without_field(source)
        }
    }

    fn apply_parser_annotation(
        &self,
        record: Record,
        doc: &MetadataDocument,
        parsed: &ParsedTag,
    ) -> Record {
        let Some(parser_name) = annotation(doc, &self.parser_annotation, parsed) else {
            return record;
        };

        let Some(parser) = self.parsers.get(parser_name) else {
            self.metrics.parser_missing.fetch_add(1, Ordering::Relaxed);
            debug!(pod = %parsed.key, parser = parser_name, "annotated parser not registered");
            return record;
        };

        let source = self.config.merge_log_source.as_str();
        let Some(line) = record.get(source).and_then(Value::as_str) else {
            return record;
        };

        match parser.parse(line) {
            Some(fields) => {
                self.metrics.parser_applied.fetch_add(1, Ordering::Relaxed);
                record.with_fields(fields)
            }
            None => {
                debug!(pod = %parsed.key, parser = parser_name, "annotated parser did not match");
                record
            }
        }
    }

    fn is_excluded(&self, doc: &MetadataDocument, parsed: &ParsedTag) -> bool {
        let Some(value) = annotation(doc, &self.exclude_annotation, parsed) else {
            return false;
        };
        if !self.config.allow_exclude_annotation {
            self.annotation_not_allowed(&self.exclude_annotation, parsed);
            return false;
        }
        is_truthy(value)
    }

    fn annotation_not_allowed(&self, name: &str, parsed: &ParsedTag) {
        self.metrics
            .annotations_not_allowed
            .fetch_add(1, Ordering::Relaxed);
        let detail = format!(
            "annotation '{name}' not allowed (ns={} pod_name={})",
            parsed.key.namespace(),
            parsed.key.name()
        );
        self.not_allowed.warn("pod annotation ignored", &detail);
    }

    /// Shared metadata cache
    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn metrics(&self) -> &KubernetesMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &KubernetesConfig {
        &self.config
    }
}

/// Annotation switch values read as enabled, case-insensitively
fn is_truthy(value: &str) -> bool {
    ["true", "on", "yes"]
        .iter()
        .any(|t| value.trim().eq_ignore_ascii_case(t))
}

/// Container-specific annotation (`<name>-<container>`) first, then `<name>`
fn annotation<'d>(doc: &'d MetadataDocument, name: &str, parsed: &ParsedTag) -> Option<&'d str> {
    parsed
        .container
        .as_ref()
        .and_then(|container| doc.annotation(&format!("{}-{}", name, container)))
        .or_else(|| doc.annotation(name))
}

impl Filter for KubernetesFilter {
    fn filter<'a>(
        &'a self,
        batch: Batch,
    ) -> Pin<Box<dyn Future<Output = FilterResult<Batch>> + Send + 'a>> {
        Box::pin(async move {
            let mut out = Vec::with_capacity(batch.len());
            for Entry { tag, record } in batch {
                for record in self.apply(&tag, record) {
                    out.push(Entry::new(tag.clone(), record));
                }
            }
            Ok(out)
        })
    }

    fn name(&self) -> &'static str {
        "kubernetes"
    }

    fn close(&self) -> FilterResult<()> {
        let stats = self.cache.stats().snapshot();
        let metrics = self.metrics.snapshot();
        info!(
            records = metrics.records_processed,
            enriched = metrics.records_enriched,
            degraded = metrics.records_degraded,
            cache_hits = stats.hits,
            cache_misses = stats.misses,
            fetch_failures = stats.fetch_failures,
            "kubernetes filter closed"
        );
        self.dispatcher.shutdown();
        self.cancel.cancel();
        Ok(())
    }
}

impl std::fmt::Debug for KubernetesFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubernetesFilter")
            .field("tag_parser", &self.tag_parser)
            .field("cache", &self.cache)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

/// Factory for `KubernetesFilter`
pub struct KubernetesFactory {
    parsers: Arc<ParserRegistry>,
}

impl KubernetesFactory {
    /// Parser annotations resolve against `parsers`
    pub fn new(parsers: Arc<ParserRegistry>) -> Self {
        Self { parsers }
    }
}

impl FilterFactory for KubernetesFactory {
    fn create(&self, config: &FilterConfig) -> FilterResult<Box<dyn Filter>> {
        let config = KubernetesConfig::try_from(config)?;
        Ok(Box::new(KubernetesFilter::new(config, Arc::clone(&self.parsers))?))
    }

    fn name(&self) -> &'static str {
        "kubernetes"
    }
}
