//! Tributary - Transform
//!
//! Filter chains applied to records between routing and buffering.
//!
//! # Overview
//!
//! Filters take a batch of tagged records and return a new batch. They can:
//! - Enrich records (attach orchestration metadata, splice embedded JSON)
//! - Parse log lines into fields
//! - Drop records (exclusion annotations)
//!
//! # Design Principles
//!
//! - **Non-blocking**: Filters never wait on I/O; slow lookups are handed
//!   to background tasks and the record goes out degraded instead
//! - **Order preserving**: Records leave a filter in the order they came in
//! - **Immutable records**: A filter consumes records and emits new ones
//! - **Zero-cost when disabled**: Empty chain is a no-op
//!
//! # Architecture
//!
//! ```text
//! [Batch] → [Filter 1] → [Filter 2] → ... → [Batch']
//! ```
//!
//! Filters are chained together and applied in order. The `Chain` struct
//! handles sequencing and error propagation.
//!
//! # Adding a New Filter
//!
//! 1. Create a config struct deriving `Deserialize` with `#[serde(default)]`
//!    and a `validate()` method.
//! 2. Parse it from the instance options with `registry::parse_options`.
//! 3. Implement the `Filter` trait.
//! 4. Register a `FilterFactory` in `create_default_registry()` and add the
//!    type name to `tributary_config::KNOWN_FILTER_TYPES`.
//!
//! # Modules
//!
//! - `chain` - Sequential filter execution
//! - `registry` - Dynamic filter creation from config
//! - `noop` - Pass-through filter for testing
//! - `parser` - Line parsers selectable by name
//! - `kubernetes` - Pod metadata enrichment with a single-flight cache

mod chain;
mod error;
pub mod kubernetes;
pub mod noop;
pub mod parser;
pub mod registry;
pub mod util;

pub use chain::Chain;
pub use error::{FetchError, FilterError, KeyParseError};
pub use kubernetes::{
    CacheResult, CacheStats, CacheStatsSnapshot, EntryInfo, EntryState, FetchDispatcher,
    FetchTicket, HttpFetcher, KubernetesConfig, KubernetesFactory, KubernetesFilter,
    KubernetesMetrics, MetadataCache, MetadataDocument, MetadataFetcher, MetadataKey, ParsedTag,
    Resolution, TagParser, Waiter,
};
pub use noop::{NoopFactory, NoopFilter};
pub use parser::{JsonParser, LineParser, ParserRegistry, RegexParser};
pub use registry::{FilterConfig, FilterFactory, FilterRegistry};
pub use util::RateLimitedLogger;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tributary_protocol::Batch;

/// Result type for filter operations
pub type FilterResult<T> = Result<T, FilterError>;

/// Trait for batch filters
///
/// Implementors must be `Send + Sync` to allow concurrent use across tasks.
///
/// # Example
///
/// ```ignore
/// struct Uppercase;
///
/// impl Filter for Uppercase {
///     fn filter<'a>(
///         &'a self,
///         batch: Batch,
///     ) -> Pin<Box<dyn Future<Output = FilterResult<Batch>> + Send + 'a>> {
///         Box::pin(async move { Ok(batch) })
///     }
///
///     fn name(&self) -> &'static str {
///         "uppercase"
///     }
/// }
/// ```
pub trait Filter: Send + Sync {
    /// Filter a batch, returning the records to keep
    ///
    /// The returned batch may be shorter (records dropped) but never
    /// reorders entries and never rewrites tags. Returning an error drops
    /// the whole batch.
    fn filter<'a>(
        &'a self,
        batch: Batch,
    ) -> Pin<Box<dyn Future<Output = FilterResult<Batch>> + Send + 'a>>;

    /// Name of this filter for logging and metrics
    fn name(&self) -> &'static str;

    /// Whether this filter is currently enabled
    ///
    /// Disabled filters are removed from chains at construction time.
    fn enabled(&self) -> bool {
        true
    }

    /// Release background resources (fetch tasks, sweepers)
    ///
    /// Called during graceful shutdown. Default implementation is a no-op.
    fn close(&self) -> FilterResult<()> {
        Ok(())
    }
}

/// Create a registry with all built-in filters
///
/// Includes:
/// - `noop` - Pass-through filter
/// - `kubernetes` - Pod metadata enrichment, resolving parser annotations
///   against `parsers`
pub fn create_default_registry(parsers: Arc<ParserRegistry>) -> FilterRegistry {
    let mut registry = FilterRegistry::new();
    registry.register("noop", NoopFactory);
    registry.register("kubernetes", KubernetesFactory::new(parsers));
    registry
}
