//! Per-rule filter chain
//!
//! Each routing rule owns one `Chain`. A batch entering the chain passes
//! through every enabled filter in configuration order; the batch a filter
//! returns is the input of the next one.
//!
//! A filter error ends the run for that batch and the error is returned to
//! the caller, which drops the batch for this rule only.

use crate::{Filter, FilterResult};
use tracing::{debug, trace, warn};
use tributary_protocol::Batch;

#[cfg(test)]
#[path = "chain_test.rs"]
mod tests;

/// Ordered filters of one routing rule
pub struct Chain {
    filters: Vec<Box<dyn Filter>>,
}

impl Chain {
    /// Build a chain, discarding filters that report themselves disabled
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        Self {
            filters: filters.into_iter().filter(|f| f.enabled()).collect(),
        }
    }

    /// A chain that returns batches as given
    pub fn empty() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Whether the chain does anything at all
    #[inline]
    pub fn is_enabled(&self) -> bool {
        !self.filters.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Filter type names in execution order
    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// First filter with the given type name
    pub fn get(&self, name: &str) -> Option<&dyn Filter> {
        self.filters
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.as_ref())
    }

    /// Run `batch` through every filter in order
    ///
    /// Filters after the point where the batch became empty are skipped.
    pub async fn filter(&self, batch: Batch) -> FilterResult<Batch> {
        let mut batch = batch;

        for filter in &self.filters {
            if batch.is_empty() {
                break;
            }
            let before = batch.len();
            batch = filter.filter(batch).await.inspect_err(|e| {
                debug!(
                    filter = filter.name(),
                    records = before,
                    error = %e,
                    "filter rejected batch"
                );
            })?;
            if batch.len() < before {
                trace!(
                    filter = filter.name(),
                    dropped = before - batch.len(),
                    "filter dropped records"
                );
            }
        }

        Ok(batch)
    }

    /// Release filter resources; failures are logged
    pub fn close(&self) {
        for filter in &self.filters {
            if let Err(e) = filter.close() {
                warn!(filter = filter.name(), error = %e, "failed to close filter");
            }
        }
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
