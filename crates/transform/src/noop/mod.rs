//! `noop` filter
//!
//! Hands every batch back untouched. Used as a placeholder in rule filter
//! lists and to check chain wiring without side effects.

use std::future::Future;
use std::pin::Pin;

use tributary_protocol::Batch;

use crate::registry::{FilterConfig, FilterFactory};
use crate::{Filter, FilterError, FilterResult};


#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFilter;

impl Filter for NoopFilter {
    fn filter<'a>(
        &'a self,
        batch: Batch,
    ) -> Pin<Box<dyn Future<Output = FilterResult<Batch>> + Send + 'a>> {
        Box::pin(std::future::ready(Ok(batch)))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Builds `NoopFilter`; any option is a configuration error
pub struct NoopFactory;

impl FilterFactory for NoopFactory {
    fn create(&self, config: &FilterConfig) -> FilterResult<Box<dyn Filter>> {
        if let Some(key) = config.keys().next() {
            return Err(FilterError::config(format!(
                "noop filter takes no options, got `{}`",
                key
            )));
        }
        Ok(Box::new(NoopFilter))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
