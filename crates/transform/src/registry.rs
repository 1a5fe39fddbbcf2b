//! Filter Registry - Dynamic filter creation
//!
//! The registry maps filter type names to factories, enabling
//! configuration-driven filter instantiation.
//!
//! # Example
//!
//! ```ignore
//! let mut registry = FilterRegistry::new();
//! registry.register("noop", NoopFactory);
//!
//! // From config
//! let filter = registry.create("noop", &config)?;
//! ```

use crate::{Filter, FilterError, FilterResult};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tributary_config::FilterInstanceConfig;
use tributary_protocol::Batch;

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;

/// Options passed to filter factories
///
/// The raw key-value map from a `[[routing.rules.filters]]` table, minus
/// `type` and `enabled`.
pub type FilterConfig = HashMap<String, toml::Value>;

/// Deserialize filter options into a typed config struct
///
/// # Errors
/// Returns `FilterError::Config` naming the offending option.
pub fn parse_options<T: DeserializeOwned>(config: &FilterConfig) -> FilterResult<T> {
    let table: toml::Table = config
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| FilterError::config(e.message().to_string()))
}

/// Factory trait for creating filters
///
/// Implement this trait to register custom filters with the registry.
pub trait FilterFactory: Send + Sync {
    /// Create a filter instance from configuration
    ///
    /// # Errors
    /// Returns `FilterError::Config` if configuration is invalid
    fn create(&self, config: &FilterConfig) -> FilterResult<Box<dyn Filter>>;

    /// Human-readable name for this factory (for error messages)
    fn name(&self) -> &'static str;
}

/// Registry for filter factories
pub struct FilterRegistry {
    factories: HashMap<String, Box<dyn FilterFactory>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a filter factory
    ///
    /// # Panics
    /// Panics if a factory is already registered with this name.
    /// Use `try_register` for fallible registration.
    pub fn register<F: FilterFactory + 'static>(&mut self, type_name: &str, factory: F) {
        if self.factories.contains_key(type_name) {
            panic!("Filter factory '{}' already registered", type_name);
        }
        self.factories
            .insert(type_name.to_string(), Box::new(factory));
    }

    /// Try to register a filter factory
    ///
    /// Returns `false` if a factory is already registered with this name.
    pub fn try_register<F: FilterFactory + 'static>(
        &mut self,
        type_name: &str,
        factory: F,
    ) -> bool {
        if self.factories.contains_key(type_name) {
            return false;
        }
        self.factories
            .insert(type_name.to_string(), Box::new(factory));
        true
    }

    /// Create a filter from its type name and options
    ///
    /// # Errors
    /// - `FilterError::Config` if the type is not registered
    /// - `FilterError::Config` if the factory rejects the options
    pub fn create(&self, type_name: &str, config: &FilterConfig) -> FilterResult<Box<dyn Filter>> {
        let factory = self.factories.get(type_name).ok_or_else(|| {
            let mut available = self.available_types();
            available.sort_unstable();
            FilterError::config(format!(
                "unknown filter type '{}', available: [{}]",
                type_name,
                available.join(", ")
            ))
        })?;

        factory.create(config).map_err(|e| match e {
            FilterError::Config(msg) => {
                FilterError::config(format!("{} filter: {}", factory.name(), msg))
            }
            other => other,
        })
    }

    /// Create a filter from a routing rule's filter table
    ///
    /// Disabled instances are still built; `Chain::new` drops them.
    pub fn create_instance(
        &self,
        instance: &FilterInstanceConfig,
    ) -> FilterResult<Box<dyn Filter>> {
        let filter = self.create(&instance.filter_type, &instance.options)?;
        if instance.enabled {
            Ok(filter)
        } else {
            Ok(Box::new(Disabled(filter)))
        }
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Get list of registered filter types
    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps a filter switched off in config
struct Disabled(Box<dyn Filter>);

impl Filter for Disabled {
    fn filter<'a>(
        &'a self,
        batch: Batch,
    ) -> Pin<Box<dyn Future<Output = FilterResult<Batch>> + Send + 'a>> {
        self.0.filter(batch)
    }

    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn enabled(&self) -> bool {
        false
    }

    fn close(&self) -> FilterResult<()> {
        self.0.close()
    }
}
