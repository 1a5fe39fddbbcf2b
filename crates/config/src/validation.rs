//! Configuration validation
//!
//! Validates config consistency:
//! - Referenced outputs in routing exist
//! - Rule patterns and output lists are non-empty
//! - Filter types are known
//! - Parser names are unique and regex parsers carry a pattern
//! - Engine, buffer and retry limits are usable

use crate::Config;
use crate::error::{ConfigError, Result};
use crate::filters::is_known_filter_type;
use crate::parsers::ParserFormat;
use std::collections::HashSet;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_engine(config)?;
    validate_parsers(config)?;
    validate_routing(config)?;
    Ok(())
}

fn validate_engine(config: &Config) -> Result<()> {
    if config.engine.flush_interval.is_zero() {
        return Err(ConfigError::invalid_value(
            "engine",
            "engine",
            "flush_interval",
            "must be greater than zero",
        ));
    }
    if config.engine.max_concurrent_deliveries == 0 {
        return Err(ConfigError::invalid_value(
            "engine",
            "engine",
            "max_concurrent_deliveries",
            "must be at least 1",
        ));
    }
    if config.engine.input_queue_size == 0 {
        return Err(ConfigError::invalid_value(
            "engine",
            "engine",
            "input_queue_size",
            "must be at least 1",
        ));
    }
    if config.buffer.chunk_max_records == 0 {
        return Err(ConfigError::invalid_value(
            "buffer",
            "buffer",
            "chunk_max_records",
            "must be at least 1",
        ));
    }
    if config.retry.max_attempts == 0 {
        return Err(ConfigError::invalid_value(
            "retry",
            "retry",
            "max_attempts",
            "must be at least 1",
        ));
    }
    if config.retry.multiplier.is_nan() || config.retry.multiplier < 1.0 {
        return Err(ConfigError::invalid_value(
            "retry",
            "retry",
            "multiplier",
            format!("must be >= 1.0, got {}", config.retry.multiplier),
        ));
    }
    if config.retry.initial_backoff > config.retry.max_backoff {
        return Err(ConfigError::invalid_value(
            "retry",
            "retry",
            "initial_backoff",
            "must not exceed max_backoff",
        ));
    }
    Ok(())
}

fn validate_parsers(config: &Config) -> Result<()> {
    let mut seen = HashSet::new();

    for parser in &config.parsers {
        if parser.name.is_empty() {
            return Err(ConfigError::missing_field("parser", "<unnamed>", "name"));
        }
        if !seen.insert(parser.name.as_str()) {
            return Err(ConfigError::duplicate_name("parser", &parser.name));
        }
        if parser.format == ParserFormat::Regex
            && parser.regex.as_deref().is_none_or(str::is_empty)
        {
            return Err(ConfigError::missing_field("parser", &parser.name, "regex"));
        }
    }

    Ok(())
}

fn validate_routing(config: &Config) -> Result<()> {
    let mut names = HashSet::new();

    for (index, rule) in config.routing.rules.iter().enumerate() {
        let name = rule.display_name(index);

        if !names.insert(name.clone()) {
            return Err(ConfigError::duplicate_name("rule", name));
        }
        if rule.pattern.is_empty() {
            return Err(ConfigError::invalid_value(
                "rule",
                name,
                "match",
                "pattern must not be empty",
            ));
        }
        if rule.outputs.is_empty() {
            return Err(ConfigError::missing_field("rule", name, "outputs"));
        }
        for output in &rule.outputs {
            if !config.outputs.contains(output) {
                return Err(ConfigError::unknown_output(&name, output));
            }
        }
        for filter in &rule.filters {
            if !is_known_filter_type(&filter.filter_type) {
                return Err(ConfigError::unknown_filter_type(&name, &filter.filter_type));
            }
        }
    }

    Ok(())
}
