//! Config loading and engine assembly for the stdin agent

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tributary_config::{Config, RoutingRule};
use tributary_pipeline::{EngineBuilder, EngineReport, JsonLinesInput};
use tributary_protocol::Tag;
use tributary_transform::{ParserRegistry, create_default_registry};

/// Output used when the configuration has no routing rules
const FALLBACK_OUTPUT: &str = "stdout";

/// Load the configuration, or built-in defaults when no path is given
///
/// A configuration without routing rules sends everything to stdout.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if !config.routing.has_rules() {
        config
            .routing
            .rules
            .push(RoutingRule::new("*", vec![FALLBACK_OUTPUT.to_string()]));
    }

    Ok(config)
}

/// Run the engine until stdin closes or Ctrl-C is received
pub async fn run(config: Config, tag: Tag) -> Result<()> {
    let parsers = ParserRegistry::from_configs(&config.parsers).context("invalid parser")?;
    let registry = create_default_registry(Arc::new(parsers));

    let engine = EngineBuilder::from_config(&config, &registry)?
        .input(Box::new(JsonLinesInput::new(
            "stdin",
            tag.clone(),
            tokio::io::stdin(),
        )))
        .build()?;

    info!(
        tag = %tag,
        rules = config.routing.rules.len(),
        outputs = ?config.active_outputs(),
        "tributary starting"
    );

    if config.log.shares_stdout() && writes_records_to_stdout(&config) {
        warn!("diagnostics and records are both written to stdout");
    }

    let handle = engine.start();
    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl-C, shutting down");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
        }
    });

    let report = handle.wait().await?;
    log_report(&report);
    Ok(())
}

fn writes_records_to_stdout(config: &Config) -> bool {
    config.active_outputs().into_iter().any(|name| match config.outputs.get(name) {
        Some(output) => output.type_name() == "stdout",
        None => name == "stdout",
    })
}

fn log_report(report: &EngineReport) {
    let metrics = &report.metrics;
    info!(
        uptime_ms = report.uptime.as_millis() as u64,
        received = metrics.records_received,
        delivered = metrics.records_delivered,
        unrouted = metrics.records_unrouted,
        filtered_out = metrics.records_filtered_out,
        retries = metrics.chunk_retries,
        "tributary stopped"
    );

    if metrics.has_data_loss() {
        error!(
            data_loss = true,
            chunks_dropped = metrics.chunks_dropped,
            records_dropped = metrics.records_dropped,
            dropped_at_shutdown = report.dropped_at_shutdown,
            "records were dropped"
        );
    }
}
