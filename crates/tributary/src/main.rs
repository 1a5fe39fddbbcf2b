//! Tributary - Log shipping agent
//!
//! Reads JSON lines from stdin under a single tag, routes them through the
//! configured rules and filter chains, and delivers them to the configured
//! outputs.
//!
//! # Usage
//!
//! ```bash
//! # Everything to stdout with defaults
//! tributary < app.log
//!
//! # Configured rules, records tagged for kubernetes enrichment
//! kubectl logs -f web-7f9c | tributary --config tributary.toml --tag kube.default.web-7f9c.app
//! ```

mod run;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use tributary_config::{LogConfig, LogFormat, LogOutput};
use tributary_protocol::Tag;

/// How long the runtime waits for stdin readers still blocked on a read
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Tributary - Log shipping agent
#[derive(Parser, Debug)]
#[command(name = "tributary")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level, overrides `[log] level` (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Tag given to every record read from stdin
    #[arg(short, long, default_value = "stdin")]
    tag: Tag,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = run::load_config(cli.config.as_deref())?;
    let directive = config.log.filter_directive(cli.log_level.as_deref());
    init_logging(&directive, &config.log)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run::run(config, cli.tag));
    // A stdin read in progress holds a blocking thread until the next line
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

/// Initialize the tracing subscriber for logging
fn init_logging(directive: &str, config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(directive)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let writer = match config.output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
    };

    match config.format {
        LogFormat::Console => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(writer),
            )
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true).with_writer(writer))
            .with(filter)
            .init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["tributary"]).unwrap();
        assert!(cli.config.is_none());
        assert!(cli.log_level.is_none());
        assert_eq!(cli.tag.as_str(), "stdin");
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "tributary",
            "-c",
            "tributary.toml",
            "--log-level",
            "debug",
            "--tag",
            "kube.default.web.app",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("tributary.toml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.tag.as_str(), "kube.default.web.app");
    }

    #[test]
    fn test_cli_rejects_invalid_tag() {
        assert!(Cli::try_parse_from(["tributary", "--tag", ""]).is_err());
    }
}
