//! `[log]` section: the agent's own diagnostics
//!
//! Diagnostics go to stderr unless configured otherwise, so they stay apart
//! from records written by the `stdout` output.

use std::fmt;

use serde::Deserialize;

/// Dependencies whose debug output drowns the pipeline's own
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls"];

/// Minimum severity of emitted diagnostics
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    /// Per-record decisions (routing misses, cache hits)
    Debug,
    #[default]
    Info,
    /// Degraded paths: retries, failed fetches, skipped annotations
    Warn,
    /// Data loss
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line format of diagnostics
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Console,
    /// One JSON object per event, for log collectors scraping the agent
    Json,
}

/// Stream diagnostics are written to
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    #[default]
    Stderr,
}

/// ```toml
/// [log]
/// level = "debug"   # trace | debug | info | warn | error
/// format = "json"   # console | json
/// output = "stderr" # stdout | stderr
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
}

impl LogConfig {
    /// Filter directive for the configured level
    ///
    /// At `debug` and below, HTTP client internals are capped at `info`.
    /// An explicit `level_override` (from the command line) is used as is.
    pub fn filter_directive(&self, level_override: Option<&str>) -> String {
        if let Some(directive) = level_override {
            return directive.to_string();
        }
        if self.level > LogLevel::Debug {
            return self.level.as_str().to_string();
        }
        let mut directive = self.level.as_str().to_string();
        for target in QUIET_TARGETS {
            directive.push_str(&format!(",{target}=info"));
        }
        directive
    }

    /// Whether diagnostics share stdout with the `stdout` output
    pub fn shares_stdout(&self) -> bool {
        self.output == LogOutput::Stdout
    }
}
