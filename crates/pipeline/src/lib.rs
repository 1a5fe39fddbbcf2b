//! Tributary Pipeline - Buffered delivery engine
//!
//! Connects inputs to outputs through the routing table, per-rule filter
//! chains and a per-destination chunk buffer.
//!
//! # Architecture
//!
//! ```text
//! [Inputs] ──→ bounded mpsc ──→ RoutingTable ──→ Chain (per rule) ──→ ChunkBuffer
//!                                                                       │ flush tick
//!                                          ack / fail + backoff ◀── Output::deliver
//! ```
//!
//! # Key Design
//!
//! - **Single owner**: one control loop owns routes, chains and buffer
//! - **One chunk in flight per destination**: destination order is chunk order
//! - **Backpressure**: input is paused while the buffer is over its memory
//!   limit, unless chunks can overflow to disk
//! - **Bounded shutdown**: open chunks are flushed for up to `grace_period`
//!
//! # Example
//!
//! ```ignore
//! use tributary_pipeline::{EngineBuilder, JsonLinesInput};
//! use tributary_protocol::Tag;
//!
//! let registry = tributary_transform::create_default_registry(parsers);
//! let engine = EngineBuilder::from_config(&config, &registry)?
//!     .input(Box::new(JsonLinesInput::new("stdin", Tag::new("app")?, tokio::io::stdin())))
//!     .build()?;
//!
//! let handle = engine.start();
//! tokio::signal::ctrl_c().await?;
//! let report = handle.stop().await?;
//! ```

pub mod buffer;
mod engine;
mod error;
mod input;
mod metrics;
pub mod output;

pub use buffer::{Chunk, ChunkBuffer, ChunkId, ChunkState, FailOutcome, RetryPolicy};
pub use engine::{Engine, EngineBuilder, EngineHandle, EngineReport, EngineState};
pub use error::{DeliveryError, PipelineError, Result};
pub use input::{ChannelInput, DEFAULT_LINES_PER_BATCH, Input, JsonLinesInput, VecInput};
pub use metrics::{EngineMetrics, EngineMetricsSnapshot};
pub use output::{LibOutput, NullOutput, Output, StdoutOutput};

// Re-export key types from dependencies for convenience
pub use tributary_protocol::{Batch, Entry};
pub use tributary_routing::{OutputId, RoutingTable, RoutingTableBuilder, RuleId};
pub use tributary_transform::Chain;
