//! Engine - Scheduler tying inputs, routes, filters, buffer and outputs
//!
//! # Architecture
//!
//! ```text
//! [Input task] ─┐                     ┌─ control loop ──────────────────────┐
//! [Input task] ─┼─→ bounded mpsc ──→  │ route → chain → ChunkBuffer.append  │
//! [Input task] ─┘                     │ tick: seal_aged + drain              │
//!                                     │ completion: ack / fail               │
//!                                     └──────┬──────────────────▲───────────┘
//!                                            │ spawn (semaphore) │ completions
//!                                            ▼                   │
//!                                        Output::deliver ────────┘
//! ```
//!
//! The control loop exclusively owns the routing table, the filter chains
//! and the chunk buffer. Deliveries run on spawned tasks, bounded by
//! `max_concurrent_deliveries` and each by `delivery_timeout`.
//!
//! # Lifecycle
//!
//! `Created → Running → Stopping → Stopped`. Shutdown starts when every
//! input is exhausted or on `EngineHandle::stop`. The engine stops
//! reading input, seals every open chunk and keeps delivering and
//! retrying until the buffer is empty or `grace_period` elapses; whatever
//! is left then is dropped and counted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use tributary_config::{BufferConfig, Config, EngineConfig, RetryConfig};
use tributary_protocol::Batch;
use tributary_routing::{OutputId, RoutingTable, RoutingTableBuilder, RuleId};
use tributary_transform::{Chain, FilterRegistry, FilterResult};

use crate::buffer::{Chunk, ChunkBuffer, ChunkId, FailOutcome, RetryPolicy};
use crate::error::{DeliveryError, PipelineError, Result};
use crate::input::Input;
use crate::metrics::{EngineMetrics, EngineMetricsSnapshot};
use crate::output::{self, Output};

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// Summary returned when the engine stops
#[derive(Debug, Clone)]
pub struct EngineReport {
    /// Counters at the time the engine stopped
    pub metrics: EngineMetricsSnapshot,
    /// Time spent between `start` and `Stopped`
    pub uptime: Duration,
    /// Records dropped because the grace period ran out
    pub dropped_at_shutdown: usize,
}

impl EngineReport {
    /// Whether shutdown had to drop undelivered chunks
    pub fn forced(&self) -> bool {
        self.dropped_at_shutdown > 0
    }
}

/// Assembles an `Engine`
///
/// # Example
///
/// ```ignore
/// let mut routes = RoutingTableBuilder::new();
/// routes.register_output("console")?;
/// let rule = routes.add_rule("all", "*", &["console"])?;
///
/// let engine = EngineBuilder::new()
///     .routing_table(routes.build())
///     .chain(rule, Chain::empty())
///     .output("console", Arc::new(NullOutput::new("console", &Default::default())))
///     .input(Box::new(VecInput::new("replay", batches)))
///     .build()?;
///
/// let report = engine.start().wait().await?;
/// ```
pub struct EngineBuilder {
    engine: EngineConfig,
    buffer: BufferConfig,
    retry: RetryPolicy,
    table: Option<RoutingTable>,
    chains: HashMap<RuleId, Chain>,
    outputs: HashMap<String, Arc<dyn Output>>,
    inputs: Vec<Box<dyn Input>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            engine: EngineConfig::default(),
            buffer: BufferConfig::default(),
            retry: RetryPolicy::default(),
            table: None,
            chains: HashMap::new(),
            outputs: HashMap::new(),
            inputs: Vec::new(),
        }
    }

    /// Build routes, filter chains and outputs from configuration
    ///
    /// Disabled outputs are left out; a rule left without any enabled
    /// output is skipped with a warning. Inputs are added separately.
    ///
    /// # Errors
    /// - `PipelineError::Routing` for a bad pattern or unknown output
    /// - `PipelineError::Filter` if a filter rejects its options
    /// - `PipelineError::MissingOutput` for an output with no implementation
    pub fn from_config(config: &Config, registry: &FilterRegistry) -> Result<Self> {
        let mut builder = Self::new()
            .with_engine_config(config.engine.clone())
            .with_buffer_config(config.buffer.clone())
            .with_retry_config(&config.retry);

        let active = config.active_outputs();
        let mut routes = RoutingTableBuilder::new();

        for &name in &active {
            routes.register_output(name)?;
            let output = match config.outputs.get(name) {
                Some(output_config) => output::from_config(name, output_config),
                None => output::builtin(name)
                    .ok_or_else(|| PipelineError::MissingOutput(name.to_string()))?,
            };
            builder.outputs.insert(name.to_string(), output);
        }

        for (index, rule) in config.routing.rules.iter().enumerate() {
            let name = rule.display_name(index);
            let outputs: Vec<&str> = rule
                .outputs
                .iter()
                .map(String::as_str)
                .filter(|o| active.contains(o))
                .collect();

            if outputs.is_empty() {
                warn!(rule = %name, "rule has no enabled outputs, skipping");
                continue;
            }

            let rule_id = routes.add_rule(&name, &rule.pattern, outputs.as_slice())?;
            let filters = rule
                .filters
                .iter()
                .map(|f| registry.create_instance(f))
                .collect::<FilterResult<Vec<_>>>()
                .map_err(|e| PipelineError::filter(&name, e))?;

            builder.chains.insert(rule_id, Chain::new(filters));
        }

        builder.table = Some(routes.build());
        Ok(builder)
    }

    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine = config;
        self
    }

    pub fn with_buffer_config(mut self, config: BufferConfig) -> Self {
        self.buffer = config;
        self
    }

    pub fn with_retry_config(mut self, config: &RetryConfig) -> Self {
        self.retry = RetryPolicy::from(config);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn routing_table(mut self, table: RoutingTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Set the filter chain of a rule; rules without one pass records through
    pub fn chain(mut self, rule: RuleId, chain: Chain) -> Self {
        self.chains.insert(rule, chain);
        self
    }

    /// Bind an output implementation to a routing table output name
    pub fn output(mut self, name: impl Into<String>, output: Arc<dyn Output>) -> Self {
        self.outputs.insert(name.into(), output);
        self
    }

    pub fn input(mut self, input: Box<dyn Input>) -> Self {
        self.inputs.push(input);
        self
    }

    /// Check the assembly and create the engine
    ///
    /// # Errors
    /// - `PipelineError::NoRoutingTable` if no table was set
    /// - `PipelineError::MissingOutput` if a table output has no implementation
    /// - `PipelineError::Overflow` if the overflow directory cannot be created
    pub fn build(mut self) -> Result<Engine> {
        let table = self.table.take().ok_or(PipelineError::NoRoutingTable)?;

        let outputs = table
            .output_names()
            .iter()
            .map(|name| {
                self.outputs
                    .remove(name)
                    .ok_or_else(|| PipelineError::MissingOutput(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let chains = table
            .rules()
            .iter()
            .map(|rule| self.chains.remove(&rule.id()).unwrap_or_default())
            .collect();

        let metrics = Arc::new(EngineMetrics::new());
        let buffer = ChunkBuffer::new(self.buffer, self.retry, Arc::clone(&metrics))?;
        let (state, _) = watch::channel(EngineState::Created);

        Ok(Engine {
            config: self.engine,
            table,
            chains,
            outputs,
            inputs: self.inputs,
            buffer,
            metrics,
            state,
        })
    }
}

/// An assembled engine, ready to start
pub struct Engine {
    config: EngineConfig,
    table: RoutingTable,
    chains: Vec<Chain>,
    outputs: Vec<Arc<dyn Output>>,
    inputs: Vec<Box<dyn Input>>,
    buffer: ChunkBuffer,
    metrics: Arc<EngineMetrics>,
    state: watch::Sender<EngineState>,
}

impl Engine {
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Spawn the inputs and the control loop
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> EngineHandle {
        let cancel = CancellationToken::new();
        let queue = self.config.input_queue_size.max(1);
        let (input_tx, input_rx) = mpsc::channel(queue);

        let input_cancel = cancel.child_token();
        let mut input_tasks = JoinSet::new();
        for input in self.inputs {
            input_tasks.spawn(run_input(input, input_tx.clone(), input_cancel.clone()));
        }
        drop(input_tx);

        // One delivery per output at a time bounds the pending completions
        let (completion_tx, completion_rx) = mpsc::channel(self.outputs.len().max(1));

        let state = self.state.subscribe();
        let metrics = Arc::clone(&self.metrics);

        info!(
            rules = self.table.rule_count(),
            outputs = self.table.output_count(),
            inputs = input_tasks.len(),
            "engine starting"
        );

        let control = ControlLoop {
            delivery_slots: Arc::new(Semaphore::new(self.config.max_concurrent_deliveries.max(1))),
            config: self.config,
            table: self.table,
            chains: self.chains,
            outputs: self.outputs,
            buffer: self.buffer,
            metrics: self.metrics,
            state: self.state,
            cancel: cancel.clone(),
            input_cancel,
            input_rx,
            input_tasks,
            completion_tx,
            completion_rx,
            deliveries: JoinSet::new(),
            backpressured: false,
        };

        EngineHandle {
            cancel,
            state,
            metrics,
            join: tokio::spawn(control.run()),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state())
            .field("rules", &self.table.rule_count())
            .field("outputs", &self.table.output_names())
            .field("inputs", &self.inputs.len())
            .finish()
    }
}

/// Handle to a running engine
pub struct EngineHandle {
    cancel: CancellationToken,
    state: watch::Receiver<EngineState>,
    metrics: Arc<EngineMetrics>,
    join: JoinHandle<EngineReport>,
}

impl EngineHandle {
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Current counters
    pub fn metrics(&self) -> EngineMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Token that stops the engine when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Begin shutdown and wait for it to finish
    pub async fn stop(self) -> Result<EngineReport> {
        self.cancel.cancel();
        self.wait().await
    }

    /// Wait for the engine to stop on its own (inputs exhausted)
    pub async fn wait(self) -> Result<EngineReport> {
        self.join
            .await
            .map_err(|e| PipelineError::EngineTask(e.to_string()))
    }
}

async fn run_input(mut input: Box<dyn Input>, tx: mpsc::Sender<Batch>, cancel: CancellationToken) {
    let name = input.name().to_string();
    debug!(input = %name, "input started");

    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => break,
            batch = input.next_batch() => batch,
        };
        let Some(batch) = batch else {
            debug!(input = %name, "input exhausted");
            break;
        };

        let sent = tokio::select! {
            _ = cancel.cancelled() => break,
            sent = tx.send(batch) => sent,
        };
        if sent.is_err() {
            break;
        }
    }
}

struct Completion {
    chunk: ChunkId,
    output: OutputId,
    records: usize,
    result: std::result::Result<(), DeliveryError>,
}

struct ControlLoop {
    config: EngineConfig,
    table: RoutingTable,
    chains: Vec<Chain>,
    outputs: Vec<Arc<dyn Output>>,
    buffer: ChunkBuffer,
    metrics: Arc<EngineMetrics>,
    state: watch::Sender<EngineState>,
    cancel: CancellationToken,
    input_cancel: CancellationToken,
    input_rx: mpsc::Receiver<Batch>,
    input_tasks: JoinSet<()>,
    completion_tx: mpsc::Sender<Completion>,
    completion_rx: mpsc::Receiver<Completion>,
    deliveries: JoinSet<()>,
    delivery_slots: Arc<Semaphore>,
    backpressured: bool,
}

/// Sleep until `at`, or forever when there is nothing to wait for
async fn sleep_until_some(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl ControlLoop {
    async fn run(mut self) -> EngineReport {
        let started = Instant::now();
        self.state.send_replace(EngineState::Running);

        let mut ticker = self.flush_ticker();

        loop {
            let accepting = !self.check_backpressure();
            let next_retry = self.buffer.next_retry_at();

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("engine stop requested");
                    break;
                }
                batch = self.input_rx.recv(), if accepting => match batch {
                    Some(batch) => self.ingest(batch).await,
                    None => {
                        info!("all inputs exhausted");
                        break;
                    }
                },
                Some(done) = self.completion_rx.recv() => self.complete(done),
                _ = ticker.tick() => self.flush(),
                _ = sleep_until_some(next_retry) => self.dispatch(Instant::now()),
            }
        }

        let dropped_at_shutdown = self.shutdown().await;
        self.state.send_replace(EngineState::Stopped);

        let report = EngineReport {
            metrics: self.metrics.snapshot(),
            uptime: started.elapsed(),
            dropped_at_shutdown,
        };
        info!(
            uptime = ?report.uptime,
            records_received = report.metrics.records_received,
            records_delivered = report.metrics.records_delivered,
            records_dropped = report.metrics.records_dropped,
            "engine stopped"
        );
        report
    }

    /// Returns true while input should be paused
    fn check_backpressure(&mut self) -> bool {
        let over = self.buffer.is_over_limit();
        if over && !self.backpressured {
            self.metrics.record_backpressure();
            warn!(
                memory_bytes = self.buffer.memory_bytes(),
                "buffer memory limit reached, pausing input"
            );
        } else if !over && self.backpressured {
            debug!("buffer below memory limit, resuming input");
        }
        self.backpressured = over;
        over
    }

    async fn ingest(&mut self, batch: Batch) {
        let now = Instant::now();
        self.metrics.record_received(batch.len() as u64);

        // Split by rule, keeping input order within each rule
        let mut per_rule: Vec<Batch> = vec![Batch::new(); self.chains.len()];
        for entry in batch {
            let rules: Vec<RuleId> = self
                .table
                .route(entry.tag.as_str())
                .rules()
                .iter()
                .map(|rule| rule.id())
                .collect();

            match rules.split_last() {
                None => {
                    self.metrics.record_unrouted();
                    trace!(tag = %entry.tag, "no route matched");
                }
                Some((last, rest)) => {
                    for rule in rest {
                        per_rule[rule.as_usize()].push(entry.clone());
                    }
                    per_rule[last.as_usize()].push(entry);
                }
            }
        }

        for (index, entries) in per_rule.into_iter().enumerate() {
            if entries.is_empty() {
                continue;
            }
            let Some(rule) = self.table.rules().get(index) else {
                continue;
            };
            let rule_name = rule.name().to_string();
            let outputs = rule.outputs().to_vec();

            let received = entries.len();
            let filtered = match self.chains[index].filter(entries).await {
                Ok(filtered) => filtered,
                Err(e) => {
                    warn!(
                        rule = %rule_name,
                        error = %e,
                        records = received,
                        "filter chain failed, dropping batch"
                    );
                    self.metrics.record_filtered_out(received as u64);
                    continue;
                }
            };
            if filtered.len() < received {
                self.metrics.record_filtered_out((received - filtered.len()) as u64);
            }

            let Some((&last, rest)) = outputs.split_last() else {
                continue;
            };
            for &output in rest {
                for entry in &filtered {
                    self.append(output, entry.clone(), now);
                }
            }
            for entry in filtered {
                self.append(last, entry, now);
            }
        }

        self.dispatch(now);
    }

    fn append(&mut self, output: OutputId, entry: tributary_protocol::Entry, now: Instant) {
        if let Err(e) = self.buffer.append(output, entry, now) {
            error!(
                output = %self.output_name(output),
                error = %e,
                data_loss = true,
                "failed to buffer record"
            );
        }
    }

    fn flush(&mut self) {
        let now = Instant::now();
        // Over the limit nothing frees memory until open chunks go out
        let sealed = if self.buffer.is_over_limit() {
            self.buffer.seal_all()
        } else {
            self.buffer.seal_aged(now)
        };
        if sealed > 0 {
            trace!(sealed, "sealed aged chunks");
        }
        self.dispatch(now);
    }

    fn dispatch(&mut self, now: Instant) {
        for chunk in self.buffer.drain(now) {
            self.spawn_delivery(chunk);
        }
    }

    fn spawn_delivery(&mut self, chunk: Arc<Chunk>) {
        let Some(output) = self.outputs.get(chunk.output().as_usize()).cloned() else {
            return;
        };
        let slots = Arc::clone(&self.delivery_slots);
        let tx = self.completion_tx.clone();
        let timeout = self.config.delivery_timeout;

        trace!(
            output = output.name(),
            chunk = %chunk.id(),
            attempt = chunk.attempt(),
            records = chunk.len(),
            "delivering chunk"
        );

        self.deliveries.spawn(async move {
            let (id, output_id, records) = (chunk.id(), chunk.output(), chunk.len());

            let result = match slots.acquire_owned().await {
                Ok(_permit) => match tokio::time::timeout(timeout, output.deliver(chunk)).await {
                    Ok(result) => result,
                    Err(_) => Err(DeliveryError::Timeout(timeout)),
                },
                Err(_) => Err(DeliveryError::Closed),
            };

            let _ = tx
                .send(Completion {
                    chunk: id,
                    output: output_id,
                    records,
                    result,
                })
                .await;
        });
    }

    fn complete(&mut self, done: Completion) {
        // Reap finished delivery tasks
        while self.deliveries.try_join_next().is_some() {}

        let now = Instant::now();
        let output = self.output_name(done.output).to_string();

        match done.result {
            Ok(()) => {
                self.buffer.ack(done.chunk);
                debug!(
                    output = %output,
                    chunk = %done.chunk,
                    records = done.records,
                    "chunk delivered"
                );
            }
            Err(e) => match self.buffer.fail(done.chunk, now) {
                Some(FailOutcome::Retry { failures, delay }) => {
                    warn!(
                        output = %output,
                        chunk = %done.chunk,
                        attempt = failures,
                        retry_in = ?delay,
                        error = %e,
                        "delivery failed, will retry"
                    );
                }
                Some(FailOutcome::Dropped { failures, records }) => {
                    error!(
                        output = %output,
                        chunk = %done.chunk,
                        attempts = failures,
                        records,
                        error = %e,
                        data_loss = true,
                        "delivery failed, dropping chunk"
                    );
                }
                None => {}
            },
        }

        self.dispatch(now);
    }

    fn flush_ticker(&self) -> Interval {
        let period = self.config.flush_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    fn output_name(&self, id: OutputId) -> &str {
        self.table.output_name(id).unwrap_or("unknown")
    }

    /// Flush what is buffered within the grace period; returns records dropped
    async fn shutdown(&mut self) -> usize {
        self.state.send_replace(EngineState::Stopping);
        self.input_cancel.cancel();

        // Batches already queued were accepted; route them before sealing
        self.input_rx.close();
        while let Some(batch) = self.input_rx.recv().await {
            self.ingest(batch).await;
        }
        while self.input_tasks.join_next().await.is_some() {}

        let sealed = self.buffer.seal_all();
        info!(
            sealed,
            pending_records = self.buffer.pending_records(),
            grace_period = ?self.config.grace_period,
            "engine stopping, flushing buffer"
        );
        self.dispatch(Instant::now());

        let deadline = Instant::now() + self.config.grace_period;
        let mut ticker = self.flush_ticker();

        while !self.buffer.is_empty() {
            let next_retry = self.buffer.next_retry_at();
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                Some(done) = self.completion_rx.recv() => self.complete(done),
                _ = ticker.tick() => self.dispatch(Instant::now()),
                _ = sleep_until_some(next_retry) => self.dispatch(Instant::now()),
            }
        }

        let mut dropped = 0;
        if !self.buffer.is_empty() {
            self.deliveries.abort_all();
            dropped = self.buffer.drop_all();
            error!(
                records = dropped,
                data_loss = true,
                "grace period elapsed, dropping undelivered records"
            );
        }
        while self.deliveries.join_next().await.is_some() {}

        for chain in &self.chains {
            chain.close();
        }

        dropped
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
