//! Engine delivery built from TOML configuration

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use tributary_config::Config;
use tributary_pipeline::{
    Chunk, DeliveryError, EngineBuilder, EngineReport, LibOutput, Output, VecInput,
};
use tributary_protocol::{Batch, Entry, Fields, Record, Tag};
use tributary_transform::{ParserRegistry, create_default_registry};

struct Capture {
    failures_left: AtomicU32,
    seen: Mutex<Vec<(String, i64)>>,
}

impl Capture {
    fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures_left: AtomicU32::new(failures),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seqs(&self) -> Vec<i64> {
        self.seen.lock().iter().map(|(_, s)| *s).collect()
    }

    fn tags(&self) -> Vec<String> {
        self.seen.lock().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl Output for Capture {
    fn name(&self) -> &str {
        "capture"
    }

    async fn deliver(&self, chunk: Arc<Chunk>) -> Result<(), DeliveryError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(DeliveryError::failed("connection reset"));
        }
        let mut seen = self.seen.lock();
        for entry in chunk.entries() {
            let seq = entry.record.get("seq").and_then(|v| v.as_i64()).unwrap();
            seen.push((entry.tag.as_str().to_string(), seq));
        }
        Ok(())
    }
}

fn entry(tag: &str, seq: i64) -> Entry {
    Entry::new(
        Tag::new(tag).unwrap(),
        Record::now(Fields::new()).with_field("seq", seq),
    )
}

const BASE: &str = r#"
[engine]
flush_interval = "10ms"
grace_period = "5s"

[buffer]
chunk_max_records = 4
chunk_max_age = "20ms"

[retry]
max_attempts = 5
initial_backoff = "10ms"
max_backoff = "100ms"

[outputs.primary]
type = "null"

[outputs.archive]
type = "null"
"#;

fn config(rules: &str) -> Config {
    Config::from_str(&format!("{BASE}\n{rules}")).unwrap()
}

fn out(capture: &Arc<Capture>) -> Arc<dyn Output> {
    capture.clone()
}

async fn run(
    config: Config,
    outputs: Vec<(&str, Arc<dyn Output>)>,
    batches: Vec<Batch>,
) -> EngineReport {
    let registry = create_default_registry(Arc::new(ParserRegistry::new()));

    let mut builder = EngineBuilder::from_config(&config, &registry).unwrap();
    for (name, output) in outputs {
        builder = builder.output(name, output);
    }
    builder
        .input(Box::new(VecInput::new("replay", batches)))
        .build()
        .unwrap()
        .start()
        .wait()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_records_reach_every_destination_in_order() {
    let primary = Capture::new(0);
    let archive = Capture::new(0);

    let report = run(
        config(
            r#"
[[routing.rules]]
match = "app.*"
outputs = ["primary", "archive"]
"#,
        ),
        vec![("primary", out(&primary)), ("archive", out(&archive))],
        vec![
            (0..5).map(|i| entry("app.web", i)).collect(),
            (5..10).map(|i| entry("app.api", i)).collect(),
        ],
    )
    .await;

    let expected: Vec<i64> = (0..10).collect();
    assert_eq!(primary.seqs(), expected);
    assert_eq!(archive.seqs(), expected);
    assert_eq!(primary.tags()[0], "app.web");
    assert_eq!(primary.tags()[9], "app.api");
    assert_eq!(report.metrics.records_delivered, 20);
    assert!(!report.metrics.has_data_loss());
}

#[tokio::test]
async fn test_output_failing_twice_delivers_once() {
    let primary = Capture::new(2);

    let report = run(
        config(
            r#"
[[routing.rules]]
match = "*"
outputs = ["primary"]
"#,
        ),
        vec![("primary", out(&primary))],
        vec![(0..3).map(|i| entry("app", i)).collect()],
    )
    .await;

    assert_eq!(primary.seqs(), vec![0, 1, 2]);
    assert_eq!(report.metrics.chunks_delivered, 1);
    assert_eq!(report.metrics.chunk_retries, 2);
    assert_eq!(report.metrics.chunks_dropped, 0);
}

#[tokio::test]
async fn test_failed_destination_does_not_block_others() {
    let primary = Capture::new(u32::MAX);
    let archive = Capture::new(0);

    let mut config = config(
        r#"
[[routing.rules]]
match = "*"
outputs = ["primary", "archive"]
"#,
    );
    config.retry.max_attempts = 2;

    let report = run(
        config,
        vec![("primary", out(&primary)), ("archive", out(&archive))],
        vec![(0..2).map(|i| entry("app", i)).collect()],
    )
    .await;

    assert!(primary.seqs().is_empty());
    assert_eq!(archive.seqs(), vec![0, 1]);
    assert_eq!(report.metrics.chunks_dropped, 1);
    assert_eq!(report.metrics.records_dropped, 2);
}

#[tokio::test]
async fn test_unrouted_records_are_counted() {
    let primary = Capture::new(0);

    let report = run(
        config(
            r#"
[[routing.rules]]
match = "kube.*"
outputs = ["primary"]
"#,
        ),
        vec![("primary", out(&primary))],
        vec![vec![entry("kube.a.b", 1), entry("syslog", 2), entry("app.web", 3)]],
    )
    .await;

    assert_eq!(primary.seqs(), vec![1]);
    assert_eq!(report.metrics.records_received, 3);
    assert_eq!(report.metrics.records_unrouted, 2);
}

#[tokio::test]
async fn test_overflow_chunks_spill_and_deliver_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let overflow = dir.path().join("spill");
    let primary = Capture::new(0);

    let mut config = config(
        r#"
[[routing.rules]]
match = "*"
outputs = ["primary"]
"#,
    );
    config.buffer.chunk_max_records = 2;
    config.buffer.memory_limit = 1;
    config.buffer.overflow_dir = Some(overflow.clone());

    let report = run(
        config,
        vec![("primary", out(&primary))],
        vec![(0..6).map(|i| entry("app", i)).collect()],
    )
    .await;

    assert_eq!(primary.seqs(), vec![0, 1, 2, 3, 4, 5]);
    assert!(report.metrics.chunks_spilled >= 1);
    assert_eq!(std::fs::read_dir(&overflow).unwrap().count(), 0);
}

#[tokio::test]
async fn test_lib_output_receives_encoded_records() {
    let received: Arc<Mutex<Vec<serde_json::Value>>> = Arc::default();
    let sink = Arc::clone(&received);
    let lib: Arc<dyn Output> = Arc::new(LibOutput::new("primary", move |bytes: &[u8]| {
        let value =
            serde_json::from_slice(bytes).map_err(|e| DeliveryError::failed(e.to_string()))?;
        sink.lock().push(value);
        Ok(())
    }));

    run(
        config(
            r#"
[[routing.rules]]
match = "*"
outputs = ["primary"]
"#,
        ),
        vec![("primary", lib)],
        vec![vec![entry("app", 7)]],
    )
    .await;

    let received = received.lock();
    assert_eq!(received.len(), 1);
    assert!(received[0][0].is_f64());
    assert_eq!(received[0][1]["seq"], 7);
}
