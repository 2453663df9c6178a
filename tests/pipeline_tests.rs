//! End-to-end pipeline tests: producer, relay, publisher and inbound
//! override sharing one metric.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use hexagon_watch::bpm::{BPM_MAX, BPM_MIN};
use hexagon_watch::config::{PipelineConfig, CONFIG};
use hexagon_watch::error::PublishError;
use hexagon_watch::producer::RandomBpm;
use hexagon_watch::publisher::PublishSource;
use hexagon_watch::Pipeline;

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        publish_timeout: Duration::from_millis(40),
        lock_wait: Duration::from_millis(20),
        ..CONFIG.pipeline
    }
}

type Sent = Arc<Mutex<Vec<(String, String)>>>;

fn recorder(sent: &Sent) -> impl FnMut(&str, &[u8]) -> Result<(), PublishError> {
    let sent = Arc::clone(sent);
    move |topic: &str, payload: &[u8]| -> Result<(), PublishError> {
        sent.lock()
            .unwrap()
            .push((topic.to_string(), String::from_utf8_lossy(payload).into_owned()));
        Ok(())
    }
}

#[test]
fn test_produce_publish_override_scenario() {
    let pipeline = Pipeline::new(&fast_config());
    let sent: Sent = Arc::default();

    let mut values = [60, 112].into_iter();
    let mut producer = pipeline.producer(move || values.next().unwrap_or(BPM_MIN));
    let mut publisher = pipeline.publisher(recorder(&sent), "hexagon");
    let inbound = pipeline.inbound("hexagon");

    // Producer emits 60, Publisher forwards it
    producer.tick();
    let report = publisher.cycle();
    assert_eq!(report.source, PublishSource::Relay);
    assert_eq!(sent.lock().unwrap().last().unwrap(), &("hexagon".to_string(), "60".to_string()));

    // Broker overrides to 85: visible until the next produce
    inbound.handle("hexagon", b"85");
    assert_eq!(pipeline.metric.read(), 85);

    producer.tick();
    let value = pipeline.metric.read();
    assert!((BPM_MIN..=BPM_MAX).contains(&value));
    assert_eq!(value, 112);
}

#[test]
fn test_relay_keeps_oldest_when_flooded() {
    let pipeline = Pipeline::new(&fast_config());
    let mut next = 60;
    let mut producer = pipeline.producer(move || {
        next += 1;
        next
    });

    let capacity = pipeline.relay.capacity();
    for _ in 0..capacity + 3 {
        producer.tick();
    }

    assert_eq!(pipeline.relay.len(), capacity);
    assert_eq!(pipeline.stats.snapshot().relay_drops, 3);

    let drained: Vec<_> = std::iter::from_fn(|| pipeline.relay.try_recv()).collect();
    assert_eq!(drained, vec![61, 62, 63, 64, 65]);
    // Metric still tracks the newest value even though the relay dropped it
    assert_eq!(pipeline.metric.read(), 68);
}

#[test]
fn test_idle_publisher_republishes_metric() {
    let pipeline = Pipeline::new(&fast_config());
    let sent: Sent = Arc::default();
    let mut publisher = pipeline.publisher(recorder(&sent), "hexagon");

    pipeline.metric.write(77);
    let start = Instant::now();
    let first = publisher.cycle();
    let second = publisher.cycle();

    assert!(start.elapsed() >= Duration::from_millis(70));
    assert_eq!(first.source, PublishSource::Fallback);
    assert_eq!(second.value, 77);
    assert_eq!(sent.lock().unwrap().len(), 2);
}

#[test]
fn test_publisher_wakes_on_produce() {
    let config = PipelineConfig {
        publish_timeout: Duration::from_secs(5),
        ..fast_config()
    };
    let pipeline = Pipeline::new(&config);
    let sent: Sent = Arc::default();
    let mut publisher = pipeline.publisher(recorder(&sent), "hexagon");

    let mut producer = pipeline.producer(|| 101);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        producer.tick();
    });

    let start = Instant::now();
    let report = publisher.cycle();
    handle.join().unwrap();

    assert!(start.elapsed() < Duration::from_secs(4));
    assert_eq!(report.source, PublishSource::Relay);
    assert_eq!(report.value, 101);
}

#[test]
fn test_concurrent_writers_leave_a_written_value() {
    let pipeline = Pipeline::new(&fast_config());
    let inbound = Arc::new(pipeline.inbound("hexagon"));

    let mut handles = Vec::new();
    for seed in 0..3u64 {
        let mut producer = pipeline.producer(RandomBpm::with_seed(seed));
        handles.push(thread::spawn(move || {
            for _ in 0..50 {
                producer.tick();
            }
        }));
    }
    let override_handle = {
        let inbound = Arc::clone(&inbound);
        thread::spawn(move || {
            for _ in 0..50 {
                inbound.handle("hexagon", b"150");
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    override_handle.join().unwrap();

    let value = pipeline.metric.read();
    assert!((BPM_MIN..=BPM_MAX).contains(&value), "torn or foreign value {}", value);

    let stats = pipeline.stats.snapshot();
    assert_eq!(stats.produced, 150);
}

#[test]
fn test_history_tracks_produced_values() {
    let pipeline = Pipeline::new(&fast_config());
    let mut producer = pipeline.producer(RandomBpm::with_seed(11));
    for _ in 0..60 {
        producer.tick();
    }

    let summary = pipeline.history.summary().unwrap();
    assert_eq!(summary.count, pipeline.history.capacity());
    assert!(summary.min >= BPM_MIN && summary.max <= BPM_MAX);
    assert!(summary.min <= summary.mean && summary.mean <= summary.max);
}
