//! Broker session shared by the Publisher, the broker event loop and the
//! subscriber task.
//!
//! ```text
//! event loop ──on_connected()──▶ connected + resubscribe signal
//! subscriber task ◀──signal── ──subscribe()──▶ client
//! Publisher ──SessionSink──▶ publish() ──▶ client
//! ```
//!
//! # Rules
//! - The event loop never calls into the client. The client library holds
//!   its own lock until the next event is pulled, so a client call from the
//!   event context waits forever.
//! - Every client access waits at most `lock_wait`, then reports
//!   [`PublishError::Busy`].

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::PublishError;
use crate::log_globals::EVENT_LOG;
use crate::pacing::PacingSignal;
use crate::publisher::Publish;

/// Client operations the session needs. QoS 0, no retain.
pub trait BrokerClient {
    fn subscribe(&mut self, topic: &str) -> Result<(), PublishError>;
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;
}

/// Connection state plus the client, behind a bounded lock.
pub struct BrokerSession<C> {
    client: Mutex<C>,
    connected: AtomicBool,
    resubscribe: PacingSignal,
    topic: &'static str,
    lock_wait: Duration,
}

impl<C: BrokerClient> BrokerSession<C> {
    pub fn new(client: C, topic: &'static str, lock_wait: Duration) -> Self {
        Self {
            client: Mutex::new(client),
            connected: AtomicBool::new(false),
            resubscribe: PacingSignal::new(),
            topic,
            lock_wait,
        }
    }

    pub fn topic(&self) -> &'static str {
        self.topic
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Event context: mark connected and ask the subscriber task to subscribe.
    pub fn on_connected(&self) {
        self.connected.store(true, Ordering::Release);
        self.resubscribe.raise();
        crate::task_info!(EVENT_LOG, "mqtt: connected");
    }

    /// Event context.
    pub fn on_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
        crate::task_warn!(EVENT_LOG, "mqtt: disconnected");
    }

    fn with_client<T>(
        &self,
        f: impl FnOnce(&mut C) -> Result<T, PublishError>,
    ) -> Result<T, PublishError> {
        let mut client = self
            .client
            .try_lock_for(self.lock_wait)
            .ok_or(PublishError::Busy)?;
        f(&mut client)
    }

    /// Publish if connected. Bounded by `lock_wait`.
    pub fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::NotConnected);
        }
        self.with_client(|client| client.publish(topic, payload))
    }

    /// Wait up to `timeout` for a (re)connect and subscribe to the topic.
    ///
    /// Returns `None` when no subscription was requested in time.
    pub fn subscribe_pending(&self, timeout: Duration) -> Option<Result<(), PublishError>> {
        if !self.resubscribe.wait(timeout) {
            return None;
        }
        if !self.is_connected() {
            return Some(Err(PublishError::NotConnected));
        }

        let result = self.with_client(|client| client.subscribe(self.topic));
        match &result {
            Ok(()) => crate::task_info!(EVENT_LOG, "mqtt: subscribe to '{}' sent", self.topic),
            Err(e) => crate::task_error!(EVENT_LOG, "mqtt: subscribe to '{}' failed: {}", self.topic, e),
        }
        Some(result)
    }

    /// One subscriber iteration: a failed subscription is requested again
    /// after `retry` while the session stays connected.
    pub fn subscriber_step(&self, timeout: Duration, retry: Duration) -> Option<Result<(), PublishError>> {
        let result = self.subscribe_pending(timeout);
        if let Some(Err(e)) = &result {
            if *e != PublishError::NotConnected {
                std::thread::sleep(retry);
                if self.is_connected() {
                    self.resubscribe.raise();
                }
            }
        }
        result
    }

    /// Subscriber task body.
    pub fn run_subscriber(&self, retry: Duration) -> ! {
        loop {
            self.subscriber_step(Duration::from_secs(60), retry);
        }
    }
}

/// [`Publish`] handle over a shared session, given to the Publisher.
pub struct SessionSink<C> {
    session: Arc<BrokerSession<C>>,
}

impl<C> SessionSink<C> {
    pub fn new(session: Arc<BrokerSession<C>>) -> Self {
        Self { session }
    }
}

impl<C: BrokerClient> Publish for SessionSink<C> {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        self.session.publish(topic, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[derive(Default)]
    struct RecordingClient {
        subscribed: Vec<String>,
        published: Vec<(String, Vec<u8>)>,
        fail_subscribes: usize,
    }

    impl BrokerClient for RecordingClient {
        fn subscribe(&mut self, topic: &str) -> Result<(), PublishError> {
            if self.fail_subscribes > 0 {
                self.fail_subscribes -= 1;
                return Err(PublishError::Transport(-1));
            }
            self.subscribed.push(topic.to_string());
            Ok(())
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
            self.published.push((topic.to_string(), payload.to_vec()));
            Ok(())
        }
    }

    fn session() -> BrokerSession<RecordingClient> {
        BrokerSession::new(RecordingClient::default(), "hexagon", Duration::from_millis(50))
    }

    #[test]
    fn test_connect_event_does_not_touch_client() {
        let session = session();

        // The event context holds the client, as the MQTT library does
        // while an event is being consumed.
        let held = session.client.lock();
        let start = Instant::now();
        session.on_connected();
        assert!(start.elapsed() < Duration::from_millis(40));
        drop(held);

        assert!(session.is_connected());
        assert!(session.client.lock().subscribed.is_empty());
    }

    #[test]
    fn test_subscriber_subscribes_after_connect() {
        let session = Arc::new(session());

        let subscriber = {
            let session = Arc::clone(&session);
            thread::spawn(move || session.subscribe_pending(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(20));
        session.on_connected();

        assert_eq!(subscriber.join().unwrap(), Some(Ok(())));
        assert_eq!(session.client.lock().subscribed, vec!["hexagon".to_string()]);
    }

    #[test]
    fn test_no_subscription_without_connect() {
        let session = session();
        assert_eq!(session.subscribe_pending(Duration::from_millis(20)), None);
        assert!(session.client.lock().subscribed.is_empty());
    }

    #[test]
    fn test_reconnect_subscribes_again() {
        let session = session();
        for _ in 0..2 {
            session.on_connected();
            assert_eq!(session.subscribe_pending(Duration::ZERO), Some(Ok(())));
            session.on_disconnected();
        }
        assert_eq!(session.client.lock().subscribed.len(), 2);
    }

    #[test]
    fn test_failed_subscription_is_retried() {
        let session = BrokerSession::new(
            RecordingClient { fail_subscribes: 1, ..Default::default() },
            "hexagon",
            Duration::from_millis(50),
        );
        session.on_connected();

        let first = session.subscriber_step(Duration::ZERO, Duration::from_millis(5));
        assert_eq!(first, Some(Err(PublishError::Transport(-1))));
        let second = session.subscriber_step(Duration::ZERO, Duration::from_millis(5));
        assert_eq!(second, Some(Ok(())));
        assert_eq!(session.client.lock().subscribed.len(), 1);
    }

    #[test]
    fn test_publish_requires_connection() {
        let mut sink = SessionSink::new(Arc::new(session()));
        assert_eq!(sink.publish("hexagon", b"72"), Err(PublishError::NotConnected));

        sink.session.on_connected();
        assert_eq!(sink.publish("hexagon", b"72"), Ok(()));
        assert_eq!(
            sink.session.client.lock().published,
            vec![("hexagon".to_string(), b"72".to_vec())]
        );
    }

    #[test]
    fn test_publish_gives_up_on_held_client() {
        let session = Arc::new(session());
        session.on_connected();

        let held = session.client.lock();
        let publisher = {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let start = Instant::now();
                let result = session.publish("hexagon", b"90");
                (result, start.elapsed())
            })
        };
        let (result, elapsed) = publisher.join().unwrap();
        drop(held);

        assert_eq!(result, Err(PublishError::Busy));
        assert!(elapsed >= Duration::from_millis(40));
        assert!(elapsed < Duration::from_secs(2));
        assert!(session.client.lock().published.is_empty());
    }
}
