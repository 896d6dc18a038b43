//! The set of connected live-reload subscribers.
//!
//! Each subscriber moves through `Connecting → Open → Closed`. It is
//! `Connecting` while its acknowledgement is being written, `Open` once the
//! ack succeeded, and `Closed` when a write to it fails or it unsubscribes.
//! Only `Open` subscribers receive broadcasts, so the ack is always the
//! first message a subscriber sees.
//!
//! Broadcast takes a snapshot of the open sinks under the lock, releases the
//! lock, writes to each sink, and re-locks only to drop the ones that
//! failed. Subscribing or unsubscribing during a broadcast never corrupts
//! the iteration, and a failed write only closes that one subscriber.

use super::event::{ChangeEvent, ReloadEvent};
use futures::{future, Stream, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

/// A write to a subscriber whose connection has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("live-reload subscriber is closed")]
pub struct SinkClosed;

/// Somewhere reload messages can be written.
pub trait EventSink: Send + Sync {
    fn send(&self, event: &ReloadEvent) -> Result<(), SinkClosed>;
}

impl EventSink for mpsc::UnboundedSender<ReloadEvent> {
    fn send(&self, event: &ReloadEvent) -> Result<(), SinkClosed> {
        mpsc::UnboundedSender::send(self, event.clone()).map_err(|_| SinkClosed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Connecting,
    Open,
    Closed,
}

struct Subscriber {
    id: SubscriberId,
    sink: Arc<dyn EventSink>,
    state: SubscriberState,
}

/// Result of one [`ReloadHub::broadcast`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Subscribers closed because the write failed.
    pub removed: Vec<SubscriberId>,
}

/// Owns the subscriber set. Share it with `Arc`.
#[derive(Default)]
pub struct ReloadHub {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl ReloadHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `sink` and send it the connected acknowledgement.
    ///
    /// A sink that fails the ack is closed immediately and never joins the
    /// broadcast set.
    pub fn subscribe(&self, sink: Arc<dyn EventSink>) -> Result<SubscriberId, SinkClosed> {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Subscriber {
            id,
            sink: Arc::clone(&sink),
            state: SubscriberState::Connecting,
        });

        let ack = sink.send(&ReloadEvent::Connected);

        let mut subscribers = self.lock();
        match ack {
            Ok(()) => {
                if let Some(s) = subscribers.iter_mut().find(|s| s.id == id) {
                    s.state = SubscriberState::Open;
                }
                debug!(
                    "Live-reload subscriber {:?} connected ({} open)",
                    id,
                    open_count(&subscribers)
                );
                Ok(id)
            }
            Err(e) => {
                subscribers.retain(|s| s.id != id);
                warn!("Live-reload subscriber {:?} closed before acknowledgement", id);
                Err(e)
            }
        }
    }

    /// Subscribe with an in-process channel.
    pub fn subscribe_channel(
        &self,
    ) -> Result<(SubscriberId, mpsc::UnboundedReceiver<ReloadEvent>), SinkClosed> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(Arc::new(tx))?;
        Ok((id, rx))
    }

    /// Subscribe as a stream of server-sent-events frames, ready to be used
    /// as an HTTP response body. Dropping the stream closes the subscriber
    /// on the next broadcast.
    pub fn subscribe_stream(
        &self,
    ) -> Result<impl Stream<Item = String> + Send + 'static, SinkClosed> {
        let (_, rx) = self.subscribe_channel()?;
        Ok(UnboundedReceiverStream::new(rx).filter_map(|event| {
            let frame = event
                .to_sse_frame()
                .map_err(|e| warn!("Dropping unserialisable reload event: {}", e))
                .ok();
            future::ready(frame)
        }))
    }

    /// Close `id`. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Current state of `id`. Ids that are no longer in the set are `Closed`.
    pub fn state(&self, id: SubscriberId) -> SubscriberState {
        self.lock()
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.state)
            .unwrap_or(SubscriberState::Closed)
    }

    /// Number of open subscribers.
    pub fn subscriber_count(&self) -> usize {
        open_count(&self.lock())
    }

    /// Write `event` to every open subscriber, closing the ones that fail.
    pub fn broadcast(&self, event: &ReloadEvent) -> BroadcastReport {
        let snapshot: Vec<(SubscriberId, Arc<dyn EventSink>)> = self
            .lock()
            .iter()
            .filter(|s| s.state == SubscriberState::Open)
            .map(|s| (s.id, Arc::clone(&s.sink)))
            .collect();

        let mut report = BroadcastReport::default();
        for (id, sink) in snapshot {
            match sink.send(event) {
                Ok(()) => report.delivered += 1,
                Err(SinkClosed) => report.removed.push(id),
            }
        }

        if !report.removed.is_empty() {
            let mut subscribers = self.lock();
            for s in subscribers.iter_mut() {
                if report.removed.contains(&s.id) {
                    s.state = SubscriberState::Closed;
                }
            }
            subscribers.retain(|s| s.state != SubscriberState::Closed);
            debug!("Dropped {} closed live-reload subscribers", report.removed.len());
        }

        debug!("Broadcast {:?} to {} subscribers", event, report.delivered);
        report
    }

    /// Broadcast the reload message for a stabilised change.
    pub fn notify_change(&self, change: &ChangeEvent) -> BroadcastReport {
        self.broadcast(&change.to_reload())
    }
}

fn open_count(subscribers: &[Subscriber]) -> usize {
    subscribers
        .iter()
        .filter(|s| s.state == SubscriberState::Open)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live_reload::event::ChangeKind;
    use std::sync::atomic::AtomicBool;

    /// Records messages; fails every write once `broken` is set.
    #[derive(Default)]
    struct TestSink {
        received: Mutex<Vec<ReloadEvent>>,
        broken: AtomicBool,
    }

    impl TestSink {
        fn broken() -> Arc<Self> {
            let sink = Arc::new(Self::default());
            sink.broken.store(true, Ordering::SeqCst);
            sink
        }

        fn received(&self) -> Vec<ReloadEvent> {
            self.received.lock().unwrap().clone()
        }
    }

    impl EventSink for TestSink {
        fn send(&self, event: &ReloadEvent) -> Result<(), SinkClosed> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(SinkClosed);
            }
            self.received.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn changed(path: &str) -> ReloadEvent {
        ChangeEvent::new(ChangeKind::Changed, path).to_reload()
    }

    #[test]
    fn subscribe_sends_ack_first() {
        let hub = ReloadHub::new();
        let sink = Arc::new(TestSink::default());
        let id = hub.subscribe(sink.clone()).unwrap();

        assert_eq!(hub.state(id), SubscriberState::Open);
        hub.broadcast(&changed("a.txt"));
        assert_eq!(sink.received(), [ReloadEvent::Connected, changed("a.txt")]);
    }

    #[test]
    fn failing_ack_never_joins() {
        let hub = ReloadHub::new();
        assert_eq!(hub.subscribe(TestSink::broken()), Err(SinkClosed));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn failing_subscriber_does_not_block_others() {
        let hub = ReloadHub::new();
        let healthy = Arc::new(TestSink::default());
        let flaky = Arc::new(TestSink::default());
        let healthy_id = hub.subscribe(healthy.clone()).unwrap();
        let flaky_id = hub.subscribe(flaky.clone()).unwrap();

        flaky.broken.store(true, Ordering::SeqCst);
        let event = changed("slides/foo/metadata.json");
        let report = hub.broadcast(&event);

        assert_eq!(report.delivered, 1);
        assert_eq!(report.removed, [flaky_id]);
        assert_eq!(healthy.received().last(), Some(&event));
        assert_eq!(hub.state(flaky_id), SubscriberState::Closed);
        assert_eq!(hub.state(healthy_id), SubscriberState::Open);
        assert_eq!(hub.subscriber_count(), 1);

        // No further writes are attempted on the closed one.
        flaky.broken.store(false, Ordering::SeqCst);
        hub.broadcast(&changed("b"));
        assert_eq!(flaky.received(), [ReloadEvent::Connected]);
    }

    #[test]
    fn events_arrive_in_emission_order() {
        let hub = ReloadHub::new();
        let sink = Arc::new(TestSink::default());
        hub.subscribe(sink.clone()).unwrap();
        for p in ["1", "2", "3"] {
            hub.broadcast(&changed(p));
        }
        assert_eq!(
            sink.received()[1..],
            [changed("1"), changed("2"), changed("3")]
        );
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let hub = ReloadHub::new();
        let id = hub.subscribe(Arc::new(TestSink::default())).unwrap();
        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        assert_eq!(hub.state(id), SubscriberState::Closed);
    }

    #[tokio::test]
    async fn dropped_receiver_is_removed_on_next_broadcast() {
        let hub = ReloadHub::new();
        let (_, mut kept) = hub.subscribe_channel().unwrap();
        let (gone_id, gone) = hub.subscribe_channel().unwrap();
        drop(gone);

        let report = hub.broadcast(&changed("x"));
        assert_eq!(report.removed, [gone_id]);
        assert_eq!(kept.recv().await, Some(ReloadEvent::Connected));
        assert_eq!(kept.recv().await, Some(changed("x")));
    }

    #[tokio::test]
    async fn stream_yields_sse_frames() {
        let hub = ReloadHub::new();
        let mut stream = Box::pin(hub.subscribe_stream().unwrap());
        hub.notify_change(&ChangeEvent::new(ChangeKind::Added, "slides/new/metadata.json"));

        assert_eq!(
            stream.next().await.as_deref(),
            Some("data: {\"type\":\"connected\"}\n\n")
        );
        let frame = stream.next().await.unwrap();
        assert!(frame.starts_with("data: {"));
        assert!(frame.contains("\"reason\":\"file-added\""));
        assert!(frame.ends_with("}\n\n"));
    }
}
