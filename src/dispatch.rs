//! Access event batching and delivery
//!
//! The dispatcher owns the pending event queue and a debounced flush: bursts
//! of rapid probing coalesce into one batch, delivered fire-and-forget to an
//! external collector through an [`EventSink`]. Enqueue runs synchronously on
//! the hot path (a trapped read); delivery happens on a later cooperative turn
//! once a quiet interval has elapsed with no further events, so observation
//! never blocks the page being observed.

use crate::schedule::{Debounce, Tick};
use crossbeam::channel::{self, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Quiet interval between the last enqueue and the flush, in ticks.
pub const QUIET_INTERVAL: Tick = 100;

/// One observed access to an instrumented property or method.
///
/// Wire shape: `{"obj": ..., "prop": ..., "scriptUrl": ...}` with `scriptUrl`
/// omitted when attribution failed or is intentionally absent (the
/// mutation-heuristic event).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    /// Display name of the instrumented object (`Navigator`, `Screen`, ...)
    pub obj: String,
    /// Property or method name that was accessed
    pub prop: String,
    /// Originating script, file-level (no line/column suffix)
    #[serde(rename = "scriptUrl", skip_serializing_if = "Option::is_none", default)]
    pub script_url: Option<String>,
}

impl AccessEvent {
    pub fn new(obj: &str, prop: &str, script_url: Option<String>) -> Self {
        Self {
            obj: obj.to_string(),
            prop: prop.to_string(),
            script_url,
        }
    }
}

/// One flushed batch, tagged with the page-load correlation id so multiple
/// injected instances do not cross-talk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchNotification {
    pub channel: String,
    pub events: Vec<AccessEvent>,
}

/// Outbound delivery boundary. Implementations must not block and must not
/// fail observably; a missing collector is not an error.
pub trait EventSink {
    fn deliver(&self, batch: BatchNotification);
}

/// Sink that hands batches to a collector thread over a lock-free channel.
/// Batches are dropped silently once the receiving side is gone.
pub struct ChannelSink {
    sender: Sender<BatchNotification>,
}

impl ChannelSink {
    /// Create the sink plus the receiver handed to the external collector.
    pub fn new() -> (Self, Receiver<BatchNotification>) {
        let (sender, receiver) = channel::unbounded();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, batch: BatchNotification) {
        // fire-and-forget: a disconnected receiver just discards the batch
        let _ = self.sender.send(batch);
    }
}

/// Default sink when no collector is attached: batches go to the trace log.
pub struct TraceSink;

impl EventSink for TraceSink {
    fn deliver(&self, batch: BatchNotification) {
        debug!(
            channel = %batch.channel,
            events = batch.events.len(),
            "flushed access event batch without a collector"
        );
    }
}

/// Debounced batching dispatcher. One instance per page-load context; the
/// queue is never observed from outside except through a flush.
pub struct EventDispatcher {
    channel: String,
    queue: Vec<AccessEvent>,
    debounce: Debounce,
    sink: Box<dyn EventSink>,
}

impl EventDispatcher {
    pub fn new(channel: &str, sink: Box<dyn EventSink>) -> Self {
        Self::with_quiet_interval(channel, sink, QUIET_INTERVAL)
    }

    /// Constructor with an explicit quiet interval, for tests that shrink it.
    pub fn with_quiet_interval(channel: &str, sink: Box<dyn EventSink>, quiet: Tick) -> Self {
        Self {
            channel: channel.to_string(),
            queue: Vec::new(),
            debounce: Debounce::new(quiet),
            sink,
        }
    }

    /// Append an event and re-arm the debounced flush.
    pub fn enqueue(&mut self, event: AccessEvent, now: Tick) {
        debug!(obj = %event.obj, prop = %event.prop, "access event enqueued");
        self.queue.push(event);
        self.debounce.poke(now);
    }

    /// Flush if the quiet interval has elapsed. Returns true when a batch was
    /// delivered.
    pub fn poll(&mut self, now: Tick) -> bool {
        if !self.debounce.fire_if_due(now) {
            return false;
        }
        self.flush();
        true
    }

    /// Number of events awaiting the next flush.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Deadline of the pending flush, if one is armed.
    pub fn next_deadline(&self) -> Option<Tick> {
        self.debounce.deadline()
    }

    /// Atomic drain-and-deliver of the whole queue.
    fn flush(&mut self) {
        let events = std::mem::take(&mut self.queue);
        if events.is_empty() {
            return;
        }
        debug!(events = events.len(), channel = %self.channel, "delivering batch");
        self.sink.deliver(BatchNotification {
            channel: self.channel.clone(),
            events,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> (EventDispatcher, Receiver<BatchNotification>) {
        let (sink, rx) = ChannelSink::new();
        (EventDispatcher::new("test-channel", Box::new(sink)), rx)
    }

    fn event(prop: &str) -> AccessEvent {
        AccessEvent::new("Navigator", prop, Some("https://x/y.js".into()))
    }

    #[test]
    fn test_burst_coalesces_into_one_batch_in_order() {
        let (mut dispatcher, rx) = dispatcher();
        dispatcher.enqueue(event("userAgent"), 0);
        dispatcher.enqueue(event("platform"), 30);
        dispatcher.enqueue(event("language"), 60);

        // quiet interval measured from the last enqueue
        assert!(!dispatcher.poll(159));
        assert!(dispatcher.poll(160));

        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.channel, "test-channel");
        let props: Vec<&str> = batch.events.iter().map(|e| e.prop.as_str()).collect();
        assert_eq!(props, vec!["userAgent", "platform", "language"]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_separated_enqueues_produce_separate_batches() {
        let (mut dispatcher, rx) = dispatcher();
        dispatcher.enqueue(event("userAgent"), 0);
        assert!(dispatcher.poll(150));
        dispatcher.enqueue(event("platform"), 200);
        assert!(dispatcher.poll(350));

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.events.len(), 1);
        assert_eq!(first.events[0].prop, "userAgent");
        assert_eq!(second.events.len(), 1);
        assert_eq!(second.events[0].prop, "platform");
    }

    #[test]
    fn test_poll_without_enqueue_is_a_no_op() {
        let (mut dispatcher, rx) = dispatcher();
        assert!(!dispatcher.poll(10_000));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_flush_drains_queue() {
        let (mut dispatcher, _rx) = dispatcher();
        dispatcher.enqueue(event("vendor"), 0);
        assert_eq!(dispatcher.pending(), 1);
        dispatcher.poll(100);
        assert_eq!(dispatcher.pending(), 0);
        assert!(dispatcher.next_deadline().is_none());
    }

    #[test]
    fn test_delivery_with_dropped_receiver_is_swallowed() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        let mut dispatcher = EventDispatcher::new("orphan", Box::new(sink));
        dispatcher.enqueue(event("userAgent"), 0);
        // must not panic or error
        assert!(dispatcher.poll(100));
    }

    #[test]
    fn test_wire_shape_omits_absent_script_url() {
        let with_url = AccessEvent::new("Navigator", "userAgent", Some("https://x/y.js".into()));
        let without = AccessEvent::new("HTMLSpanElement", "style.fontFamily", None);
        assert_eq!(
            serde_json::to_string(&with_url).unwrap(),
            r#"{"obj":"Navigator","prop":"userAgent","scriptUrl":"https://x/y.js"}"#
        );
        assert_eq!(
            serde_json::to_string(&without).unwrap(),
            r#"{"obj":"HTMLSpanElement","prop":"style.fontFamily"}"#
        );
    }
}
