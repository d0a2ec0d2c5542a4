// Property-based tests for the attribution and batching invariants

use probewatch::dispatch::{AccessEvent, ChannelSink, EventDispatcher, QUIET_INTERVAL};
use probewatch::origin::strip_position_suffix;
use proptest::prelude::*;

proptest! {
    /// Any trailing :line:column pair is removed in full.
    #[test]
    fn prop_strip_removes_appended_position(
        url in "[a-z]{1,8}://[a-z]{1,12}/[a-z]{1,12}\\.js",
        line in 1u32..100_000,
        column in 1u32..100_000,
    ) {
        let with_position = format!("{}:{}:{}", url, line, column);
        prop_assert_eq!(strip_position_suffix(&with_position), url);
    }

    /// Strings without a trailing :line:column pass through unchanged.
    #[test]
    fn prop_strip_preserves_suffixless_input(url in "[a-z]{1,8}://[a-z]{1,12}/[a-z]{1,12}\\.js") {
        prop_assert_eq!(strip_position_suffix(&url), url.clone());
    }

    /// N enqueues with every gap below the quiet interval coalesce into one
    /// flush holding all N events in call order.
    #[test]
    fn prop_sub_quiet_gaps_coalesce(gaps in prop::collection::vec(0..QUIET_INTERVAL, 1..40)) {
        let (sink, rx) = ChannelSink::new();
        let mut dispatcher = EventDispatcher::new("prop", Box::new(sink));

        let mut now = 0;
        for (i, gap) in gaps.iter().enumerate() {
            dispatcher.enqueue(
                AccessEvent::new("Navigator", &format!("prop{}", i), None),
                now,
            );
            now += gap;
            dispatcher.poll(now);
        }
        prop_assert!(rx.try_recv().is_err(), "flushed before the quiet interval elapsed");

        now += QUIET_INTERVAL;
        prop_assert!(dispatcher.poll(now));

        let batch = rx.try_recv().unwrap();
        prop_assert_eq!(batch.events.len(), gaps.len());
        for (i, event) in batch.events.iter().enumerate() {
            prop_assert_eq!(event.prop.clone(), format!("prop{}", i));
        }
        prop_assert!(rx.try_recv().is_err());
    }

    /// Gaps at or above the quiet interval split batches; total event count
    /// and order are preserved across the splits.
    #[test]
    fn prop_batch_splits_preserve_count_and_order(
        gaps in prop::collection::vec(0..(3 * QUIET_INTERVAL), 1..40),
    ) {
        let (sink, rx) = ChannelSink::new();
        let mut dispatcher = EventDispatcher::new("prop", Box::new(sink));

        let mut now = 0;
        for (i, gap) in gaps.iter().enumerate() {
            dispatcher.enqueue(
                AccessEvent::new("Navigator", &format!("prop{}", i), None),
                now,
            );
            now += gap;
            dispatcher.poll(now);
        }
        now += QUIET_INTERVAL;
        dispatcher.poll(now);

        let mut collected = Vec::new();
        while let Ok(batch) = rx.try_recv() {
            prop_assert!(!batch.events.is_empty());
            collected.extend(batch.events);
        }
        prop_assert_eq!(collected.len(), gaps.len());
        for (i, event) in collected.iter().enumerate() {
            prop_assert_eq!(event.prop.clone(), format!("prop{}", i));
        }
    }

    /// AccessEvent survives a wire round trip, including an absent scriptUrl.
    #[test]
    fn prop_access_event_round_trips(
        obj in "[A-Za-z.]{1,24}",
        prop in "[A-Za-z.]{1,24}",
        script_url in prop::option::of("[ -~]{0,64}"),
    ) {
        let event = AccessEvent::new(&obj, &prop, script_url);
        let json = serde_json::to_string(&event).unwrap();
        let decoded: AccessEvent = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(decoded, event);
    }
}
