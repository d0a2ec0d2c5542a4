//! Probewatch - runtime instrumentation against browser fingerprinting
//!
//! This library detects and partially mitigates fingerprinting probes by
//! intercepting reads of a curated set of host object properties and methods,
//! attributing each access to the script that performed it, and optionally
//! substituting spoofed values so the environment looks more generic.
//!
//! Four pieces carry the design:
//!
//! - the interception engine ([`trap`]): idempotent, guarded trap installation
//!   with configurable value overrides
//! - the origin resolver ([`origin`]): call-stack attribution of the accessing
//!   script, including through evaluated code
//! - the event dispatcher ([`dispatch`]): debounced batching of access events
//!   delivered fire-and-forget to an external collector
//! - the mutation heuristic ([`mutation`]): a per-node detector that flags
//!   font-enumeration probing from repeated style mutations
//!
//! Everything runs under a cooperative single-threaded model on a virtual
//! clock ([`schedule`]); [`context::PageContext`] owns one page load's state
//! and [`bootstrap`] wires a configured instance together.
//!
//! ```
//! use probewatch::{bootstrap_with_sink, ChannelSink, InstrumentationConfig};
//!
//! let config = InstrumentationConfig::default_profile();
//! let (sink, collector) = ChannelSink::new();
//! let mut page = bootstrap_with_sink(&config, Box::new(sink));
//!
//! // a page script reads a trapped property
//! let frame = page.enter_script("https://cdn.example/fp.js", 3, 14);
//! let ua = page.read_property_of("Navigator", "userAgent").unwrap();
//! assert_eq!(ua.as_str().unwrap(), "Mozilla/5.0 (Windows NT 6.1; rv:24.0) Gecko/20100101 Firefox/24.0");
//! drop(frame);
//!
//! // after a quiet interval the batch reaches the collector
//! page.advance(100);
//! let batch = collector.try_recv().unwrap();
//! assert_eq!(batch.events[0].script_url.as_deref(), Some("https://cdn.example/fp.js"));
//! ```

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod dom;
pub mod host;
pub mod mutation;
pub mod origin;
pub mod schedule;
pub mod trap;
pub mod value;

pub use bootstrap::{bootstrap, bootstrap_with_sink};
pub use config::InstrumentationConfig;
pub use context::PageContext;
pub use dispatch::{AccessEvent, BatchNotification, ChannelSink, EventSink, TraceSink};
pub use value::Value;
