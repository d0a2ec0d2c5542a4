//! Font enumeration heuristic
//!
//! Font-enumeration probes cycle many font-family names through one element's
//! style to test glyph metrics. The detector watches style-attribute mutations
//! across the document, tracks the distinct previous font-family values per
//! node, and fires once when any node exceeds the threshold. After firing the
//! whole detector retires; a single positive signal is enough per page load.
//!
//! Mutation delivery is asynchronous, so the triggering script's stack is gone
//! by the time a record arrives: the emitted event intentionally carries no
//! origin attribution.

use crate::dispatch::{AccessEvent, EventDispatcher};
use crate::dom::{Document, MutationRecord, NodeId};
use crate::schedule::Tick;
use fnv::FnvHashMap;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};

/// A node exceeding this many distinct font-family values is flagged.
///
/// Heuristically chosen: two distinct values happen during legitimate font
/// changes, three or more on one node is characteristic of enumeration. The
/// false-positive rate on real pages has not been re-derived; treat with care
/// before tuning.
pub const FONT_PROBE_THRESHOLD: usize = 2;

/// Synthetic property name carried by the enumeration-detected event.
pub const FONT_PROBE_MARKER: &str = "style.fontFamily";

fn font_family_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"font-family: ([^;]+);").expect("static regex"))
}

/// First font-family declaration value in an inline style string.
fn extract_font_family(style: &str) -> Option<String> {
    font_family_re()
        .captures(style)
        .map(|caps| caps[1].to_string())
}

/// Per-node font probe detector. Nodes move unseen → tracking → fired; the
/// detector as a whole is active until its first fire, then retired (the page
/// context drops it, cancelling the subscription).
pub struct FontProbeDetector {
    ledger: FnvHashMap<NodeId, Vec<String>>,
}

impl FontProbeDetector {
    pub fn new() -> Self {
        Self {
            ledger: FnvHashMap::default(),
        }
    }

    /// Process one delivered batch of mutation records.
    ///
    /// Returns `true` when the detector fired and must be retired; the
    /// remainder of the batch is not examined.
    pub fn process(
        &mut self,
        records: &[MutationRecord],
        document: &Document,
        dispatcher: &mut EventDispatcher,
        now: Tick,
    ) -> bool {
        for record in records {
            if record.attribute != "style" {
                continue;
            }
            // only the previous value matters: the probe has already moved on
            // to the next font by the time the record is delivered
            let Some(old_value) = record.old_value.as_deref() else {
                continue;
            };
            let Some(family) = extract_font_family(old_value) else {
                continue;
            };

            let fonts = self.ledger.entry(record.target).or_default();
            if !fonts.iter().any(|f| f == &family) {
                fonts.push(family);
            }
            debug!(node = ?record.target, distinct = fonts.len(), "font-family mutation tracked");

            if fonts.len() > FONT_PROBE_THRESHOLD {
                let obj = document
                    .display_name(record.target)
                    .unwrap_or("Node")
                    .to_string();
                info!(node = %obj, "font enumeration detected");
                dispatcher.enqueue(AccessEvent::new(&obj, FONT_PROBE_MARKER, None), now);
                return true;
            }
        }
        false
    }

    /// Number of nodes currently being tracked.
    pub fn tracked_nodes(&self) -> usize {
        self.ledger.len()
    }
}

impl Default for FontProbeDetector {
    fn default() -> Self {
        Self::new()
    }
}
