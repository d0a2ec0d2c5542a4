//! Document node arena and mutation records
//!
//! A minimal document model: nodes live in an arena addressed by [`NodeId`]
//! handles, and attribute writes produce [`MutationRecord`]s carrying the
//! previous value. Records accumulate on the document and are drained by the
//! page context on a later cooperative turn, mirroring how mutation
//! notifications are delivered asynchronously rather than inline with the
//! write that caused them.
//!
//! Detector state is keyed by `NodeId`, never stored on the node itself, so
//! observed nodes stay free of instrumentation fields.

use fnv::FnvHashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomError {
    #[error("unknown document node {0:?}")]
    UnknownNode(NodeId),
}

/// Stable handle to a document node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

/// One attribute mutation, with the attribute's previous value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub attribute: String,
    pub old_value: Option<String>,
}

struct DomNode {
    display_name: String,
    attributes: FnvHashMap<String, String>,
}

/// Document subtree under observation.
pub struct Document {
    nodes: Vec<DomNode>,
    pending: Vec<MutationRecord>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Create a node with the given display name (e.g. `HTMLSpanElement`).
    pub fn create_node(&mut self, display_name: &str) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(DomNode {
            display_name: display_name.to_string(),
            attributes: FnvHashMap::default(),
        });
        id
    }

    /// Display name of a node, for access reports.
    pub fn display_name(&self, id: NodeId) -> Result<&str, DomError> {
        self.nodes
            .get(id.0 as usize)
            .map(|n| n.display_name.as_str())
            .ok_or(DomError::UnknownNode(id))
    }

    /// Write an attribute, recording a mutation with the previous value.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let node = self
            .nodes
            .get_mut(id.0 as usize)
            .ok_or(DomError::UnknownNode(id))?;
        let old_value = node.attributes.insert(name.to_string(), value.to_string());
        self.pending.push(MutationRecord {
            target: id,
            attribute: name.to_string(),
            old_value,
        });
        Ok(())
    }

    /// Write the node's inline style attribute.
    pub fn set_style(&mut self, id: NodeId, css: &str) -> Result<(), DomError> {
        self.set_attribute(id, "style", css)
    }

    /// Current attribute value.
    pub fn attribute(&self, id: NodeId, name: &str) -> Result<Option<&str>, DomError> {
        let node = self.nodes.get(id.0 as usize).ok_or(DomError::UnknownNode(id))?;
        Ok(node.attributes.get(name).map(|s| s.as_str()))
    }

    /// Drain mutations queued since the last delivery turn.
    pub fn take_pending_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.pending)
    }

    /// True when mutations are waiting for a delivery turn.
    pub fn has_pending_mutations(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
