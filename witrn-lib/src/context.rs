//! Rolling decode context.
//!
//! Some PD messages can only be fully decoded with knowledge of an earlier
//! one: a Request selects a PDO by position from the last Source_Capabilities.
//! [`DecodeContext`] keeps the most recent tree of each relevant kind.
//!
//! One context belongs to one capture stream. The type is `Send + Sync`, but
//! updates need `&mut`, so two streams sharing a context (behind a lock or
//! otherwise) will interpret each other's Requests. Give each stream its own.

use std::sync::Arc;
use tracing::trace;

use crate::metadata::MetadataNode;
use crate::pd::extended::PAYLOAD;
use crate::pd::header::{DataMessageType, ExtendedMessageType, MESSAGE_TYPE};
use crate::pd::{DATA_OBJECTS, MESSAGE_HEADER};

/// Which slots a call to [`DecodeContext::update`] overwrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextUpdate {
    pub source_capabilities: bool,
    pub extended: bool,
    pub request: bool,
}

impl ContextUpdate {
    pub fn any(&self) -> bool {
        self.source_capabilities || self.extended || self.request
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecodeContext {
    last_source_capabilities: Option<Arc<MetadataNode>>,
    last_extended: Option<Arc<MetadataNode>>,
    last_request: Option<Arc<MetadataNode>>,
}

impl DecodeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything, e.g. at a capture session boundary.
    pub fn reset(&mut self) {
        trace!("Resetting decode context");
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.last_source_capabilities.is_none()
            && self.last_extended.is_none()
            && self.last_request.is_none()
    }

    pub fn last_source_capabilities(&self) -> Option<&Arc<MetadataNode>> {
        self.last_source_capabilities.as_ref()
    }

    pub fn last_extended(&self) -> Option<&Arc<MetadataNode>> {
        self.last_extended.as_ref()
    }

    pub fn last_request(&self) -> Option<&Arc<MetadataNode>> {
        self.last_request.as_ref()
    }

    /// Raw word of PDO `position` (1-based) of the last Source_Capabilities,
    /// if that PDO was decoded cleanly.
    pub fn source_pdo(&self, position: usize) -> Option<u32> {
        let tree = self.last_source_capabilities.as_ref()?;
        let name = format!("PDO {}", position);
        let pdo = capability_list(tree)?.get(&name)?;
        if pdo.has_errors() {
            return None;
        }
        let word: [u8; 4] = pdo.raw().as_ref().try_into().ok()?;
        Some(u32::from_le_bytes(word))
    }

    /// Store `tree` in every slot whose predicate holds. Earlier entries are
    /// overwritten unconditionally.
    pub fn update(&mut self, tree: &Arc<MetadataNode>) -> ContextUpdate {
        let update = ContextUpdate {
            source_capabilities: carries_source_capabilities(tree),
            extended: provides_extended(tree),
            request: carries_request(tree),
        };
        if update.source_capabilities {
            self.last_source_capabilities = Some(Arc::clone(tree));
        }
        if update.extended {
            self.last_extended = Some(Arc::clone(tree));
        }
        if update.request {
            self.last_request = Some(Arc::clone(tree));
        }
        if update.any() {
            trace!(?update, "Decode context updated");
        }
        update
    }
}

fn message_type(tree: &MetadataNode) -> Option<&'static str> {
    tree.path(&[MESSAGE_HEADER, MESSAGE_TYPE])?.label()
}

fn is_extended(tree: &MetadataNode) -> bool {
    tree.path(&[MESSAGE_HEADER, "Extended"])
        .and_then(MetadataNode::scalar)
        .and_then(|s| s.as_u64())
        == Some(1)
}

fn capability_list(tree: &MetadataNode) -> Option<&MetadataNode> {
    tree.get(DATA_OBJECTS).or_else(|| tree.get(PAYLOAD))
}

/// A Source_Capabilities or EPR_Source_Capabilities message with a usable
/// PDO list.
pub fn carries_source_capabilities(tree: &MetadataNode) -> bool {
    let source_caps: &'static str = DataMessageType::SourceCapabilities.into();
    let epr_source_caps: &'static str = ExtendedMessageType::EprSourceCapabilities.into();
    let Some(label) = message_type(tree) else {
        return false;
    };
    let expected = if is_extended(tree) { epr_source_caps } else { source_caps };
    label == expected
        && capability_list(tree)
            .is_some_and(|list| !list.is_malformed() && list.get("PDO 1").is_some())
}

/// A Request or EPR_Request message whose RDO decoded.
pub fn carries_request(tree: &MetadataNode) -> bool {
    let request: &'static str = DataMessageType::Request.into();
    let epr_request: &'static str = DataMessageType::EprRequest.into();
    !is_extended(tree)
        && message_type(tree).is_some_and(|label| label == request || label == epr_request)
        && tree
            .path(&[DATA_OBJECTS, "RDO"])
            .is_some_and(|rdo| !rdo.is_malformed())
}

/// An extended message whose payload is present in this frame.
pub fn provides_extended(tree: &MetadataNode) -> bool {
    is_extended(tree) && tree.get(PAYLOAD).is_some_and(|payload| !payload.is_malformed())
}
