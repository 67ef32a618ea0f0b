use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use strum_macros::{Display, IntoStaticStr};
use tracing::debug;

use crate::constants::{GENERAL_FRAME_SIZE, GENERAL_MARKER, PD_MARKER};
use crate::context::{ContextUpdate, DecodeContext};
use crate::error::DecodeError;
use crate::general::decode_general;
use crate::metadata::MetadataNode;
use crate::pd::header::MESSAGE_TYPE;
use crate::pd::{MESSAGE_HEADER, declared_len, decode_pd};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    General,
    Pd,
}

/// A frame whose marker and length have been checked, trimmed to the bytes
/// its decoder reads.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    General(Bytes),
    Pd(Bytes),
}

impl TryFrom<Bytes> for Frame {
    type Error = DecodeError;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        let marker = *bytes.first().ok_or(DecodeError::EmptyFrame)?;
        match marker {
            GENERAL_MARKER => {
                if bytes.len() < GENERAL_FRAME_SIZE {
                    return Err(DecodeError::InsufficientData {
                        expected: GENERAL_FRAME_SIZE,
                        actual: bytes.len(),
                    });
                }
                Ok(Frame::General(bytes.slice(..GENERAL_FRAME_SIZE)))
            }
            PD_MARKER => {
                let total = declared_len(&bytes)?;
                Ok(Frame::Pd(bytes.slice(..total)))
            }
            other => Err(DecodeError::UnknownMarker(other)),
        }
    }
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::General(_) => FrameKind::General,
            Frame::Pd(_) => FrameKind::Pd,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        match self {
            Frame::General(bytes) | Frame::Pd(bytes) => bytes,
        }
    }

    /// Decode without touching any context.
    pub fn decode(&self, context: &DecodeContext) -> Result<MetadataNode, DecodeError> {
        match self {
            Frame::General(bytes) => decode_general(bytes),
            Frame::Pd(bytes) => decode_pd(bytes, context),
        }
    }
}

/// Result of one [`Decoder::decode`] call.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub kind: FrameKind,
    pub tree: Arc<MetadataNode>,
    /// Message Type label of a PD frame, when the header was decoded and the
    /// code is known.
    pub message_type: Option<&'static str>,
    pub context_update: ContextUpdate,
}

/// Decodes a stream of frames, carrying the context from one PD message to the
/// next.
#[derive(Debug, Default)]
pub struct Decoder {
    context: DecodeContext,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> &DecodeContext {
        &self.context
    }

    pub fn reset(&mut self) {
        self.context.reset();
    }

    pub fn decode(&mut self, bytes: impl Into<Bytes>) -> Result<Decoded, DecodeError> {
        let frame = Frame::try_from(bytes.into())?;
        let kind = frame.kind();
        debug!(%kind, len = frame.bytes().len(), "Dispatching frame");

        let tree = Arc::new(frame.decode(&self.context)?);
        let (message_type, context_update) = match kind {
            FrameKind::General => (None, ContextUpdate::default()),
            FrameKind::Pd => (
                tree.path(&[MESSAGE_HEADER, MESSAGE_TYPE]).and_then(MetadataNode::label),
                self.context.update(&tree),
            ),
        };

        Ok(Decoded {
            kind,
            tree,
            message_type,
            context_update,
        })
    }
}
