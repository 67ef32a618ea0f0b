//! USB Power Delivery frames.
//!
//! A PD frame is the `0xFE` marker, one payload-length byte and the PD message
//! itself: a 2-byte message header followed by data objects or an extended
//! header and data block. Every location in the tree is relative to the marker
//! byte.

pub mod extended;
pub mod header;
pub mod objects;
pub mod pdo;
pub mod rdo;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::bitfield::{BitLoc, FieldSpec, decode_fields, read_u32};
use crate::constants::{
    PD_DATA_OBJECT_SIZE, PD_FRAME_HEADER_SIZE, PD_MARKER, PD_MESSAGE_HEADER_SIZE, PD_MESSAGE_OFFSET,
    PD_OBJECTS_OFFSET,
};
use crate::context::DecodeContext;
use crate::error::{DecodeError, FieldError};
use crate::metadata::{MetadataNode, Scalar};

use extended::decode_extended;
use header::{DataMessageType, ExtendedMessageType, MessageHeader, MessageKind, header_fields};
use objects::{
    ADO, BDO, BSDO, EPRMDO, EUDO, RMDO, SIDO, decode_opaque, decode_vdm_header, decode_word,
};
use pdo::{PdoRole, decode_pdo, decode_pdo_list};
use rdo::{decode_rdo, object_position};

pub const PD_MESSAGE: &str = "PD Message";
pub const MESSAGE_HEADER: &str = "Message Header";
pub const DATA_OBJECTS: &str = "Data Objects";

fn frame_type(code: u64) -> Option<&'static str> {
    (code == PD_MARKER as u64).then_some("PD")
}

const FRAME_HEADER: &[FieldSpec] = &[
    FieldSpec::label("Frame Type", 0, 8, frame_type),
    FieldSpec::unsigned("Payload Length", 8, 8),
];

/// Bits 12-14 of the message header, where the object count lives.
const NDO_LOC: BitLoc = BitLoc {
    byte_offset: PD_MESSAGE_OFFSET + 1,
    bit_offset: 4,
    bit_width: 3,
};

/// Total frame length announced by the payload-length byte.
pub fn declared_len(frame: &[u8]) -> Result<usize, DecodeError> {
    let declared = frame.get(1).ok_or(DecodeError::InsufficientData {
        expected: PD_FRAME_HEADER_SIZE,
        actual: frame.len(),
    })?;
    let total = *declared as usize + PD_FRAME_HEADER_SIZE;
    if frame.len() < total {
        return Err(DecodeError::InsufficientData {
            expected: total,
            actual: frame.len(),
        });
    }
    Ok(total)
}

/// Decode a PD frame. Bytes past the declared payload length are ignored.
///
/// `context` supplies the last Source_Capabilities tree so a Request can be
/// decoded against the PDO it selects. Structural problems inside the message
/// are reported as malformed nodes; only a frame shorter than its declared
/// length is an error.
pub fn decode_pd(frame: &Bytes, context: &DecodeContext) -> Result<MetadataNode, DecodeError> {
    let total = declared_len(frame)?;
    let frame = frame.slice(..total);

    // Both rows lie inside the two bytes checked above
    let mut children = decode_fields(&frame, 0, FRAME_HEADER).unwrap_or_else(|e| {
        vec![MetadataNode::malformed("Frame Header", &frame, BitLoc::bytes(0, 2), e)]
    });

    let end = match frame.get(PD_MESSAGE_OFFSET..PD_OBJECTS_OFFSET) {
        Some(bytes) => {
            let header = MessageHeader::from_bytes([bytes[0], bytes[1]]);
            decode_message(&frame, header, context, &mut children)
        }
        None => {
            if let Some(node) = MetadataNode::incomplete(
                MESSAGE_HEADER,
                &frame,
                PD_MESSAGE_OFFSET,
                FieldError::Truncated {
                    what: MESSAGE_HEADER,
                    declared: PD_MESSAGE_HEADER_SIZE,
                    available: total - PD_MESSAGE_OFFSET,
                },
            ) {
                warn!(total, "PD frame too short for a message header");
                children.push(node);
            }
            total
        }
    };

    if end < total {
        let rest = &frame[end..total];
        let name = if rest.iter().all(|b| *b == 0) { "Padding" } else { "Trailing Data" };
        children.push(MetadataNode::leaf(
            name,
            &frame,
            BitLoc::bytes(end, total - end),
            Scalar::Hex(hex::encode_upper(rest)),
        ));
    }

    Ok(MetadataNode::branch(PD_MESSAGE, &frame, BitLoc::bytes(0, total), children))
}

/// Decode the message header and body, returning the first byte after them.
fn decode_message(
    frame: &Bytes,
    header: MessageHeader,
    context: &DecodeContext,
    children: &mut Vec<MetadataNode>,
) -> usize {
    let kind = MessageKind::from(header);
    debug!(?kind, label = ?kind.label(), id = header.message_id(), "Decoding PD message");

    let header_loc = BitLoc::bytes(PD_MESSAGE_OFFSET, PD_MESSAGE_HEADER_SIZE);
    children.push(
        decode_fields(frame, PD_MESSAGE_OFFSET, &header_fields(kind))
            .map(|fields| MetadataNode::branch(MESSAGE_HEADER, frame, header_loc, fields))
            .unwrap_or_else(|e| MetadataNode::malformed(MESSAGE_HEADER, frame, header_loc, e)),
    );

    match kind {
        MessageKind::Control(_) => PD_OBJECTS_OFFSET,
        MessageKind::Data(code) => {
            let count = header.num_data_objects() as usize;
            let needed = count * PD_DATA_OBJECT_SIZE;
            let available = frame.len() - PD_OBJECTS_OFFSET;
            if needed > available {
                let err = FieldError::Truncated {
                    what: DATA_OBJECTS,
                    declared: needed,
                    available,
                };
                warn!(%err, "Data objects exceed payload");
                children.push(
                    MetadataNode::incomplete(DATA_OBJECTS, frame, PD_OBJECTS_OFFSET, err.clone())
                        .unwrap_or_else(|| {
                            MetadataNode::malformed(DATA_OBJECTS, frame, NDO_LOC, err)
                        }),
                );
                return frame.len();
            }
            let msg = DataMessageType::try_from(code).ok();
            let objects = decode_data_objects(frame, count, msg, context);
            children.push(MetadataNode::branch(
                DATA_OBJECTS,
                frame,
                BitLoc::bytes(PD_OBJECTS_OFFSET, needed),
                objects,
            ));
            PD_OBJECTS_OFFSET + needed
        }
        MessageKind::Extended(code) => {
            let msg = ExtendedMessageType::try_from(code).ok();
            let section = decode_extended(frame, PD_OBJECTS_OFFSET, msg);
            children.extend(section.nodes);
            section.end
        }
    }
}

fn object_offset(index: usize) -> usize {
    PD_OBJECTS_OFFSET + index * PD_DATA_OBJECT_SIZE
}

/// Decode `count` data objects. All of them are known to lie inside `frame`.
fn decode_data_objects(
    frame: &Bytes,
    count: usize,
    msg: Option<DataMessageType>,
    context: &DecodeContext,
) -> Vec<MetadataNode> {
    let first = object_offset(0);
    let (mut nodes, rest) = match msg {
        Some(DataMessageType::SourceCapabilities) => {
            return decode_pdo_list(frame, first, count, PdoRole::Source);
        }
        Some(DataMessageType::SinkCapabilities) => {
            return decode_pdo_list(frame, first, count, PdoRole::Sink);
        }
        Some(DataMessageType::Request) => {
            let source_pdo = object_position(frame, first)
                .ok()
                .and_then(|position| context.source_pdo(position));
            (vec![object("RDO", first, frame, decode_rdo(frame, first, "RDO", source_pdo))], 1)
        }
        Some(DataMessageType::EprRequest) if count >= 2 => {
            let copy = object_offset(1);
            let source_pdo = read_u32(frame, copy).ok();
            (
                vec![
                    object("RDO", first, frame, decode_rdo(frame, first, "RDO", source_pdo)),
                    object(
                        "PDO Copy",
                        copy,
                        frame,
                        decode_pdo(frame, copy, "PDO Copy", PdoRole::Source),
                    ),
                ],
                2,
            )
        }
        Some(DataMessageType::EprRequest) => {
            (vec![object("RDO", first, frame, decode_rdo(frame, first, "RDO", None))], 1)
        }
        Some(DataMessageType::VendorDefined) => {
            let header = decode_vdm_header(frame, first);
            let mut nodes = vec![object("VDM Header", first, frame, header)];
            nodes.extend((1..count).map(|i| {
                let name = format!("VDO {}", i);
                opaque_object(frame, &name, object_offset(i))
            }));
            return nodes;
        }
        Some(simple) => match single_word_layout(simple) {
            Some((name, layout)) => {
                let word = decode_word(frame, first, name, layout);
                (vec![object(name, first, frame, word)], 1)
            }
            None => (Vec::new(), 0),
        },
        None => (Vec::new(), 0),
    };

    nodes.extend((rest..count).map(|i| {
        let name = format!("Data Object {}", i + 1);
        opaque_object(frame, &name, object_offset(i))
    }));
    nodes
}

fn single_word_layout(msg: DataMessageType) -> Option<(&'static str, &'static [FieldSpec])> {
    match msg {
        DataMessageType::Bist => Some(("BDO", BDO)),
        DataMessageType::BatteryStatus => Some(("BSDO", BSDO)),
        DataMessageType::Alert => Some(("ADO", ADO)),
        DataMessageType::EnterUsb => Some(("EUDO", EUDO)),
        DataMessageType::EprMode => Some(("EPRMDO", EPRMDO)),
        DataMessageType::SourceInfo => Some(("Source Info", SIDO)),
        DataMessageType::Revision => Some(("Revision", RMDO)),
        _ => None,
    }
}

/// Keep a decoded object, or flag it in place.
fn object(
    name: &str,
    offset: usize,
    frame: &Bytes,
    result: Result<MetadataNode, FieldError>,
) -> MetadataNode {
    result.unwrap_or_else(|e| {
        MetadataNode::malformed(name, frame, BitLoc::bytes(offset, PD_DATA_OBJECT_SIZE), e)
    })
}

fn opaque_object(frame: &Bytes, name: &str, offset: usize) -> MetadataNode {
    object(name, offset, frame, decode_opaque(frame, offset, name))
}
