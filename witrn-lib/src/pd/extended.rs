//! Extended messages: the extended header and the data blocks it carries.
//!
//! A single frame holds at most one chunk. Payloads are only interpreted when
//! the whole message fits in that chunk; anything else stays opaque.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::bitfield::{BitLoc, FieldSpec, Interpretation, decode_fields, quantity};
use crate::constants::{
    PD_DATA_OBJECT_SIZE, PD_EXTENDED_HEADER_SIZE, PD_MAX_CHUNK_SIZE, PD_MESSAGE_HEADER_SIZE,
};
use crate::error::FieldError;
use crate::metadata::{MetadataNode, Scalar, Unit};
use crate::pd::header::{EXTENDED_HEADER_FIELDS, ExtendedHeader, ExtendedMessageType};
use crate::pd::pdo::{PdoRole, decode_pdo};

pub const EXTENDED_HEADER: &str = "Extended Header";
pub const PAYLOAD: &str = "Payload";

/// Bytes of message data the chunk in this frame should carry.
pub fn chunk_len(header: &ExtendedHeader) -> usize {
    let size = header.data_size() as usize;
    if !header.chunked() {
        return size;
    }
    let sent = PD_MAX_CHUNK_SIZE * header.chunk_number() as usize;
    size.saturating_sub(sent).min(PD_MAX_CHUNK_SIZE)
}

/// True when this chunk holds the entire message.
fn is_complete(header: &ExtendedHeader) -> bool {
    !header.chunked()
        || (header.chunk_number() == 0 && header.data_size() as usize <= PD_MAX_CHUNK_SIZE)
}

fn tenth_watt_hours(raw: u64) -> Option<Scalar> {
    if raw == 0xFFFF {
        Some(Scalar::Text("Unknown".to_string()))
    } else {
        quantity(raw as f64 * 0.1, Unit::WattHour)
    }
}

fn hex16(raw: u64) -> Option<Scalar> {
    Some(Scalar::Hex(format!("{:04X}", raw)))
}

fn pps_voltage(raw: u64) -> Option<Scalar> {
    (raw != 0xFFFF).then(|| quantity(raw as f64 * 0.02, Unit::Volt)).flatten()
}

fn pps_current(raw: u64) -> Option<Scalar> {
    (raw != 0xFF).then(|| quantity(raw as f64 * 0.05, Unit::Ampere)).flatten()
}

fn internal_temperature(raw: u64) -> Option<Scalar> {
    match raw {
        0 => Some(Scalar::Text("Not Supported".to_string())),
        1 => Some(Scalar::Text("Below 2 °C".to_string())),
        t => quantity(t as f64, Unit::Celsius),
    }
}

fn temperature_flag(code: u64) -> Option<&'static str> {
    match code {
        0 => Some("Not Supported"),
        1 => Some("Normal"),
        2 => Some("Warning"),
        3 => Some("Over Temperature"),
        _ => None,
    }
}

fn extended_control_type(code: u64) -> Option<&'static str> {
    match code {
        1 => Some("EPR_Get_Source_Cap"),
        2 => Some("EPR_Get_Sink_Cap"),
        3 => Some("EPR_KeepAlive"),
        4 => Some("EPR_KeepAlive_Ack"),
        _ => None,
    }
}

const fn byte(name: &'static str, at: u16) -> FieldSpec {
    FieldSpec::unsigned(name, at * 8, 8)
}

const fn custom(name: &'static str, at: u16, width: u8, f: fn(u64) -> Option<Scalar>) -> FieldSpec {
    FieldSpec::new(name, at * 8, width, Interpretation::Custom(f))
}

const SCEDB: &[FieldSpec] = &[
    custom("VID", 0, 16, hex16),
    custom("PID", 2, 16, hex16),
    FieldSpec::raw("XID", 32, 32),
    byte("FW Version", 8),
    byte("HW Version", 9),
    byte("Voltage Regulation", 10),
    FieldSpec::milli("Holdup Time", 88, 8, 1.0, Unit::Second),
    byte("Compliance", 12),
    byte("Touch Current", 13),
    FieldSpec::raw("Peak Current 1", 112, 16),
    FieldSpec::raw("Peak Current 2", 128, 16),
    FieldSpec::raw("Peak Current 3", 144, 16),
    byte("Touch Temp", 20),
    byte("Source Inputs", 21),
    byte("Number of Batteries", 22),
    FieldSpec::milli("Source PDP", 184, 8, 1000.0, Unit::Watt),
    FieldSpec::milli("EPR Source PDP", 192, 8, 1000.0, Unit::Watt),
];

const SSDB: &[FieldSpec] = &[
    custom("Internal Temp", 0, 8, internal_temperature),
    FieldSpec::flag("External Power", 9),
    FieldSpec::flag("External Power AC", 10),
    FieldSpec::flag("Internal Power Battery", 11),
    FieldSpec::flag("Internal Power Non-Battery", 12),
    byte("Present Battery Input", 2),
    FieldSpec::flag("OCP Event", 25),
    FieldSpec::flag("OTP Event", 26),
    FieldSpec::flag("OVP Event", 27),
    FieldSpec::flag("CF Mode", 28),
    FieldSpec::label("Temperature Status", 33, 2, temperature_flag),
    byte("Power Status", 5),
    byte("Power State Change", 6),
];

const PPSSDB: &[FieldSpec] = &[
    custom("Output Voltage", 0, 16, pps_voltage),
    custom("Output Current", 2, 8, pps_current),
    FieldSpec::raw("Reserved", 24, 1),
    FieldSpec::label("PTF", 25, 2, temperature_flag),
    FieldSpec::flag("OMF", 27),
    FieldSpec::raw("Reserved", 28, 4),
];

const BCDB: &[FieldSpec] = &[
    custom("VID", 0, 16, hex16),
    custom("PID", 2, 16, hex16),
    custom("Battery Design Capacity", 4, 16, tenth_watt_hours),
    custom("Battery Last Full Charge Capacity", 6, 16, tenth_watt_hours),
    FieldSpec::flag("Invalid Battery Reference", 64),
    FieldSpec::raw("Reserved", 65, 7),
];

const MANUFACTURER_IDS: &[FieldSpec] = &[custom("VID", 0, 16, hex16), custom("PID", 2, 16, hex16)];

const ECDB: &[FieldSpec] = &[
    FieldSpec::label("Type", 0, 8, extended_control_type),
    byte("Data", 1),
];

const GET_BATTERY_CAP: &[FieldSpec] = &[byte("Battery Cap Ref", 0)];
const GET_BATTERY_STATUS: &[FieldSpec] = &[byte("Battery Status Ref", 0)];

fn opaque(name: &'static str, frame: &Bytes, base: usize, len: usize) -> MetadataNode {
    MetadataNode::leaf(
        name,
        frame,
        BitLoc::bytes(base, len),
        Scalar::Hex(hex::encode_upper(&frame[base..base + len])),
    )
}

/// Bytes from `covered` to `len` that no row describes, as one opaque leaf.
fn remainder(frame: &Bytes, base: usize, covered: usize, len: usize) -> Option<MetadataNode> {
    (covered < len).then(|| opaque("Additional Data", frame, base + covered, len - covered))
}

/// Rows that fit entirely inside `len` bytes, then whatever the table does not
/// reach. Shorter revisions of a data block simply stop early.
fn decode_rows(
    frame: &Bytes,
    base: usize,
    len: usize,
    specs: &[FieldSpec],
) -> Result<Vec<MetadataNode>, FieldError> {
    let fitting: Vec<FieldSpec> = specs
        .iter()
        .filter(|s| s.lsb as usize + s.width as usize <= len * 8)
        .copied()
        .collect();
    let covered = fitting
        .iter()
        .map(|s| (s.lsb as usize + s.width as usize).div_ceil(8))
        .max()
        .unwrap_or(0);
    let mut nodes = decode_fields(frame, base, &fitting)?;
    nodes.extend(remainder(frame, base, covered, len));
    Ok(nodes)
}

fn manufacturer_info(
    frame: &Bytes,
    base: usize,
    len: usize,
) -> Result<Vec<MetadataNode>, FieldError> {
    let mut nodes = decode_rows(frame, base, len.min(4), MANUFACTURER_IDS)?;
    if len > 4 {
        let text = String::from_utf8_lossy(&frame[base + 4..base + len])
            .trim_end_matches('\0')
            .to_string();
        nodes.push(MetadataNode::leaf(
            "Manufacturer String",
            frame,
            BitLoc::bytes(base + 4, len - 4),
            Scalar::Text(text),
        ));
    }
    Ok(nodes)
}

/// Whole PDO words inside `len` bytes at `base`. `message_offset` is where the
/// chunk starts inside the reassembled message, which fixes word alignment and
/// numbering.
fn capability_words(
    frame: &Bytes,
    base: usize,
    len: usize,
    message_offset: usize,
    role: PdoRole,
) -> Result<Vec<MetadataNode>, FieldError> {
    let skip = (PD_DATA_OBJECT_SIZE - message_offset % PD_DATA_OBJECT_SIZE) % PD_DATA_OBJECT_SIZE;
    let first_index = (message_offset + skip) / PD_DATA_OBJECT_SIZE;
    let words = len.saturating_sub(skip) / PD_DATA_OBJECT_SIZE;
    (0..words)
        .map(|i| {
            let at = base + skip + i * PD_DATA_OBJECT_SIZE;
            decode_pdo(frame, at, format!("PDO {}", first_index + i + 1), role)
        })
        .collect()
}

fn interpret(
    msg: Option<ExtendedMessageType>,
    frame: &Bytes,
    base: usize,
    len: usize,
) -> Result<Vec<MetadataNode>, FieldError> {
    use ExtendedMessageType::*;
    match msg {
        Some(SourceCapabilitiesExtended) => decode_rows(frame, base, len, SCEDB),
        Some(Status) => decode_rows(frame, base, len, SSDB),
        Some(PpsStatus) => decode_rows(frame, base, len, PPSSDB),
        Some(BatteryCapabilities) => decode_rows(frame, base, len, BCDB),
        Some(ManufacturerInfo) => manufacturer_info(frame, base, len),
        Some(ExtendedControl) => decode_rows(frame, base, len, ECDB),
        Some(GetBatteryCap) => decode_rows(frame, base, len, GET_BATTERY_CAP),
        Some(GetBatteryStatus) => decode_rows(frame, base, len, GET_BATTERY_STATUS),
        Some(EprSourceCapabilities) => capabilities(frame, base, len, PdoRole::Source),
        Some(EprSinkCapabilities) => capabilities(frame, base, len, PdoRole::Sink),
        _ => Ok(vec![opaque("Extended Data", frame, base, len)]),
    }
}

/// A complete EPR capabilities block: every PDO, then any partial word.
fn capabilities(
    frame: &Bytes,
    base: usize,
    len: usize,
    role: PdoRole,
) -> Result<Vec<MetadataNode>, FieldError> {
    let mut nodes = capability_words(frame, base, len, 0, role)?;
    let covered = len - len % PD_DATA_OBJECT_SIZE;
    nodes.extend(remainder(frame, base, covered, len));
    Ok(nodes)
}

/// The extended header and payload of an extended message, plus the first
/// byte after them.
pub(crate) struct ExtendedSection {
    pub nodes: Vec<MetadataNode>,
    pub end: usize,
}

/// Decode the extended header at `offset` and the chunk that follows it.
/// `frame` ends at the declared payload end. A payload with no byte present at
/// all is flagged on the Data Size field instead.
pub(crate) fn decode_extended(
    frame: &Bytes,
    offset: usize,
    msg: Option<ExtendedMessageType>,
) -> ExtendedSection {
    let Some(header_bytes) = frame.get(offset..offset + PD_EXTENDED_HEADER_SIZE) else {
        let err = FieldError::Truncated {
            what: EXTENDED_HEADER,
            declared: PD_EXTENDED_HEADER_SIZE,
            available: frame.len().saturating_sub(offset),
        };
        warn!(%err, "Extended message without a complete extended header");
        // With no byte left, flag the Extended bit of the message header
        let header_start = offset.saturating_sub(PD_MESSAGE_HEADER_SIZE);
        let extended_bit = BitLoc::from_bits(header_start * 8 + 15, 1);
        let node = MetadataNode::incomplete(EXTENDED_HEADER, frame, offset, err.clone())
            .unwrap_or_else(|| MetadataNode::malformed(EXTENDED_HEADER, frame, extended_bit, err));
        return ExtendedSection {
            nodes: vec![node],
            end: frame.len(),
        };
    };
    let header = ExtendedHeader::from_bytes([header_bytes[0], header_bytes[1]]);

    let header_loc = BitLoc::bytes(offset, PD_EXTENDED_HEADER_SIZE);
    let header_node = decode_fields(frame, offset, EXTENDED_HEADER_FIELDS)
        .map(|fields| MetadataNode::branch(EXTENDED_HEADER, frame, header_loc, fields))
        .unwrap_or_else(|e| MetadataNode::malformed(EXTENDED_HEADER, frame, header_loc, e));
    let mut nodes = vec![header_node];

    let data = offset + PD_EXTENDED_HEADER_SIZE;
    let available = frame.len() - data;
    let expected = chunk_len(&header);

    if header.request_chunk() || expected == 0 {
        debug!(request = header.request_chunk(), "Extended message without data");
        return ExtendedSection { nodes, end: data };
    }

    if expected > available {
        let err = FieldError::Truncated {
            what: PAYLOAD,
            declared: expected,
            available,
        };
        warn!(%err, "Extended payload exceeds frame");
        let node = MetadataNode::incomplete(PAYLOAD, frame, data, err.clone())
            .unwrap_or_else(|| {
                MetadataNode::malformed(PAYLOAD, frame, BitLoc::from_bits(offset * 8, 9), err)
            });
        nodes.push(node);
        return ExtendedSection { nodes, end: frame.len() };
    }

    let children = if is_complete(&header) {
        interpret(msg, frame, data, expected)
    } else {
        let message_offset = PD_MAX_CHUNK_SIZE * header.chunk_number() as usize;
        let mut chunk = vec![opaque("Chunk Data", frame, data, expected)];
        let words = match msg {
            Some(ExtendedMessageType::EprSourceCapabilities) => {
                capability_words(frame, data, expected, message_offset, PdoRole::Source)
            }
            Some(ExtendedMessageType::EprSinkCapabilities) => {
                capability_words(frame, data, expected, message_offset, PdoRole::Sink)
            }
            _ => Ok(Vec::new()),
        };
        words.map(|w| {
            chunk.extend(w);
            chunk
        })
    };

    let loc = BitLoc::bytes(data, expected);
    let payload = match children {
        Ok(children) => MetadataNode::branch(PAYLOAD, frame, loc, children),
        Err(e) => MetadataNode::malformed(PAYLOAD, frame, loc, e),
    };
    nodes.push(payload);

    ExtendedSection { nodes, end: data + expected }
}
