//! Fixed 64-byte telemetry report.

use bytes::Bytes;
use std::mem::{offset_of, size_of_val};
use tracing::debug;
use zerocopy::byteorder::little_endian::{F32, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::bitfield::{BitLoc, FieldSpec, Interpretation, decode_fields, quantity};
use crate::constants::{GENERAL_FRAME_SIZE, GENERAL_MARKER};
use crate::error::DecodeError;
use crate::metadata::{MetadataNode, Scalar, Unit};

/// Wire layout of a general report. All multi-byte fields are little-endian.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct GeneralFrameRaw {
    pub report_type: u8,
    pub status: u8,
    pub device_data: [u8; 10],
    pub ah: F32,            // Accumulated charge (Ah)
    pub wh: F32,            // Accumulated energy (Wh)
    pub rectime_s: U32,     // Recording time (s)
    pub runtime_s: U32,     // Time since power-on (s)
    pub dp_v: F32,          // D+ (V)
    pub dm_v: F32,          // D- (V)
    pub reserved0: [u8; 4],
    pub temperature_c: F32, // Probe temperature (°C)
    pub vbus_v: F32,        // VBUS (V)
    pub current_a: F32,     // IBUS (A)
    pub group: u8,          // Recording group index
    pub reserved1: u8,
    pub cc1_tenth_mv: U16,  // 0.1 millivolts
    pub cc2_tenth_mv: U16,  // 0.1 millivolts
    pub reserved2: [u8; 6],
}

fn report_type(code: u64) -> Option<&'static str> {
    (code == GENERAL_MARKER as u64).then_some("General")
}

const REPORT_TYPE: FieldSpec = FieldSpec::label("Report Type", 0, 8, report_type);

const CC_VOLTAGE: Interpretation = Interpretation::Milli {
    step: 0.1,
    unit: Unit::Volt,
};

const STATUS_FLAGS: &[FieldSpec] = &[
    FieldSpec::flag("Recording", 0),
    FieldSpec::flag("Reverse Current", 1),
    FieldSpec::flag("Over Temperature", 2),
    FieldSpec::flag("Low Voltage", 3),
    FieldSpec::raw("Reserved", 4, 4),
];

fn float(value: F32, unit: Unit) -> Scalar {
    let value = value.get();
    quantity(value as f64, unit).unwrap_or(Scalar::Uninterpreted(value.to_bits() as u64))
}

fn hms(seconds: U32) -> Scalar {
    let s = seconds.get();
    Scalar::Text(format!("{:02}:{:02}:{:02}", s / 3600, (s / 60) % 60, s % 60))
}

fn opaque(bytes: &[u8]) -> Scalar {
    Scalar::Hex(hex::encode_upper(bytes))
}

macro_rules! field {
    ($frame:expr, $raw:expr, $member:ident, $name:expr, $value:expr) => {
        MetadataNode::leaf(
            $name,
            $frame,
            BitLoc::bytes(offset_of!(GeneralFrameRaw, $member), size_of_val(&$raw.$member)),
            $value,
        )
    };
}

/// Decode a general telemetry report. The frame must be exactly 64 bytes.
pub fn decode_general(frame: &Bytes) -> Result<MetadataNode, DecodeError> {
    if frame.len() != GENERAL_FRAME_SIZE {
        return Err(DecodeError::InvalidLength {
            expected: GENERAL_FRAME_SIZE,
            actual: frame.len(),
        });
    }
    let raw = GeneralFrameRaw::ref_from_bytes(frame.as_ref()).map_err(|_| {
        DecodeError::InvalidLength {
            expected: GENERAL_FRAME_SIZE,
            actual: frame.len(),
        }
    })?;

    let status_offset = offset_of!(GeneralFrameRaw, status);
    let status_loc = BitLoc::bytes(status_offset, 1);
    let status = decode_fields(frame, status_offset, STATUS_FLAGS)
        .map(|flags| MetadataNode::branch("Status", frame, status_loc, flags))
        .unwrap_or_else(|e| MetadataNode::malformed("Status", frame, status_loc, e));

    let report = REPORT_TYPE
        .at(0)
        .decode(frame)
        .unwrap_or_else(|e| MetadataNode::malformed("Report Type", frame, BitLoc::bytes(0, 1), e));

    let children = vec![
        report,
        status,
        field!(frame, raw, device_data, "Device Data", opaque(&raw.device_data)),
        field!(frame, raw, ah, "Ah", float(raw.ah, Unit::AmpereHour)),
        field!(frame, raw, wh, "Wh", float(raw.wh, Unit::WattHour)),
        field!(frame, raw, rectime_s, "Rectime", hms(raw.rectime_s)),
        field!(frame, raw, runtime_s, "Runtime", hms(raw.runtime_s)),
        field!(frame, raw, dp_v, "D+", float(raw.dp_v, Unit::Volt)),
        field!(frame, raw, dm_v, "D-", float(raw.dm_v, Unit::Volt)),
        field!(frame, raw, reserved0, "Reserved", opaque(&raw.reserved0)),
        field!(frame, raw, temperature_c, "Temperature", float(raw.temperature_c, Unit::Celsius)),
        field!(frame, raw, vbus_v, "VBus", float(raw.vbus_v, Unit::Volt)),
        field!(frame, raw, current_a, "Current", float(raw.current_a, Unit::Ampere)),
        field!(frame, raw, group, "Group", Scalar::Unsigned(raw.group as u64)),
        field!(frame, raw, reserved1, "Reserved", opaque(&[raw.reserved1])),
        field!(
            frame,
            raw,
            cc1_tenth_mv,
            "CC1",
            CC_VOLTAGE.apply(raw.cc1_tenth_mv.get() as u64)
        ),
        field!(
            frame,
            raw,
            cc2_tenth_mv,
            "CC2",
            CC_VOLTAGE.apply(raw.cc2_tenth_mv.get() as u64)
        ),
        field!(frame, raw, reserved2, "Reserved", opaque(&raw.reserved2)),
    ];

    debug!(
        vbus = raw.vbus_v.get(),
        current = raw.current_a.get(),
        "Decoded general report"
    );

    Ok(MetadataNode::branch(
        "General Message",
        frame,
        BitLoc::bytes(0, GENERAL_FRAME_SIZE),
        children,
    ))
}
