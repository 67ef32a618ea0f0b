//! Single-word data objects other than PDOs and RDOs.

use bytes::Bytes;

use crate::bitfield::{BitLoc, FieldSpec, Interpretation, decode_fields, quantity, read_u32};
use crate::constants::PD_DATA_OBJECT_SIZE;
use crate::error::FieldError;
use crate::metadata::{MetadataNode, Scalar, Unit};

fn bist_mode(code: u64) -> Option<&'static str> {
    match code {
        5 => Some("BIST Carrier Mode"),
        8 => Some("BIST Test Data"),
        9 => Some("BIST Shared Test Mode Entry"),
        10 => Some("BIST Shared Test Mode Exit"),
        _ => None,
    }
}

fn present_capacity(raw: u64) -> Option<Scalar> {
    if raw == 0xFFFF {
        Some(Scalar::Text("Unknown".to_string()))
    } else {
        quantity(raw as f64 * 0.1, Unit::WattHour)
    }
}

fn charging_status(code: u64) -> Option<&'static str> {
    match code {
        0 => Some("Charging"),
        1 => Some("Discharging"),
        2 => Some("Idle"),
        _ => None,
    }
}

fn extended_alert(code: u64) -> Option<&'static str> {
    match code {
        1 => Some("Power State Change"),
        2 => Some("Power Button Press"),
        3 => Some("Power Button Release"),
        4 => Some("Controller Initiated Wake"),
        _ => None,
    }
}

fn port_type(code: u64) -> Option<&'static str> {
    Some(if code == 0 { "Managed Capability" } else { "Guaranteed Capability" })
}

fn usb_mode(code: u64) -> Option<&'static str> {
    match code {
        0 => Some("USB 2.0"),
        1 => Some("USB 3.2"),
        2 => Some("USB4"),
        _ => None,
    }
}

fn cable_speed(code: u64) -> Option<&'static str> {
    match code {
        0 => Some("USB 2.0 only"),
        1 => Some("USB 3.2 Gen1"),
        2 => Some("USB 3.2 Gen2 / USB4 Gen2"),
        3 => Some("USB4 Gen3"),
        4 => Some("USB4 Gen4"),
        _ => None,
    }
}

fn cable_type(code: u64) -> Option<&'static str> {
    match code {
        0 => Some("Passive"),
        1 => Some("Active Re-timer"),
        2 => Some("Active Re-driver"),
        3 => Some("Optically Isolated"),
        _ => None,
    }
}

fn cable_current(code: u64) -> Option<&'static str> {
    match code {
        0 => Some("VBUS not supported"),
        1 => Some("3A"),
        2 => Some("5A"),
        _ => None,
    }
}

fn epr_action(code: u64) -> Option<&'static str> {
    match code {
        1 => Some("Enter"),
        2 => Some("Enter Acknowledged"),
        3 => Some("Enter Succeeded"),
        4 => Some("Enter Failed"),
        5 => Some("Exit"),
        _ => None,
    }
}

fn svid(raw: u64) -> Option<Scalar> {
    Some(Scalar::Hex(format!("{:04X}", raw)))
}

fn vdm_type(code: u64) -> Option<&'static str> {
    Some(if code == 0 { "Unstructured" } else { "Structured" })
}

fn command_type(code: u64) -> Option<&'static str> {
    match code {
        0 => Some("REQ"),
        1 => Some("ACK"),
        2 => Some("NAK"),
        3 => Some("BUSY"),
        _ => None,
    }
}

fn vdm_command(code: u64) -> Option<&'static str> {
    match code {
        1 => Some("Discover Identity"),
        2 => Some("Discover SVIDs"),
        3 => Some("Discover Modes"),
        4 => Some("Enter Mode"),
        5 => Some("Exit Mode"),
        6 => Some("Attention"),
        16..=31 => Some("SVID Specific"),
        _ => None,
    }
}

pub(crate) const BDO: &[FieldSpec] = &[
    FieldSpec::label("BIST Mode", 28, 4, bist_mode),
    FieldSpec::raw("Reserved", 0, 28),
];

pub(crate) const BSDO: &[FieldSpec] = &[
    FieldSpec::new(
        "Battery Present Capacity",
        16,
        16,
        Interpretation::Custom(present_capacity),
    ),
    FieldSpec::raw("Reserved", 12, 4),
    FieldSpec::label("Battery Charging Status", 10, 2, charging_status),
    FieldSpec::flag("Battery Present", 9),
    FieldSpec::flag("Invalid Battery Reference", 8),
    FieldSpec::raw("Reserved", 0, 8),
];

pub(crate) const ADO: &[FieldSpec] = &[
    FieldSpec::flag("Extended Alert Event", 31),
    FieldSpec::flag("OVP Event", 30),
    FieldSpec::flag("Source Input Change Event", 29),
    FieldSpec::flag("Operating Condition Change", 28),
    FieldSpec::flag("OTP Event", 27),
    FieldSpec::flag("OCP Event", 26),
    FieldSpec::flag("Battery Status Change Event", 25),
    FieldSpec::raw("Reserved", 24, 1),
    FieldSpec::unsigned("Fixed Batteries", 20, 4),
    FieldSpec::unsigned("Hot Swappable Batteries", 16, 4),
    FieldSpec::raw("Reserved", 4, 12),
    FieldSpec::label("Extended Alert Event Type", 0, 4, extended_alert),
];

pub(crate) const SIDO: &[FieldSpec] = &[
    FieldSpec::label("Port Type", 31, 1, port_type),
    FieldSpec::raw("Reserved", 24, 7),
    FieldSpec::milli("Port Maximum PDP", 16, 8, 1000.0, Unit::Watt),
    FieldSpec::milli("Port Present PDP", 8, 8, 1000.0, Unit::Watt),
    FieldSpec::milli("Port Reported PDP", 0, 8, 1000.0, Unit::Watt),
];

pub(crate) const RMDO: &[FieldSpec] = &[
    FieldSpec::unsigned("Revision Major", 28, 4),
    FieldSpec::unsigned("Revision Minor", 24, 4),
    FieldSpec::unsigned("Version Major", 20, 4),
    FieldSpec::unsigned("Version Minor", 16, 4),
    FieldSpec::raw("Reserved", 0, 16),
];

pub(crate) const EUDO: &[FieldSpec] = &[
    FieldSpec::raw("Reserved", 31, 1),
    FieldSpec::label("USB Mode", 28, 3, usb_mode),
    FieldSpec::raw("Reserved", 27, 1),
    FieldSpec::flag("USB4 DRD", 26),
    FieldSpec::flag("USB3 DRD", 25),
    FieldSpec::raw("Reserved", 24, 1),
    FieldSpec::label("Cable Speed", 21, 3, cable_speed),
    FieldSpec::label("Cable Type", 19, 2, cable_type),
    FieldSpec::label("Cable Current", 17, 2, cable_current),
    FieldSpec::flag("PCIe Support", 16),
    FieldSpec::flag("DP Support", 15),
    FieldSpec::flag("TBT Support", 14),
    FieldSpec::flag("Host Present", 13),
    FieldSpec::raw("Reserved", 0, 13),
];

pub(crate) const EPRMDO: &[FieldSpec] = &[
    FieldSpec::label("Action", 24, 8, epr_action),
    FieldSpec::unsigned("Data", 16, 8),
    FieldSpec::raw("Reserved", 0, 16),
];

const VDM_COMMON: &[FieldSpec] = &[
    FieldSpec::new("SVID", 16, 16, Interpretation::Custom(svid)),
    FieldSpec::label("VDM Type", 15, 1, vdm_type),
];

const VDM_STRUCTURED: &[FieldSpec] = &[
    FieldSpec::unsigned("Structured VDM Version Major", 13, 2),
    FieldSpec::unsigned("Structured VDM Version Minor", 11, 2),
    FieldSpec::unsigned("Object Position", 8, 3),
    FieldSpec::label("Command Type", 6, 2, command_type),
    FieldSpec::raw("Reserved", 5, 1),
    FieldSpec::label("Command", 0, 5, vdm_command),
];

const VDM_UNSTRUCTURED: &[FieldSpec] = &[FieldSpec::raw("Vendor Use", 0, 15)];

/// Decode one 32-bit object through a layout table.
pub(crate) fn decode_word(
    frame: &Bytes,
    offset: usize,
    name: impl Into<String>,
    layout: &[FieldSpec],
) -> Result<MetadataNode, FieldError> {
    let children = decode_fields(frame, offset, layout)?;
    Ok(MetadataNode::branch(
        name,
        frame,
        BitLoc::bytes(offset, PD_DATA_OBJECT_SIZE),
        children,
    ))
}

/// A word with no known layout, kept as a single uninterpreted leaf.
pub(crate) fn decode_opaque(
    frame: &Bytes,
    offset: usize,
    name: impl Into<String>,
) -> Result<MetadataNode, FieldError> {
    let word = read_u32(frame, offset)?;
    Ok(MetadataNode::leaf(
        name,
        frame,
        BitLoc::bytes(offset, PD_DATA_OBJECT_SIZE),
        Scalar::Uninterpreted(word as u64),
    ))
}

pub(crate) fn decode_vdm_header(frame: &Bytes, offset: usize) -> Result<MetadataNode, FieldError> {
    let mut children = decode_fields(frame, offset, VDM_COMMON)?;
    let structured = children
        .last()
        .and_then(MetadataNode::scalar)
        .and_then(Scalar::as_u64)
        == Some(1);
    let rest = if structured { VDM_STRUCTURED } else { VDM_UNSTRUCTURED };
    children.extend(decode_fields(frame, offset, rest)?);
    Ok(MetadataNode::branch(
        "VDM Header",
        frame,
        BitLoc::bytes(offset, PD_DATA_OBJECT_SIZE),
        children,
    ))
}
