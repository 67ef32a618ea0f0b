//! Power Data Objects.
//!
//! Bits 31-30 pick the supply type; for augmented PDOs bits 29-28 pick the
//! APDO flavour. Source and sink PDOs share the voltage/current fields but use
//! the upper bits differently.

use bytes::Bytes;

use crate::bitfield::{BitLoc, FieldSpec, decode_fields, read_u32};
use crate::constants::PD_DATA_OBJECT_SIZE;
use crate::error::FieldError;
use crate::metadata::{MetadataNode, Unit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdoKind {
    Fixed,
    Battery,
    Variable,
    Pps,
    EprAvs,
    SprAvs,
    ReservedApdo,
}

impl PdoKind {
    pub fn from_word(word: u32) -> Self {
        match (word >> 30, (word >> 28) & 0b11) {
            (0b00, _) => PdoKind::Fixed,
            (0b01, _) => PdoKind::Battery,
            (0b10, _) => PdoKind::Variable,
            (_, 0b00) => PdoKind::Pps,
            (_, 0b01) => PdoKind::EprAvs,
            (_, 0b10) => PdoKind::SprAvs,
            _ => PdoKind::ReservedApdo,
        }
    }

    pub fn is_augmented(&self) -> bool {
        matches!(
            self,
            PdoKind::Pps | PdoKind::EprAvs | PdoKind::SprAvs | PdoKind::ReservedApdo
        )
    }
}

/// Which side advertised the PDO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdoRole {
    Source,
    Sink,
}

fn supply_type(code: u64) -> Option<&'static str> {
    match code {
        0 => Some("Fixed Supply"),
        1 => Some("Battery"),
        2 => Some("Variable Supply"),
        3 => Some("Augmented"),
        _ => None,
    }
}

fn apdo_type(code: u64) -> Option<&'static str> {
    match code {
        0 => Some("SPR PPS"),
        1 => Some("EPR AVS"),
        2 => Some("SPR AVS"),
        _ => None,
    }
}

fn peak_current(code: u64) -> Option<&'static str> {
    match code {
        0 => Some("Peak equals IOC"),
        1 => Some("150% / 125% / 110% IOC"),
        2 => Some("200% / 150% / 125% IOC"),
        3 => Some("200% / 175% / 150% IOC"),
        _ => None,
    }
}

fn fast_role_swap(code: u64) -> Option<&'static str> {
    match code {
        0 => Some("Not Supported"),
        1 => Some("Default USB Power"),
        2 => Some("1.5A @ 5V"),
        3 => Some("3.0A @ 5V"),
        _ => None,
    }
}

const SUPPLY_TYPE: FieldSpec = FieldSpec::label("PDO Type", 30, 2, supply_type);
const APDO_TYPE: FieldSpec = FieldSpec::label("APDO Type", 28, 2, apdo_type);

const FIXED_SOURCE: &[FieldSpec] = &[
    FieldSpec::flag("Dual-Role Power", 29),
    FieldSpec::flag("USB Suspend Supported", 28),
    FieldSpec::flag("Unconstrained Power", 27),
    FieldSpec::flag("USB Communications Capable", 26),
    FieldSpec::flag("Dual-Role Data", 25),
    FieldSpec::flag("Unchunked Extended Messages Supported", 24),
    FieldSpec::flag("EPR Mode Capable", 23),
    FieldSpec::label("Peak Current", 20, 2, peak_current),
    FieldSpec::milli("Voltage", 10, 10, 50.0, Unit::Volt),
    FieldSpec::milli("Maximum Current", 0, 10, 10.0, Unit::Ampere),
];

const FIXED_SINK: &[FieldSpec] = &[
    FieldSpec::flag("Dual-Role Power", 29),
    FieldSpec::flag("Higher Capability", 28),
    FieldSpec::flag("Unconstrained Power", 27),
    FieldSpec::flag("USB Communications Capable", 26),
    FieldSpec::flag("Dual-Role Data", 25),
    FieldSpec::label("Fast Role Swap Required Current", 23, 2, fast_role_swap),
    FieldSpec::milli("Voltage", 10, 10, 50.0, Unit::Volt),
    FieldSpec::milli("Operational Current", 0, 10, 10.0, Unit::Ampere),
];

const VARIABLE_SOURCE: &[FieldSpec] = &[
    FieldSpec::milli("Maximum Voltage", 20, 10, 50.0, Unit::Volt),
    FieldSpec::milli("Minimum Voltage", 10, 10, 50.0, Unit::Volt),
    FieldSpec::milli("Maximum Current", 0, 10, 10.0, Unit::Ampere),
];

const VARIABLE_SINK: &[FieldSpec] = &[
    FieldSpec::milli("Maximum Voltage", 20, 10, 50.0, Unit::Volt),
    FieldSpec::milli("Minimum Voltage", 10, 10, 50.0, Unit::Volt),
    FieldSpec::milli("Operational Current", 0, 10, 10.0, Unit::Ampere),
];

const BATTERY_SOURCE: &[FieldSpec] = &[
    FieldSpec::milli("Maximum Voltage", 20, 10, 50.0, Unit::Volt),
    FieldSpec::milli("Minimum Voltage", 10, 10, 50.0, Unit::Volt),
    FieldSpec::milli("Maximum Allowable Power", 0, 10, 250.0, Unit::Watt),
];

const BATTERY_SINK: &[FieldSpec] = &[
    FieldSpec::milli("Maximum Voltage", 20, 10, 50.0, Unit::Volt),
    FieldSpec::milli("Minimum Voltage", 10, 10, 50.0, Unit::Volt),
    FieldSpec::milli("Operational Power", 0, 10, 250.0, Unit::Watt),
];

const PPS_SOURCE: &[FieldSpec] = &[
    FieldSpec::flag("PPS Power Limited", 27),
    FieldSpec::milli("Maximum Voltage", 17, 8, 100.0, Unit::Volt),
    FieldSpec::milli("Minimum Voltage", 8, 8, 100.0, Unit::Volt),
    FieldSpec::milli("Maximum Current", 0, 7, 50.0, Unit::Ampere),
];

const PPS_SINK: &[FieldSpec] = &[
    FieldSpec::milli("Maximum Voltage", 17, 8, 100.0, Unit::Volt),
    FieldSpec::milli("Minimum Voltage", 8, 8, 100.0, Unit::Volt),
    FieldSpec::milli("Maximum Current", 0, 7, 50.0, Unit::Ampere),
];

const EPR_AVS: &[FieldSpec] = &[
    FieldSpec::label("Peak Current", 26, 2, peak_current),
    FieldSpec::milli("Maximum Voltage", 17, 9, 100.0, Unit::Volt),
    FieldSpec::milli("Minimum Voltage", 8, 8, 100.0, Unit::Volt),
    FieldSpec::milli("PDP", 0, 8, 1000.0, Unit::Watt),
];

const SPR_AVS: &[FieldSpec] = &[
    FieldSpec::label("Peak Current", 26, 2, peak_current),
    FieldSpec::milli("Maximum Current 15V", 10, 10, 10.0, Unit::Ampere),
    FieldSpec::milli("Maximum Current 20V", 0, 10, 10.0, Unit::Ampere),
];

const RESERVED_APDO: &[FieldSpec] = &[FieldSpec::raw("Reserved", 0, 28)];

fn layout(kind: PdoKind, role: PdoRole) -> &'static [FieldSpec] {
    match (kind, role) {
        (PdoKind::Fixed, PdoRole::Source) => FIXED_SOURCE,
        (PdoKind::Fixed, PdoRole::Sink) => FIXED_SINK,
        (PdoKind::Variable, PdoRole::Source) => VARIABLE_SOURCE,
        (PdoKind::Variable, PdoRole::Sink) => VARIABLE_SINK,
        (PdoKind::Battery, PdoRole::Source) => BATTERY_SOURCE,
        (PdoKind::Battery, PdoRole::Sink) => BATTERY_SINK,
        (PdoKind::Pps, PdoRole::Source) => PPS_SOURCE,
        (PdoKind::Pps, PdoRole::Sink) => PPS_SINK,
        (PdoKind::EprAvs, _) => EPR_AVS,
        (PdoKind::SprAvs, _) => SPR_AVS,
        (PdoKind::ReservedApdo, _) => RESERVED_APDO,
    }
}

/// Decode the PDO word at `offset` into a node named `name`.
pub(crate) fn decode_pdo(
    frame: &Bytes,
    offset: usize,
    name: impl Into<String>,
    role: PdoRole,
) -> Result<MetadataNode, FieldError> {
    let kind = PdoKind::from_word(read_u32(frame, offset)?);

    let mut children = vec![SUPPLY_TYPE.at(offset).decode(frame)?];
    if kind.is_augmented() {
        children.push(APDO_TYPE.at(offset).decode(frame)?);
    }
    children.extend(decode_fields(frame, offset, layout(kind, role))?);

    Ok(MetadataNode::branch(
        name,
        frame,
        BitLoc::bytes(offset, PD_DATA_OBJECT_SIZE),
        children,
    ))
}

/// Decode `count` consecutive PDOs starting at `offset`, numbering them from 1.
/// A PDO that fails to decode is flagged without affecting its neighbours.
pub(crate) fn decode_pdo_list(
    frame: &Bytes,
    offset: usize,
    count: usize,
    role: PdoRole,
) -> Vec<MetadataNode> {
    (0..count)
        .filter_map(|i| {
            let at = offset + i * PD_DATA_OBJECT_SIZE;
            let name = format!("PDO {}", i + 1);
            match decode_pdo(frame, at, name.clone(), role) {
                Ok(node) => Some(node),
                Err(e) => MetadataNode::incomplete(name, frame, at, e),
            }
        })
        .collect()
}
