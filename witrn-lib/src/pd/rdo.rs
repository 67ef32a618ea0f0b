//! Request Data Objects.
//!
//! An RDO only makes sense next to the PDO it selects: the same bits are
//! currents for a fixed supply, powers for a battery and a voltage for an
//! augmented supply. Without that PDO the word is shown in a generic layout.

use bytes::Bytes;
use tracing::trace;

use crate::bitfield::{BitLoc, FieldSpec, decode_fields, read_u32};
use crate::constants::PD_DATA_OBJECT_SIZE;
use crate::error::FieldError;
use crate::metadata::{MetadataNode, Unit};
use crate::pd::pdo::PdoKind;

pub const OBJECT_POSITION: &str = "Object Position";

const POSITION: FieldSpec = FieldSpec::unsigned(OBJECT_POSITION, 28, 4);

const COMMON_FLAGS: &[FieldSpec] = &[
    FieldSpec::flag("Capability Mismatch", 26),
    FieldSpec::flag("USB Communications Capable", 25),
    FieldSpec::flag("No USB Suspend", 24),
    FieldSpec::flag("Unchunked Extended Messages Supported", 23),
    FieldSpec::flag("EPR Mode Capable", 22),
];

const GIVE_BACK: FieldSpec = FieldSpec::flag("GiveBack", 27);

const FIXED_VARIABLE: &[FieldSpec] = &[
    FieldSpec::milli("Operating Current", 10, 10, 10.0, Unit::Ampere),
    FieldSpec::milli("Maximum Operating Current", 0, 10, 10.0, Unit::Ampere),
];

const BATTERY: &[FieldSpec] = &[
    FieldSpec::milli("Operating Power", 10, 10, 250.0, Unit::Watt),
    FieldSpec::milli("Maximum Operating Power", 0, 10, 250.0, Unit::Watt),
];

const PPS: &[FieldSpec] = &[
    FieldSpec::milli("Output Voltage", 9, 12, 20.0, Unit::Volt),
    FieldSpec::milli("Operating Current", 0, 7, 50.0, Unit::Ampere),
];

const AVS: &[FieldSpec] = &[
    FieldSpec::milli("Output Voltage", 9, 12, 25.0, Unit::Volt),
    FieldSpec::milli("Operating Current", 0, 7, 50.0, Unit::Ampere),
];

const GENERIC: &[FieldSpec] = &[
    FieldSpec::raw("Operating Value", 10, 10),
    FieldSpec::raw("Limit Value", 0, 10),
];

/// Object position of the RDO word at `offset`.
pub(crate) fn object_position(frame: &[u8], offset: usize) -> Result<usize, FieldError> {
    read_u32(frame, offset).map(|word| (word >> 28) as usize)
}

/// Decode the RDO at `offset`. `source_pdo` is the raw word of the PDO the
/// request selects, when it is known.
pub(crate) fn decode_rdo(
    frame: &Bytes,
    offset: usize,
    name: impl Into<String>,
    source_pdo: Option<u32>,
) -> Result<MetadataNode, FieldError> {
    let kind = source_pdo.map(PdoKind::from_word);
    trace!(?kind, "Decoding RDO");

    let (give_back, layout) = match kind {
        Some(PdoKind::Fixed | PdoKind::Variable) => (true, FIXED_VARIABLE),
        Some(PdoKind::Battery) => (true, BATTERY),
        Some(PdoKind::Pps) => (false, PPS),
        Some(PdoKind::EprAvs | PdoKind::SprAvs) => (false, AVS),
        Some(PdoKind::ReservedApdo) | None => (true, GENERIC),
    };

    let mut children = vec![POSITION.at(offset).decode(frame)?];
    if give_back {
        children.push(GIVE_BACK.at(offset).decode(frame)?);
    }
    children.extend(decode_fields(frame, offset, COMMON_FLAGS)?);
    children.extend(decode_fields(frame, offset, layout)?);
    Ok(MetadataNode::branch(
        name,
        frame,
        BitLoc::bytes(offset, PD_DATA_OBJECT_SIZE),
        children,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Scalar;

    fn quantity(node: &MetadataNode, field: &str) -> f64 {
        match node.get(field).and_then(MetadataNode::scalar) {
            Some(Scalar::Quantity { value, .. }) => *value,
            other => panic!("{} is not a quantity: {:?}", field, other),
        }
    }

    #[test]
    fn test_fixed_rdo_with_context() {
        // Position 1, 3A operating, 3A max
        let word: u32 = (1 << 28) | (300 << 10) | 300;
        let frame = Bytes::from(word.to_le_bytes().to_vec());
        let node = decode_rdo(&frame, 0, "RDO", Some(0x0801_912C)).unwrap();
        assert_eq!(
            node.get(OBJECT_POSITION).and_then(MetadataNode::scalar),
            Some(&Scalar::Unsigned(1))
        );
        assert!((quantity(&node, "Operating Current") - 3.0).abs() < 1e-9);
        assert!(node.get("GiveBack").is_some());
    }

    #[test]
    fn test_pps_rdo_output_voltage() {
        // 9V (450 * 20mV), 2A (40 * 50mA)
        let word: u32 = (4 << 28) | (450 << 9) | 40;
        let frame = Bytes::from(word.to_le_bytes().to_vec());
        let node = decode_rdo(&frame, 0, "RDO", Some(0xC000_0000)).unwrap();
        assert!((quantity(&node, "Output Voltage") - 9.0).abs() < 1e-9);
        assert!((quantity(&node, "Operating Current") - 2.0).abs() < 1e-9);
        assert!(node.get("GiveBack").is_none());
    }

    #[test]
    fn test_generic_rdo_without_context() {
        let word: u32 = (2 << 28) | (100 << 10) | 200;
        let frame = Bytes::from(word.to_le_bytes().to_vec());
        let node = decode_rdo(&frame, 0, "RDO", None).unwrap();
        assert_eq!(
            node.get("Operating Value").and_then(MetadataNode::scalar),
            Some(&Scalar::Uninterpreted(100))
        );
        assert_eq!(object_position(&frame, 0), Ok(2));
    }
}
