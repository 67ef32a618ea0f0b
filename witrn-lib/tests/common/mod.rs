//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use hex;
#[allow(unused_imports)]
pub use std::sync::Arc;
#[allow(unused_imports)]
pub use witrn_lib::context::{
    ContextUpdate, carries_request, carries_source_capabilities, provides_extended,
};
#[allow(unused_imports)]
pub use witrn_lib::pd::decode_pd;
#[allow(unused_imports)]
pub use witrn_lib::{
    DecodeContext, DecodeError, Decoder, Frame, FrameKind, MetadataNode, Scalar, Unit, Value,
};

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

/// Build a PD frame around a message: marker, payload length, message bytes
#[allow(dead_code)]
pub fn pd_frame(message: &[u8]) -> Bytes {
    let mut frame = vec![0xFE, message.len() as u8];
    frame.extend_from_slice(message);
    Bytes::from(frame)
}

/// Pack a PD message header
#[allow(dead_code)]
pub fn message_header(msg_type: u8, num_objects: u8, message_id: u8, extended: bool) -> [u8; 2] {
    let word: u16 = ((extended as u16) << 15)
        | ((num_objects as u16 & 0x7) << 12)
        | ((message_id as u16 & 0x7) << 9)
        | (2 << 6)
        | (msg_type as u16 & 0x1F);
    word.to_le_bytes()
}

/// Build a single-chunk extended message frame carrying `data`
#[allow(dead_code)]
pub fn extended_frame(msg_type: u8, data: &[u8]) -> Bytes {
    let objects = (data.len() + 2).div_ceil(4) as u8;
    let ext: u16 = (1 << 15) | data.len() as u16;
    let mut message = message_header(msg_type, objects, 0, true).to_vec();
    message.extend_from_slice(&ext.to_le_bytes());
    message.extend_from_slice(data);
    pd_frame(&message)
}

/// Check that every composite node spans exactly the union of its children
#[allow(dead_code)]
pub fn assert_spans_match_children(node: &MetadataNode) {
    if let Value::Children(children) = node.value() {
        let union = children
            .iter()
            .map(MetadataNode::bit_loc)
            .reduce(|a, b| a.union(&b));
        assert_eq!(
            union.map(|loc| loc.bit_range()),
            Some(node.bit_loc().bit_range()),
            "{} does not span its children",
            node.field()
        );
        children.iter().for_each(assert_spans_match_children);
    }
}

/// Numeric value of a quantity leaf
#[allow(dead_code)]
pub fn quantity(node: &MetadataNode) -> f64 {
    match node.scalar() {
        Some(Scalar::Quantity { value, .. }) => *value,
        other => panic!("{} is not a quantity: {:?}", node.field(), other),
    }
}

/// A 64-byte general report: 5.02V, 0.512A, 28.5 °C, recording, group 1
#[allow(dead_code)]
pub const GENERAL_HEX: &str = "FF0110111213141516171819F085493C6DE77B3D8D0E00009A1C00009A99193F3D0A173F000000000000E441D7A3A0406F12033F010074400000000000000000";

/// Source_Capabilities: 5V 3A fixed, 9V 3A, 15V 3A, 20V 2.25A, PPS 3.3-11V 3A
#[allow(dead_code)]
pub const SOURCE_CAPS_HEX: &str = "FE16A1572C9101062CD102002CB10400E14006003C21DCC0";

/// Request for PDO 2, 3A operating and maximum current
#[allow(dead_code)]
pub const REQUEST_HEX: &str = "FE0682182CB10422";

/// Source_Capabilities: 5V 3A fixed, then a 5-20V 15W battery PDO
#[allow(dead_code)]
pub const BATTERY_CAPS_HEX: &str = "FE0AA1212C9101003C900159";

/// Request for PDO 2 with 15W operating and maximum power
#[allow(dead_code)]
pub const BATTERY_REQUEST_HEX: &str = "FE0682123CF00020";

/// PPS_Status: 5.0V, 2.0A, temperature normal, two bytes of padding
#[allow(dead_code)]
pub const PPS_STATUS_HEX: &str = "FE0AACAB0480FA0028020000";

/// Manufacturer_Info: VID 0x0716, PID 0x5060, "WITRN"
#[allow(dead_code)]
pub const MANUFACTURER_INFO_HEX: &str = "FE0EA7BD098016076050574954524E00";

/// Vendor_Defined: Discover Identity REQ to the PD SID
#[allow(dead_code)]
pub const DISCOVER_IDENTITY_HEX: &str = "FE06AF1F01A000FF";

/// GoodCRC with message ID 0
#[allow(dead_code)]
pub const GOOD_CRC_HEX: &str = "FE028100";
