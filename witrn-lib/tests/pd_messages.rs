//! Tests for USB PD message decoding

mod common;

use common::*;

fn decode(hex_data: &str) -> MetadataNode {
    decode_pd(&hex_to_bytes(hex_data), &DecodeContext::new()).expect("Failed to decode PD frame")
}

#[test]
fn test_pd_root_layout() {
    let tree = decode(SOURCE_CAPS_HEX);
    assert_eq!(tree.field(), "PD Message");
    assert_eq!(tree.raw().len(), 24);

    let names: Vec<&str> = tree.children().iter().map(MetadataNode::field).collect();
    assert_eq!(names, ["Frame Type", "Payload Length", "Message Header", "Data Objects"]);
    assert_eq!(tree.get("Frame Type").and_then(MetadataNode::label), Some("PD"));
    assert_eq!(
        tree.get("Payload Length").and_then(MetadataNode::scalar),
        Some(&Scalar::Unsigned(22))
    );
}

#[test]
fn test_message_header_fields() {
    let tree = decode(SOURCE_CAPS_HEX);
    let header = tree.get("Message Header").unwrap();

    assert_eq!(header.bit_loc().bit_range(), (16, 31));
    assert_eq!(header.raw().as_ref(), &[0xA1, 0x57]);
    assert_eq!(
        header.get("Specification Revision").and_then(MetadataNode::label),
        Some("Revision 3.x")
    );
    assert_eq!(header.get("Port Data Role").and_then(MetadataNode::label), Some("DFP"));
    assert_eq!(header.get("Message ID").and_then(MetadataNode::scalar), Some(&Scalar::Unsigned(3)));
    assert_eq!(header.get("Extended").and_then(MetadataNode::scalar), Some(&Scalar::Flag(false)));

    // Message Type occupies bits 0-4 of the header word
    assert_eq!(header.get("Message Type").unwrap().bit_loc().bit_range(), (16, 20));
}

#[test]
fn test_fixed_pdo_flags() {
    let tree = decode(SOURCE_CAPS_HEX);
    let pdo = tree.path(&["Data Objects", "PDO 1"]).unwrap();

    assert_eq!(pdo.bit_loc().bit_range(), (32, 63));
    assert_eq!(pdo.get("PDO Type").and_then(MetadataNode::label), Some("Fixed Supply"));
    assert_eq!(
        pdo.get("Dual-Role Data").and_then(MetadataNode::scalar),
        Some(&Scalar::Flag(true))
    );
    assert_eq!(
        pdo.get("Unconstrained Power").and_then(MetadataNode::scalar),
        Some(&Scalar::Flag(false))
    );
    assert!((quantity(pdo.get("Voltage").unwrap()) - 5.0).abs() < 1e-9);
}

#[test]
fn test_control_message() {
    let tree = decode(GOOD_CRC_HEX);
    assert_eq!(
        tree.path(&["Message Header", "Message Type"]).and_then(MetadataNode::label),
        Some("GoodCRC")
    );
    assert!(tree.get("Data Objects").is_none());
    assert_eq!(tree.children().len(), 3);
}

#[test]
fn test_unknown_message_type_is_uninterpreted() {
    // Control message type 0x1F is reserved
    let frame = pd_frame(&message_header(0x1F, 0, 0, false));
    let tree = decode_pd(&frame, &DecodeContext::new()).unwrap();
    let msg_type = tree.path(&["Message Header", "Message Type"]).unwrap();
    assert_eq!(msg_type.scalar(), Some(&Scalar::Uninterpreted(0x1F)));
}

#[test]
fn test_unknown_data_message_objects() {
    // Data message type 0x0D is reserved: objects stay raw
    let mut message = message_header(0x0D, 2, 0, false).to_vec();
    message.extend_from_slice(&[0x01, 0x02, 0x03, 0x04, 0xAA, 0xBB, 0xCC, 0xDD]);
    let tree = decode_pd(&pd_frame(&message), &DecodeContext::new()).unwrap();

    let objects = tree.get("Data Objects").unwrap();
    assert_eq!(
        objects.get("Data Object 1").and_then(MetadataNode::scalar),
        Some(&Scalar::Uninterpreted(0x0403_0201))
    );
    assert_eq!(
        objects.get("Data Object 2").and_then(MetadataNode::scalar),
        Some(&Scalar::Uninterpreted(0xDDCC_BBAA))
    );
}

#[test]
fn test_vendor_defined_message() {
    let tree = decode(DISCOVER_IDENTITY_HEX);
    let header = tree.path(&["Data Objects", "VDM Header"]).unwrap();
    assert_eq!(
        header.get("SVID").and_then(MetadataNode::scalar),
        Some(&Scalar::Hex("FF00".to_string()))
    );
    assert_eq!(header.get("Command").and_then(MetadataNode::label), Some("Discover Identity"));
}

#[test]
fn test_battery_status_and_alert() {
    // Battery_Status: 42.0 Wh, present, idle
    let mut message = message_header(0x05, 1, 1, false).to_vec();
    message.extend_from_slice(&((420u32 << 16) | (2 << 10) | (1 << 9)).to_le_bytes());
    let tree = decode_pd(&pd_frame(&message), &DecodeContext::new()).unwrap();
    let bsdo = tree.path(&["Data Objects", "BSDO"]).unwrap();
    assert!((quantity(bsdo.get("Battery Present Capacity").unwrap()) - 42.0).abs() < 1e-9);
    assert_eq!(bsdo.get("Battery Charging Status").and_then(MetadataNode::label), Some("Idle"));

    // Alert: OCP event
    let mut message = message_header(0x06, 1, 2, false).to_vec();
    message.extend_from_slice(&(1u32 << 26).to_le_bytes());
    let tree = decode_pd(&pd_frame(&message), &DecodeContext::new()).unwrap();
    let ado = tree.path(&["Data Objects", "ADO"]).unwrap();
    assert_eq!(ado.get("OCP Event").and_then(MetadataNode::scalar), Some(&Scalar::Flag(true)));
    assert_eq!(ado.get("OVP Event").and_then(MetadataNode::scalar), Some(&Scalar::Flag(false)));
}

#[test]
fn test_epr_request_uses_pdo_copy() {
    // RDO for position 8 (AVS: 28V at 5A) followed by a copy of an EPR AVS PDO
    let rdo: u32 = (8 << 28) | (1120 << 9) | 100;
    let avs: u32 = (0b11 << 30) | (0b01 << 28) | (280 << 17) | (150 << 8) | 140;
    let mut message = message_header(0x09, 2, 3, false).to_vec();
    message.extend_from_slice(&rdo.to_le_bytes());
    message.extend_from_slice(&avs.to_le_bytes());

    let tree = decode_pd(&pd_frame(&message), &DecodeContext::new()).unwrap();
    let objects = tree.get("Data Objects").unwrap();
    let rdo = objects.get("RDO").unwrap();
    assert!((quantity(rdo.get("Output Voltage").unwrap()) - 28.0).abs() < 1e-9);
    assert!((quantity(rdo.get("Operating Current").unwrap()) - 5.0).abs() < 1e-9);

    let copy = objects.get("PDO Copy").unwrap();
    assert_eq!(copy.get("APDO Type").and_then(MetadataNode::label), Some("EPR AVS"));
    assert!((quantity(copy.get("PDP").unwrap()) - 140.0).abs() < 1e-9);
}

#[test]
fn test_pps_status_extended_message() {
    let tree = decode(PPS_STATUS_HEX);
    let names: Vec<&str> = tree.children().iter().map(MetadataNode::field).collect();
    assert_eq!(
        names,
        ["Frame Type", "Payload Length", "Message Header", "Extended Header", "Payload", "Padding"]
    );

    let ext = tree.get("Extended Header").unwrap();
    assert_eq!(ext.get("Data Size").and_then(MetadataNode::scalar), Some(&Scalar::Unsigned(4)));
    assert_eq!(ext.get("Chunked").and_then(MetadataNode::scalar), Some(&Scalar::Flag(true)));

    let payload = tree.get("Payload").unwrap();
    assert!((quantity(payload.get("Output Voltage").unwrap()) - 5.0).abs() < 1e-9);
    assert!((quantity(payload.get("Output Current").unwrap()) - 2.0).abs() < 1e-9);
    assert_eq!(payload.get("PTF").and_then(MetadataNode::label), Some("Normal"));
}

#[test]
fn test_manufacturer_info() {
    let tree = decode(MANUFACTURER_INFO_HEX);
    assert_eq!(
        tree.path(&["Message Header", "Message Type"]).and_then(MetadataNode::label),
        Some("Manufacturer_Info")
    );
    let payload = tree.get("Payload").unwrap();
    assert_eq!(
        payload.get("VID").and_then(MetadataNode::scalar),
        Some(&Scalar::Hex("0716".to_string()))
    );
    assert_eq!(
        payload.get("Manufacturer String").and_then(MetadataNode::scalar),
        Some(&Scalar::Text("WITRN".to_string()))
    );
    assert!(provides_extended(&tree));
}

#[test]
fn test_first_chunk_of_long_message_is_opaque() {
    // Source_Capabilities_Extended declared as 30 bytes: chunk 0 carries 26
    let ext: u16 = (1 << 15) | 30;
    let mut message = message_header(0x01, 7, 0, true).to_vec();
    message.extend_from_slice(&ext.to_le_bytes());
    message.extend((0..26).map(|i| i as u8));
    let tree = decode_pd(&pd_frame(&message), &DecodeContext::new()).unwrap();

    let payload = tree.get("Payload").unwrap();
    assert_eq!(payload.children().len(), 1);
    assert_eq!(payload.children()[0].field(), "Chunk Data");
    assert_eq!(payload.raw().len(), 26);
}

#[test]
fn test_sink_capabilities() {
    // 5V 3A fixed with higher capability, then a 5-20V 2A variable supply
    let fixed: u32 = (1 << 28) | (100 << 10) | 300;
    let variable: u32 = (0b10 << 30) | (400 << 20) | (100 << 10) | 200;
    let mut message = message_header(0x04, 2, 1, false).to_vec();
    message.extend_from_slice(&fixed.to_le_bytes());
    message.extend_from_slice(&variable.to_le_bytes());
    let tree = decode_pd(&pd_frame(&message), &DecodeContext::new()).unwrap();

    assert_eq!(
        tree.path(&["Message Header", "Message Type"]).and_then(MetadataNode::label),
        Some("Sink_Capabilities")
    );
    let objects = tree.get("Data Objects").unwrap();
    let pdo = objects.get("PDO 1").unwrap();
    assert_eq!(
        pdo.get("Higher Capability").and_then(MetadataNode::scalar),
        Some(&Scalar::Flag(true))
    );
    assert!((quantity(pdo.get("Operational Current").unwrap()) - 3.0).abs() < 1e-9);
    assert!(pdo.get("USB Suspend Supported").is_none());

    let pdo = objects.get("PDO 2").unwrap();
    assert_eq!(pdo.get("PDO Type").and_then(MetadataNode::label), Some("Variable Supply"));
    assert!((quantity(pdo.get("Maximum Voltage").unwrap()) - 20.0).abs() < 1e-9);
    assert!((quantity(pdo.get("Operational Current").unwrap()) - 2.0).abs() < 1e-9);
    assert!(!carries_source_capabilities(&tree));
}

#[test]
fn test_single_word_objects_cover_their_word() {
    let cases = vec![
        (0x0C, 0x3120_0000u32, "Revision"),
        (0x05, (420 << 16) | (1 << 9), "BSDO"),
        (0x08, (2 << 28) | (1 << 21) | (1 << 13), "EUDO"),
        (0x0A, 1 << 24, "EPRMDO"),
    ];

    for (msg_type, word, name) in cases {
        let mut message = message_header(msg_type, 1, 0, false).to_vec();
        message.extend_from_slice(&word.to_le_bytes());
        let tree = decode_pd(&pd_frame(&message), &DecodeContext::new()).unwrap();

        let object = tree.path(&["Data Objects", name]).unwrap();
        assert_eq!(object.bit_loc().bit_range(), (32, 63), "{}", name);
        assert!(!object.has_errors(), "{}", name);
        assert_spans_match_children(&tree);
    }
}

#[test]
fn test_status_extended_message() {
    // 40 °C, external power, OCP event, temperature warning
    let tree = decode_pd(
        &extended_frame(0x02, &[40, 0x02, 0x00, 0x02, 0x04, 0x00, 0x00]),
        &DecodeContext::new(),
    )
    .unwrap();

    let payload = tree.get("Payload").unwrap();
    let temperature = payload.get("Internal Temp").unwrap();
    assert_eq!(
        temperature.scalar(),
        Some(&Scalar::Quantity {
            value: 40.0,
            unit: Unit::Celsius
        })
    );
    assert_eq!(
        payload.get("External Power").and_then(MetadataNode::scalar),
        Some(&Scalar::Flag(true))
    );
    assert_eq!(payload.get("OCP Event").and_then(MetadataNode::scalar), Some(&Scalar::Flag(true)));
    assert_eq!(
        payload.get("Temperature Status").and_then(MetadataNode::label),
        Some("Warning")
    );
    assert!(payload.get("Additional Data").is_none());
    assert!(provides_extended(&tree));
}

#[test]
fn test_source_capabilities_extended_message() {
    let mut data = vec![0x34, 0x12, 0x78, 0x56, 0, 0, 0, 0, 1, 2, 0, 3];
    data.extend_from_slice(&[0; 9]);
    data.extend_from_slice(&[1, 0, 65, 0]);
    assert_eq!(data.len(), 25);
    let tree = decode_pd(&extended_frame(0x01, &data), &DecodeContext::new()).unwrap();

    assert_eq!(
        tree.path(&["Message Header", "Message Type"]).and_then(MetadataNode::label),
        Some("Source_Capabilities_Extended")
    );
    let payload = tree.get("Payload").unwrap();
    assert_eq!(
        payload.get("VID").and_then(MetadataNode::scalar),
        Some(&Scalar::Hex("1234".to_string()))
    );
    assert_eq!(
        payload.get("PID").and_then(MetadataNode::scalar),
        Some(&Scalar::Hex("5678".to_string()))
    );
    assert_eq!(
        payload.get("FW Version").and_then(MetadataNode::scalar),
        Some(&Scalar::Unsigned(1))
    );
    assert!((quantity(payload.get("Holdup Time").unwrap()) - 0.003).abs() < 1e-9);
    assert!((quantity(payload.get("Source PDP").unwrap()) - 65.0).abs() < 1e-9);
    assert_eq!(payload.get("EPR Source PDP").unwrap().bit_loc().byte_range().end, 6 + 25);
    assert!(payload.get("Additional Data").is_none());
}

#[test]
fn test_battery_capabilities_extended_message() {
    // 50.0 Wh design capacity, last full charge capacity unknown
    let data = [0x16, 0x07, 0x60, 0x50, 0xF4, 0x01, 0xFF, 0xFF, 0x00];
    let tree = decode_pd(&extended_frame(0x05, &data), &DecodeContext::new()).unwrap();

    let payload = tree.get("Payload").unwrap();
    assert!((quantity(payload.get("Battery Design Capacity").unwrap()) - 50.0).abs() < 1e-9);
    assert_eq!(
        payload.get("Battery Last Full Charge Capacity").and_then(MetadataNode::scalar),
        Some(&Scalar::Text("Unknown".to_string()))
    );
    assert_eq!(
        payload.get("Invalid Battery Reference").and_then(MetadataNode::scalar),
        Some(&Scalar::Flag(false))
    );
    assert_spans_match_children(&tree);
}

#[test]
fn test_extended_control_message() {
    let tree = decode_pd(&extended_frame(0x10, &[0x03, 0x00]), &DecodeContext::new()).unwrap();

    let payload = tree.get("Payload").unwrap();
    assert_eq!(payload.get("Type").and_then(MetadataNode::label), Some("EPR_KeepAlive"));
    assert_eq!(payload.get("Data").and_then(MetadataNode::scalar), Some(&Scalar::Unsigned(0)));
    assert_eq!(payload.bit_loc().bit_range(), (48, 63));
}

#[test]
fn test_payload_longer_than_its_table_keeps_the_rest() {
    // Extended_Control with three extra bytes
    let tree = decode_pd(
        &extended_frame(0x10, &[0x01, 0x00, 0xAA, 0xBB, 0xCC]),
        &DecodeContext::new(),
    )
    .unwrap();

    let rest = tree.path(&["Payload", "Additional Data"]).unwrap();
    assert_eq!(rest.scalar(), Some(&Scalar::Hex("AABBCC".to_string())));
    assert_spans_match_children(&tree);
}
