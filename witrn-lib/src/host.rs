//! Hex-string boundary for embedding hosts (web front ends, the CLI).

use serde::{Serialize, Serializer};
use std::sync::Arc;

use crate::error::DecodeError;
use crate::frame::{Decoded, Decoder, FrameKind};
use crate::metadata::MetadataNode;

/// Strip whitespace and upper-case a hex payload.
pub fn normalize_hex(payload: &str) -> Result<String, DecodeError> {
    let cleaned: String = payload.split_whitespace().collect();
    if cleaned.is_empty() {
        return Err(DecodeError::EmptyInput);
    }
    if cleaned.len() % 2 != 0 {
        return Err(DecodeError::OddHexLength(cleaned.len()));
    }
    Ok(cleaned.to_ascii_uppercase())
}

/// Parse a hex payload into frame bytes.
pub fn parse_hex(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let cleaned = normalize_hex(payload)?;
    Ok(hex::decode(cleaned)?)
}

fn serialize_tree<S: Serializer>(
    tree: &Arc<MetadataNode>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    tree.as_ref().serialize(serializer)
}

/// JSON-ready result of [`decode_hex_payload`].
#[derive(Debug, Clone, Serialize)]
pub struct DecodeReport {
    pub status: &'static str,
    pub message: FrameKind,
    /// The normalized input.
    pub raw: String,
    #[serde(serialize_with = "serialize_tree")]
    pub tree: Arc<MetadataNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pd_message_type: Option<&'static str>,
}

impl DecodeReport {
    fn new(raw: String, decoded: Decoded) -> Self {
        Self {
            status: "ok",
            message: decoded.kind,
            raw,
            tree: decoded.tree,
            pd_message_type: decoded.message_type,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Decode one hex-encoded frame through `decoder`, updating its context.
pub fn decode_hex_payload(
    decoder: &mut Decoder,
    payload: &str,
) -> Result<DecodeReport, DecodeError> {
    let raw = normalize_hex(payload)?;
    let bytes = hex::decode(&raw)?;
    let decoded = decoder.decode(bytes)?;
    Ok(DecodeReport::new(raw, decoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_hex() {
        assert_eq!(normalize_hex(" fe 02\n81 00 ").unwrap(), "FE028100");
        assert_eq!(normalize_hex("  \t"), Err(DecodeError::EmptyInput));
        assert_eq!(normalize_hex("FE0"), Err(DecodeError::OddHexLength(3)));
    }

    #[test]
    fn test_invalid_hex_digit() {
        assert!(matches!(parse_hex("FEZZ"), Err(DecodeError::InvalidHex(_))));
    }

    #[test]
    fn test_report_json_shape() {
        let mut decoder = Decoder::new();
        let report = decode_hex_payload(&mut decoder, "fe028100").unwrap();
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["message"], "pd");
        assert_eq!(json["raw"], "FE028100");
        assert_eq!(json["pd_message_type"], "GoodCRC");
        assert_eq!(json["tree"]["field"], "PD Message");
        assert_eq!(json["tree"]["bit_loc"], serde_json::json!([0, 31]));
        assert_eq!(json["tree"]["value"][0]["field"], "Frame Type");
        assert_eq!(json["tree"]["value"][0]["raw"], "FE");
    }
}
