//! USB PD message header, extended header and message type code spaces.

use modular_bitfield::prelude::*;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::{Display, IntoStaticStr};

use crate::bitfield::FieldSpec;

#[bitfield(bytes = 2)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MessageHeader {
    pub message_type: B5,
    pub port_data_role: bool,
    pub spec_revision: B2,
    pub port_power_role: bool,
    pub message_id: B3,
    pub num_data_objects: B3,
    pub extended: bool,
}

#[bitfield(bytes = 2)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtendedHeader {
    pub data_size: B9,
    #[skip]
    unused: bool,
    pub request_chunk: bool,
    pub chunk_number: B4,
    pub chunked: bool,
}

/// Which code space the Message Type field is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Control(u8),
    Data(u8),
    Extended(u8),
}

impl From<MessageHeader> for MessageKind {
    fn from(header: MessageHeader) -> Self {
        let code = header.message_type();
        if header.extended() {
            MessageKind::Extended(code)
        } else if header.num_data_objects() == 0 {
            MessageKind::Control(code)
        } else {
            MessageKind::Data(code)
        }
    }
}

impl MessageKind {
    /// Label of the message type, or `None` for reserved codes.
    pub fn label(&self) -> Option<&'static str> {
        match *self {
            MessageKind::Control(code) => ControlMessageType::try_from(code).ok().map(Into::into),
            MessageKind::Data(code) => DataMessageType::try_from(code).ok().map(Into::into),
            MessageKind::Extended(code) => ExtendedMessageType::try_from(code).ok().map(Into::into),
        }
    }

    fn field_spec(&self) -> FieldSpec {
        match self {
            MessageKind::Control(_) => FieldSpec::label(MESSAGE_TYPE, 0, 5, control_label),
            MessageKind::Data(_) => FieldSpec::label(MESSAGE_TYPE, 0, 5, data_label),
            MessageKind::Extended(_) => FieldSpec::label(MESSAGE_TYPE, 0, 5, extended_label),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive, Display, IntoStaticStr,
)]
#[repr(u8)]
pub enum ControlMessageType {
    #[strum(serialize = "GoodCRC")]
    GoodCrc = 0x01,
    #[strum(serialize = "GotoMin")]
    GotoMin = 0x02,
    #[strum(serialize = "Accept")]
    Accept = 0x03,
    #[strum(serialize = "Reject")]
    Reject = 0x04,
    #[strum(serialize = "Ping")]
    Ping = 0x05,
    #[strum(serialize = "PS_RDY")]
    PsRdy = 0x06,
    #[strum(serialize = "Get_Source_Cap")]
    GetSourceCap = 0x07,
    #[strum(serialize = "Get_Sink_Cap")]
    GetSinkCap = 0x08,
    #[strum(serialize = "DR_Swap")]
    DrSwap = 0x09,
    #[strum(serialize = "PR_Swap")]
    PrSwap = 0x0A,
    #[strum(serialize = "VCONN_Swap")]
    VconnSwap = 0x0B,
    #[strum(serialize = "Wait")]
    Wait = 0x0C,
    #[strum(serialize = "Soft_Reset")]
    SoftReset = 0x0D,
    #[strum(serialize = "Data_Reset")]
    DataReset = 0x0E,
    #[strum(serialize = "Data_Reset_Complete")]
    DataResetComplete = 0x0F,
    #[strum(serialize = "Not_Supported")]
    NotSupported = 0x10,
    #[strum(serialize = "Get_Source_Cap_Extended")]
    GetSourceCapExtended = 0x11,
    #[strum(serialize = "Get_Status")]
    GetStatus = 0x12,
    #[strum(serialize = "FR_Swap")]
    FrSwap = 0x13,
    #[strum(serialize = "Get_PPS_Status")]
    GetPpsStatus = 0x14,
    #[strum(serialize = "Get_Country_Codes")]
    GetCountryCodes = 0x15,
    #[strum(serialize = "Get_Sink_Cap_Extended")]
    GetSinkCapExtended = 0x16,
    #[strum(serialize = "Get_Source_Info")]
    GetSourceInfo = 0x17,
    #[strum(serialize = "Get_Revision")]
    GetRevision = 0x18,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive, Display, IntoStaticStr,
)]
#[repr(u8)]
pub enum DataMessageType {
    #[strum(serialize = "Source_Capabilities")]
    SourceCapabilities = 0x01,
    #[strum(serialize = "Request")]
    Request = 0x02,
    #[strum(serialize = "BIST")]
    Bist = 0x03,
    #[strum(serialize = "Sink_Capabilities")]
    SinkCapabilities = 0x04,
    #[strum(serialize = "Battery_Status")]
    BatteryStatus = 0x05,
    #[strum(serialize = "Alert")]
    Alert = 0x06,
    #[strum(serialize = "Get_Country_Info")]
    GetCountryInfo = 0x07,
    #[strum(serialize = "Enter_USB")]
    EnterUsb = 0x08,
    #[strum(serialize = "EPR_Request")]
    EprRequest = 0x09,
    #[strum(serialize = "EPR_Mode")]
    EprMode = 0x0A,
    #[strum(serialize = "Source_Info")]
    SourceInfo = 0x0B,
    #[strum(serialize = "Revision")]
    Revision = 0x0C,
    #[strum(serialize = "Vendor_Defined")]
    VendorDefined = 0x0F,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive, Display, IntoStaticStr,
)]
#[repr(u8)]
pub enum ExtendedMessageType {
    #[strum(serialize = "Source_Capabilities_Extended")]
    SourceCapabilitiesExtended = 0x01,
    #[strum(serialize = "Status")]
    Status = 0x02,
    #[strum(serialize = "Get_Battery_Cap")]
    GetBatteryCap = 0x03,
    #[strum(serialize = "Get_Battery_Status")]
    GetBatteryStatus = 0x04,
    #[strum(serialize = "Battery_Capabilities")]
    BatteryCapabilities = 0x05,
    #[strum(serialize = "Get_Manufacturer_Info")]
    GetManufacturerInfo = 0x06,
    #[strum(serialize = "Manufacturer_Info")]
    ManufacturerInfo = 0x07,
    #[strum(serialize = "Security_Request")]
    SecurityRequest = 0x08,
    #[strum(serialize = "Security_Response")]
    SecurityResponse = 0x09,
    #[strum(serialize = "Firmware_Update_Request")]
    FirmwareUpdateRequest = 0x0A,
    #[strum(serialize = "Firmware_Update_Response")]
    FirmwareUpdateResponse = 0x0B,
    #[strum(serialize = "PPS_Status")]
    PpsStatus = 0x0C,
    #[strum(serialize = "Country_Info")]
    CountryInfo = 0x0D,
    #[strum(serialize = "Country_Codes")]
    CountryCodes = 0x0E,
    #[strum(serialize = "Sink_Capabilities_Extended")]
    SinkCapabilitiesExtended = 0x0F,
    #[strum(serialize = "Extended_Control")]
    ExtendedControl = 0x10,
    #[strum(serialize = "EPR_Source_Capabilities")]
    EprSourceCapabilities = 0x11,
    #[strum(serialize = "EPR_Sink_Capabilities")]
    EprSinkCapabilities = 0x12,
    #[strum(serialize = "Vendor_Defined_Extended")]
    VendorDefinedExtended = 0x13,
}

pub const MESSAGE_TYPE: &str = "Message Type";

fn control_label(code: u64) -> Option<&'static str> {
    ControlMessageType::try_from(code as u8).ok().map(Into::into)
}

fn data_label(code: u64) -> Option<&'static str> {
    DataMessageType::try_from(code as u8).ok().map(Into::into)
}

fn extended_label(code: u64) -> Option<&'static str> {
    ExtendedMessageType::try_from(code as u8).ok().map(Into::into)
}

fn data_role(code: u64) -> Option<&'static str> {
    Some(if code == 0 { "UFP" } else { "DFP" })
}

fn power_role(code: u64) -> Option<&'static str> {
    Some(if code == 0 { "Sink" } else { "Source" })
}

fn spec_revision(code: u64) -> Option<&'static str> {
    match code {
        0 => Some("Revision 1.0"),
        1 => Some("Revision 2.0"),
        2 => Some("Revision 3.x"),
        _ => None,
    }
}

/// Message header rows, most significant first, followed by the message type
/// resolved in the code space of `kind`.
pub(crate) fn header_fields(kind: MessageKind) -> [FieldSpec; 7] {
    [
        FieldSpec::flag("Extended", 15),
        FieldSpec::unsigned("Number of Data Objects", 12, 3),
        FieldSpec::unsigned("Message ID", 9, 3),
        FieldSpec::label("Port Power Role", 8, 1, power_role),
        FieldSpec::label("Specification Revision", 6, 2, spec_revision),
        FieldSpec::label("Port Data Role", 5, 1, data_role),
        kind.field_spec(),
    ]
}

pub(crate) const EXTENDED_HEADER_FIELDS: &[FieldSpec] = &[
    FieldSpec::flag("Chunked", 15),
    FieldSpec::unsigned("Chunk Number", 11, 4),
    FieldSpec::flag("Request Chunk", 10),
    FieldSpec::unsigned("Data Size", 0, 9),
];
