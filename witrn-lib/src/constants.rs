// Frame constants for WITRN capture reports

/// Marker byte of a general telemetry frame
pub const GENERAL_MARKER: u8 = 0xFF;

/// Marker byte of a USB PD frame
pub const PD_MARKER: u8 = 0xFE;

/// Size of a general telemetry frame (64 bytes)
pub const GENERAL_FRAME_SIZE: usize = 64;

/// Size of the PD frame header: marker + payload length (2 bytes)
pub const PD_FRAME_HEADER_SIZE: usize = 2;

/// Size of the USB PD message header (2 bytes)
pub const PD_MESSAGE_HEADER_SIZE: usize = 2;

/// Size of the extended message header (2 bytes)
pub const PD_EXTENDED_HEADER_SIZE: usize = 2;

/// Size of one data object (4 bytes)
pub const PD_DATA_OBJECT_SIZE: usize = 4;

/// Largest chunk of extended message data carried in one message
pub const PD_MAX_CHUNK_SIZE: usize = 26;

/// Byte offset of the PD message header inside a PD frame
pub const PD_MESSAGE_OFFSET: usize = PD_FRAME_HEADER_SIZE;

/// Byte offset of the first data object inside a PD frame
pub const PD_OBJECTS_OFFSET: usize = PD_MESSAGE_OFFSET + PD_MESSAGE_HEADER_SIZE;
