pub mod bitfield;
pub mod constants;
pub mod context;
pub mod error;
pub mod frame;
pub mod general;
pub mod host;
pub mod metadata;
pub mod pd;


// Re-export the entry points most callers need
pub use context::DecodeContext;
pub use error::{DecodeError, FieldError};
pub use frame::{Decoded, Decoder, Frame, FrameKind};
pub use host::{DecodeReport, decode_hex_payload, normalize_hex};
pub use metadata::{MetadataNode, Scalar, Unit, Value};
