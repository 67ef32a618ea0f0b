//! Bit-level field extraction.
//!
//! Locations are measured from the first byte of the decoded frame. Bits are
//! numbered LSB-first inside little-endian words, which is how both the meter
//! and USB PD lay out their multi-byte fields: bit 10 of the 32-bit word at
//! byte 4 is absolute bit `4 * 8 + 10`.

use bytes::Bytes;
use std::ops::Range;

use crate::error::FieldError;
use crate::metadata::{MetadataNode, Scalar, Unit};

/// Where a field lives: the first byte touched, the bit inside that byte where
/// the field starts, and its width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitLoc {
    pub byte_offset: usize,
    pub bit_offset: u8,
    pub bit_width: u32,
}

impl BitLoc {
    pub fn new(byte_offset: usize, bit_offset: u8, bit_width: u32) -> Self {
        let start = byte_offset * 8 + bit_offset as usize;
        Self::from_bits(start, bit_width)
    }

    /// Location from an absolute start bit.
    pub fn from_bits(start_bit: usize, bit_width: u32) -> Self {
        Self {
            byte_offset: start_bit / 8,
            bit_offset: (start_bit % 8) as u8,
            bit_width,
        }
    }

    /// A byte-aligned span of `len` bytes.
    pub fn bytes(byte_offset: usize, len: usize) -> Self {
        Self {
            byte_offset,
            bit_offset: 0,
            bit_width: (len * 8) as u32,
        }
    }

    pub fn start_bit(&self) -> usize {
        self.byte_offset * 8 + self.bit_offset as usize
    }

    /// Last bit covered, inclusive.
    pub fn end_bit(&self) -> usize {
        self.start_bit() + (self.bit_width.max(1) as usize) - 1
    }

    /// Absolute `(start, end)` bits, both inclusive.
    pub fn bit_range(&self) -> (usize, usize) {
        (self.start_bit(), self.end_bit())
    }

    /// The minimal run of bytes that covers every bit of the field.
    pub fn byte_range(&self) -> Range<usize> {
        self.byte_offset..self.end_bit() / 8 + 1
    }

    pub fn union(&self, other: &BitLoc) -> BitLoc {
        let start = self.start_bit().min(other.start_bit());
        let end = self.end_bit().max(other.end_bit());
        BitLoc::from_bits(start, (end - start + 1) as u32)
    }
}

/// Read the unsigned integer stored at `loc`.
pub fn extract(buf: &[u8], loc: BitLoc) -> Result<u64, FieldError> {
    if loc.bit_width == 0 || loc.bit_width > 64 {
        return Err(FieldError::Width(loc.bit_width));
    }
    let bytes = buf.get(loc.byte_range()).ok_or(FieldError::OutOfRange {
        start: loc.start_bit(),
        end: loc.end_bit(),
        available: buf.len(),
    })?;

    // Up to nine bytes when a 64-bit field does not start on a byte boundary
    let word = bytes
        .iter()
        .enumerate()
        .fold(0u128, |acc, (i, b)| acc | (*b as u128) << (8 * i));
    let mask = (1u128 << loc.bit_width) - 1;
    Ok(((word >> loc.bit_offset) & mask) as u64)
}

/// How a raw integer becomes a [`Scalar`].
#[derive(Debug, Clone, Copy)]
pub enum Interpretation {
    Unsigned,
    Flag,
    /// Look the code up in a label table.
    Label(fn(u64) -> Option<&'static str>),
    /// `raw * step` thousandths of `unit` (the "50 mV units" of the PD tables).
    Milli { step: f64, unit: Unit },
    Custom(fn(u64) -> Option<Scalar>),
    /// Reserved or layout-dependent bits that are shown as-is.
    Raw,
}

impl Interpretation {
    /// Never fails: anything that cannot be interpreted is returned as
    /// [`Scalar::Uninterpreted`].
    pub fn apply(self, raw: u64) -> Scalar {
        let interpreted = match self {
            Interpretation::Unsigned => Some(Scalar::Unsigned(raw)),
            Interpretation::Flag => Some(Scalar::Flag(raw != 0)),
            Interpretation::Label(table) => {
                table(raw).map(|label| Scalar::Label { code: raw, label })
            }
            Interpretation::Milli { step, unit } => {
                quantity(unit.from_milli(raw as f64 * step), unit)
            }
            Interpretation::Custom(f) => f(raw),
            Interpretation::Raw => None,
        };
        interpreted.unwrap_or(Scalar::Uninterpreted(raw))
    }
}

/// A finite value becomes a quantity; NaN and infinities are rejected.
pub fn quantity(value: f64, unit: Unit) -> Option<Scalar> {
    value.is_finite().then_some(Scalar::Quantity { value, unit })
}

/// A named field at a fixed location.
#[derive(Debug, Clone, Copy)]
pub struct BitField {
    pub name: &'static str,
    pub loc: BitLoc,
    pub interpretation: Interpretation,
}

impl BitField {
    pub fn new(name: &'static str, loc: BitLoc, interpretation: Interpretation) -> Self {
        Self {
            name,
            loc,
            interpretation,
        }
    }

    pub fn decode(&self, frame: &Bytes) -> Result<MetadataNode, FieldError> {
        let raw = extract(frame, self.loc)?;
        Ok(MetadataNode::leaf(
            self.name,
            frame,
            self.loc,
            self.interpretation.apply(raw),
        ))
    }
}

/// One row of a layout table: `width` bits starting at bit `lsb` of the
/// structure the table describes.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub lsb: u16,
    pub width: u8,
    pub interpretation: Interpretation,
}

impl FieldSpec {
    pub const fn new(
        name: &'static str,
        lsb: u16,
        width: u8,
        interpretation: Interpretation,
    ) -> Self {
        Self {
            name,
            lsb,
            width,
            interpretation,
        }
    }

    pub const fn flag(name: &'static str, bit: u16) -> Self {
        Self::new(name, bit, 1, Interpretation::Flag)
    }

    pub const fn unsigned(name: &'static str, lsb: u16, width: u8) -> Self {
        Self::new(name, lsb, width, Interpretation::Unsigned)
    }

    pub const fn milli(name: &'static str, lsb: u16, width: u8, step: f64, unit: Unit) -> Self {
        Self::new(name, lsb, width, Interpretation::Milli { step, unit })
    }

    pub const fn label(
        name: &'static str,
        lsb: u16,
        width: u8,
        table: fn(u64) -> Option<&'static str>,
    ) -> Self {
        Self::new(name, lsb, width, Interpretation::Label(table))
    }

    pub const fn raw(name: &'static str, lsb: u16, width: u8) -> Self {
        Self::new(name, lsb, width, Interpretation::Raw)
    }

    /// Place the row over a structure that starts at `base_byte`.
    pub fn at(&self, base_byte: usize) -> BitField {
        BitField::new(
            self.name,
            BitLoc::from_bits(base_byte * 8 + self.lsb as usize, self.width as u32),
            self.interpretation,
        )
    }
}

/// Decode every row of `specs` over the structure at `base_byte`.
pub fn decode_fields(
    frame: &Bytes,
    base_byte: usize,
    specs: &[FieldSpec],
) -> Result<Vec<MetadataNode>, FieldError> {
    specs.iter().map(|spec| spec.at(base_byte).decode(frame)).collect()
}

/// Read a little-endian 32-bit word.
pub fn read_u32(frame: &[u8], byte_offset: usize) -> Result<u32, FieldError> {
    extract(frame, BitLoc::bytes(byte_offset, 4)).map(|v| v as u32)
}
