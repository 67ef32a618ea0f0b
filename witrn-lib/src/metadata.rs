//! The decode result tree.
//!
//! Every decoded field is a [`MetadataNode`]: a name, the [`BitLoc`] of the
//! field inside the frame, the raw bytes covering it and a [`Value`]. A value
//! is either a [`Scalar`] or an ordered list of child nodes, never both.

use bytes::Bytes;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use strum_macros::Display;
use uom::si::electric_current::{ampere, milliampere};
use uom::si::electric_potential::{millivolt, volt};
use uom::si::f64::{ElectricCurrent, ElectricPotential, Power, Time};
use uom::si::power::{milliwatt, watt};
use uom::si::time::{millisecond, second};

use crate::bitfield::BitLoc;
use crate::error::FieldError;

/// Physical unit of a [`Scalar::Quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Unit {
    #[strum(to_string = "V")]
    Volt,
    #[strum(to_string = "A")]
    Ampere,
    #[strum(to_string = "W")]
    Watt,
    #[strum(to_string = "Ah")]
    AmpereHour,
    #[strum(to_string = "Wh")]
    WattHour,
    #[strum(to_string = "°C")]
    Celsius,
    #[strum(to_string = "s")]
    Second,
}

impl Unit {
    /// Convert a value expressed in thousandths of this unit.
    pub fn from_milli(self, milli: f64) -> f64 {
        match self {
            Unit::Volt => ElectricPotential::new::<millivolt>(milli).get::<volt>(),
            Unit::Ampere => ElectricCurrent::new::<milliampere>(milli).get::<ampere>(),
            Unit::Watt => Power::new::<milliwatt>(milli).get::<watt>(),
            Unit::Second => Time::new::<millisecond>(milli).get::<second>(),
            Unit::AmpereHour | Unit::WattHour | Unit::Celsius => milli / 1000.0,
        }
    }

    fn precision(self) -> usize {
        match self {
            Unit::AmpereHour | Unit::WattHour => 6,
            Unit::Celsius => 2,
            Unit::Second => 3,
            Unit::Volt | Unit::Ampere | Unit::Watt => 3,
        }
    }
}

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Unsigned(u64),
    Flag(bool),
    /// A recognised code and its label.
    Label { code: u64, label: &'static str },
    /// A scaled physical value.
    Quantity { value: f64, unit: Unit },
    Text(String),
    /// Opaque bytes, upper-case hex.
    Hex(String),
    /// The raw integer, exposed because interpretation failed.
    Uninterpreted(u64),
    /// The field could not be decoded at all.
    Malformed(FieldError),
}

impl Scalar {
    pub fn is_interpreted(&self) -> bool {
        !matches!(self, Scalar::Uninterpreted(_) | Scalar::Malformed(_))
    }

    /// The integer behind the value, where one exists.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Scalar::Unsigned(v) | Scalar::Uninterpreted(v) => Some(*v),
            Scalar::Label { code, .. } => Some(*code),
            Scalar::Flag(b) => Some(*b as u64),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Unsigned(v) => write!(f, "{}", v),
            Scalar::Flag(b) => write!(f, "{}", b),
            Scalar::Label { label, .. } => f.write_str(label),
            Scalar::Quantity { value, unit } => write!(f, "{:.*}{}", unit.precision(), value, unit),
            Scalar::Text(s) => f.write_str(s),
            Scalar::Hex(s) => write!(f, "0x{}", s),
            Scalar::Uninterpreted(v) => write!(f, "0x{:X} (uninterpreted)", v),
            Scalar::Malformed(e) => write!(f, "<malformed: {}>", e),
        }
    }
}

/// Either a scalar or an ordered list of children.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Children(Vec<MetadataNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataNode {
    field: String,
    bit_loc: BitLoc,
    raw: Bytes,
    value: Value,
}

impl MetadataNode {
    /// A leaf whose raw bytes are taken from `frame` at `loc`.
    ///
    /// `loc` must lie inside `frame`; callers obtain it from a successful
    /// extraction or clamp it first.
    pub fn leaf(field: impl Into<String>, frame: &Bytes, loc: BitLoc, value: Scalar) -> Self {
        Self {
            field: field.into(),
            raw: frame.slice(loc.byte_range()),
            bit_loc: loc,
            value: Value::Scalar(value),
        }
    }

    /// A composite node with an explicit location.
    pub fn branch(
        field: impl Into<String>,
        frame: &Bytes,
        loc: BitLoc,
        children: Vec<MetadataNode>,
    ) -> Self {
        Self {
            field: field.into(),
            raw: frame.slice(loc.byte_range()),
            bit_loc: loc,
            value: Value::Children(children),
        }
    }

    /// A composite node spanning the union of its children.
    pub fn group(
        field: &'static str,
        frame: &Bytes,
        children: Vec<MetadataNode>,
    ) -> Result<Self, FieldError> {
        let loc = children
            .iter()
            .map(|c| c.bit_loc)
            .reduce(|a, b| a.union(&b))
            .ok_or(FieldError::Empty(field))?;
        Ok(Self::branch(field, frame, loc, children))
    }

    /// An error-flagged leaf at `loc`.
    pub fn malformed(
        field: impl Into<String>,
        frame: &Bytes,
        loc: BitLoc,
        error: FieldError,
    ) -> Self {
        Self::leaf(field, frame, loc, Scalar::Malformed(error))
    }

    /// An error-flagged leaf covering whatever bytes exist from `byte_offset`
    /// to the end of `frame`, or `None` when there are none.
    pub fn incomplete(
        field: impl Into<String>,
        frame: &Bytes,
        byte_offset: usize,
        error: FieldError,
    ) -> Option<Self> {
        let available = frame.len().checked_sub(byte_offset).filter(|n| *n > 0)?;
        Some(Self::malformed(field, frame, BitLoc::bytes(byte_offset, available), error))
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn bit_loc(&self) -> BitLoc {
        self.bit_loc
    }

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn scalar(&self) -> Option<&Scalar> {
        match &self.value {
            Value::Scalar(s) => Some(s),
            Value::Children(_) => None,
        }
    }

    /// Children of a composite node; empty for a scalar.
    pub fn children(&self) -> &[MetadataNode] {
        match &self.value {
            Value::Children(children) => children,
            Value::Scalar(_) => &[],
        }
    }

    /// First direct child named `field`.
    pub fn get(&self, field: &str) -> Option<&MetadataNode> {
        self.children().iter().find(|c| c.field == field)
    }

    /// Walk down through nested children by name.
    pub fn path(&self, fields: &[&str]) -> Option<&MetadataNode> {
        fields.iter().try_fold(self, |node, name| node.get(name))
    }

    /// Label of an enum-valued leaf.
    pub fn label(&self) -> Option<&'static str> {
        match self.scalar() {
            Some(Scalar::Label { label, .. }) => Some(*label),
            _ => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self.scalar(), Some(Scalar::Malformed(_)))
    }

    /// True when this node or any descendant failed to decode.
    pub fn has_errors(&self) -> bool {
        self.is_malformed() || self.children().iter().any(MetadataNode::has_errors)
    }

    /// All scalar nodes in depth-first order.
    pub fn leaves(&self) -> Vec<&MetadataNode> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a MetadataNode>) {
        match &self.value {
            Value::Scalar(_) => out.push(self),
            Value::Children(children) => children.iter().for_each(|c| c.collect_leaves(out)),
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let (start, end) = self.bit_loc.bit_range();
        write!(f, "{:indent$}{} [bits {}-{}]", "", self.field, start, end, indent = depth * 2)?;
        match &self.value {
            Value::Scalar(s) => writeln!(f, ": {}", s),
            Value::Children(children) => {
                writeln!(f)?;
                children.iter().try_for_each(|c| c.fmt_indented(f, depth + 1))
            }
        }
    }
}

impl fmt::Display for MetadataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

struct SerializeValue<'a>(&'a Value);

impl Serialize for SerializeValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Children(children) => children.serialize(serializer),
            Value::Scalar(Scalar::Unsigned(v)) | Value::Scalar(Scalar::Uninterpreted(v)) => {
                serializer.serialize_u64(*v)
            }
            Value::Scalar(Scalar::Flag(b)) => serializer.serialize_bool(*b),
            Value::Scalar(other) => serializer.collect_str(other),
        }
    }
}

/// Host projection: `{field, bit_loc: [start, end], raw, value}` plus an
/// `interpreted` flag on leaves that fell back to raw values.
impl Serialize for MetadataNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fallback = self.scalar().filter(|s| !s.is_interpreted());
        let len = if fallback.is_some() { 5 } else { 4 };
        let mut state = serializer.serialize_struct("MetadataNode", len)?;
        state.serialize_field("field", &self.field)?;
        let (start, end) = self.bit_loc.bit_range();
        state.serialize_field("bit_loc", &[start, end])?;
        state.serialize_field("raw", &hex::encode_upper(&self.raw))?;
        state.serialize_field("value", &SerializeValue(&self.value))?;
        if fallback.is_some() {
            state.serialize_field("interpreted", &false)?;
        }
        state.end()
    }
}
