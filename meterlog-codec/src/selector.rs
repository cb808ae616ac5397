//! Dataset selector mask.
//!
//! The meter records only the fields whose bit is set in the selector. The
//! mask travels as two little-endian bytes (`configureHistoryLogDataset`,
//! `getHistoryLogInfo.dataSelector`).

use crate::catalog::{all_fields, field_by_name, Field, FieldSpec, ALL_FIELDS_MASK, ALL_FIELDS_NAME};
use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Wire size of a selector mask.
pub const SELECTOR_WIRE_SIZE: usize = 2;

/// A validated 16-bit dataset selector.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct SelectorMask(u16);

impl SelectorMask {
    /// Selects nothing.
    pub const EMPTY: SelectorMask = SelectorMask(0);

    /// Selects every catalog field.
    pub const ALL: SelectorMask = SelectorMask(ALL_FIELDS_MASK);

    /// Validates raw mask bits.
    pub fn new(bits: u16) -> Result<Self, CodecError> {
        let undefined = bits & !ALL_FIELDS_MASK;
        if undefined != 0 {
            return Err(CodecError::InvalidMask {
                mask: bits,
                undefined,
            });
        }
        Ok(Self(bits))
    }

    /// Builds a mask from typed fields.
    pub fn from_fields(fields: impl IntoIterator<Item = Field>) -> Self {
        Self(
            fields
                .into_iter()
                .fold(0, |bits, field| bits | field.selector_bit()),
        )
    }

    /// Builds a mask from wire field names. `"ALL"` selects every field.
    pub fn encode<I, S>(names: I) -> Result<Self, CodecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut bits = 0u16;
        for name in names {
            let name = name.as_ref();
            if name == ALL_FIELDS_NAME {
                bits |= ALL_FIELDS_MASK;
            } else {
                bits |= field_by_name(name)?.selector_bit;
            }
        }
        Ok(Self(bits))
    }

    /// Returns the catalog entries selected by this mask, in canonical order.
    pub fn decode(self) -> Vec<&'static FieldSpec> {
        all_fields()
            .iter()
            .filter(|spec| self.0 & spec.selector_bit != 0)
            .collect()
    }

    /// Returns the selected fields in canonical order.
    pub fn fields(self) -> impl Iterator<Item = Field> {
        all_fields()
            .iter()
            .filter(move |spec| self.0 & spec.selector_bit != 0)
            .map(|spec| spec.field)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, field: Field) -> bool {
        self.0 & field.selector_bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_all(self) -> bool {
        self.0 == ALL_FIELDS_MASK
    }

    /// Returns this mask with `field` added.
    pub fn with(self, field: Field) -> Self {
        Self(self.0 | field.selector_bit())
    }

    /// Number of selected fields.
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Encodes the mask for the wire.
    pub fn to_wire(self) -> [u8; SELECTOR_WIRE_SIZE] {
        self.0.to_le_bytes()
    }

    /// Parses a mask from its wire form.
    pub fn from_wire(buf: &[u8]) -> Result<Self, CodecError> {
        match buf {
            [lo, hi] => Self::new(u16::from_le_bytes([*lo, *hi])),
            _ => Err(CodecError::Truncated {
                what: "selector mask",
                needed: SELECTOR_WIRE_SIZE,
                actual: buf.len(),
            }),
        }
    }
}

impl TryFrom<u16> for SelectorMask {
    type Error = CodecError;

    fn try_from(bits: u16) -> Result<Self, Self::Error> {
        Self::new(bits)
    }
}

impl From<SelectorMask> for u16 {
    fn from(mask: SelectorMask) -> Self {
        mask.0
    }
}

impl FromIterator<Field> for SelectorMask {
    fn from_iter<T: IntoIterator<Item = Field>>(iter: T) -> Self {
        Self::from_fields(iter)
    }
}

impl BitOr for SelectorMask {
    type Output = SelectorMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOr<Field> for SelectorMask {
    type Output = SelectorMask;

    fn bitor(self, rhs: Field) -> Self::Output {
        self.with(rhs)
    }
}

impl fmt::Debug for SelectorMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SelectorMask({:#06x})", self.0)
    }
}

impl fmt::Display for SelectorMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x} [", self.0)?;
        if self.is_all() {
            f.write_str(ALL_FIELDS_NAME)?;
        } else {
            for (i, field) in self.fields().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                f.write_str(field.name())?;
            }
        }
        f.write_str("]")
    }
}
