//! Field catalog.
//!
//! Every field a history-log entry can carry, with its byte width and the
//! selector bit that enables it. [`CATALOG`] is listed in the order the meter
//! concatenates fields into an entry; layouts are always built by walking it
//! front to back.

use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pseudo-field name selecting every catalog field.
pub const ALL_FIELDS_NAME: &str = "ALL";

/// Selector value of the "ALL" pseudo-field.
pub const ALL_FIELDS_MASK: u16 = 0xFF1F;

/// A field that can appear in a history-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    DateTimeTypeG,
    DateTimeTypeF,
    SumVolume,
    ForwardVolume,
    BackwardVolume,
    CurrentFlow,
    MaximumFlow,
    MinimumFlow,
    MediumTemp,
    AmbientTemp,
    OperatingHours,
    ErrorHours,
    ErrorState,
}

/// How the bytes of a field are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Packed 2-byte date (type G).
    DateG,
    /// Packed 4-byte date and time (type F).
    DateTimeF,
    /// Unsigned volume, 0.1 resolution.
    Volume,
    /// Signed flow rate, 0.1 resolution.
    Flow,
    /// Signed temperature, 0.1 resolution.
    Temperature,
    /// Unsigned hour counter.
    Hours,
    /// Error-handler bitfield.
    ErrorState,
}

/// Static description of one catalog field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: Field,
    pub name: &'static str,
    pub byte_width: usize,
    pub selector_bit: u16,
    pub kind: FieldKind,
}

const fn spec(
    field: Field,
    name: &'static str,
    byte_width: usize,
    selector_bit: u16,
    kind: FieldKind,
) -> FieldSpec {
    FieldSpec {
        field,
        name,
        byte_width,
        selector_bit,
        kind,
    }
}

/// All fields in canonical concatenation order.
pub const CATALOG: [FieldSpec; 13] = [
    spec(Field::DateTimeTypeG, "dateTimeTypeG", 2, 0x0100, FieldKind::DateG),
    spec(Field::DateTimeTypeF, "dateTimeTypeF", 4, 0x0200, FieldKind::DateTimeF),
    spec(Field::SumVolume, "sumVolume", 4, 0x0400, FieldKind::Volume),
    spec(Field::ForwardVolume, "forwardVolume", 4, 0x0800, FieldKind::Volume),
    spec(Field::BackwardVolume, "backwardVolume", 4, 0x1000, FieldKind::Volume),
    spec(Field::CurrentFlow, "currentFlow", 3, 0x2000, FieldKind::Flow),
    spec(Field::MaximumFlow, "maximumFlow", 3, 0x4000, FieldKind::Flow),
    spec(Field::MinimumFlow, "minimumFlow", 3, 0x8000, FieldKind::Flow),
    spec(Field::MediumTemp, "mediumTemp", 2, 0x0001, FieldKind::Temperature),
    spec(Field::AmbientTemp, "ambientTemp", 2, 0x0002, FieldKind::Temperature),
    spec(Field::OperatingHours, "operatingHours", 3, 0x0004, FieldKind::Hours),
    spec(Field::ErrorHours, "errorHours", 2, 0x0008, FieldKind::Hours),
    spec(Field::ErrorState, "errorState", 4, 0x0010, FieldKind::ErrorState),
];

/// Returns every catalog field in canonical order.
pub fn all_fields() -> &'static [FieldSpec] {
    &CATALOG
}

/// Looks up a field by its wire name.
pub fn field_by_name(name: &str) -> Result<&'static FieldSpec, CodecError> {
    CATALOG
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| CodecError::UnknownField {
            name: name.to_string(),
        })
}

/// Looks up a field by its selector bit. Exactly one bit must be set.
pub fn field_by_bit(bit: u16) -> Result<&'static FieldSpec, CodecError> {
    CATALOG
        .iter()
        .find(|spec| spec.selector_bit == bit)
        .ok_or(CodecError::UnknownFieldBit { bit })
}

impl Field {
    /// Returns the catalog entry for this field.
    pub fn spec(self) -> &'static FieldSpec {
        // CATALOG is declared in enum order.
        &CATALOG[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn byte_width(self) -> usize {
        self.spec().byte_width
    }

    pub fn selector_bit(self) -> u16 {
        self.spec().selector_bit
    }

    pub fn kind(self) -> FieldKind {
        self.spec().kind
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        field_by_name(s).map(|spec| spec.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_matches_enum_order() {
        for (i, spec) in CATALOG.iter().enumerate() {
            assert_eq!(spec.field as usize, i);
            assert_eq!(spec.field.spec(), spec);
        }
    }

    #[test]
    fn test_selector_bits_are_distinct_single_bits() {
        let mut union = 0u16;
        for spec in all_fields() {
            assert_eq!(spec.selector_bit.count_ones(), 1, "{}", spec.name);
            assert_eq!(union & spec.selector_bit, 0, "{}", spec.name);
            union |= spec.selector_bit;
        }
        assert_eq!(union, ALL_FIELDS_MASK);
    }

    #[test]
    fn test_total_width() {
        let total: usize = all_fields().iter().map(|s| s.byte_width).sum();
        assert_eq!(total, 40);
    }

    #[test]
    fn test_lookup_by_name() {
        let spec = field_by_name("operatingHours").unwrap();
        assert_eq!(spec.field, Field::OperatingHours);
        assert_eq!(spec.byte_width, 3);
        assert_eq!(spec.selector_bit, 0x0004);

        assert_eq!("errorState".parse::<Field>().unwrap(), Field::ErrorState);
    }

    #[test]
    fn test_lookup_rejects_misspelled_names() {
        assert!(matches!(
            field_by_name("maximumFlow:"),
            Err(CodecError::UnknownField { .. })
        ));
        assert!(field_by_name("mediumTemperature").is_err());
        assert!(field_by_name(ALL_FIELDS_NAME).is_err());
    }

    #[test]
    fn test_lookup_by_bit() {
        assert_eq!(field_by_bit(0x0200).unwrap().field, Field::DateTimeTypeF);
        assert_eq!(field_by_bit(0x0010).unwrap().field, Field::ErrorState);
        assert!(matches!(
            field_by_bit(0x0020),
            Err(CodecError::UnknownFieldBit { bit: 0x0020 })
        ));
        assert!(field_by_bit(ALL_FIELDS_MASK).is_err());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&Field::DateTimeTypeF).unwrap();
        assert_eq!(json, "\"dateTimeTypeF\"");
        let parsed: Field = serde_json::from_str("\"minimumFlow\"").unwrap();
        assert_eq!(parsed, Field::MinimumFlow);
    }
}
