//! History-log entry decoding.

use crate::catalog::{Field, FieldKind};
use crate::error::CodecError;
use crate::layout::RecordLayout;
use crate::timestamp::{DateG, DateTimeF};
use crate::value::{Decimal1, ErrorFlags};
use bytes::Buf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The decoded value of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldValue {
    DateTimeF { stamp: DateTimeF, valid: bool },
    DateG { stamp: DateG, valid: bool },
    Decimal { value: Decimal1 },
    Counter { value: u32 },
    ErrorState { flags: ErrorFlags },
}

impl FieldValue {
    /// Timestamp validity; `None` for non-timestamp values.
    pub fn timestamp_valid(&self) -> Option<bool> {
        match self {
            FieldValue::DateTimeF { valid, .. } | FieldValue::DateG { valid, .. } => Some(*valid),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal1> {
        match self {
            FieldValue::Decimal { value } => Some(*value),
            _ => None,
        }
    }

    pub fn as_counter(&self) -> Option<u32> {
        match self {
            FieldValue::Counter { value } => Some(*value),
            _ => None,
        }
    }

    pub fn as_datetime_f(&self) -> Option<DateTimeF> {
        match self {
            FieldValue::DateTimeF { stamp, .. } => Some(*stamp),
            _ => None,
        }
    }

    pub fn as_date_g(&self) -> Option<DateG> {
        match self {
            FieldValue::DateG { stamp, .. } => Some(*stamp),
            _ => None,
        }
    }

    pub fn as_error_flags(&self) -> Option<ErrorFlags> {
        match self {
            FieldValue::ErrorState { flags } => Some(*flags),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::DateTimeF { stamp, valid } => {
                write!(f, "{}", stamp)?;
                if !valid {
                    f.write_str(" (invalid)")?;
                }
                Ok(())
            }
            FieldValue::DateG { stamp, valid } => {
                write!(f, "{}", stamp)?;
                if !valid {
                    f.write_str(" (invalid)")?;
                }
                Ok(())
            }
            FieldValue::Decimal { value } => write!(f, "{}", value),
            FieldValue::Counter { value } => write!(f, "{}", value),
            FieldValue::ErrorState { flags } => write!(f, "{}", flags),
        }
    }
}

/// A decoded entry: every field of the layout with its value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedEntry {
    values: BTreeMap<Field, FieldValue>,
}

impl DecodedEntry {
    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    /// Iterates values in canonical field order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.values.iter().map(|(field, value)| (*field, value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns false if any timestamp field failed its range check.
    pub fn timestamps_valid(&self) -> bool {
        self.values
            .values()
            .all(|value| value.timestamp_valid().unwrap_or(true))
    }
}

/// Decodes raw entries against a fixed layout.
#[derive(Debug, Clone)]
pub struct RecordDecoder {
    layout: RecordLayout,
    strict_timestamps: bool,
}

impl RecordDecoder {
    pub fn new(layout: RecordLayout) -> Self {
        Self {
            layout,
            strict_timestamps: false,
        }
    }

    /// In strict mode an out-of-range timestamp fails the decode instead of
    /// being flagged invalid.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_timestamps = strict;
        self
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// Decodes one entry.
    pub fn decode(&self, raw: &[u8]) -> Result<DecodedEntry, CodecError> {
        self.layout.check_len(raw)?;

        let mut buf = raw;
        let mut values = BTreeMap::new();
        for slot in self.layout.slots() {
            let value = self.decode_field(slot.field, &buf[..slot.width])?;
            buf.advance(slot.width);
            values.insert(slot.field, value);
        }

        Ok(DecodedEntry { values })
    }

    fn decode_field(&self, field: Field, mut bytes: &[u8]) -> Result<FieldValue, CodecError> {
        let width = bytes.len();
        let value = match field.kind() {
            FieldKind::DateTimeF => {
                let stamp = DateTimeF::from_slice(bytes)?;
                FieldValue::DateTimeF {
                    stamp,
                    valid: self.check_timestamp(stamp.validate())?,
                }
            }
            FieldKind::DateG => {
                let stamp = DateG::from_slice(bytes)?;
                FieldValue::DateG {
                    stamp,
                    valid: self.check_timestamp(stamp.validate())?,
                }
            }
            FieldKind::Volume => FieldValue::Decimal {
                value: Decimal1::from_raw(bytes.get_uint_le(width) as i64),
            },
            FieldKind::Flow | FieldKind::Temperature => FieldValue::Decimal {
                value: Decimal1::from_raw(bytes.get_int_le(width)),
            },
            FieldKind::Hours => FieldValue::Counter {
                value: bytes.get_uint_le(width) as u32,
            },
            FieldKind::ErrorState => FieldValue::ErrorState {
                flags: ErrorFlags::from_bits(bytes.get_uint_le(width) as u32),
            },
        };
        Ok(value)
    }

    fn check_timestamp(&self, result: Result<(), CodecError>) -> Result<bool, CodecError> {
        match result {
            Ok(()) => Ok(true),
            Err(err) if self.strict_timestamps => Err(err),
            Err(err) => {
                tracing::debug!("timestamp flagged invalid: {}", err);
                Ok(false)
            }
        }
    }
}

/// Decodes `raw` under `layout`, flagging bad timestamps instead of failing.
pub fn decode(raw: &[u8], layout: &RecordLayout) -> Result<DecodedEntry, CodecError> {
    RecordDecoder::new(layout.clone()).decode(raw)
}
