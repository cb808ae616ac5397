//! # meterlog-codec
//!
//! History-log record codec for the meter.
//!
//! This crate provides:
//! - The field catalog and the dataset selector mask
//! - Entry layout resolution for a selector
//! - Entry decoding, including the packed type F / type G timestamps
//! - Entry encoding from live measurement snapshots
//! - Interval selector codes

pub mod catalog;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod interval;
pub mod layout;
pub mod selector;
pub mod timestamp;
pub mod value;

pub use catalog::{
    all_fields, field_by_bit, field_by_name, Field, FieldKind, FieldSpec, ALL_FIELDS_MASK,
    ALL_FIELDS_NAME, CATALOG,
};
pub use decoder::{decode, DecodedEntry, FieldValue, RecordDecoder};
pub use encoder::MeasurementSnapshot;
pub use error::CodecError;
pub use interval::IntervalPolicy;
pub use layout::{LayoutSlot, RecordLayout};
pub use selector::SelectorMask;
pub use timestamp::{DateG, DateTimeF};
pub use value::{Decimal1, ErrorCondition, ErrorFlags};

/// Default log capacity (`0x03E8`).
pub const DEFAULT_CAPACITY: u16 = 1000;

/// Wire size of the capacity setting.
pub const CAPACITY_WIRE_SIZE: usize = 2;
