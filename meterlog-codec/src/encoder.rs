//! Entry encoding from live measurements.

use crate::catalog::{Field, FieldKind};
use crate::layout::RecordLayout;
use crate::timestamp::{DateG, DateTimeF};
use crate::value::ErrorFlags;
use bytes::{BufMut, Bytes, BytesMut};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Live meter values in device units (tenths for volumes, flows and temperatures).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementSnapshot {
    pub clock: NaiveDateTime,
    pub sum_volume: u32,
    pub forward_volume: u32,
    pub backward_volume: u32,
    pub current_flow: i32,
    pub maximum_flow: i32,
    pub minimum_flow: i32,
    pub medium_temp: i16,
    pub ambient_temp: i16,
    pub operating_hours: u32,
    pub error_hours: u16,
    pub error_state: ErrorFlags,
}

impl MeasurementSnapshot {
    /// A snapshot with all counters at zero.
    pub fn at(clock: NaiveDateTime) -> Self {
        Self {
            clock,
            sum_volume: 0,
            forward_volume: 0,
            backward_volume: 0,
            current_flow: 0,
            maximum_flow: 0,
            minimum_flow: 0,
            medium_temp: 0,
            ambient_temp: 0,
            operating_hours: 0,
            error_hours: 0,
            error_state: ErrorFlags::default(),
        }
    }

    /// Raw integer for a non-timestamp field.
    fn raw_value(&self, field: Field) -> i64 {
        match field {
            Field::SumVolume => self.sum_volume as i64,
            Field::ForwardVolume => self.forward_volume as i64,
            Field::BackwardVolume => self.backward_volume as i64,
            Field::CurrentFlow => self.current_flow as i64,
            Field::MaximumFlow => self.maximum_flow as i64,
            Field::MinimumFlow => self.minimum_flow as i64,
            Field::MediumTemp => self.medium_temp as i64,
            Field::AmbientTemp => self.ambient_temp as i64,
            Field::OperatingHours => self.operating_hours as i64,
            Field::ErrorHours => self.error_hours as i64,
            Field::ErrorState => self.error_state.bits() as i64,
            Field::DateTimeTypeG | Field::DateTimeTypeF => 0,
        }
    }

    /// Encodes this snapshot as one entry under `layout`.
    ///
    /// Values wider than their field are truncated to the field width, as the
    /// meter does. A clock outside 2000..=2099 is written as all-zero bytes.
    pub fn encode(&self, layout: &RecordLayout) -> Bytes {
        let mut buf = BytesMut::with_capacity(layout.entry_len());
        for slot in layout.slots() {
            match slot.field.kind() {
                FieldKind::DateTimeF => {
                    let bytes = DateTimeF::from_datetime(&self.clock)
                        .map(|ts| ts.to_bytes())
                        .unwrap_or_default();
                    buf.put_slice(&bytes);
                }
                FieldKind::DateG => {
                    let bytes = DateG::from_date(&self.clock.date())
                        .map(|d| d.to_bytes())
                        .unwrap_or_default();
                    buf.put_slice(&bytes);
                }
                _ => {
                    let mask = if slot.width >= 8 {
                        u64::MAX
                    } else {
                        (1u64 << (slot.width * 8)) - 1
                    };
                    let raw = self.raw_value(slot.field) as u64 & mask;
                    buf.put_uint_le(raw, slot.width);
                }
            }
        }
        buf.freeze()
    }
}
