//! Packed timestamp encodings.
//!
//! Type F (4 bytes, date and time to the minute), read as a little-endian u32:
//!
//! ```text
//!  31    28 27    24 23  21 20     16 15 14  13 12     8 7 6 5        0
//! +--------+--------+------+---------+--+------+--------+---+----------+
//! | yearHi | month  |yearLo|   day   |SU| ---- |  hour  | - |  minute  |
//! +--------+--------+------+---------+--+------+--------+---+----------+
//! ```
//!
//! Type G (2 bytes, date only), read as a little-endian u16:
//!
//! ```text
//!  15    12 11     8 7    5 4       0
//! +--------+--------+------+---------+
//! | yearHi | month  |yearLo|   day   |
//! +--------+--------+------+---------+
//! ```
//!
//! Years are offsets from 2000.

use crate::catalog::Field;
use crate::error::CodecError;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire size of a type-F timestamp.
pub const TYPE_F_SIZE: usize = 4;

/// Wire size of a type-G date.
pub const TYPE_G_SIZE: usize = 2;

/// Year offset of both encodings.
pub const EPOCH_YEAR: i32 = 2000;

const MAX_YEAR_OFFSET: u8 = 99;

fn pack_year(year: u8) -> (u32, u32) {
    ((year & 0x07) as u32, ((year >> 3) & 0x0F) as u32)
}

fn unpack_year(lo: u32, hi: u32) -> u8 {
    ((lo & 0x07) | ((hi & 0x0F) << 3)) as u8
}

fn check_date(field: Field, day: u8, month: u8, year: u8) -> Result<(), CodecError> {
    let reason = if !(1..=31).contains(&day) {
        format!("day {} not in 1..=31", day)
    } else if !(1..=12).contains(&month) {
        format!("month {} not in 1..=12", month)
    } else if year > MAX_YEAR_OFFSET {
        format!("year {} not in 0..=99", year)
    } else {
        return Ok(());
    };
    Err(CodecError::TimestampRange { field, reason })
}

/// A decoded type-F timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateTimeF {
    pub minute: u8,
    pub hour: u8,
    pub day: u8,
    pub month: u8,
    /// Years since 2000.
    pub year: u8,
    pub summer_time: bool,
}

impl DateTimeF {
    /// Unpacks a timestamp from its raw little-endian value.
    pub fn from_raw(v: u32) -> Self {
        Self {
            minute: (v & 0x3F) as u8,
            hour: ((v >> 8) & 0x1F) as u8,
            day: ((v >> 16) & 0x1F) as u8,
            month: ((v >> 24) & 0x0F) as u8,
            year: unpack_year(v >> 21, v >> 28),
            summer_time: v & (1 << 15) != 0,
        }
    }

    pub fn from_bytes(bytes: [u8; TYPE_F_SIZE]) -> Self {
        Self::from_raw(u32::from_le_bytes(bytes))
    }

    /// Parses a timestamp from a wire slice.
    pub fn from_slice(buf: &[u8]) -> Result<Self, CodecError> {
        let bytes: [u8; TYPE_F_SIZE] = buf.try_into().map_err(|_| CodecError::Truncated {
            what: "type F timestamp",
            needed: TYPE_F_SIZE,
            actual: buf.len(),
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Packs the timestamp. Components are masked to their bit widths.
    pub fn to_raw(&self) -> u32 {
        let (year_lo, year_hi) = pack_year(self.year);
        (self.minute as u32 & 0x3F)
            | ((self.hour as u32 & 0x1F) << 8)
            | ((self.summer_time as u32) << 15)
            | ((self.day as u32 & 0x1F) << 16)
            | (year_lo << 21)
            | ((self.month as u32 & 0x0F) << 24)
            | (year_hi << 28)
    }

    pub fn to_bytes(&self) -> [u8; TYPE_F_SIZE] {
        self.to_raw().to_le_bytes()
    }

    /// Checks the component ranges.
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.hour > 23 {
            return Err(CodecError::TimestampRange {
                field: Field::DateTimeTypeF,
                reason: format!("hour {} not in 0..=23", self.hour),
            });
        }
        if self.minute > 59 {
            return Err(CodecError::TimestampRange {
                field: Field::DateTimeTypeF,
                reason: format!("minute {} not in 0..=59", self.minute),
            });
        }
        check_date(Field::DateTimeTypeF, self.day, self.month, self.year)
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Converts a calendar time. Returns `None` outside 2000..=2099.
    pub fn from_datetime(dt: &NaiveDateTime) -> Option<Self> {
        let year = u8::try_from(dt.year() - EPOCH_YEAR).ok()?;
        if year > MAX_YEAR_OFFSET {
            return None;
        }
        Some(Self {
            minute: dt.minute() as u8,
            hour: dt.hour() as u8,
            day: dt.day() as u8,
            month: dt.month() as u8,
            year,
            summer_time: false,
        })
    }

    /// Converts to a calendar time. Returns `None` for impossible dates such as 31.02.
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        if !self.is_valid() {
            return None;
        }
        NaiveDate::from_ymd_opt(
            EPOCH_YEAR + self.year as i32,
            self.month as u32,
            self.day as u32,
        )?
        .and_hms_opt(self.hour as u32, self.minute as u32, 0)
    }
}

impl fmt::Display for DateTimeF {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}.{:02}.{:04} {:02}:{:02}",
            self.day,
            self.month,
            EPOCH_YEAR + self.year as i32,
            self.hour,
            self.minute
        )
    }
}

/// A decoded type-G date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateG {
    pub day: u8,
    pub month: u8,
    /// Years since 2000.
    pub year: u8,
}

impl DateG {
    pub fn from_raw(v: u16) -> Self {
        let v = v as u32;
        Self {
            day: (v & 0x1F) as u8,
            month: ((v >> 8) & 0x0F) as u8,
            year: unpack_year(v >> 5, v >> 12),
        }
    }

    pub fn from_bytes(bytes: [u8; TYPE_G_SIZE]) -> Self {
        Self::from_raw(u16::from_le_bytes(bytes))
    }

    pub fn from_slice(buf: &[u8]) -> Result<Self, CodecError> {
        let bytes: [u8; TYPE_G_SIZE] = buf.try_into().map_err(|_| CodecError::Truncated {
            what: "type G date",
            needed: TYPE_G_SIZE,
            actual: buf.len(),
        })?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn to_raw(&self) -> u16 {
        let (year_lo, year_hi) = pack_year(self.year);
        ((self.day as u32 & 0x1F)
            | (year_lo << 5)
            | ((self.month as u32 & 0x0F) << 8)
            | (year_hi << 12)) as u16
    }

    pub fn to_bytes(&self) -> [u8; TYPE_G_SIZE] {
        self.to_raw().to_le_bytes()
    }

    pub fn validate(&self) -> Result<(), CodecError> {
        check_date(Field::DateTimeTypeG, self.day, self.month, self.year)
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn from_date(date: &NaiveDate) -> Option<Self> {
        let year = u8::try_from(date.year() - EPOCH_YEAR).ok()?;
        if year > MAX_YEAR_OFFSET {
            return None;
        }
        Some(Self {
            day: date.day() as u8,
            month: date.month() as u8,
            year,
        })
    }

    pub fn to_date(&self) -> Option<NaiveDate> {
        if !self.is_valid() {
            return None;
        }
        NaiveDate::from_ymd_opt(
            EPOCH_YEAR + self.year as i32,
            self.month as u32,
            self.day as u32,
        )
    }
}

impl fmt::Display for DateG {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}.{:02}.{:04}",
            self.day,
            self.month,
            EPOCH_YEAR + self.year as i32
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_type_f_device_fixture() {
        // 28.02.2021 23:59
        let ts = DateTimeF::from_bytes([0x3B, 0x37, 0xBC, 0x22]);
        assert_eq!(ts.hour, 23);
        assert_eq!(ts.minute, 59);
        assert_eq!(ts.day, 28);
        assert_eq!(ts.month, 2);
        assert_eq!(ts.year, 21);
        assert!(!ts.summer_time);
        assert!(ts.is_valid());
        assert_eq!(ts.to_string(), "28.02.2021 23:59");
    }

    #[test]
    fn test_type_f_rtc_fixtures() {
        let new_year_eve = DateTimeF::from_slice(&[0x00, 0x00, 0xBF, 0x2C]).unwrap();
        assert_eq!(
            new_year_eve.to_datetime(),
            NaiveDate::from_ymd_opt(2021, 12, 31).unwrap().and_hms_opt(0, 0, 0)
        );

        let one_am = DateTimeF::from_slice(&[0x00, 0x01, 0xBF, 0x2C]).unwrap();
        assert_eq!(one_am.hour, 1);
        assert_eq!(one_am.day, 31);

        let new_year = DateTimeF::from_slice(&[0x00, 0x00, 0xC1, 0x21]).unwrap();
        assert_eq!(
            new_year.to_datetime(),
            NaiveDate::from_ymd_opt(2022, 1, 1).unwrap().and_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn test_type_f_encode_fixture() {
        let ts = DateTimeF {
            minute: 59,
            hour: 23,
            day: 28,
            month: 2,
            year: 21,
            summer_time: false,
        };
        assert_eq!(ts.to_bytes(), [0x3B, 0x37, 0xBC, 0x22]);
    }

    #[test]
    fn test_type_f_summer_time_bit() {
        let ts = DateTimeF::from_bytes([0x3B, 0x37 | 0x80, 0xBC, 0x22]);
        assert!(ts.summer_time);
        assert_eq!(ts.hour, 23);
    }

    #[test]
    fn test_type_f_invalid_components() {
        // All bits set: minute 63, hour 31, month 15, year 127.
        let ts = DateTimeF::from_raw(0xFFFF_FFFF);
        assert!(!ts.is_valid());
        assert!(matches!(
            ts.validate(),
            Err(CodecError::TimestampRange {
                field: Field::DateTimeTypeF,
                ..
            })
        ));

        let zeroed = DateTimeF::from_raw(0);
        assert!(!zeroed.is_valid(), "day 0 and month 0 are invalid");
        assert_eq!(zeroed.to_datetime(), None);
    }

    #[test]
    fn test_type_f_impossible_calendar_date() {
        let ts = DateTimeF {
            minute: 0,
            hour: 0,
            day: 31,
            month: 2,
            year: 21,
            summer_time: false,
        };
        assert!(ts.is_valid());
        assert_eq!(ts.to_datetime(), None);
    }

    #[test]
    fn test_type_f_wrong_length() {
        assert!(matches!(
            DateTimeF::from_slice(&[0x3B, 0x37, 0xBC]),
            Err(CodecError::Truncated { needed: 4, .. })
        ));
    }

    #[test]
    fn test_type_g_decode() {
        let date = DateG {
            day: 28,
            month: 2,
            year: 21,
        };
        let bytes = date.to_bytes();
        assert_eq!(bytes, [0xBC, 0x22]);
        assert_eq!(DateG::from_bytes(bytes), date);
        assert_eq!(date.to_string(), "28.02.2021");
        assert_eq!(date.to_date(), NaiveDate::from_ymd_opt(2021, 2, 28));
    }

    #[test]
    fn test_type_g_invalid() {
        let date = DateG::from_raw(0xFFFF);
        assert!(!date.is_valid());
        assert!(matches!(
            date.validate(),
            Err(CodecError::TimestampRange {
                field: Field::DateTimeTypeG,
                ..
            })
        ));
    }

    #[test]
    fn test_from_datetime_range() {
        let dt = NaiveDate::from_ymd_opt(1999, 12, 31)
            .unwrap()
            .and_hms_opt(23, 0, 0)
            .unwrap();
        assert!(DateTimeF::from_datetime(&dt).is_none());

        let dt = NaiveDate::from_ymd_opt(2099, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 0)
            .unwrap();
        let ts = DateTimeF::from_datetime(&dt).unwrap();
        assert_eq!(ts.year, 99);
        assert_eq!(ts.to_datetime(), Some(dt));
    }

    proptest! {
        #[test]
        fn prop_type_f_roundtrip(
            hour in 0u8..=23,
            minute in 0u8..=59,
            day in 1u8..=31,
            month in 1u8..=12,
            year in 0u8..=99,
        ) {
            let ts = DateTimeF { minute, hour, day, month, year, summer_time: false };
            let decoded = DateTimeF::from_bytes(ts.to_bytes());
            prop_assert_eq!(decoded, ts);
            prop_assert!(decoded.is_valid());
        }

        #[test]
        fn prop_type_g_roundtrip(day in 1u8..=31, month in 1u8..=12, year in 0u8..=99) {
            let date = DateG { day, month, year };
            let decoded = DateG::from_bytes(date.to_bytes());
            prop_assert_eq!(decoded, date);
            prop_assert!(decoded.is_valid());
        }
    }
}
