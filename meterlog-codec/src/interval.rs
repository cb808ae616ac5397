//! Logging interval selector.

use crate::error::CodecError;
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire size of an interval selector.
pub const INTERVAL_WIRE_SIZE: usize = 2;

/// Schedule for automatic entry generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalPolicy {
    /// 1 January, 00:00.
    Yearly,
    /// The 15th of each month, 00:00.
    MonthlyMid,
    /// The 1st of each month, 00:00 (end of the previous month).
    MonthlyEnd,
    /// 00:00 on the given day of week.
    Weekly(Weekday),
    /// Every midnight.
    #[default]
    Daily,
    /// Every full hour.
    Hourly,
}

impl IntervalPolicy {
    /// Weekly policy for a chrono weekday.
    pub fn weekly(day: Weekday) -> Self {
        IntervalPolicy::Weekly(day)
    }

    /// Weekly policy for a day index, 0 = Sunday .. 6 = Saturday.
    pub fn weekly_dow(dow: u8) -> Result<Self, CodecError> {
        let day = match dow {
            0 => Weekday::Sun,
            1 => Weekday::Mon,
            2 => Weekday::Tue,
            3 => Weekday::Wed,
            4 => Weekday::Thu,
            5 => Weekday::Fri,
            6 => Weekday::Sat,
            _ => return Err(CodecError::InvalidWeekday { dow }),
        };
        Ok(IntervalPolicy::Weekly(day))
    }

    /// Selector ordinal, 1..=12.
    fn ordinal(self) -> u8 {
        match self {
            IntervalPolicy::Yearly => 1,
            IntervalPolicy::MonthlyMid => 2,
            IntervalPolicy::MonthlyEnd => 3,
            IntervalPolicy::Weekly(day) => 4 + day.num_days_from_sunday() as u8,
            IntervalPolicy::Daily => 11,
            IntervalPolicy::Hourly => 12,
        }
    }

    /// The selector code, `0x0100` (yearly) to `0x0C00` (hourly).
    pub fn code(self) -> u16 {
        (self.ordinal() as u16) << 8
    }

    pub fn from_code(code: u16) -> Result<Self, CodecError> {
        if code & 0x00FF != 0 {
            return Err(CodecError::UnknownInterval(code));
        }
        let policy = match code >> 8 {
            1 => IntervalPolicy::Yearly,
            2 => IntervalPolicy::MonthlyMid,
            3 => IntervalPolicy::MonthlyEnd,
            n @ 4..=10 => Self::weekly_dow((n - 4) as u8)?,
            11 => IntervalPolicy::Daily,
            12 => IntervalPolicy::Hourly,
            _ => return Err(CodecError::UnknownInterval(code)),
        };
        Ok(policy)
    }

    /// Wire bytes, e.g. `0C 00` for hourly.
    pub fn to_wire(self) -> [u8; INTERVAL_WIRE_SIZE] {
        [self.ordinal(), 0x00]
    }

    pub fn from_wire(buf: &[u8]) -> Result<Self, CodecError> {
        match buf {
            [ordinal, low] => Self::from_code(u16::from_be_bytes([*ordinal, *low])),
            _ => Err(CodecError::Truncated {
                what: "interval selector",
                needed: INTERVAL_WIRE_SIZE,
                actual: buf.len(),
            }),
        }
    }

    /// Day of week of a weekly policy.
    pub fn weekday(self) -> Option<Weekday> {
        match self {
            IntervalPolicy::Weekly(day) => Some(day),
            _ => None,
        }
    }
}

impl fmt::Display for IntervalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalPolicy::Yearly => f.write_str("yearly"),
            IntervalPolicy::MonthlyMid => f.write_str("monthly_middle"),
            IntervalPolicy::MonthlyEnd => f.write_str("monthly_end"),
            IntervalPolicy::Weekly(day) => {
                let day = match day {
                    Weekday::Sun => "sunday",
                    Weekday::Mon => "monday",
                    Weekday::Tue => "tuesday",
                    Weekday::Wed => "wednesday",
                    Weekday::Thu => "thursday",
                    Weekday::Fri => "friday",
                    Weekday::Sat => "saturday",
                };
                write!(f, "weekly_{}", day)
            }
            IntervalPolicy::Daily => f.write_str("daily"),
            IntervalPolicy::Hourly => f.write_str("hourly"),
        }
    }
}

impl FromStr for IntervalPolicy {
    type Err = CodecError;

    /// Parses the display name (`daily`, `weekly_sunday`, ...) or a hex code (`0x0C00`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            let code =
                u16::from_str_radix(hex, 16).map_err(|_| CodecError::UnknownIntervalName {
                    name: s.to_string(),
                })?;
            return Self::from_code(code);
        }
        let policy = match s {
            "yearly" => IntervalPolicy::Yearly,
            "monthly_middle" => IntervalPolicy::MonthlyMid,
            "monthly_end" => IntervalPolicy::MonthlyEnd,
            "weekly_sunday" => IntervalPolicy::Weekly(Weekday::Sun),
            "weekly_monday" => IntervalPolicy::Weekly(Weekday::Mon),
            "weekly_tuesday" => IntervalPolicy::Weekly(Weekday::Tue),
            "weekly_wednesday" => IntervalPolicy::Weekly(Weekday::Wed),
            "weekly_thursday" => IntervalPolicy::Weekly(Weekday::Thu),
            "weekly_friday" => IntervalPolicy::Weekly(Weekday::Fri),
            "weekly_saturday" => IntervalPolicy::Weekly(Weekday::Sat),
            "daily" => IntervalPolicy::Daily,
            "hourly" => IntervalPolicy::Hourly,
            _ => {
                return Err(CodecError::UnknownIntervalName {
                    name: s.to_string(),
                })
            }
        };
        Ok(policy)
    }
}
