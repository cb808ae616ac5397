//! Measurement value types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed-point measurement with one decimal digit (raw / 10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Decimal1(i64);

impl Decimal1 {
    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// The value in device units (tenths).
    pub fn raw(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 10.0
    }
}

impl fmt::Display for Decimal1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{}", sign, abs / 10, abs % 10)
    }
}

/// One condition reported by the meter's error handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCondition {
    AnyApplicationError,
    Checksum,
    HardwareFlow,
    HardwareTemperature,
    Leakage,
    UndersizedMeter,
    Backflow,
    FailSafeMode,
    AirInPipe,
    NoUsage,
    MeasurementInterference,
    FreezingRisk,
    HighMediumTemperature,
    TooMuchCommunication,
    MetrologicalLogAccess,
    LowBattery,
    SystemReset,
}

impl ErrorCondition {
    /// Conditions ordered by their error-state bit (bit 0 first).
    pub const ALL: [ErrorCondition; 17] = [
        ErrorCondition::AnyApplicationError,
        ErrorCondition::Checksum,
        ErrorCondition::HardwareFlow,
        ErrorCondition::HardwareTemperature,
        ErrorCondition::Leakage,
        ErrorCondition::UndersizedMeter,
        ErrorCondition::Backflow,
        ErrorCondition::FailSafeMode,
        ErrorCondition::AirInPipe,
        ErrorCondition::NoUsage,
        ErrorCondition::MeasurementInterference,
        ErrorCondition::FreezingRisk,
        ErrorCondition::HighMediumTemperature,
        ErrorCondition::TooMuchCommunication,
        ErrorCondition::MetrologicalLogAccess,
        ErrorCondition::LowBattery,
        ErrorCondition::SystemReset,
    ];

    /// Bit in the error-state word recorded in log entries.
    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }

    /// Bit in the harmonized data-model error word, where one exists.
    pub fn harmonized_bit(self) -> Option<u32> {
        let bit = match self {
            ErrorCondition::Checksum => 1,
            ErrorCondition::HardwareFlow => 2,
            ErrorCondition::HardwareTemperature => 4,
            ErrorCondition::Leakage => 8,
            ErrorCondition::Backflow => 32,
            ErrorCondition::FailSafeMode => 64,
            ErrorCondition::MeasurementInterference => 128,
            ErrorCondition::UndersizedMeter => 1024,
            ErrorCondition::AirInPipe => 2048,
            ErrorCondition::NoUsage => 4096,
            ErrorCondition::FreezingRisk => 8192,
            ErrorCondition::HighMediumTemperature => 16384,
            ErrorCondition::TooMuchCommunication => 32768,
            ErrorCondition::MetrologicalLogAccess => 65536,
            ErrorCondition::LowBattery => 131072,
            ErrorCondition::AnyApplicationError | ErrorCondition::SystemReset => return None,
        };
        Some(bit)
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorCondition::AnyApplicationError => "anyApplicationError",
            ErrorCondition::Checksum => "checksum",
            ErrorCondition::HardwareFlow => "hardwareFlow",
            ErrorCondition::HardwareTemperature => "hardwareTemperature",
            ErrorCondition::Leakage => "leakage",
            ErrorCondition::UndersizedMeter => "undersizedMeter",
            ErrorCondition::Backflow => "backflow",
            ErrorCondition::FailSafeMode => "failSafeMode",
            ErrorCondition::AirInPipe => "airInPipe",
            ErrorCondition::NoUsage => "noUsage",
            ErrorCondition::MeasurementInterference => "measurementInterference",
            ErrorCondition::FreezingRisk => "freezingRisk",
            ErrorCondition::HighMediumTemperature => "highMediumTemperature",
            ErrorCondition::TooMuchCommunication => "tooMuchCommunication",
            ErrorCondition::MetrologicalLogAccess => "metrologicalLogAccess",
            ErrorCondition::LowBattery => "lowBattery",
            ErrorCondition::SystemReset => "systemReset",
        }
    }
}

impl fmt::Display for ErrorCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The error-state word of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorFlags(u32);

impl ErrorFlags {
    const KNOWN_BITS: u32 = (1 << 17) - 1;

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, condition: ErrorCondition) -> bool {
        self.0 & condition.bit() != 0
    }

    pub fn insert(&mut self, condition: ErrorCondition) {
        self.0 |= condition.bit();
    }

    /// Active conditions, lowest bit first.
    pub fn conditions(self) -> Vec<ErrorCondition> {
        ErrorCondition::ALL
            .into_iter()
            .filter(|c| self.contains(*c))
            .collect()
    }

    /// Set bits with no assigned condition.
    pub fn unknown_bits(self) -> u32 {
        self.0 & !Self::KNOWN_BITS
    }

    /// Translates the active conditions into the harmonized data-model word.
    pub fn to_harmonized(self) -> u32 {
        self.conditions()
            .into_iter()
            .filter_map(ErrorCondition::harmonized_bit)
            .fold(0, |acc, bit| acc | bit)
    }
}

impl FromIterator<ErrorCondition> for ErrorFlags {
    fn from_iter<T: IntoIterator<Item = ErrorCondition>>(iter: T) -> Self {
        let mut flags = ErrorFlags::default();
        for condition in iter {
            flags.insert(condition);
        }
        flags
    }
}

impl fmt::Display for ErrorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for condition in self.conditions() {
            if !first {
                f.write_str("|")?;
            }
            first = false;
            f.write_str(condition.name())?;
        }
        if self.unknown_bits() != 0 {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{:#x}", self.unknown_bits())?;
        }
        Ok(())
    }
}
