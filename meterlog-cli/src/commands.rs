//! Command execution.

use crate::Commands;
use chrono::NaiveDateTime;
use colored::Colorize;
use meterlog_codec::{
    all_fields, DateG, DateTimeF, IntervalPolicy, RecordDecoder, RecordLayout, SelectorMask,
};
use serde_json::{json, Value};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Executes a command and returns the formatted output.
pub fn execute(cmd: Commands, json: bool) -> CliResult<String> {
    match cmd {
        Commands::Decode {
            dataset,
            hex,
            strict,
        } => {
            let mask = parse_selector(&dataset)?;
            let raw = parse_hex(&hex)?;
            let decoder = RecordDecoder::new(RecordLayout::resolve(mask)).strict(strict);
            let entry = decoder.decode(&raw)?;
            tracing::debug!(mask = mask.bits(), len = raw.len(), "decoded entry");

            if json {
                return Ok(format_json(&serde_json::to_value(&entry)?));
            }

            let mut output = format!("{}\n", format!("Entry {}", mask).bold());
            for (field, value) in entry.iter() {
                let text = value.to_string();
                let text = if value.timestamp_valid() == Some(false) {
                    text.red()
                } else {
                    text.normal()
                };
                output.push_str(&format!("  {:<16} {}\n", field.name().cyan(), text));
            }
            if !entry.timestamps_valid() {
                output.push_str(&format!("{}\n", "Timestamp out of range".yellow()));
            }
            Ok(output.trim_end().to_string())
        }

        Commands::Timestamp { hex, encode } => {
            if let Some(text) = encode {
                return encode_timestamp(&text, json);
            }
            let raw = parse_hex(hex.as_deref().unwrap_or_default())?;
            decode_timestamp(&raw, json)
        }

        Commands::Selector { dataset } => {
            let mask = parse_selector(&dataset)?;
            let wire = mask.to_wire();
            if json {
                let names: Vec<&str> = mask.fields().map(|f| f.name()).collect();
                return Ok(format_json(&json!({
                    "mask": format!("{:#06x}", mask.bits()),
                    "wire": hex::encode(wire),
                    "fields": names,
                })));
            }
            Ok(format!(
                "{}\n  Mask: {:#06x}\n  Wire: {}",
                mask.to_string().bold(),
                mask.bits(),
                hex::encode_upper(wire).cyan()
            ))
        }

        Commands::Layout { dataset } => {
            let layout = RecordLayout::resolve(parse_selector(&dataset)?);
            if json {
                let slots: Vec<Value> = layout
                    .slots()
                    .iter()
                    .map(|slot| {
                        json!({
                            "field": slot.field.name(),
                            "offset": slot.offset,
                            "width": slot.width,
                        })
                    })
                    .collect();
                return Ok(format_json(&json!({
                    "mask": format!("{:#06x}", layout.mask().bits()),
                    "entry_len": layout.entry_len(),
                    "slots": slots,
                })));
            }

            if layout.is_empty() {
                return Ok("Empty dataset selects no fields".yellow().to_string());
            }
            let mut output = format!(
                "{}\n",
                format!("Layout {} ({} bytes)", layout.mask(), layout.entry_len()).bold()
            );
            for slot in layout.slots() {
                output.push_str(&format!(
                    "  {:>3}..{:<3} {}\n",
                    slot.offset,
                    slot.offset + slot.width,
                    slot.field.name().cyan()
                ));
            }
            Ok(output.trim_end().to_string())
        }

        Commands::Interval { value } => {
            let interval: IntervalPolicy = value.parse()?;
            if json {
                return Ok(format_json(&json!({
                    "name": interval.to_string(),
                    "code": format!("{:#06x}", interval.code()),
                    "wire": hex::encode(interval.to_wire()),
                })));
            }
            Ok(format!(
                "{}\n  Code: {:#06x}\n  Wire: {}",
                interval.to_string().bold(),
                interval.code(),
                hex::encode_upper(interval.to_wire()).cyan()
            ))
        }

        Commands::Fields => {
            if json {
                let fields: Vec<Value> = all_fields()
                    .iter()
                    .map(|spec| {
                        json!({
                            "name": spec.name,
                            "bit": format!("{:#06x}", spec.selector_bit),
                            "width": spec.byte_width,
                        })
                    })
                    .collect();
                return Ok(format_json(&Value::Array(fields)));
            }

            let mut output = String::new();
            for spec in all_fields() {
                output.push_str(&format!(
                    "  {:<16} {:#06x}  {} bytes\n",
                    spec.name.cyan(),
                    spec.selector_bit,
                    spec.byte_width
                ));
            }
            Ok(output.trim_end().to_string())
        }
    }
}

fn decode_timestamp(raw: &[u8], json: bool) -> CliResult<String> {
    match raw.len() {
        4 => {
            let stamp = DateTimeF::from_slice(raw)?;
            if json {
                return Ok(format_json(&json!({
                    "type": "F",
                    "stamp": stamp,
                    "valid": stamp.is_valid(),
                })));
            }
            let mut output = format!("{} {}", "Type F".bold(), stamp.to_string().cyan());
            if stamp.summer_time {
                output.push_str(" (summer time)");
            }
            if let Err(e) = stamp.validate() {
                output.push_str(&format!("\n{}", e.to_string().yellow()));
            }
            Ok(output)
        }
        2 => {
            let stamp = DateG::from_slice(raw)?;
            if json {
                return Ok(format_json(&json!({
                    "type": "G",
                    "stamp": stamp,
                    "valid": stamp.is_valid(),
                })));
            }
            let mut output = format!("{} {}", "Type G".bold(), stamp.to_string().cyan());
            if let Err(e) = stamp.validate() {
                output.push_str(&format!("\n{}", e.to_string().yellow()));
            }
            Ok(output)
        }
        n => Err(format!("timestamp must be 2 (type G) or 4 (type F) bytes, got {}", n).into()),
    }
}

fn encode_timestamp(text: &str, json: bool) -> CliResult<String> {
    let dt = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .map_err(|e| format!("invalid datetime '{}': {}", text, e))?;
    let f = DateTimeF::from_datetime(&dt)
        .ok_or_else(|| format!("'{}' is outside 2000..=2099", text))?;
    let g = DateG::from_date(&dt.date())
        .ok_or_else(|| format!("'{}' is outside 2000..=2099", text))?;

    if json {
        return Ok(format_json(&json!({
            "type_f": hex::encode(f.to_bytes()),
            "type_g": hex::encode(g.to_bytes()),
        })));
    }
    Ok(format!(
        "{}\n  Type F: {}\n  Type G: {}",
        f.to_string().bold(),
        hex::encode_upper(f.to_bytes()).cyan(),
        hex::encode_upper(g.to_bytes()).cyan()
    ))
}

/// Parses a dataset argument: `ALL`, a hex mask (`0xFF1F`) or comma-separated field names.
fn parse_selector(s: &str) -> CliResult<SelectorMask> {
    let s = s.trim();
    if let Some(digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        let bits = u16::from_str_radix(digits, 16)
            .map_err(|e| format!("invalid selector mask '{}': {}", s, e))?;
        return Ok(SelectorMask::new(bits)?);
    }
    let names: Vec<&str> = s
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();
    Ok(SelectorMask::encode(names)?)
}

/// Parses hex bytes, ignoring whitespace.
fn parse_hex(s: &str) -> CliResult<Vec<u8>> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);
    Ok(hex::decode(digits).map_err(|e| format!("invalid hex '{}': {}", s, e))?)
}

fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meterlog_codec::Field;

    #[test]
    fn test_parse_selector() {
        assert_eq!(parse_selector("ALL").unwrap(), SelectorMask::ALL);
        assert_eq!(parse_selector("0xFF1F").unwrap(), SelectorMask::ALL);
        assert_eq!(
            parse_selector("dateTimeTypeF, operatingHours").unwrap(),
            SelectorMask::from_fields([Field::DateTimeTypeF, Field::OperatingHours])
        );
        assert!(parse_selector("0x0020").is_err());
        assert!(parse_selector("maximumFlow:").is_err());
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("00 01 BF 2C").unwrap(), vec![0x00, 0x01, 0xBF, 0x2C]);
        assert_eq!(parse_hex("0x3b37bc22").unwrap(), vec![0x3B, 0x37, 0xBC, 0x22]);
        assert!(parse_hex("ABC").is_err());
    }

    #[test]
    fn test_decode_timestamp_f() {
        let output = execute(
            Commands::Timestamp {
                hex: Some("3B 37 BC 22".to_string()),
                encode: None,
            },
            false,
        )
        .unwrap();
        assert!(output.contains("28.02.2021 23:59"));
    }

    #[test]
    fn test_encode_timestamp() {
        let output = execute(
            Commands::Timestamp {
                hex: None,
                encode: Some("2021-12-31T01:00:00".to_string()),
            },
            true,
        )
        .unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["type_f"], "0001bf2c");
    }

    #[test]
    fn test_timestamp_wrong_length() {
        let result = execute(
            Commands::Timestamp {
                hex: Some("00 01 02".to_string()),
                encode: None,
            },
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_entry_json() {
        let output = execute(
            Commands::Decode {
                dataset: "dateTimeTypeF,errorHours".to_string(),
                hex: "00 00 BF 2C 05 00".to_string(),
                strict: true,
            },
            true,
        )
        .unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        let values = &value["values"];
        assert_eq!(values["errorHours"]["value"], 5);
        assert_eq!(values["dateTimeTypeF"]["stamp"]["day"], 31);
        assert_eq!(values["dateTimeTypeF"]["valid"], true);
    }

    #[test]
    fn test_decode_length_mismatch() {
        let result = execute(
            Commands::Decode {
                dataset: "ALL".to_string(),
                hex: "00 00".to_string(),
                strict: false,
            },
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_layout_and_fields() {
        let output = execute(
            Commands::Layout {
                dataset: "ALL".to_string(),
            },
            true,
        )
        .unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["entry_len"], 40);
        assert_eq!(value["slots"][0]["field"], "dateTimeTypeG");

        let output = execute(Commands::Fields, true).unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(13));
    }

    #[test]
    fn test_interval() {
        let output = execute(
            Commands::Interval {
                value: "hourly".to_string(),
            },
            true,
        )
        .unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["code"], "0x0c00");
        assert_eq!(value["wire"], "0c00");
    }
}
