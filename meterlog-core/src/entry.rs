//! Stored log entries.

use meterlog_codec::{CodecError, DecodedEntry, RecordDecoder, RecordLayout, SelectorMask};
use serde::{Deserialize, Serialize};

/// One stored entry: raw bytes plus the selector it was recorded under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub selector: SelectorMask,
    pub raw: Vec<u8>,
}

impl LogEntry {
    /// Creates an entry, checking `raw` against the layout of `selector`.
    pub fn new(selector: SelectorMask, raw: impl Into<Vec<u8>>) -> Result<Self, CodecError> {
        let raw = raw.into();
        RecordLayout::resolve(selector).check_len(&raw)?;
        Ok(Self { selector, raw })
    }

    pub fn layout(&self) -> RecordLayout {
        RecordLayout::resolve(self.selector)
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Decodes the entry with the layout it was recorded under.
    pub fn decode(&self, strict_timestamps: bool) -> Result<DecodedEntry, CodecError> {
        RecordDecoder::new(self.layout())
            .strict(strict_timestamps)
            .decode(&self.raw)
    }
}
