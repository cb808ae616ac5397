//! Record layout resolution.
//!
//! An entry is the concatenation of every selected field, in catalog order,
//! with no padding:
//!
//! ```text
//! selector 0x0213 (dateTimeTypeF | mediumTemp | ambientTemp | errorState)
//! +----------------+------------+-------------+----------------+
//! | dateTimeTypeF  | mediumTemp | ambientTemp | errorState     |
//! | 4 bytes @0     | 2 bytes @4 | 2 bytes @6  | 4 bytes @8     |
//! +----------------+------------+-------------+----------------+
//! ```

use crate::catalog::Field;
use crate::error::CodecError;
use crate::selector::SelectorMask;

/// Position of one field inside an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutSlot {
    pub field: Field,
    pub offset: usize,
    pub width: usize,
}

impl LayoutSlot {
    /// Byte range of this slot within an entry.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.width
    }
}

/// The byte layout of one entry under a given selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    mask: SelectorMask,
    slots: Vec<LayoutSlot>,
    entry_len: usize,
}

impl RecordLayout {
    /// Resolves the layout for `mask`.
    pub fn resolve(mask: SelectorMask) -> Self {
        let mut slots = Vec::with_capacity(mask.len());
        let mut offset = 0;
        for spec in mask.decode() {
            slots.push(LayoutSlot {
                field: spec.field,
                offset,
                width: spec.byte_width,
            });
            offset += spec.byte_width;
        }

        Self {
            mask,
            slots,
            entry_len: offset,
        }
    }

    pub fn mask(&self) -> SelectorMask {
        self.mask
    }

    pub fn slots(&self) -> &[LayoutSlot] {
        &self.slots
    }

    /// Total entry length in bytes.
    pub fn entry_len(&self) -> usize {
        self.entry_len
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.slots.iter().map(|slot| slot.field)
    }

    pub fn slot(&self, field: Field) -> Option<&LayoutSlot> {
        self.slots.iter().find(|slot| slot.field == field)
    }

    pub fn offset_of(&self, field: Field) -> Option<usize> {
        self.slot(field).map(|slot| slot.offset)
    }

    /// Fails unless `raw` is exactly one entry long.
    pub fn check_len(&self, raw: &[u8]) -> Result<(), CodecError> {
        if raw.len() != self.entry_len {
            return Err(CodecError::LayoutMismatch {
                expected: self.entry_len,
                actual: raw.len(),
            });
        }
        Ok(())
    }

    /// Returns the bytes of `field` within `raw`, if the field is present.
    pub fn slice<'a>(&self, raw: &'a [u8], field: Field) -> Result<Option<&'a [u8]>, CodecError> {
        self.check_len(raw)?;
        Ok(self.slot(field).map(|slot| &raw[slot.range()]))
    }
}
