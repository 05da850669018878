//! String table blocks (`RT_STRING`).
//!
//! A block stores 16 consecutive strings as length-prefixed UTF-16 without terminator.
//! String `id` lives in block `id / 16 + 1` at index `id % 16`.

use crate::{errors::*, id::*, registry::*, util::*};

/// Number of strings in a string table block.
pub const STRINGS_PER_BLOCK: usize = 16;

/// Block of 16 consecutive strings of a string table.
/// Empty strings are absent from the table.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct StringTable {
    strings: [String; STRINGS_PER_BLOCK],
}
impl StringTable {
    pub fn new() -> Self { Self::default() }

    /// Returns the name of the block containing the string with the given identifier.
    pub fn block_name(string_id: u16) -> ResourceId { ResourceId::Numeric((string_id >> 4) + 1) }

    /// Returns the identifier of the string at `index` in the block named `block`.
    pub fn string_id(block: &ResourceId, index: usize) -> Option<u16> {
        let block = block.as_numeric()?;
        if block == 0 || block > 0x1000 || index >= STRINGS_PER_BLOCK {
            return None;
        }
        Some(((block - 1) << 4) | index as u16)
    }

    /// Returns the string at `index`, or `None` if the index is out of range.
    pub fn get(&self, index: usize) -> Option<&str> { self.strings.get(index).map(String::as_str) }

    /// Set the string at `index`. An empty string removes it.
    ///
    /// # Returns
    /// Returns [`ResourceError::EncodingInvariantViolation`] if the index is out of range.
    pub fn set<S: Into<String>>(&mut self, index: usize, string: S) -> Result<(), ResourceError> {
        let slot = self.strings.get_mut(index).ok_or_else(|| {
            ResourceError::invariant(format!(
                "string index {} outside block of {}",
                index, STRINGS_PER_BLOCK
            ))
        })?;
        *slot = string.into();
        Ok(())
    }

    /// Returns the strings of the block in order.
    pub fn strings(&self) -> &[String; STRINGS_PER_BLOCK] { &self.strings }

    /// Returns whether all strings of the block are empty.
    pub fn is_empty(&self) -> bool { self.strings.iter().all(String::is_empty) }
}

impl ResourceFormat for StringTable {
    fn decode(data: &[u8]) -> Result<Self, ResourceError> {
        let mut reader = ByteReader::new(data);
        let mut table = StringTable::default();
        for (index, string) in table.strings.iter_mut().enumerate() {
            // Trailing empty strings are sometimes omitted.
            if reader.is_empty() {
                break;
            }
            let length = reader.u16().map_err(|_| {
                ReadError(format!("string table truncated at string {}", index))
            })?;
            *string = reader.u16_string_counted(length as usize)?;
        }
        Ok(table)
    }

    fn encode(&self) -> Result<Vec<u8>, ResourceError> {
        let mut writer = ByteWriter::new();
        for string in &self.strings {
            let units = string.encode_utf16().collect::<Vec<_>>();
            let length = u16::try_from(units.len()).map_err(|_| {
                ResourceError::invariant(format!(
                    "string of {} code units exceeds 16 bits",
                    units.len()
                ))
            })?;
            writer.u16(length);
            units.iter().for_each(|&unit| writer.u16(unit));
        }
        Ok(writer.into_inner())
    }
}
