use std::{
    any::type_name,
    mem::size_of,
    ops::{Add, Rem, Sub},
};

use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::ReadError;

pub fn read<T: FromBytes + Copy>(data: &[u8]) -> Result<T, ReadError> {
    T::read_from_prefix(data)
        .map_err(|_| ReadError(format!("{} truncated ({} bytes left)", type_name::<T>(), data.len())))
        .map(|(value, _)| value)
}

/// Returns the tail of `data` starting at `offset`, or an error if the offset is out of bounds.
pub fn slice_from(data: &[u8], offset: usize) -> Result<&[u8], ReadError> {
    data.get(offset..)
        .ok_or_else(|| ReadError(format!("offset {:#x} outside data ({:#x})", offset, data.len())))
}

/// Returns `length` bytes of `data` starting at `offset`, or an error if the range is out of bounds.
pub fn slice_at(data: &[u8], offset: usize, length: usize) -> Result<&[u8], ReadError> {
    offset
        .checked_add(length)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            ReadError(format!(
                "range {:#x}+{:#x} outside data ({:#x})",
                offset,
                length,
                data.len()
            ))
        })
}

pub fn aligned_to<T: Add<Output = T> + Sub<Output = T> + Rem<Output = T> + Eq + Copy + Default>(
    value: T, alignment: T,
) -> T {
    if value % alignment == T::default() {
        return value;
    }
    value + alignment - (value % alignment)
}

pub fn decode_utf16(units: &[u16]) -> String {
    char::decode_utf16(units.iter().copied())
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Read a null-terminated UTF-16 string from the start of `data`.
/// A string without terminator ends at the end of the data.
pub fn read_u16_string(data: &[u8]) -> String {
    let units = data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&c| c != 0)
        .collect::<Vec<_>>();
    decode_utf16(&units)
}

pub fn string_to_u16<S: AsRef<str>>(string: S) -> Vec<u8> {
    let string = string.as_ref();
    let mut data = Vec::with_capacity(string.len() * 2 + 2);
    data.extend(string.encode_utf16().flat_map(|c| c.to_le_bytes()));
    data.extend([0, 0]);
    data
}

/// Bounds-checked little-endian reader over resource data.
/// Offsets are relative to the start of the resource, which is what alignment is computed against.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data:   &'a [u8],
    offset: usize,
}
impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self { Self { data, offset: 0 } }

    pub fn offset(&self) -> usize { self.offset }

    pub fn remaining(&self) -> usize { self.data.len().saturating_sub(self.offset) }

    pub fn is_empty(&self) -> bool { self.remaining() == 0 }

    /// Restrict the reader to end at `end`.
    pub fn limit(&mut self, end: usize) -> Result<(), ReadError> {
        if end < self.offset || end > self.data.len() {
            return Err(ReadError(format!(
                "limit {:#x} outside data ({:#x}..{:#x})",
                end,
                self.offset,
                self.data.len()
            )));
        }
        self.data = &self.data[..end];
        Ok(())
    }

    pub fn seek(&mut self, offset: usize) -> Result<(), ReadError> {
        if offset > self.data.len() {
            return Err(ReadError(format!(
                "offset {:#x} outside data ({:#x})",
                offset,
                self.data.len()
            )));
        }
        self.offset = offset;
        Ok(())
    }

    /// Skip padding up to the next multiple of `alignment`.
    /// Padding missing at the very end of the data is tolerated.
    pub fn align(&mut self, alignment: usize) {
        self.offset = aligned_to(self.offset, alignment).min(self.data.len().max(self.offset));
    }

    pub fn read<T: FromBytes + Copy>(&mut self) -> Result<T, ReadError> {
        let value = read::<T>(slice_from(self.data, self.offset)?)?;
        self.offset += size_of::<T>();
        Ok(value)
    }

    pub fn u8(&mut self) -> Result<u8, ReadError> { self.read::<u8>() }

    pub fn u16(&mut self) -> Result<u16, ReadError> { self.read::<u16>() }

    pub fn u32(&mut self) -> Result<u32, ReadError> { self.read::<u32>() }

    pub fn peek_u16(&self) -> Result<u16, ReadError> {
        read::<u16>(slice_from(self.data, self.offset)?)
    }

    pub fn bytes(&mut self, length: usize) -> Result<&'a [u8], ReadError> {
        let bytes = slice_at(self.data, self.offset, length)?;
        self.offset += length;
        Ok(bytes)
    }

    /// Read UTF-16 code units up to and including a null terminator.
    pub fn u16_units_terminated(&mut self) -> Result<Vec<u16>, ReadError> {
        let start = self.offset;
        let mut units = Vec::new();
        loop {
            let unit = self.u16().map_err(|_| {
                ReadError(format!("unterminated string at offset {:#x}", start))
            })?;
            if unit == 0 {
                return Ok(units);
            }
            units.push(unit);
        }
    }

    /// Read a null-terminated UTF-16 string.
    pub fn u16_string(&mut self) -> Result<String, ReadError> {
        Ok(decode_utf16(&self.u16_units_terminated()?))
    }

    /// Read `count` UTF-16 code units without terminator.
    pub fn u16_string_counted(&mut self, count: usize) -> Result<String, ReadError> {
        let bytes = self.bytes(count.checked_mul(2).ok_or_else(|| {
            ReadError(format!("string length {} overflows", count))
        })?)?;
        let units = bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect::<Vec<_>>();
        Ok(decode_utf16(&units))
    }
}

/// Little-endian writer producing resource data.
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    data: Vec<u8>,
}
impl ByteWriter {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.data.len() }

    /// Pad with zero bytes up to the next multiple of `alignment`.
    pub fn align(&mut self, alignment: usize) {
        let end = aligned_to(self.data.len(), alignment);
        self.data.resize(end, 0);
    }

    pub fn write<T: IntoBytes + Immutable>(&mut self, value: &T) {
        self.data.extend_from_slice(value.as_bytes());
    }

    pub fn u8(&mut self, value: u8) { self.data.push(value); }

    pub fn u16(&mut self, value: u16) { self.data.extend_from_slice(&value.to_le_bytes()); }

    pub fn u32(&mut self, value: u32) { self.data.extend_from_slice(&value.to_le_bytes()); }

    pub fn bytes(&mut self, bytes: &[u8]) { self.data.extend_from_slice(bytes); }

    /// Write a null-terminated UTF-16 string.
    pub fn u16_string(&mut self, string: &str) { self.data.extend(string_to_u16(string)); }

    /// Overwrite a previously written `u16` at `offset`.
    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn into_inner(self) -> Vec<u8> { self.data }
}
