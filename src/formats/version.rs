//! Version information (`RT_VERSION`).
//!
//! `VS_VERSIONINFO` is a tree of blocks. Each block is a [`VersionHeader`], a null-terminated key,
//! padding to 32 bits, a value and padding to 32 bits, followed by its children.
//! The root carries a [`FixedFileInfo`] and has a `StringFileInfo` child with one string table per
//! language and codepage, and a `VarFileInfo` child listing the translations.
//! Blocks without a structured counterpart are kept as [`VersionBlock`] trees and written back unchanged.

use ahash::RandomState;
use indexmap::IndexMap;
use log::trace;
use zerocopy::IntoBytes;

use crate::{constants::*, errors::*, registry::*, types::*, util::*};

const MAX_DEPTH: usize = 8;
const VALUE_BINARY: u16 = 0;
const VALUE_TEXT: u16 = 1;

/// Strings of one language and codepage, keyed by names like [`VS_FILE_VERSION`].
pub type VersionStrings = IndexMap<String, String, RandomState>;

/// Language and codepage of a translation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Translation {
    pub language: LANGID,
    pub codepage: u16,
}
impl Translation {
    pub fn new(language: LANGID, codepage: u16) -> Self { Self { language, codepage } }

    /// Returns the key of the string table for this translation, like `040904B0`.
    pub fn key(&self) -> String { format!("{:04X}{:04X}", self.language, self.codepage) }

    /// Parse the key of a string table.
    pub fn parse_key(key: &str) -> Option<Self> {
        if key.len() != 8 || !key.is_ascii() {
            return None;
        }
        let language = u16::from_str_radix(&key[..4], 16).ok()?;
        let codepage = u16::from_str_radix(&key[4..], 16).ok()?;
        Some(Self { language, codepage })
    }
}

/// Version information of a module.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct VersionInfo {
    /// Fixed file information, absent if the root block stores no value.
    pub fixed:        Option<FixedFileInfo>,
    /// String tables keyed by their translation key.
    pub strings:      IndexMap<String, VersionStrings, RandomState>,
    /// Translations listed in `VarFileInfo`.
    pub translations: Vec<Translation>,
    /// Entries of `VarFileInfo` other than the translations, in order.
    pub vars:         Vec<VersionBlock>,
    /// Children of the root other than `StringFileInfo` and `VarFileInfo`, in order.
    pub extra:        Vec<VersionBlock>,
}
impl VersionInfo {
    /// Create version information with default fixed file information and no strings.
    pub fn new() -> Self {
        Self {
            fixed: Some(FixedFileInfo::default()),
            ..Default::default()
        }
    }

    /// Returns the string with the given name from the first string table containing it.
    pub fn string(&self, name: &str) -> Option<&str> {
        self.strings.values().find_map(|table| table.get(name)).map(String::as_str)
    }

    /// Set a string in the table of the given translation, adding the table and translation if missing.
    pub fn set_string<K: Into<String>, V: Into<String>>(
        &mut self, translation: Translation, name: K, value: V,
    ) {
        if !self.translations.contains(&translation) {
            self.translations.push(translation);
        }
        self.strings
            .entry(translation.key())
            .or_default()
            .insert(name.into(), value.into());
    }
}

/// Block of the version information tree.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct VersionBlock {
    pub key:        String,
    /// `1` if the value is UTF-16 text, `0` if it is binary.
    pub value_type: u16,
    /// Raw value. Text values include their null terminator.
    pub value:      Vec<u8>,
    pub children:   Vec<VersionBlock>,
}
impl VersionBlock {
    fn new<S: Into<String>>(key: S, value_type: u16, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            value_type,
            value,
            children: Vec::new(),
        }
    }

    /// Create a block with a binary value.
    pub fn binary<S: Into<String>>(key: S, value: Vec<u8>) -> Self { Self::new(key, VALUE_BINARY, value) }

    /// Create a block with a text value.
    pub fn text<S: Into<String>>(key: S, value: &str) -> Self {
        Self::new(key, VALUE_TEXT, string_to_u16(value))
    }

    /// Returns the value as text, up to the null terminator.
    pub fn text_value(&self) -> String { read_u16_string(&self.value) }

    fn parse(reader: &mut ByteReader, depth: usize) -> Result<Self, ReadError> {
        if depth > MAX_DEPTH {
            return Err(ReadError(format!("version block nested deeper than {} levels", MAX_DEPTH)));
        }
        let start = reader.offset();
        let header = reader.read::<VersionHeader>()?;
        let length = header.length as usize;
        if length < std::mem::size_of::<VersionHeader>() {
            return Err(ReadError(format!("version block length {} at offset {:#x}", length, start)));
        }

        let mut block_reader = reader.clone();
        block_reader.limit(start + length)?;
        let key = block_reader.u16_string()?;
        block_reader.align(4);

        let value = if header.type_ == VALUE_TEXT {
            // Text lengths are counted in characters including the terminator.
            let size = (header.value_length as usize * 2).min(block_reader.remaining());
            let value = block_reader.bytes(size)?;
            let units = value.len() / 2;
            value[..units * 2].to_vec()
        } else {
            block_reader.bytes(header.value_length as usize)?.to_vec()
        };

        let mut block = VersionBlock {
            key,
            value_type: header.type_,
            value,
            children: Vec::new(),
        };
        loop {
            block_reader.align(4);
            if block_reader.is_empty() {
                break;
            }
            block.children.push(VersionBlock::parse(&mut block_reader, depth + 1)?);
        }

        reader.seek(start + length)?;
        Ok(block)
    }

    fn write(&self, writer: &mut ByteWriter) -> Result<(), ResourceError> {
        writer.align(4);
        let start = writer.len();
        let value_length = if self.value_type == VALUE_TEXT { self.value.len() / 2 } else { self.value.len() };
        let value_length = u16::try_from(value_length).map_err(|_| {
            ResourceError::invariant(format!("version value {:?} exceeds 16 bits", self.key))
        })?;
        writer.write(&VersionHeader {
            length: 0,
            value_length,
            type_: self.value_type,
        });
        writer.u16_string(&self.key);
        writer.align(4);
        writer.bytes(&self.value);
        for child in &self.children {
            child.write(writer)?;
        }
        let length = u16::try_from(writer.len() - start).map_err(|_| {
            ResourceError::invariant(format!("version block {:?} exceeds 16 bits", self.key))
        })?;
        writer.patch_u16(start, length);
        Ok(())
    }
}

impl ResourceFormat for VersionInfo {
    fn decode(data: &[u8]) -> Result<Self, ResourceError> {
        let root = VersionBlock::parse(&mut ByteReader::new(data), 0)?;
        if root.key != VS_VERSION_INFO_KEY {
            return Err(ResourceError::malformed(format!(
                "version information has key {:?}",
                root.key
            )));
        }

        let mut info = VersionInfo::default();
        if !root.value.is_empty() {
            let fixed = read::<FixedFileInfo>(&root.value)?;
            let signature = fixed.signature;
            if signature != VS_FIXEDFILEINFO_SIGNATURE {
                return Err(ResourceError::malformed(format!(
                    "fixed file information has signature {:#x}",
                    signature
                )));
            }
            info.fixed = Some(fixed);
        }

        for child in &root.children {
            match child.key.as_str() {
                VS_STRING_FILE_INFO_KEY => {
                    for table in &child.children {
                        let strings = info.strings.entry(table.key.clone()).or_default();
                        for string in &table.children {
                            strings.insert(string.key.clone(), string.text_value());
                        }
                    }
                }
                VS_VAR_FILE_INFO_KEY => {
                    for var in &child.children {
                        if var.key != VS_TRANSLATION_KEY {
                            trace!("keeping version variable {:?}", var.key);
                            info.vars.push(var.clone());
                            continue;
                        }
                        info.translations.extend(var.value.chunks_exact(4).map(|chunk| {
                            Translation::new(
                                u16::from_le_bytes([chunk[0], chunk[1]]),
                                u16::from_le_bytes([chunk[2], chunk[3]]),
                            )
                        }));
                    }
                }
                key => {
                    trace!("keeping version block {:?}", key);
                    info.extra.push(child.clone());
                }
            }
        }
        Ok(info)
    }

    fn encode(&self) -> Result<Vec<u8>, ResourceError> {
        let fixed = self.fixed.as_ref().map(|fixed| fixed.as_bytes().to_vec()).unwrap_or_default();
        let mut root = VersionBlock::new(VS_VERSION_INFO_KEY, VALUE_BINARY, fixed);

        if !self.strings.is_empty() {
            let mut string_file_info = VersionBlock::new(VS_STRING_FILE_INFO_KEY, VALUE_TEXT, Vec::new());
            for (key, strings) in &self.strings {
                let mut table = VersionBlock::new(key.as_str(), VALUE_TEXT, Vec::new());
                for (name, value) in strings {
                    if value.contains('\0') {
                        return Err(ResourceError::invariant(format!(
                            "version string {:?} contains a null character",
                            name
                        )));
                    }
                    table.children.push(VersionBlock::text(name.as_str(), value));
                }
                string_file_info.children.push(table);
            }
            root.children.push(string_file_info);
        }

        if !self.translations.is_empty() || !self.vars.is_empty() {
            let mut var_file_info = VersionBlock::new(VS_VAR_FILE_INFO_KEY, VALUE_TEXT, Vec::new());
            if !self.translations.is_empty() {
                let value = self
                    .translations
                    .iter()
                    .flat_map(|t| t.language.to_le_bytes().into_iter().chain(t.codepage.to_le_bytes()))
                    .collect();
                var_file_info.children.push(VersionBlock::binary(VS_TRANSLATION_KEY, value));
            }
            var_file_info.children.extend(self.vars.iter().cloned());
            root.children.push(var_file_info);
        }
        root.children.extend(self.extra.iter().cloned());

        let mut writer = ByteWriter::new();
        root.write(&mut writer)?;
        Ok(writer.into_inner())
    }
}
