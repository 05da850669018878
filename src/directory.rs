//! Data types for parsing and building the resource section.
//! The resource section contains the three-level resource directory (types, names, languages) and the resource data.
//! See <https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#the-rsrc-section> for more information.

use std::{borrow::Cow, mem::size_of, ops::ControlFlow};

use ahash::RandomState;
use debug_ignore::DebugIgnore;
use indexmap::IndexMap;
use log::{debug, error, trace, warn};
use zerocopy::IntoBytes;

use crate::{constants::*, errors::*, id::*, provider::*, types::*, util::*};

const TABLE_SIZE: u32 = size_of::<ResourceDirectoryTable>() as u32;
const ENTRY_SIZE: u32 = size_of::<ResourceDirectoryEntry>() as u32;
const DESCRIPTION_SIZE: u32 = size_of::<ResourceDataEntry>() as u32;
const DATA_ALIGNMENT: u32 = 8;
const MAX_DEPTH: usize = 3;

/// Portable executable resource directory.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ResourceDirectory {
    pub(crate) virtual_address: u32,
    pub(crate) root:            ResourceTable,
}
impl ResourceDirectory {
    /// Parse the resource directory from the given image at the given base address.
    /// The virtual address is used to resolve the resource data offsets and has to correspond to the virtual address of the directory in the source image.
    ///
    /// # Returns
    /// Returns an error if the resource directory at the given address is invalid.
    pub fn parse(
        image: &[u8], base_address: u32, virtual_address: u32,
    ) -> Result<Self, ImageReadError> {
        let root = ResourceTable::parse(image, base_address, virtual_address, 0, 0)?;
        Ok(Self {
            virtual_address,
            root,
        })
    }

    /// Returns the virtual address of the resource directory in the source image.
    pub fn virtual_address(&self) -> u32 { self.virtual_address }

    /// Returns the root resource table.
    /// The root resource table contains one table per resource type.
    pub fn root(&self) -> &ResourceTable { &self.root }

    /// Returns the mutable root resource table.
    pub fn root_mut(&mut self) -> &mut ResourceTable { &mut self.root }

    /// Returns the size of the resulting resource directory in bytes.
    pub fn size(&self) -> u32 { self.root.size() }

    /// Returns whether the directory contains no resources.
    pub fn is_empty(&self) -> bool { self.root.entries.is_empty() }

    /// Build the resource directory into raw bytes to be included in an image.
    /// The virtual address is used to compute the resource data offsets and has to correspond to the virtual address of the directory in the target image.
    pub fn build(&self, virtual_address: u32) -> Vec<u8> { self.root.build(virtual_address) }

    /// Returns the data of a resource.
    pub fn get(&self, id: &ResourceIdPair) -> Option<&ResourceData> {
        match self.root.get(&id.type_)? {
            ResourceEntry::Table(names) => match names.get(&id.name)? {
                ResourceEntry::Table(languages) => {
                    match languages.get(&ResourceId::Numeric(id.language))? {
                        ResourceEntry::Data(data) => Some(data),
                        ResourceEntry::Table(_) => None,
                    }
                }
                ResourceEntry::Data(_) => None,
            },
            ResourceEntry::Data(_) => None,
        }
    }

    /// Insert the data of a resource, creating the type and name tables as needed.
    /// # Returns
    /// The replaced data.
    pub fn insert(&mut self, id: &ResourceIdPair, data: ResourceData) -> Option<ResourceData> {
        let names = self.root.table_mut(&id.type_);
        let languages = names.table_mut(&id.name);
        match languages.insert(ResourceId::Numeric(id.language), ResourceEntry::Data(data)) {
            Some(ResourceEntry::Data(data)) => Some(data),
            _ => None,
        }
    }

    /// Remove the data of a resource, pruning tables left empty.
    /// # Returns
    /// The removed data.
    pub fn remove(&mut self, id: &ResourceIdPair) -> Option<ResourceData> {
        let Some(ResourceEntry::Table(names)) = self.root.get_mut(&id.type_) else {
            return None;
        };
        let Some(ResourceEntry::Table(languages)) = names.get_mut(&id.name) else {
            return None;
        };
        let removed = match languages.remove(&ResourceId::Numeric(id.language)) {
            Some(ResourceEntry::Data(data)) => Some(data),
            _ => None,
        };
        if languages.entries.is_empty() {
            names.remove(&id.name);
        }
        if names.entries.is_empty() {
            self.root.remove(&id.type_);
        }
        removed
    }

    /// Returns the identities of all resources in directory order.
    pub fn resource_ids(&self) -> Vec<ResourceIdPair> {
        let mut ids = Vec::new();
        for (type_, entry) in &self.root.entries {
            let ResourceEntry::Table(names) = entry else { continue };
            for (name, entry) in &names.entries {
                let ResourceEntry::Table(languages) = entry else { continue };
                for (language, entry) in &languages.entries {
                    if let (ResourceId::Numeric(language), ResourceEntry::Data(_)) = (language, entry) {
                        ids.push(ResourceIdPair::new(type_, name, *language));
                    }
                }
            }
        }
        ids
    }
}

impl ResourceProvider for ResourceDirectory {
    fn enum_types(
        &self, callback: &mut dyn FnMut(&ResourceId) -> ControlFlow<()>,
    ) -> Result<(), ProviderError> {
        for (type_, entry) in &self.root.entries {
            if let ResourceEntry::Table(_) = entry {
                if callback(type_).is_break() {
                    break;
                }
            }
        }
        Ok(())
    }

    fn enum_names(
        &self, type_: &ResourceId, callback: &mut dyn FnMut(&ResourceId) -> ControlFlow<()>,
    ) -> Result<(), ProviderError> {
        let Some(ResourceEntry::Table(names)) = self.root.get(type_) else {
            return Err(ReadError(format!("resource type {} not found", type_)).into());
        };
        for (name, entry) in &names.entries {
            if let ResourceEntry::Table(_) = entry {
                if callback(name).is_break() {
                    break;
                }
            }
        }
        Ok(())
    }

    fn enum_languages(
        &self, type_: &ResourceId, name: &ResourceId,
        callback: &mut dyn FnMut(LANGID) -> ControlFlow<()>,
    ) -> Result<(), ProviderError> {
        let languages = match self.root.get(type_) {
            Some(ResourceEntry::Table(names)) => match names.get(name) {
                Some(ResourceEntry::Table(languages)) => languages,
                _ => return Err(ReadError(format!("resource name {} not found", name)).into()),
            },
            _ => return Err(ReadError(format!("resource type {} not found", type_)).into()),
        };
        for (language, entry) in &languages.entries {
            match (language, entry) {
                (ResourceId::Numeric(language), ResourceEntry::Data(_)) => {
                    if callback(*language).is_break() {
                        break;
                    }
                }
                _ => warn!("skipping invalid language entry {} in {} : {}", language, type_, name),
            }
        }
        Ok(())
    }

    fn load(&self, id: &ResourceIdPair) -> Result<Option<Cow<'_, [u8]>>, ProviderError> {
        Ok(self.get(id).map(|data| Cow::Borrowed(data.data())))
    }

    fn codepage(&self, id: &ResourceIdPair) -> u32 {
        self.get(id).map(|data| data.codepage()).unwrap_or_default()
    }
}

impl UpdateTarget for ResourceDirectory {
    fn begin_update(
        &mut self, discard_existing: bool,
    ) -> Result<Box<dyn UpdateSession + '_>, ProviderError> {
        let staged = if discard_existing {
            ResourceDirectory {
                virtual_address: self.virtual_address,
                ..Default::default()
            }
        } else {
            self.clone()
        };
        Ok(Box::new(DirectoryUpdate {
            target: self,
            staged,
        }))
    }
}

/// Update session staging changes on a copy of a resource directory.
#[derive(Debug)]
pub struct DirectoryUpdate<'a> {
    target: &'a mut ResourceDirectory,
    staged: ResourceDirectory,
}
impl<'a> DirectoryUpdate<'a> {
    /// Returns the staged directory.
    pub fn staged(&self) -> &ResourceDirectory { &self.staged }
}
impl UpdateSession for DirectoryUpdate<'_> {
    fn update(&mut self, id: &ResourceIdPair, data: Option<&ResourceData>) -> Result<(), ProviderError> {
        stage_update(&mut self.staged, id, data)
    }

    fn end(self: Box<Self>, commit: bool) -> Result<(), ProviderError> {
        let update = *self;
        if commit {
            debug!("committing {} staged resources", update.staged.resource_ids().len());
            *update.target = update.staged;
        }
        Ok(())
    }
}

/// Apply one staged update to a directory.
pub(crate) fn stage_update(
    directory: &mut ResourceDirectory, id: &ResourceIdPair, data: Option<&ResourceData>,
) -> Result<(), ProviderError> {
    match data {
        Some(data) => {
            id.check_encodable()?;
            trace!("staging {} ({} bytes, codepage {})", id, data.data().len(), data.codepage());
            directory.insert(id, data.clone());
        }
        None => {
            trace!("staging removal of {}", id);
            directory.remove(id);
        }
    }
    Ok(())
}

/// Offsets of the regions of a resource directory being built.
#[derive(Debug, Default)]
struct BuildCursor {
    tables:       u32,
    strings:      u32,
    descriptions: u32,
    data:         u32,
}

/// Portable executable resource table.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ResourceTable {
    pub(crate) data:    ResourceDirectoryTable,
    pub(crate) entries: IndexMap<ResourceId, ResourceEntry, RandomState>,
}
impl ResourceTable {
    fn parse(
        image: &[u8], base_address: u32, virtual_address: u32, directory_offset: u32, level: usize,
    ) -> Result<Self, ImageReadError> {
        if level >= MAX_DEPTH {
            return Err(ImageReadError::InvalidSection(format!(
                "resource directory nested deeper than {} levels",
                MAX_DEPTH
            )));
        }
        let table_offset = base_address as usize + directory_offset as usize;
        let resource_table = read::<ResourceDirectoryTable>(slice_from(image, table_offset)?)?;
        trace!("{} {:#x?}", "--".repeat(level + 1), resource_table);

        let mut entries = IndexMap::with_hasher(RandomState::new());

        let count = resource_table.number_of_name_entries as usize
            + resource_table.number_of_id_entries as usize;
        for index in 0..count {
            let entry_offset = table_offset + (TABLE_SIZE + ENTRY_SIZE * index as u32) as usize;
            let entry = read::<ResourceDirectoryEntry>(slice_from(image, entry_offset)?)?;
            trace!("{} {:#x?}", "--".repeat(level + 1), entry);

            let name = parse_entry_name(image, base_address, entry.name_offset_or_integer_id)?;
            let target = entry.data_entry_or_subdirectory_offset;
            if target & IMAGE_RESOURCE_DATA_IS_DIRECTORY != 0 {
                let table = ResourceTable::parse(
                    image,
                    base_address,
                    virtual_address,
                    target ^ IMAGE_RESOURCE_DATA_IS_DIRECTORY,
                    level + 1,
                )?;
                entries.insert(name, ResourceEntry::Table(table));
                continue;
            }

            let description_offset = base_address as usize + target as usize;
            let description = read::<ResourceDataEntry>(slice_from(image, description_offset)?)?;
            // calculate as i64 and convert to u64 to detect packed images pointing before the section
            let address = base_address as i64 + description.data_rva as i64 - virtual_address as i64;
            let mut address = address as u64;
            if address & 0xffffffffff000000 == 0xffffffffff000000 {
                warn!(
                    "{} resource data entry address {:#x?} seems to be packed, ignoring padding",
                    "--".repeat(level + 1),
                    address
                );
                address ^= 0xffffffffff000000;
            }
            trace!("{} {:#x?} {:#x?}", "--".repeat(level + 1), address, description);
            let Ok(data) = slice_at(image, address as usize, description.size as usize) else {
                error!(
                    "{} resource data entry {} at {:#x?} with size {:#x?} outside valid range ({:#x?})",
                    "--".repeat(level + 1),
                    name,
                    address,
                    description.size,
                    image.len()
                );
                continue;
            };
            entries.insert(
                name,
                ResourceEntry::Data(ResourceData {
                    data:     data.to_vec().into(),
                    codepage: description.codepage,
                    reserved: description.reserved,
                }),
            );
        }

        let mut data = resource_table;
        data.number_of_name_entries = entries.keys().filter(|name| name.is_named()).count() as u16;
        data.number_of_id_entries = entries.keys().filter(|name| name.is_numeric()).count() as u16;
        Ok(Self {
            data,
            entries,
        })
    }

    fn build(&self, virtual_address: u32) -> Vec<u8> {
        let tables_size = self.tables_size();
        let strings_size = self.strings_size();
        let descriptions_size = self.descriptions_size();
        let mut output = vec![0u8; self.size() as usize];

        let mut cursor = BuildCursor {
            tables:       0,
            strings:      tables_size,
            descriptions: tables_size + strings_size,
            data:         tables_size + strings_size + descriptions_size,
        };
        cursor.tables += TABLE_SIZE + ENTRY_SIZE * self.entries.len() as u32;
        self.build_table(&mut output, 0, virtual_address, &mut cursor);
        debug!("built resource directory of {:#x?} bytes", output.len());
        output
    }

    /// Write the table at `offset` and recursively its children.
    /// Child tables are placed in the table region after all previously placed tables.
    fn build_table(
        &self, output: &mut [u8], offset: u32, virtual_address: u32, cursor: &mut BuildCursor,
    ) {
        let mut table = self.data;
        table.number_of_name_entries = self.entries.keys().filter(|name| name.is_named()).count() as u16;
        table.number_of_id_entries = self.entries.keys().filter(|name| name.is_numeric()).count() as u16;
        write_at(output, offset, table.as_bytes());

        // the loader binary searches entries: names first, then ids, each in ascending order
        let mut ordered = self.entries.iter().collect::<Vec<_>>();
        ordered.sort_by(|(a, _), (b, _)| a.is_numeric().cmp(&b.is_numeric()).then_with(|| a.cmp(b)));

        let mut children = Vec::new();
        for (index, (name, entry)) in ordered.into_iter().enumerate() {
            let name_offset_or_integer_id = match name {
                ResourceId::Numeric(id) => *id as u32,
                ResourceId::Named(name) => {
                    let name_offset = cursor.strings;
                    let string = entry_name_data(name);
                    write_at(output, name_offset, &string);
                    cursor.strings += string.len() as u32;
                    name_offset | IMAGE_RESOURCE_NAME_IS_STRING
                }
            };
            let data_entry_or_subdirectory_offset = match entry {
                ResourceEntry::Table(table) => {
                    let table_offset = cursor.tables;
                    cursor.tables += TABLE_SIZE + ENTRY_SIZE * table.entries.len() as u32;
                    children.push((table_offset, table));
                    table_offset | IMAGE_RESOURCE_DATA_IS_DIRECTORY
                }
                ResourceEntry::Data(data) => {
                    let description_offset = cursor.descriptions;
                    let description = ResourceDataEntry {
                        data_rva: cursor.data + virtual_address,
                        size:     data.data.len() as u32,
                        codepage: data.codepage,
                        reserved: data.reserved,
                    };
                    write_at(output, description_offset, description.as_bytes());
                    write_at(output, cursor.data, &data.data);
                    cursor.descriptions += DESCRIPTION_SIZE;
                    cursor.data += aligned_to(data.data.len() as u32, DATA_ALIGNMENT);
                    description_offset
                }
            };
            let entry = ResourceDirectoryEntry {
                name_offset_or_integer_id,
                data_entry_or_subdirectory_offset,
            };
            write_at(output, offset + TABLE_SIZE + ENTRY_SIZE * index as u32, entry.as_bytes());
        }

        for (table_offset, table) in children {
            table.build_table(output, table_offset, virtual_address, cursor);
        }
    }

    /// Get a resource entry from the table.
    pub fn get(&self, name: &ResourceId) -> Option<&ResourceEntry> { self.entries.get(name) }

    /// Get a mutable resource entry from the table.
    pub fn get_mut(&mut self, name: &ResourceId) -> Option<&mut ResourceEntry> {
        self.entries.get_mut(name)
    }

    /// Get the child table with the given name, replacing a data entry or inserting an empty table if needed.
    fn table_mut(&mut self, name: &ResourceId) -> &mut ResourceTable {
        if !matches!(self.entries.get(name), Some(ResourceEntry::Table(_))) {
            self.insert(name.clone(), ResourceEntry::Table(ResourceTable::default()));
        }
        match self.entries.get_mut(name) {
            Some(ResourceEntry::Table(table)) => table,
            _ => unreachable!("table inserted above"),
        }
    }

    /// Insert a resource entry into the table.
    /// If an entry with the given name already exists, it will be replaced.
    /// # Returns
    /// The replaced entry.
    pub fn insert(&mut self, name: ResourceId, entry: ResourceEntry) -> Option<ResourceEntry> {
        let named = name.is_named();
        let entry = self.entries.insert(name, entry);
        if entry.is_none() {
            if named {
                self.data.number_of_name_entries += 1;
            } else {
                self.data.number_of_id_entries += 1;
            }
        }
        entry
    }

    /// Remove a resource entry from the table, keeping the order of the remaining entries.
    /// # Returns
    /// The removed entry.
    pub fn remove(&mut self, name: &ResourceId) -> Option<ResourceEntry> {
        let entry = self.entries.shift_remove(name)?;
        if name.is_named() {
            self.data.number_of_name_entries -= 1;
        } else {
            self.data.number_of_id_entries -= 1;
        }
        Some(entry)
    }

    /// Returns the entry names in the table.
    pub fn entries(&self) -> Vec<&ResourceId> { self.entries.keys().collect() }

    /// Returns the complete size of the table, its resources and its children in the resource directory.
    pub fn size(&self) -> u32 {
        self.tables_size() + self.strings_size() + self.descriptions_size() + self.data_size()
    }

    /// Returns the size of the table and its children in the resource directory.
    pub fn tables_size(&self) -> u32 {
        self.entries.values().map(|entry| entry.table_size()).sum::<u32>() + TABLE_SIZE
    }

    /// Returns the size of the entry names of the table and its children, padded to 8 bytes.
    pub fn strings_size(&self) -> u32 { aligned_to(self.unaligned_strings_size(), DATA_ALIGNMENT) }

    fn unaligned_strings_size(&self) -> u32 {
        self.entries
            .iter()
            .map(|(name, entry)| {
                let name_size = match name {
                    ResourceId::Numeric(_) => 0,
                    ResourceId::Named(name) => entry_name_data(name).len() as u32,
                };
                let children_size = match entry {
                    ResourceEntry::Table(table) => table.unaligned_strings_size(),
                    ResourceEntry::Data(_) => 0,
                };
                name_size + children_size
            })
            .sum::<u32>()
    }

    /// Returns the size of the data descriptions of the table and its children.
    pub fn descriptions_size(&self) -> u32 {
        self.entries.values().map(|entry| entry.description_size()).sum::<u32>()
    }

    /// Returns the size of the data of the table and its children, each entry padded to 8 bytes.
    pub fn data_size(&self) -> u32 {
        self.entries.values().map(|entry| entry.data_size()).sum::<u32>()
    }
}

fn write_at(output: &mut [u8], offset: u32, data: &[u8]) {
    let offset = offset as usize;
    output[offset..offset + data.len()].copy_from_slice(data);
}

/// Encode a directory entry name: 2 byte length in characters followed by UTF-16 data without terminator.
fn entry_name_data(name: &str) -> Vec<u8> {
    let units = name.encode_utf16().collect::<Vec<_>>();
    let mut data = Vec::with_capacity(units.len() * 2 + 2);
    data.extend_from_slice(&(units.len() as u16).to_le_bytes());
    data.extend(units.iter().flat_map(|c| c.to_le_bytes()));
    data
}

fn parse_entry_name(image: &[u8], base_address: u32, id: u32) -> Result<ResourceId, ReadError> {
    if id & IMAGE_RESOURCE_NAME_IS_STRING != 0 {
        trace!("reading resource name {:#x?}", id);
        let address = base_address as usize + (id ^ IMAGE_RESOURCE_NAME_IS_STRING) as usize;
        let length = read::<u16>(slice_from(image, address)?)? as usize;
        // length is in 16 bit characters
        let data = slice_at(image, address + 2, length * 2)?;
        let units = data.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect::<Vec<_>>();
        let name = decode_utf16(&units);
        trace!("resource name: {}", name);
        Ok(ResourceId::Named(name))
    } else {
        trace!("reading resource id {:#x?}", id);
        u16::try_from(id)
            .map(ResourceId::Numeric)
            .map_err(|_| ReadError(format!("resource id {:#x} exceeds 16 bits", id)))
    }
}

/// Raw resource data.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ResourceData {
    data:     DebugIgnore<Vec<u8>>,
    codepage: u32,
    reserved: u32,
}
impl ResourceData {
    pub fn new(data: Vec<u8>, codepage: u32) -> Self {
        Self {
            data: data.into(),
            codepage,
            reserved: 0,
        }
    }

    /// Returns the raw data.
    pub fn data(&self) -> &[u8] { &self.data }

    /// Returns the codepage of the data.
    pub fn codepage(&self) -> u32 { self.codepage }

    /// Set the raw data.
    pub fn set_data(&mut self, data: Vec<u8>) { self.data = data.into(); }

    /// Set the codepage of the data.
    pub fn set_codepage(&mut self, codepage: u32) { self.codepage = codepage; }
}

/// Resource entry in a resource table.
/// This can be either a child table or raw data.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ResourceEntry {
    Table(ResourceTable),
    Data(ResourceData),
}
impl ResourceEntry {
    /// Returns the size of the table entry and its children in the resource directory.
    pub fn table_size(&self) -> u32 {
        match self {
            ResourceEntry::Table(table) => table.tables_size() + ENTRY_SIZE,
            ResourceEntry::Data(_) => ENTRY_SIZE,
        }
    }

    /// Returns the size of the data descriptions of the entry and its children.
    pub fn description_size(&self) -> u32 {
        match self {
            ResourceEntry::Table(table) => table.descriptions_size(),
            ResourceEntry::Data(_) => DESCRIPTION_SIZE,
        }
    }

    /// Returns the size of the data of the entry and its children.
    pub fn data_size(&self) -> u32 {
        match self {
            ResourceEntry::Table(table) => table.data_size(),
            ResourceEntry::Data(data) => aligned_to(data.data.len() as u32, DATA_ALIGNMENT),
        }
    }
}
