#![allow(dead_code)]

use std::{
    borrow::Cow,
    cell::{Cell, RefCell},
    ops::ControlFlow,
    rc::Rc,
    sync::Once,
};

use resinfo::{types::*, *};
use zerocopy::IntoBytes;

pub const SECTION_ALIGNMENT: u32 = 0x1000;
pub const FILE_ALIGNMENT: u32 = 0x200;
pub const TEXT_VIRTUAL_ADDRESS: u32 = 0x1000;
pub const RESOURCE_VIRTUAL_ADDRESS: u32 = 0x2000;

pub const PE_HEADER_OFFSET: usize = 0x40;
pub const COFF_HEADER_OFFSET: usize = PE_HEADER_OFFSET + 4;
pub const STANDARD_HEADER_OFFSET: usize = COFF_HEADER_OFFSET + 20;
/// Offset of the data directories from the start of a PE32 optional header.
pub const DATA_DIRECTORIES_START: usize = 96;
const OPTIONAL_HEADER_SIZE: usize = 224;
const SECTION_TABLE_OFFSET: usize = STANDARD_HEADER_OFFSET + OPTIONAL_HEADER_SIZE;
const SECTION_HEADER_SIZE: usize = 40;

/// Size of the optional header and number of data directories of a built image.
#[derive(Debug, Clone, Copy)]
pub struct OptionalHeaderLayout {
    pub size:             usize,
    pub data_directories: u32,
}
impl Default for OptionalHeaderLayout {
    fn default() -> Self {
        Self {
            size:             OPTIONAL_HEADER_SIZE,
            data_directories: 16,
        }
    }
}

static INIT_LOGGER: Once = Once::new();
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Debug)
            .format_timestamp(None)
            .format_module_path(false)
            .format_level(true)
            .format_target(false)
            .write_style(env_logger::WriteStyle::Auto)
            .init();
    });
}

pub fn align(value: u32, alignment: u32) -> u32 { value.div_ceil(alignment) * alignment }

/// Build a PE32 image with a code section, an optional resource section and an optional data section after it.
pub fn build_image(resources: Option<&ResourceDirectory>, trailing_section: bool) -> Vec<u8> {
    let mut sections = vec![(*b".text\0\0\0", vec![0xC3; 0x10])];
    if let Some(directory) = resources {
        sections.push((*b".rsrc\0\0\0", directory.build(RESOURCE_VIRTUAL_ADDRESS)));
    }
    if trailing_section {
        sections.push((*b".data\0\0\0", vec![0xAB; 0x20]));
    }
    let headers_size = align((SECTION_TABLE_OFFSET + 4 * SECTION_HEADER_SIZE) as u32, FILE_ALIGNMENT);
    assemble(&sections, resources.map(ResourceDirectory::size), headers_size, OptionalHeaderLayout::default())
}

/// Build a PE32 image with a code section and a data section, using the given optional header layout.
pub fn build_image_with_layout(layout: OptionalHeaderLayout) -> Vec<u8> {
    let sections = vec![(*b".text\0\0\0", vec![0xC3; 0x10]), (*b".data\0\0\0", vec![0xAB; 0x20])];
    let headers_size = align((SECTION_TABLE_OFFSET + 4 * SECTION_HEADER_SIZE) as u32, FILE_ALIGNMENT);
    assemble(&sections, None, headers_size, layout)
}

/// Build a PE32 image without resources whose section data directly follows the section table.
pub fn build_image_without_header_space() -> Vec<u8> {
    let sections = vec![(*b".text\0\0\0", vec![0xC3; 0x10])];
    assemble(
        &sections,
        None,
        (SECTION_TABLE_OFFSET + SECTION_HEADER_SIZE) as u32,
        OptionalHeaderLayout::default(),
    )
}

fn assemble(
    sections: &[([u8; 8], Vec<u8>)], resource_size: Option<u32>, headers_size: u32,
    layout: OptionalHeaderLayout,
) -> Vec<u8> {
    let mut section_table = Vec::new();
    let mut virtual_address = TEXT_VIRTUAL_ADDRESS;
    let mut pointer_to_raw_data = headers_size;
    for (name, data) in sections {
        let size_of_raw_data = align(data.len() as u32, FILE_ALIGNMENT);
        section_table.push(SectionHeader {
            name: u64::from_le_bytes(*name),
            virtual_size: data.len() as u32,
            virtual_address,
            size_of_raw_data,
            pointer_to_raw_data,
            characteristics: IMAGE_SCN_CNT_INITIALIZED_DATA | IMAGE_SCN_MEM_READ,
            ..Default::default()
        });
        virtual_address += align(data.len() as u32, SECTION_ALIGNMENT).max(SECTION_ALIGNMENT);
        pointer_to_raw_data += size_of_raw_data;
    }

    let mut image = vec![0u8; headers_size as usize];
    image[0..2].copy_from_slice(&PE_DOS_MAGIC.to_le_bytes());
    image[PE_PTR_OFFSET as usize..PE_PTR_OFFSET as usize + 4]
        .copy_from_slice(&(PE_HEADER_OFFSET as u32).to_le_bytes());
    image[PE_HEADER_OFFSET..PE_HEADER_OFFSET + 4].copy_from_slice(&PE_NT_SIGNATURE.to_le_bytes());

    let coff_header = CoffHeader {
        machine: 0x014C,
        number_of_sections: sections.len() as u16,
        size_of_optional_header: layout.size as u16,
        characteristics: 0x0102,
        ..Default::default()
    };
    write_at(&mut image, COFF_HEADER_OFFSET, coff_header.as_bytes());

    let standard_header = StandardHeader {
        magic: PE_32_MAGIC,
        base_of_code: TEXT_VIRTUAL_ADDRESS,
        ..Default::default()
    };
    write_at(&mut image, STANDARD_HEADER_OFFSET, standard_header.as_bytes());
    // base of data
    write_at(&mut image, STANDARD_HEADER_OFFSET + 24, &TEXT_VIRTUAL_ADDRESS.to_le_bytes());

    let windows_header = WindowsHeader::<u32> {
        image_base: 0x0040_0000,
        section_alignment: SECTION_ALIGNMENT,
        file_alignment: FILE_ALIGNMENT,
        size_of_image: virtual_address,
        size_of_headers: headers_size,
        subsystem: 3,
        number_of_rva_and_sizes: layout.data_directories,
        ..Default::default()
    };
    write_at(&mut image, STANDARD_HEADER_OFFSET + 28, windows_header.as_bytes());

    if let Some(size) = resource_size {
        let resource_table = ImageDataDirectory {
            virtual_address: RESOURCE_VIRTUAL_ADDRESS,
            size,
        };
        write_at(
            &mut image,
            STANDARD_HEADER_OFFSET + DATA_DIRECTORIES_START + 2 * 8,
            resource_table.as_bytes(),
        );
    }

    let section_table_offset = STANDARD_HEADER_OFFSET + layout.size;
    for (index, section) in section_table.iter().enumerate() {
        write_at(&mut image, section_table_offset + index * SECTION_HEADER_SIZE, section.as_bytes());
    }
    for ((_, data), section) in sections.iter().zip(&section_table) {
        image.extend_from_slice(data);
        image.resize((section.pointer_to_raw_data + section.size_of_raw_data) as usize, 0);
    }
    image
}

fn write_at(image: &mut [u8], offset: usize, bytes: &[u8]) {
    image[offset..offset + bytes.len()].copy_from_slice(bytes);
}

/// Build a resource directory from identities and data.
pub fn directory_with(resources: &[(ResourceIdPair, &[u8])]) -> ResourceDirectory {
    let mut directory = ResourceDirectory::default();
    for (id, data) in resources {
        directory.insert(id, ResourceData::new(data.to_vec(), 0));
    }
    directory
}

/// Provider serving resources from a list, optionally failing to enumerate the names of one type.
#[derive(Debug, Default)]
pub struct ListProvider {
    pub resources:      Vec<(ResourceIdPair, Vec<u8>)>,
    pub fail_names_of:  Option<ResourceId>,
    pub loads:          Cell<usize>,
}
impl ListProvider {
    pub fn new(resources: Vec<(ResourceIdPair, Vec<u8>)>) -> Self {
        Self {
            resources,
            ..Default::default()
        }
    }

    fn distinct<T: PartialEq + Clone>(items: impl Iterator<Item = T>) -> Vec<T> {
        let mut distinct = Vec::new();
        for item in items {
            if !distinct.contains(&item) {
                distinct.push(item);
            }
        }
        distinct
    }
}
impl ResourceProvider for ListProvider {
    fn enum_types(
        &self, callback: &mut dyn FnMut(&ResourceId) -> ControlFlow<()>,
    ) -> Result<(), ProviderError> {
        for type_ in Self::distinct(self.resources.iter().map(|(id, _)| id.type_.clone())) {
            if callback(&type_).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn enum_names(
        &self, type_: &ResourceId, callback: &mut dyn FnMut(&ResourceId) -> ControlFlow<()>,
    ) -> Result<(), ProviderError> {
        if self.fail_names_of.as_ref() == Some(type_) {
            return Err("names unavailable".into());
        }
        let names = self.resources.iter().filter(|(id, _)| id.type_ == *type_);
        for name in Self::distinct(names.map(|(id, _)| id.name.clone())) {
            if callback(&name).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn enum_languages(
        &self, type_: &ResourceId, name: &ResourceId,
        callback: &mut dyn FnMut(LANGID) -> ControlFlow<()>,
    ) -> Result<(), ProviderError> {
        let languages = self.resources.iter().filter(|(id, _)| id.type_ == *type_ && id.name == *name);
        for language in Self::distinct(languages.map(|(id, _)| id.language)) {
            if callback(language).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn load(&self, id: &ResourceIdPair) -> Result<Option<Cow<'_, [u8]>>, ProviderError> {
        self.loads.set(self.loads.get() + 1);
        Ok(self
            .resources
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, data)| Cow::Borrowed(data.as_slice())))
    }
}

/// Events observed by a [`RecordingTarget`].
#[derive(Debug, Default)]
pub struct TargetLog {
    pub sessions:  usize,
    pub staged:    Vec<ResourceIdPair>,
    pub discarded: bool,
    pub committed: bool,
}

/// Update target that applies committed updates to a directory,
/// failing the commit or the update after a number of staged updates if configured.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    pub directory:     ResourceDirectory,
    pub fail_commit:   bool,
    pub fail_update:   Option<usize>,
    pub log:           Rc<RefCell<TargetLog>>,
}
impl UpdateTarget for RecordingTarget {
    fn begin_update(
        &mut self, discard_existing: bool,
    ) -> Result<Box<dyn UpdateSession + '_>, ProviderError> {
        self.log.borrow_mut().sessions += 1;
        let staged = if discard_existing { ResourceDirectory::default() } else { self.directory.clone() };
        Ok(Box::new(RecordingSession {
            target: self,
            staged,
        }))
    }
}

pub struct RecordingSession<'a> {
    target: &'a mut RecordingTarget,
    staged: ResourceDirectory,
}
impl UpdateSession for RecordingSession<'_> {
    fn update(&mut self, id: &ResourceIdPair, data: Option<&ResourceData>) -> Result<(), ProviderError> {
        let mut log = self.target.log.borrow_mut();
        if self.target.fail_update == Some(log.staged.len()) {
            return Err(format!("rejected {}", id).into());
        }
        log.staged.push(id.clone());
        match data {
            Some(data) => {
                self.staged.insert(id, data.clone());
            }
            None => {
                self.staged.remove(id);
            }
        }
        Ok(())
    }

    fn end(self: Box<Self>, commit: bool) -> Result<(), ProviderError> {
        let RecordingSession { target, staged } = *self;
        if !commit {
            target.log.borrow_mut().discarded = true;
            return Ok(());
        }
        if target.fail_commit {
            return Err("commit failed".into());
        }
        target.log.borrow_mut().committed = true;
        target.directory = staged;
        Ok(())
    }
}
