//! Portable executable images as resource providers and update targets.
//!
//! See <https://learn.microsoft.com/en-us/windows/win32/debug/pe-format> for more information.

use std::{
    borrow::Cow,
    fs::File,
    io::Write,
    ops::ControlFlow,
    path::{Path, PathBuf},
};

use ahash::RandomState;
use indexmap::IndexMap;
use log::{debug, error, info, warn};
use zerocopy::IntoBytes;

use crate::{constants::*, directory::*, errors::*, id::*, provider::*, types::*, util::*};

const COFF_HEADER_SIZE: u64 = 20;
const SECTION_HEADER_SIZE: u32 = 40;
const DATA_DIRECTORY_SIZE: u32 = 8;

/// Image data directory type enumeration.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum DataDirectoryType {
    ExportTable,
    ImportTable,
    ResourceTable,
    ExceptionTable,
    CertificateTable,
    BaseRelocationTable,
    Debug,
    Architecture,
    GlobalPtr,
    TLSTable,
    LoadConfigTable,
    BoundImport,
    IAT,
    DelayImportDescriptor,
    CLRRuntimeHeader,
    Reserved,
}
impl DataDirectoryType {
    const ALL: [DataDirectoryType; 16] = [
        Self::ExportTable,
        Self::ImportTable,
        Self::ResourceTable,
        Self::ExceptionTable,
        Self::CertificateTable,
        Self::BaseRelocationTable,
        Self::Debug,
        Self::Architecture,
        Self::GlobalPtr,
        Self::TLSTable,
        Self::LoadConfigTable,
        Self::BoundImport,
        Self::IAT,
        Self::DelayImportDescriptor,
        Self::CLRRuntimeHeader,
        Self::Reserved,
    ];
}

/// Portable executable image.
///
/// The image provides the resources of its resource directory and accepts update sessions
/// that rebuild the resource section on commit.
#[derive(Debug, Clone)]
pub struct Image<'a> {
    image: Cow<'a, [u8]>,

    coff_header:           CoffHeader,
    standard_header:       StandardHeader,
    windows_header:        GenericWindowsHeader,
    header_data_directory: IndexMap<DataDirectoryType, ImageDataDirectory, RandomState>,
    section_table:         Vec<SectionHeader>,

    resource_directory: Option<ResourceDirectory>,

    coff_header_offset:      u64,
    windows_header_offset:   u64,
    data_directories_offset: u64,
    section_table_end:       u64,
}

impl PartialEq for Image<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.coff_header == other.coff_header
            && self.standard_header == other.standard_header
            && self.windows_header == other.windows_header
            && self.header_data_directory == other.header_data_directory
            && self.section_table == other.section_table
            && self.resource_directory == other.resource_directory
    }
}
impl Eq for Image<'_> {}

impl<'a> Image<'a> {
    /// Parse a portable executable image from bytes.
    ///
    /// # Returns
    /// Returns the `Image`, or an error if the bytes are not a valid portable executable image or are missing required headers.
    pub fn parse<R: Into<Cow<'a, [u8]>>>(image: R) -> Result<Self, ImageReadError> {
        let image = image.into();

        let pe_dos_magic = read::<u16>(&image)?;
        if pe_dos_magic != PE_DOS_MAGIC {
            return Err(ImageReadError::InvalidHeader("no dos magic".into()));
        }

        let pe_signature_offset = read::<u32>(slice_from(&image, PE_PTR_OFFSET as usize)?)?;
        debug!("pe_signature_offset: {:#x?}", pe_signature_offset);
        let pe_signature = read::<u32>(slice_from(&image, pe_signature_offset as usize)?)?;
        if pe_signature != PE_NT_SIGNATURE {
            return Err(ImageReadError::InvalidHeader("no pe signature".into()));
        }

        let coff_header_offset = pe_signature_offset as u64 + 4;
        let coff_header = read::<CoffHeader>(slice_from(&image, coff_header_offset as usize)?)?;
        debug!("{:#x?}: {:#x?}", coff_header_offset, coff_header);

        let standard_header_offset = coff_header_offset + COFF_HEADER_SIZE;
        let standard_header =
            read::<StandardHeader>(slice_from(&image, standard_header_offset as usize)?)?;
        debug!("{:#x?}: {:#x?}", standard_header_offset, standard_header);

        // PE32 optional headers carry an additional base of data field before the windows header
        let (windows_header, windows_header_offset, optional_header_dd_offset) = if standard_header
            .magic
            == PE_32_MAGIC
            && coff_header.size_of_optional_header >= 96
        {
            let offset = standard_header_offset + 28;
            let header = read::<WindowsHeader<u32>>(slice_from(&image, offset as usize)?)?;
            (GenericWindowsHeader::WindowsHeader32(header), offset, standard_header_offset + 96)
        } else if standard_header.magic == PE_64_MAGIC && coff_header.size_of_optional_header >= 112
        {
            let offset = standard_header_offset + 24;
            let header = read::<WindowsHeader<u64>>(slice_from(&image, offset as usize)?)?;
            (GenericWindowsHeader::WindowsHeader64(header), offset, standard_header_offset + 112)
        } else {
            return Err(ImageReadError::InvalidHeader("invalid optional header".into()));
        };
        debug!("{:#x?}", windows_header);

        let mut header_data_directory = IndexMap::with_hasher(RandomState::new());
        let count = windows_header.number_of_rva_and_sizes() as usize;
        for (index, header) in DataDirectoryType::ALL.into_iter().enumerate().take(count) {
            let offset = optional_header_dd_offset as usize + index * DATA_DIRECTORY_SIZE as usize;
            let data = read::<ImageDataDirectory>(slice_from(&image, offset)?)?;
            debug!("{:#x?}: {:?}: {:#x?}", offset, header, data);
            header_data_directory.insert(header, data);
        }

        let section_table_offset =
            standard_header_offset + coff_header.size_of_optional_header as u64;
        let mut section_table = Vec::with_capacity(coff_header.number_of_sections as usize);
        for index in 0..coff_header.number_of_sections as u64 {
            let offset = section_table_offset + index * SECTION_HEADER_SIZE as u64;
            let section_header = read::<SectionHeader>(slice_from(&image, offset as usize)?)?;
            debug!(
                "{:#x?}: {}: {:#x?}",
                offset,
                section_header.name().unwrap_or_else(|| "?".to_string()),
                section_header
            );
            section_table.push(section_header);
        }
        let section_table_end = section_table_offset
            + coff_header.number_of_sections as u64 * SECTION_HEADER_SIZE as u64;

        let mut resource_directory = None;
        if let Some(resource_data) = header_data_directory.get(&DataDirectoryType::ResourceTable) {
            let virtual_address = resource_data.virtual_address;
            if virtual_address > 0 && resource_data.size > 0 {
                let section = section_table
                    .iter()
                    .find(|section| section.contains_virtual_address(virtual_address))
                    .ok_or_else(|| {
                        ImageReadError::InvalidSection(format!(
                            "no section contains the resource directory at {:#x}",
                            virtual_address
                        ))
                    })?;
                debug!(
                    "found resource directory in {} section",
                    section.name().unwrap_or_else(|| "?".to_string())
                );
                let base_address = section
                    .pointer_to_raw_data
                    .checked_add(virtual_address - section.virtual_address)
                    .ok_or_else(|| {
                        ImageReadError::InvalidSection("resource directory outside image".into())
                    })?;
                resource_directory =
                    Some(ResourceDirectory::parse(&image, base_address, virtual_address)?);
            }
        }

        Ok(Self {
            image,
            coff_header,
            standard_header,
            windows_header,
            header_data_directory,
            section_table,
            resource_directory,
            coff_header_offset,
            windows_header_offset,
            data_directories_offset: optional_header_dd_offset,
            section_table_end,
        })
    }

    /// Parse a portable executable image from a file.
    ///
    /// # Returns
    /// Returns the `Image`, or an error if the file could not be read, is not a valid portable executable image or is missing required headers.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Image<'static>, ImageReadError> {
        let data = std::fs::read(path)?;
        Image::parse(data)
    }

    /// Write the portable executable image to a file.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ImageWriteError> {
        std::fs::write(path, &self.image).map_err(|e| e.into())
    }

    /// Write the portable executable image to a writer.
    pub fn write_writer<W: Write>(&self, writer: &mut W) -> Result<(), ImageWriteError> {
        writer.write_all(&self.image).map_err(|e| e.into())
    }

    /// Set the resource directory of the image.
    ///
    /// This will update the resource data directory and the resource section.
    /// The existing resource section is rebuilt in place if the following conditions are met:
    /// - The section starts with the resource directory and isn't used by other data directories.
    /// - The new directory fits into the section, or the section is the last section in the image.
    ///
    /// Otherwise, the existing section is kept intact and a new section is added after all other sections
    /// and before any other data at the end of the image.
    ///
    /// The image is left unmodified if an error is returned.
    ///
    /// # Returns
    /// Returns the previous resource directory, or an error in the following cases:
    /// - There is not enough space in the image header to add a new section.
    /// - A section points to data outside the image.
    pub fn set_resource_directory(
        &mut self, mut resource_directory: ResourceDirectory,
    ) -> Result<Option<ResourceDirectory>, ImageWriteError> {
        // modify copies to allow erroring out without invalidating the image
        let mut coff_header = self.coff_header;
        let mut windows_header = self.windows_header;
        let mut header_data_directory = self.header_data_directory.clone();
        let mut section_table = self.section_table.clone();
        let section_alignment = windows_header.section_alignment().max(1);
        let file_alignment = windows_header.file_alignment().max(1);

        for &header in &DataDirectoryType::ALL[..=2] {
            if !header_data_directory.contains_key(&header) {
                debug!("adding missing header data directory: {:?}", header);
                header_data_directory.insert(header, ImageDataDirectory::default());
            }
        }
        // the optional header only grows if the data directories no longer fit into it
        let standard_header_offset = self.coff_header_offset + COFF_HEADER_SIZE;
        let section_table_offset = standard_header_offset + self.coff_header.size_of_optional_header as u64;
        let data_directories_end = self.data_directories_offset
            + header_data_directory.len() as u64 * DATA_DIRECTORY_SIZE as u64;
        let optional_header_size = (data_directories_end - standard_header_offset)
            .max(self.coff_header.size_of_optional_header as u64);
        coff_header.size_of_optional_header = u16::try_from(optional_header_size)
            .map_err(|_| ImageWriteError::NotEnoughSpaceInHeader)?;
        let mut required_header_space =
            (optional_header_size - self.coff_header.size_of_optional_header as u64) as u32;

        let image_len = self.image.len() as u64;
        if let Some(section) = section_table.iter().find(|section| section.raw_end() > image_len) {
            return Err(ImageWriteError::InvalidSectionRange(section.raw_end(), image_len));
        }
        let raw_sections = || section_table.iter().filter(|section| section.size_of_raw_data > 0);
        let first_section_start = raw_sections()
            .map(|section| section.pointer_to_raw_data as u64)
            .min()
            .unwrap_or(image_len);
        let last_section_end = raw_sections().map(SectionHeader::raw_end).max().unwrap_or(image_len);
        let virtual_end = section_table
            .iter()
            .map(|section| section.virtual_address as u64 + section.virtual_size as u64)
            .max()
            .unwrap_or(section_alignment as u64);

        let old_resource_data_directory =
            header_data_directory.get(&DataDirectoryType::ResourceTable).copied().unwrap_or_default();
        let new_size = resource_directory.size();
        debug!("new resource directory size: {:#x?}", new_size);

        // find an existing section that holds nothing but the resource directory
        let reusable_section = section_table.iter().position(|section| {
            old_resource_data_directory.size > 0
                && section.virtual_address == old_resource_data_directory.virtual_address
                && section.size_of_raw_data > 0
                && !header_data_directory.iter().any(|(header, directory)| {
                    *header != DataDirectoryType::ResourceTable
                        && directory.size > 0
                        && section.contains_virtual_address(directory.virtual_address)
                })
        });
        let reusable_section = reusable_section.filter(|&index| {
            let section = &section_table[index];
            let is_last = section.raw_end() == last_section_end
                && section.virtual_address as u64 + section.virtual_size as u64 == virtual_end;
            if new_size <= section.size_of_raw_data
                && new_size <= aligned_to(section.virtual_size, section_alignment)
            {
                debug!("existing resource section is large enough and can be reused");
                true
            } else if is_last {
                debug!("existing resource section is the last section and can be extended");
                true
            } else {
                debug!("existing resource section is too small and followed by other sections");
                false
            }
        });

        let mut tail = Vec::new();
        let section_data_start;
        let section_data_end;
        let virtual_address;
        match reusable_section {
            Some(index) => {
                let section = &mut section_table[index];
                virtual_address = section.virtual_address;
                section_data_start = section.pointer_to_raw_data as u64;
                section_data_end = section.raw_end();
                let mut data = resource_directory.build(virtual_address);
                if new_size > section.size_of_raw_data {
                    section.size_of_raw_data = aligned_to(new_size, file_alignment);
                }
                data.resize(section.size_of_raw_data as usize, 0);
                section.virtual_size = new_size;
                tail = data;
            }
            None => {
                if old_resource_data_directory.size > 0 {
                    warn!("keeping existing resource data intact, adding a new resource section");
                }
                virtual_address = u32::try_from(aligned_to(virtual_end, section_alignment as u64))
                    .map_err(|_| ImageWriteError::DirectoryTooLarge(new_size as usize))?;
                let pointer_to_raw_data = aligned_to(last_section_end, file_alignment as u64);
                let size_of_raw_data = aligned_to(new_size, file_alignment);
                let name = if section_table.iter().any(|section| section.name().as_deref() == Some(".rsrc")) {
                    *b".rsrc2\0\0"
                } else {
                    *b".rsrc\0\0\0"
                };
                section_table.push(SectionHeader {
                    name: u64::from_le_bytes(name),
                    virtual_size: new_size,
                    virtual_address,
                    size_of_raw_data,
                    pointer_to_raw_data: u32::try_from(pointer_to_raw_data)
                        .map_err(|_| ImageWriteError::DirectoryTooLarge(new_size as usize))?,
                    characteristics: IMAGE_SCN_CNT_INITIALIZED_DATA | IMAGE_SCN_MEM_READ,
                    ..SectionHeader::default()
                });
                coff_header.number_of_sections += 1;
                required_header_space += SECTION_HEADER_SIZE;

                section_data_start = last_section_end;
                section_data_end = last_section_end;
                tail.resize((pointer_to_raw_data - last_section_end) as usize, 0);
                tail.extend(resource_directory.build(virtual_address));
                tail.resize(tail.len() + (size_of_raw_data - new_size) as usize, 0);
            }
        }
        virtual_address
            .checked_add(new_size)
            .ok_or(ImageWriteError::DirectoryTooLarge(new_size as usize))?;

        if first_section_start < self.section_table_end {
            return Err(ImageWriteError::InvalidSectionRange(
                first_section_start,
                self.section_table_end,
            ));
        }
        let available_space = first_section_start - self.section_table_end;
        debug!(
            "available header space: {:#x?}, required: {:#x?}",
            available_space, required_header_space
        );
        if required_header_space as u64 > available_space {
            error!(
                "not enough space in header to add new section ({} > {})",
                required_header_space, available_space
            );
            return Err(ImageWriteError::NotEnoughSpaceInHeader);
        }

        if let Some(resource_dd) = header_data_directory.get_mut(&DataDirectoryType::ResourceTable) {
            resource_dd.virtual_address = virtual_address;
            resource_dd.size = new_size;
        }
        if section_data_end < image_len && last_section_end < image_len {
            warn!("image contains data after the last section, it will be moved and signatures invalidated");
        }
        let size_of_image = section_table
            .iter()
            .map(|section| {
                aligned_to(section.virtual_address.saturating_add(section.virtual_size), section_alignment)
            })
            .max()
            .unwrap_or(0);
        windows_header.set_layout(size_of_image, header_data_directory.len() as u32);

        // rewrite the optional header over its original bytes to keep fields and padding this crate doesn't model
        let mut optional_header =
            self.image[standard_header_offset as usize..section_table_offset as usize].to_vec();
        optional_header.resize(optional_header_size as usize, 0);
        let windows_header_start = (self.windows_header_offset - standard_header_offset) as usize;
        let windows_header_bytes = windows_header.as_bytes();
        optional_header[windows_header_start..windows_header_start + windows_header_bytes.len()]
            .copy_from_slice(windows_header_bytes);
        let data_directories_start = (self.data_directories_offset - standard_header_offset) as usize;
        for (index, data) in header_data_directory.values().enumerate() {
            let start = data_directories_start + index * DATA_DIRECTORY_SIZE as usize;
            optional_header[start..start + DATA_DIRECTORY_SIZE as usize].copy_from_slice(data.as_bytes());
        }

        let mut new_image = Vec::with_capacity(self.image.len() + tail.len());
        new_image.extend_from_slice(&self.image[..self.coff_header_offset as usize]);
        new_image.extend_from_slice(coff_header.as_bytes());
        new_image.extend_from_slice(&optional_header);
        for section_header in &section_table {
            new_image.extend_from_slice(section_header.as_bytes());
        }
        let header_end = (self.section_table_end + required_header_space as u64) as usize;
        new_image.extend_from_slice(&self.image[header_end..first_section_start as usize]);
        new_image.extend_from_slice(&self.image[first_section_start as usize..section_data_start as usize]);
        new_image.extend_from_slice(&tail);
        new_image.extend_from_slice(&self.image[section_data_end as usize..]);

        info!(
            "set resource directory at {:#x?} ({:#x?} bytes), image size {:#x?}",
            virtual_address,
            new_size,
            new_image.len()
        );

        self.coff_header = coff_header;
        self.windows_header = windows_header;
        self.header_data_directory = header_data_directory;
        self.section_table = section_table;
        self.section_table_end += required_header_space as u64;
        self.image = new_image.into();

        resource_directory.virtual_address = virtual_address;
        Ok(self.resource_directory.replace(resource_directory))
    }

    /// Returns the current resource directory or `None` if the image does not contain a resource directory.
    pub fn resource_directory(&self) -> Option<&ResourceDirectory> { self.resource_directory.as_ref() }

    /// Returns the raw image data with all changes applied.
    pub fn data(&self) -> &[u8] { &self.image }

    /// Returns the parsed coff header.
    pub fn coff_header(&self) -> &CoffHeader { &self.coff_header }

    /// Returns the parsed windows header.
    pub fn windows_header(&self) -> &GenericWindowsHeader { &self.windows_header }

    /// Returns the data directory for the requested header.
    pub fn data_directory(&self, directory: DataDirectoryType) -> Option<&ImageDataDirectory> {
        self.header_data_directory.get(&directory)
    }

    /// Returns all section headers of the image.
    pub fn section_table(&self) -> &[SectionHeader] { &self.section_table }

    /// Returns the section header containing the data directory.
    pub fn section_header_for_data_directory(
        &self, directory: DataDirectoryType,
    ) -> Option<&SectionHeader> {
        let data_directory = self.data_directory(directory)?;
        self.section_table
            .iter()
            .find(|section| section.contains_virtual_address(data_directory.virtual_address))
    }

    fn staged_directory(&self, discard_existing: bool) -> ResourceDirectory {
        match &self.resource_directory {
            Some(directory) if !discard_existing => directory.clone(),
            _ => ResourceDirectory::default(),
        }
    }
}

impl ResourceProvider for Image<'_> {
    fn enum_types(
        &self, callback: &mut dyn FnMut(&ResourceId) -> ControlFlow<()>,
    ) -> Result<(), ProviderError> {
        match &self.resource_directory {
            Some(directory) => directory.enum_types(callback),
            None => Ok(()),
        }
    }

    fn enum_names(
        &self, type_: &ResourceId, callback: &mut dyn FnMut(&ResourceId) -> ControlFlow<()>,
    ) -> Result<(), ProviderError> {
        match &self.resource_directory {
            Some(directory) => directory.enum_names(type_, callback),
            None => Err(ReadError("image has no resource directory".into()).into()),
        }
    }

    fn enum_languages(
        &self, type_: &ResourceId, name: &ResourceId,
        callback: &mut dyn FnMut(LANGID) -> ControlFlow<()>,
    ) -> Result<(), ProviderError> {
        match &self.resource_directory {
            Some(directory) => directory.enum_languages(type_, name, callback),
            None => Err(ReadError("image has no resource directory".into()).into()),
        }
    }

    fn load(&self, id: &ResourceIdPair) -> Result<Option<Cow<'_, [u8]>>, ProviderError> {
        match &self.resource_directory {
            Some(directory) => directory.load(id),
            None => Ok(None),
        }
    }

    fn codepage(&self, id: &ResourceIdPair) -> u32 {
        self.resource_directory.as_ref().map(|directory| directory.codepage(id)).unwrap_or_default()
    }
}

impl<'a> UpdateTarget for Image<'a> {
    fn begin_update(
        &mut self, discard_existing: bool,
    ) -> Result<Box<dyn UpdateSession + '_>, ProviderError> {
        let staged = self.staged_directory(discard_existing);
        Ok(Box::new(ImageUpdate {
            image: self,
            staged,
        }))
    }
}

/// Update session staging changes on a copy of the resource directory of an image.
/// Committing rebuilds the resource section of the image.
#[derive(Debug)]
pub struct ImageUpdate<'i, 'a> {
    image:  &'i mut Image<'a>,
    staged: ResourceDirectory,
}
impl UpdateSession for ImageUpdate<'_, '_> {
    fn update(&mut self, id: &ResourceIdPair, data: Option<&ResourceData>) -> Result<(), ProviderError> {
        stage_update(&mut self.staged, id, data)
    }

    fn end(self: Box<Self>, commit: bool) -> Result<(), ProviderError> {
        let update = *self;
        if commit {
            update.image.set_resource_directory(update.staged)?;
        }
        Ok(())
    }
}

/// Portable executable image file as an update target.
///
/// A session reads the file when it begins. Committing writes the updated image to a temporary file
/// next to the target and renames it over the target, so the file is never observed partially written.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ImageFile {
    path: PathBuf,
}
impl ImageFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self { Self { path: path.into() } }

    pub fn path(&self) -> &Path { &self.path }

    fn temporary_path(&self) -> PathBuf {
        let name = self.path.file_name().map(|name| name.to_string_lossy()).unwrap_or_default();
        self.path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
    }
}
impl UpdateTarget for ImageFile {
    fn begin_update(
        &mut self, discard_existing: bool,
    ) -> Result<Box<dyn UpdateSession + '_>, ProviderError> {
        let image = Image::parse_file(&self.path)?;
        let staged = image.staged_directory(discard_existing);
        Ok(Box::new(ImageFileUpdate {
            file: self,
            image,
            staged,
        }))
    }
}

/// Update session of an [`ImageFile`].
#[derive(Debug)]
pub struct ImageFileUpdate<'f> {
    file:   &'f ImageFile,
    image:  Image<'static>,
    staged: ResourceDirectory,
}
impl UpdateSession for ImageFileUpdate<'_> {
    fn update(&mut self, id: &ResourceIdPair, data: Option<&ResourceData>) -> Result<(), ProviderError> {
        stage_update(&mut self.staged, id, data)
    }

    fn end(self: Box<Self>, commit: bool) -> Result<(), ProviderError> {
        let ImageFileUpdate {
            file,
            mut image,
            staged,
        } = *self;
        if !commit {
            return Ok(());
        }
        image.set_resource_directory(staged)?;

        let temporary = file.temporary_path();
        let written = File::create(&temporary)
            .map_err(ImageWriteError::from)
            .and_then(|mut output| {
                image.write_writer(&mut output)?;
                output.sync_all()?;
                Ok(())
            })
            .and_then(|_| std::fs::rename(&temporary, &file.path).map_err(ImageWriteError::from));
        if let Err(error) = written {
            if let Err(remove_error) = std::fs::remove_file(&temporary) {
                debug!("failed to remove {}: {}", temporary.display(), remove_error);
            }
            return Err(error.into());
        }
        debug!("replaced {}", file.path.display());
        Ok(())
    }
}
