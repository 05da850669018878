//! Menu templates (`RT_MENU`).
//!
//! Standard templates start with a `MENUHEADER` of version 0 and store items as
//! 16-bit option flags, a 16-bit identifier for command items and a null-terminated title.
//! Extended templates start with a `MENUEX_TEMPLATE_HEADER` of version 1 and store
//! items on 32-bit boundaries with 32-bit type, state and identifier.
//! In both layouts the last item of a level is flagged, and popup items are followed by their submenu.

use crate::{constants::*, errors::*, registry::*, types::*, util::*};

/// Maximum nesting of popup menus accepted when decoding.
const MAX_DEPTH: usize = 32;

/// Item of a menu.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct MenuItem {
    /// Option flags like [`MF_GRAYED`] in standard templates, `MFT_*` type flags in extended templates.
    /// The popup and end flags are derived from the item's position and submenu.
    pub flags:    u32,
    /// `MFS_*` state flags. Only stored in extended templates.
    pub state:    u32,
    /// Command identifier. Not stored for popup items in standard templates.
    pub id:       u32,
    /// Help identifier of a popup. Only stored in extended templates.
    pub help_id:  u32,
    pub text:     String,
    /// Items of the submenu if the item opens a popup.
    pub submenu:  Option<Vec<MenuItem>>,
}
impl MenuItem {
    /// Create a command item.
    pub fn command<S: Into<String>>(id: u32, text: S) -> Self {
        Self {
            id,
            text: text.into(),
            ..Default::default()
        }
    }

    /// Create a popup item opening the given submenu.
    pub fn popup<S: Into<String>>(text: S, submenu: Vec<MenuItem>) -> Self {
        Self {
            text: text.into(),
            submenu: Some(submenu),
            ..Default::default()
        }
    }

    /// Create a separator.
    pub fn separator() -> Self { Self::default() }
}

/// Menu template.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Menu {
    /// Whether the template uses the extended layout.
    pub extended: bool,
    /// Help identifier of the menu. Only stored in extended templates.
    pub help_id:  u32,
    pub items:    Vec<MenuItem>,
}
impl Menu {
    /// Returns the first command item with the given identifier, searching submenus depth-first.
    pub fn find(&self, id: u32) -> Option<&MenuItem> { find_item(&self.items, id) }
}

fn find_item(items: &[MenuItem], id: u32) -> Option<&MenuItem> {
    items.iter().find_map(|item| match &item.submenu {
        Some(submenu) => find_item(submenu, id),
        None if item.id == id => Some(item),
        None => None,
    })
}

fn decode_items(reader: &mut ByteReader, depth: usize) -> Result<Vec<MenuItem>, ReadError> {
    if depth > MAX_DEPTH {
        return Err(ReadError(format!("menu nested deeper than {} levels", MAX_DEPTH)));
    }
    let mut items = Vec::new();
    loop {
        let flags = reader.u16()?;
        let mut item = MenuItem {
            flags: (flags & !(MF_POPUP | MF_END)) as u32,
            ..Default::default()
        };
        if flags & MF_POPUP != 0 {
            item.text = reader.u16_string()?;
            item.submenu = Some(decode_items(reader, depth + 1)?);
        } else {
            item.id = reader.u16()? as u32;
            item.text = reader.u16_string()?;
        }
        items.push(item);
        if flags & MF_END != 0 {
            return Ok(items);
        }
    }
}

fn decode_items_ex(reader: &mut ByteReader, depth: usize) -> Result<Vec<MenuItem>, ReadError> {
    if depth > MAX_DEPTH {
        return Err(ReadError(format!("menu nested deeper than {} levels", MAX_DEPTH)));
    }
    let mut items = Vec::new();
    loop {
        reader.align(4);
        let header = reader.read::<MenuExItemHeader>()?;
        let mut item = MenuItem {
            flags: header.type_,
            state: header.state,
            id: header.id,
            text: reader.u16_string()?,
            ..Default::default()
        };
        if header.res_info & MFR_POPUP != 0 {
            reader.align(4);
            item.help_id = reader.u32()?;
            item.submenu = Some(decode_items_ex(reader, depth + 1)?);
        }
        items.push(item);
        if header.res_info & MFR_END != 0 {
            return Ok(items);
        }
    }
}

fn encode_items(writer: &mut ByteWriter, items: &[MenuItem]) -> Result<(), ResourceError> {
    for (index, item) in items.iter().enumerate() {
        let mut flags = u16::try_from(item.flags)
            .ok()
            .filter(|flags| flags & (MF_POPUP | MF_END) == 0)
            .ok_or_else(|| {
                ResourceError::invariant(format!(
                    "menu item flags {:#x} can't be stored in a standard menu",
                    item.flags
                ))
            })?;
        if item.state != 0 || item.help_id != 0 {
            return Err(ResourceError::invariant(
                "standard menus can't store item state or help ids",
            ));
        }
        if index + 1 == items.len() {
            flags |= MF_END;
        }
        match &item.submenu {
            Some(submenu) => {
                if submenu.is_empty() {
                    return Err(ResourceError::invariant(format!(
                        "popup {:?} has an empty submenu",
                        item.text
                    )));
                }
                if item.id != 0 {
                    return Err(ResourceError::invariant(format!(
                        "popup {:?} can't store id {} in a standard menu",
                        item.text, item.id
                    )));
                }
                writer.u16(flags | MF_POPUP);
                writer.u16_string(&item.text);
                encode_items(writer, submenu)?;
            }
            None => {
                let id = u16::try_from(item.id).map_err(|_| {
                    ResourceError::invariant(format!(
                        "menu item id {} exceeds 16 bits in a standard menu",
                        item.id
                    ))
                })?;
                writer.u16(flags);
                writer.u16(id);
                writer.u16_string(&item.text);
            }
        }
    }
    Ok(())
}

fn encode_items_ex(writer: &mut ByteWriter, items: &[MenuItem]) -> Result<(), ResourceError> {
    for (index, item) in items.iter().enumerate() {
        let mut res_info = 0;
        if item.submenu.is_some() {
            res_info |= MFR_POPUP;
        }
        if index + 1 == items.len() {
            res_info |= MFR_END;
        }
        writer.align(4);
        writer.write(&MenuExItemHeader {
            type_: item.flags,
            state: item.state,
            id: item.id,
            res_info,
        });
        writer.u16_string(&item.text);
        if let Some(submenu) = &item.submenu {
            if submenu.is_empty() {
                return Err(ResourceError::invariant(format!(
                    "popup {:?} has an empty submenu",
                    item.text
                )));
            }
            writer.align(4);
            writer.u32(item.help_id);
            encode_items_ex(writer, submenu)?;
        } else if item.help_id != 0 {
            return Err(ResourceError::invariant(format!(
                "menu item {:?} has a help id but no submenu",
                item.text
            )));
        }
    }
    Ok(())
}

impl ResourceFormat for Menu {
    fn decode(data: &[u8]) -> Result<Self, ResourceError> {
        let mut reader = ByteReader::new(data);
        let header = reader.read::<MenuHeader>()?;
        let mut menu = Menu::default();
        match header.version {
            0 => {
                reader.seek(size_of_header() + header.header_size as usize)?;
                if !reader.is_empty() {
                    menu.items = decode_items(&mut reader, 0)?;
                }
            }
            MENU_EX_VERSION => {
                menu.extended = true;
                let items_offset = size_of_header() + header.header_size as usize;
                if header.header_size >= 4 {
                    menu.help_id = reader.u32()?;
                }
                reader.seek(items_offset)?;
                if !reader.is_empty() {
                    menu.items = decode_items_ex(&mut reader, 0)?;
                }
            }
            version => {
                return Err(ResourceError::malformed(format!(
                    "unknown menu template version {}",
                    version
                )));
            }
        }
        Ok(menu)
    }

    fn encode(&self) -> Result<Vec<u8>, ResourceError> {
        let mut writer = ByteWriter::new();
        if self.extended {
            writer.write(&MenuHeader {
                version:     MENU_EX_VERSION,
                header_size: 4,
            });
            writer.u32(self.help_id);
            encode_items_ex(&mut writer, &self.items)?;
        } else {
            if self.help_id != 0 {
                return Err(ResourceError::invariant("standard menus can't store a help id"));
            }
            writer.write(&MenuHeader::default());
            encode_items(&mut writer, &self.items)?;
        }
        Ok(writer.into_inner())
    }
}

const fn size_of_header() -> usize { std::mem::size_of::<MenuHeader>() }
