//! Dialog box templates (`RT_DIALOG`).
//!
//! Both the classic `DLGTEMPLATE` and the extended `DLGTEMPLATEEX` layouts are supported.
//! See <https://learn.microsoft.com/en-us/windows/win32/dlgbox/about-dialog-boxes#templates-in-memory>.
//!
//! The header is followed by the menu, window class and title, each on a 16-bit boundary,
//! the font block if the style contains `DS_SETFONT`, and the item templates.
//! Every item template starts on a 32-bit boundary.

use crate::{constants::*, errors::*, id::*, registry::*, types::*, util::*};

/// Font of a dialog, present if the dialog style contains `DS_SETFONT`.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct DialogFont {
    pub point_size: u16,
    /// Only stored in extended templates.
    pub weight:     u16,
    /// Only stored in extended templates.
    pub italic:     bool,
    /// Only stored in extended templates.
    pub charset:    u8,
    pub typeface:   String,
}

/// Control of a dialog.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DialogItem {
    /// Only stored in extended templates.
    pub help_id:        u32,
    pub style:          u32,
    pub extended_style: u32,
    pub x:              i16,
    pub y:              i16,
    pub cx:             i16,
    pub cy:             i16,
    /// Control identifier, limited to 16 bits in classic templates.
    pub id:             u32,
    /// Window class, either a predefined class atom like [`CONTROL_BUTTON`] or a registered class name.
    pub class:          ResourceId,
    /// Window text, either a resource ordinal or inline text.
    pub title:          ResourceId,
    /// Opaque data passed to the control on creation.
    pub creation_data:  Vec<u8>,
}
impl Default for DialogItem {
    fn default() -> Self {
        Self {
            help_id:        0,
            style:          WS_CHILD | WS_VISIBLE,
            extended_style: 0,
            x:              0,
            y:              0,
            cx:             0,
            cy:             0,
            id:             0,
            class:          ResourceId::Numeric(CONTROL_STATIC),
            title:          ResourceId::Named(String::new()),
            creation_data:  Vec::new(),
        }
    }
}

/// Dialog box template.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct DialogTemplate {
    /// Whether the template uses the extended layout.
    pub extended:       bool,
    /// Only stored in extended templates.
    pub help_id:        u32,
    pub style:          u32,
    pub extended_style: u32,
    pub x:              i16,
    pub y:              i16,
    pub cx:             i16,
    pub cy:             i16,
    pub menu:           Option<ResourceId>,
    pub class:          Option<ResourceId>,
    pub title:          String,
    /// Font of the dialog. Has to be set if and only if the style contains `DS_SETFONT`.
    pub font:           Option<DialogFont>,
    pub items:          Vec<DialogItem>,
}
impl DialogTemplate {
    /// Returns the control with the given identifier.
    pub fn item(&self, id: u32) -> Option<&DialogItem> { self.items.iter().find(|item| item.id == id) }

    /// Returns the mutable control with the given identifier.
    pub fn item_mut(&mut self, id: u32) -> Option<&mut DialogItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    fn decode_items(&mut self, reader: &mut ByteReader, count: u16) -> Result<(), ReadError> {
        for index in 0..count {
            reader.align(4);
            if reader.is_empty() {
                return Err(ReadError(format!(
                    "dialog declares {} items but data ends after {}",
                    count, index
                )));
            }
            let mut item = if self.extended {
                let header = reader.read::<DialogItemExHeader>()?;
                DialogItem {
                    help_id: header.help_id,
                    style: header.style,
                    extended_style: header.extended_style,
                    x: header.x,
                    y: header.y,
                    cx: header.cx,
                    cy: header.cy,
                    id: header.id,
                    ..Default::default()
                }
            } else {
                let header = reader.read::<DialogItemHeader>()?;
                DialogItem {
                    style: header.style,
                    extended_style: header.extended_style,
                    x: header.x,
                    y: header.y,
                    cx: header.cx,
                    cy: header.cy,
                    id: header.id as u32,
                    ..Default::default()
                }
            };
            item.class = read_name_or_ordinal(reader)?;
            item.title = read_name_or_ordinal(reader)?;
            let size = reader.u16()? as usize;
            item.creation_data = reader.bytes(size)?.to_vec();
            self.items.push(item);
        }
        Ok(())
    }
}

/// Read a `sz_Or_Ord` field: `0xFFFF` followed by an ordinal, or a null-terminated string.
fn read_name_or_ordinal(reader: &mut ByteReader) -> Result<ResourceId, ReadError> {
    reader.align(2);
    if reader.peek_u16()? == 0xFFFF {
        reader.u16()?;
        return Ok(ResourceId::Numeric(reader.u16()?));
    }
    Ok(ResourceId::Named(reader.u16_string()?))
}

/// Read an optional `sz_Or_Ord` field, where `0x0000` means absent.
fn read_optional_name_or_ordinal(reader: &mut ByteReader) -> Result<Option<ResourceId>, ReadError> {
    match read_name_or_ordinal(reader)? {
        ResourceId::Named(name) if name.is_empty() => Ok(None),
        id => Ok(Some(id)),
    }
}

fn write_name_or_ordinal(writer: &mut ByteWriter, id: &ResourceId) -> Result<(), ResourceError> {
    writer.align(2);
    match id {
        ResourceId::Numeric(ordinal) => {
            writer.u16(0xFFFF);
            writer.u16(*ordinal);
        }
        ResourceId::Named(name) => write_text(writer, name)?,
    }
    Ok(())
}

fn write_optional_name_or_ordinal(
    writer: &mut ByteWriter, id: &Option<ResourceId>,
) -> Result<(), ResourceError> {
    match id {
        Some(ResourceId::Named(name)) if name.is_empty() => Err(ResourceError::invariant(
            "empty dialog menu or class name, use None instead",
        )),
        Some(id) => write_name_or_ordinal(writer, id),
        None => {
            writer.align(2);
            writer.u16(0);
            Ok(())
        }
    }
}

fn write_text(writer: &mut ByteWriter, text: &str) -> Result<(), ResourceError> {
    if text.contains('\0') {
        return Err(ResourceError::invariant(format!(
            "dialog string {:?} contains a null character",
            text
        )));
    }
    writer.align(2);
    writer.u16_string(text);
    Ok(())
}

impl ResourceFormat for DialogTemplate {
    fn decode(data: &[u8]) -> Result<Self, ResourceError> {
        let mut reader = ByteReader::new(data);
        let signature = read::<[u16; 2]>(data).map_err(|_| {
            ReadError(format!("dialog header truncated ({} bytes)", data.len()))
        })?;
        let extended = signature == [DIALOG_EX_VERSION, DIALOG_EX_SIGNATURE];

        let (mut dialog, count) = if extended {
            let header = reader.read::<DialogExHeader>()?;
            let dialog = DialogTemplate {
                extended: true,
                help_id: header.help_id,
                style: header.style,
                extended_style: header.extended_style,
                x: header.x,
                y: header.y,
                cx: header.cx,
                cy: header.cy,
                ..Default::default()
            };
            (dialog, header.item_count)
        } else {
            let header = reader.read::<DialogHeader>()?;
            let dialog = DialogTemplate {
                style: header.style,
                extended_style: header.extended_style,
                x: header.x,
                y: header.y,
                cx: header.cx,
                cy: header.cy,
                ..Default::default()
            };
            (dialog, header.item_count)
        };

        dialog.menu = read_optional_name_or_ordinal(&mut reader)?;
        dialog.class = read_optional_name_or_ordinal(&mut reader)?;
        reader.align(2);
        dialog.title = reader.u16_string()?;

        if dialog.style & DS_SETFONT != 0 {
            let mut font = DialogFont {
                point_size: reader.u16()?,
                ..Default::default()
            };
            if extended {
                font.weight = reader.u16()?;
                font.italic = reader.u8()? != 0;
                font.charset = reader.u8()?;
            }
            reader.align(2);
            font.typeface = reader.u16_string()?;
            dialog.font = Some(font);
        }

        dialog.decode_items(&mut reader, count)?;
        Ok(dialog)
    }

    fn encode(&self) -> Result<Vec<u8>, ResourceError> {
        let item_count = u16::try_from(self.items.len()).map_err(|_| {
            ResourceError::invariant(format!("dialog has {} items", self.items.len()))
        })?;
        if (self.style & DS_SETFONT != 0) != self.font.is_some() {
            return Err(ResourceError::invariant(
                "dialog font has to be set if and only if the style contains DS_SETFONT",
            ));
        }

        let mut writer = ByteWriter::new();
        if self.extended {
            writer.write(&DialogExHeader {
                version: DIALOG_EX_VERSION,
                signature: DIALOG_EX_SIGNATURE,
                help_id: self.help_id,
                extended_style: self.extended_style,
                style: self.style,
                item_count,
                x: self.x,
                y: self.y,
                cx: self.cx,
                cy: self.cy,
            });
        } else {
            if self.help_id != 0 {
                return Err(ResourceError::invariant("classic dialogs can't store a help id"));
            }
            writer.write(&DialogHeader {
                style: self.style,
                extended_style: self.extended_style,
                item_count,
                x: self.x,
                y: self.y,
                cx: self.cx,
                cy: self.cy,
            });
        }

        write_optional_name_or_ordinal(&mut writer, &self.menu)?;
        write_optional_name_or_ordinal(&mut writer, &self.class)?;
        write_text(&mut writer, &self.title)?;

        if let Some(font) = &self.font {
            writer.u16(font.point_size);
            if self.extended {
                writer.u16(font.weight);
                writer.u8(font.italic as u8);
                writer.u8(font.charset);
            } else if font.weight != 0 || font.italic || font.charset != 0 {
                return Err(ResourceError::invariant(
                    "classic dialogs can only store the font size and typeface",
                ));
            }
            write_text(&mut writer, &font.typeface)?;
        }

        for item in &self.items {
            writer.align(4);
            if self.extended {
                writer.write(&DialogItemExHeader {
                    help_id:        item.help_id,
                    extended_style: item.extended_style,
                    style:          item.style,
                    x:              item.x,
                    y:              item.y,
                    cx:             item.cx,
                    cy:             item.cy,
                    id:             item.id,
                });
            } else {
                let id = u16::try_from(item.id).map_err(|_| {
                    ResourceError::invariant(format!(
                        "control id {} exceeds 16 bits in a classic dialog",
                        item.id
                    ))
                })?;
                if item.help_id != 0 {
                    return Err(ResourceError::invariant(
                        "classic dialog controls can't store a help id",
                    ));
                }
                writer.write(&DialogItemHeader {
                    style: item.style,
                    extended_style: item.extended_style,
                    x: item.x,
                    y: item.y,
                    cx: item.cx,
                    cy: item.cy,
                    id,
                });
            }
            write_name_or_ordinal(&mut writer, &item.class)?;
            write_name_or_ordinal(&mut writer, &item.title)?;
            let size = u16::try_from(item.creation_data.len()).map_err(|_| {
                ResourceError::invariant(format!(
                    "control creation data of {} bytes exceeds 16 bits",
                    item.creation_data.len()
                ))
            })?;
            writer.u16(size);
            writer.bytes(&item.creation_data);
        }

        Ok(writer.into_inner())
    }
}
