//! Icon groups (`RT_GROUP_ICON`).
//!
//! A group is a `GRPICONDIR` header followed by one entry per image.
//! Each entry references an `RT_ICON` resource by its numeric name.

use crate::{errors::*, registry::*, types::*, util::*};

const ICON_TYPE: u16 = 1;

/// Directory of the images making up an icon.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct IconGroup {
    pub entries: Vec<IconDirectoryEntry>,
}
impl IconGroup {
    /// Returns the names of the `RT_ICON` resources referenced by the group.
    pub fn icon_ids(&self) -> impl Iterator<Item = u16> + '_ { self.entries.iter().map(|entry| entry.id) }
}

impl ResourceFormat for IconGroup {
    fn decode(data: &[u8]) -> Result<Self, ResourceError> {
        let mut reader = ByteReader::new(data);
        let header = reader.read::<IconDirectory>()?;
        if header.type_ != ICON_TYPE {
            return Err(ResourceError::malformed(format!(
                "icon group has type {}, expected {}",
                { header.type_ },
                ICON_TYPE
            )));
        }
        let entries = (0..header.count)
            .map(|_| reader.read::<IconDirectoryEntry>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    fn encode(&self) -> Result<Vec<u8>, ResourceError> {
        let count = u16::try_from(self.entries.len()).map_err(|_| {
            ResourceError::invariant(format!("icon group has {} entries", self.entries.len()))
        })?;
        let mut writer = ByteWriter::new();
        writer.write(&IconDirectory {
            reserved: 0,
            type_: ICON_TYPE,
            count,
        });
        self.entries.iter().for_each(|entry| writer.write(entry));
        Ok(writer.into_inner())
    }
}
