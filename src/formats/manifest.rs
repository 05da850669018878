//! Application manifests (`RT_MANIFEST`).

use crate::{errors::*, registry::*};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Side-by-side assembly manifest, stored as UTF-8 XML.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Manifest {
    /// Manifest XML text.
    pub text: String,
    /// Whether the text is prefixed with a UTF-8 byte order mark.
    pub bom:  bool,
}
impl Manifest {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            bom:  false,
        }
    }
}

impl ResourceFormat for Manifest {
    fn decode(data: &[u8]) -> Result<Self, ResourceError> {
        let (bom, text) = match data.strip_prefix(UTF8_BOM) {
            Some(text) => (true, text),
            None => (false, data),
        };
        let text = std::str::from_utf8(text)
            .map_err(|e| ResourceError::malformed(format!("manifest is not valid UTF-8: {}", e)))?;
        Ok(Self {
            text: text.to_string(),
            bom,
        })
    }

    fn encode(&self) -> Result<Vec<u8>, ResourceError> {
        let mut data = Vec::with_capacity(self.text.len() + UTF8_BOM.len());
        if self.bom {
            data.extend_from_slice(UTF8_BOM);
        }
        data.extend_from_slice(self.text.as_bytes());
        Ok(data)
    }
}
