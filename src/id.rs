//! Resource identifiers.
//!
//! Every resource is addressed by its type, its name and its language.
//! Types and names are either 16-bit ordinals or strings, see <https://learn.microsoft.com/en-us/windows/win32/menurc/resource-types>.

use std::{cmp::Ordering, fmt};

use crate::{constants::*, errors::*};

/// Maximum length of a resource name in UTF-16 units, limited by the 16-bit length prefix in the resource directory.
pub const MAX_NAME_LENGTH: usize = u16::MAX as usize;

/// Dual-mode resource identifier, used for resource types and names.
///
/// Numeric identifiers order before named identifiers.
/// Named identifiers compare by exact string value.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ResourceId {
    Numeric(u16),
    Named(String),
}
impl ResourceId {
    /// Parse an identifier using the native `#123` convention for ordinals.
    /// Any other string becomes a named identifier.
    pub fn parse<S: AsRef<str>>(string: S) -> Self {
        let string = string.as_ref();
        match string.strip_prefix('#').map(str::parse::<u16>) {
            Some(Ok(id)) => Self::Numeric(id),
            _ => Self::Named(string.to_string()),
        }
    }

    /// Returns the ordinal of a numeric identifier.
    pub fn as_numeric(&self) -> Option<u16> {
        match self {
            Self::Numeric(id) => Some(*id),
            Self::Named(_) => None,
        }
    }

    /// Returns the string of a named identifier.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Numeric(_) => None,
            Self::Named(name) => Some(name),
        }
    }

    pub fn is_numeric(&self) -> bool { matches!(self, Self::Numeric(_)) }

    pub fn is_named(&self) -> bool { matches!(self, Self::Named(_)) }

    /// Returns the symbolic name of a predefined resource type, e.g. `MANIFEST` for type 24.
    pub fn known_type_name(&self) -> Option<&'static str> {
        let id = self.as_numeric()?;
        RT_NAMES.iter().find(|(rt, _)| *rt == id).map(|(_, name)| *name)
    }

    /// Display form of the identifier when used as a resource type.
    /// Predefined types render symbolically, everything else as the identifier itself.
    pub fn type_name(&self) -> String {
        match self.known_type_name() {
            Some(name) => name.to_string(),
            None => self.to_string(),
        }
    }

    /// Check that the identifier can be stored in a resource directory.
    ///
    /// # Returns
    /// Returns [`ResourceError::EncodingInvariantViolation`] if a name is longer than [`MAX_NAME_LENGTH`] UTF-16 units.
    pub fn check_encodable(&self) -> Result<(), ResourceError> {
        let Self::Named(name) = self else {
            return Ok(());
        };
        let length = name.encode_utf16().count();
        if length > MAX_NAME_LENGTH {
            return Err(ResourceError::invariant(format!(
                "resource name of {} characters exceeds {}",
                length, MAX_NAME_LENGTH
            )));
        }
        Ok(())
    }

    /// Returns the identifier with its name upper-cased, the way the Windows loader compares names.
    pub fn to_uppercase(&self) -> Self {
        match self {
            Self::Numeric(id) => Self::Numeric(*id),
            Self::Named(name) => Self::Named(name.to_uppercase()),
        }
    }
}
impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{}", id),
            Self::Named(name) => f.write_str(name),
        }
    }
}
impl From<u16> for ResourceId {
    fn from(id: u16) -> Self { Self::Numeric(id) }
}
impl From<&str> for ResourceId {
    fn from(name: &str) -> Self { Self::Named(name.to_string()) }
}
impl From<String> for ResourceId {
    fn from(name: String) -> Self { Self::Named(name) }
}
impl From<&ResourceId> for ResourceId {
    fn from(id: &ResourceId) -> Self { id.clone() }
}

/// Unique key of a resource: its type, name and language.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ResourceIdPair {
    pub type_:    ResourceId,
    pub name:     ResourceId,
    pub language: LANGID,
}
impl ResourceIdPair {
    pub fn new<T: Into<ResourceId>, N: Into<ResourceId>>(type_: T, name: N, language: LANGID) -> Self {
        Self {
            type_: type_.into(),
            name: name.into(),
            language,
        }
    }

    pub fn type_(&self) -> &ResourceId { &self.type_ }

    pub fn name(&self) -> &ResourceId { &self.name }

    pub fn language(&self) -> LANGID { self.language }

    /// Check that the type and name can be stored in a resource directory.
    pub fn check_encodable(&self) -> Result<(), ResourceError> {
        self.type_.check_encodable()?;
        self.name.check_encodable()
    }
}
impl Ord for ResourceIdPair {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_
            .cmp(&other.type_)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.language.cmp(&other.language))
    }
}
impl PartialOrd for ResourceIdPair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}
impl fmt::Display for ResourceIdPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {} : 0x{:04X}", self.type_.type_name(), self.name, self.language)
    }
}
impl<T: Into<ResourceId>, N: Into<ResourceId>> From<(T, N, LANGID)> for ResourceIdPair {
    fn from((type_, name, language): (T, N, LANGID)) -> Self { Self::new(type_, name, language) }
}
