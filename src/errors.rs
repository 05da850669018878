//! Errors specific to decoding, encoding, collecting and committing resources.

use std::io::Error as IOError;

use crate::{ResourceId, ResourceIdPair};

/// Opaque error reported by a resource provider or update session.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error that can occur when reading and parsing bytes.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct ReadError(pub String);

/// Errors that can occur when reading a PE image.
#[derive(Debug, thiserror::Error)]
pub enum ImageReadError {
    #[error("invalid bytes: {0}")]
    InvalidBytes(#[from] ReadError),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("invalid section: {0}")]
    InvalidSection(String),
    #[error("io error: {0}")]
    IOError(#[from] IOError),
}

/// Errors that can occur when writing a PE image.
#[derive(Debug, thiserror::Error)]
pub enum ImageWriteError {
    #[error("not enough space in file header")]
    NotEnoughSpaceInHeader,
    #[error("section points outside image: {0} > {1}")]
    InvalidSectionRange(u64, u64),
    #[error("resource directory too large: {0} bytes")]
    DirectoryTooLarge(usize),
    #[error("io error: {0}")]
    IOError(#[from] IOError),
}

/// Errors that can occur when decoding, encoding or collecting resources.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("a codec is already registered for type {0}")]
    DuplicateType(ResourceId),
    #[error("resource {0} already exists")]
    DuplicateKey(ResourceIdPair),
    #[error("resource {0} not found")]
    NotFound(ResourceIdPair),
    #[error("resource provider is closed")]
    ProviderClosed,
    #[error("malformed resource: {0}")]
    MalformedResource(#[from] ReadError),
    #[error("cannot encode resource: {0}")]
    EncodingInvariantViolation(String),
    #[error("provider failure: {context}")]
    ProviderFailure {
        context: String,
        #[source]
        source:  ProviderError,
    },
    #[error("resource {id}: {source}")]
    InResource {
        id:     ResourceIdPair,
        #[source]
        source: Box<ResourceError>,
    },
}
impl ResourceError {
    pub(crate) fn malformed<S: Into<String>>(reason: S) -> Self {
        ResourceError::MalformedResource(ReadError(reason.into()))
    }

    pub(crate) fn invariant<S: Into<String>>(reason: S) -> Self {
        ResourceError::EncodingInvariantViolation(reason.into())
    }

    pub(crate) fn provider<S: Into<String>, E: Into<ProviderError>>(context: S, source: E) -> Self {
        ResourceError::ProviderFailure {
            context: context.into(),
            source:  source.into(),
        }
    }

    /// Attach the identity of the resource this error originated from.
    /// Errors already carrying an identity are returned unchanged.
    pub fn in_resource(self, id: &ResourceIdPair) -> Self {
        match self {
            ResourceError::InResource { .. } => self,
            source => ResourceError::InResource {
                id:     id.clone(),
                source: Box::new(source),
            },
        }
    }

    /// Returns the error with all resource identity wrappers removed.
    pub fn innermost(&self) -> &ResourceError {
        match self {
            ResourceError::InResource { source, .. } => source.innermost(),
            error => error,
        }
    }

    /// Returns the identity of the resource this error originated from, if known.
    pub fn resource_id(&self) -> Option<&ResourceIdPair> {
        match self {
            ResourceError::InResource { id, .. } => Some(id),
            ResourceError::DuplicateKey(id) | ResourceError::NotFound(id) => Some(id),
            _ => None,
        }
    }
}
