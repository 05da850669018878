//! Boundary to the native resource provider.
//!
//! A provider enumerates the resource directory of a module level by level through callbacks and returns raw resource bytes.
//! An update target accepts atomic update sessions writing resources back into an image.

use std::{borrow::Cow, cell::RefCell, ops::ControlFlow};

use log::warn;

use crate::{constants::*, directory::ResourceData, errors::*, id::*};

/// Source of resources, walked as types, then names within a type, then languages within a name.
///
/// Enumeration is callback driven: the provider invokes the callback synchronously for every entry until the callback returns [`ControlFlow::Break`].
/// A provider returns `Ok` if the enumeration ran to completion or was stopped by the callback.
pub trait ResourceProvider {
    /// Enumerate the resource types.
    fn enum_types(
        &self, callback: &mut dyn FnMut(&ResourceId) -> ControlFlow<()>,
    ) -> Result<(), ProviderError>;

    /// Enumerate the resource names of a type.
    fn enum_names(
        &self, type_: &ResourceId, callback: &mut dyn FnMut(&ResourceId) -> ControlFlow<()>,
    ) -> Result<(), ProviderError>;

    /// Enumerate the languages of a resource.
    fn enum_languages(
        &self, type_: &ResourceId, name: &ResourceId,
        callback: &mut dyn FnMut(LANGID) -> ControlFlow<()>,
    ) -> Result<(), ProviderError>;

    /// Returns the raw bytes of a resource, or `None` if the resource doesn't exist.
    fn load(&self, id: &ResourceIdPair) -> Result<Option<Cow<'_, [u8]>>, ProviderError>;

    /// Returns the codepage recorded for a resource.
    fn codepage(&self, _id: &ResourceIdPair) -> u32 { 0 }
}

impl<P: ResourceProvider + ?Sized> ResourceProvider for &P {
    fn enum_types(
        &self, callback: &mut dyn FnMut(&ResourceId) -> ControlFlow<()>,
    ) -> Result<(), ProviderError> {
        (**self).enum_types(callback)
    }

    fn enum_names(
        &self, type_: &ResourceId, callback: &mut dyn FnMut(&ResourceId) -> ControlFlow<()>,
    ) -> Result<(), ProviderError> {
        (**self).enum_names(type_, callback)
    }

    fn enum_languages(
        &self, type_: &ResourceId, name: &ResourceId,
        callback: &mut dyn FnMut(LANGID) -> ControlFlow<()>,
    ) -> Result<(), ProviderError> {
        (**self).enum_languages(type_, name, callback)
    }

    fn load(&self, id: &ResourceIdPair) -> Result<Option<Cow<'_, [u8]>>, ProviderError> {
        (**self).load(id)
    }

    fn codepage(&self, id: &ResourceIdPair) -> u32 { (**self).codepage(id) }
}

/// Target of atomic resource updates.
pub trait UpdateTarget {
    /// Begin an update session.
    /// With `discard_existing`, the committed image contains only the resources updated in the session.
    fn begin_update(
        &mut self, discard_existing: bool,
    ) -> Result<Box<dyn UpdateSession + '_>, ProviderError>;
}

/// Atomic update session of an [`UpdateTarget`].
///
/// Updates are staged and not observable in the target before the session is committed.
/// Ending the session without commit leaves the target unmodified.
/// A failing commit leaves the target unmodified.
pub trait UpdateSession {
    /// Stage an update writing the data and codepage of a resource. `None` deletes the resource.
    fn update(&mut self, id: &ResourceIdPair, data: Option<&ResourceData>) -> Result<(), ProviderError>;

    /// End the session, applying all staged updates if `commit` is set.
    fn end(self: Box<Self>, commit: bool) -> Result<(), ProviderError>;
}

/// Carries errors raised inside enumeration callbacks past the provider boundary.
///
/// The provider can't propagate a structured error out of a callback.
/// The first error raised by a callback is captured and the callback signals the provider to stop.
/// Once an error is captured, later callbacks do no work.
/// After control returns from the provider, [`EnumerationBridge::finish`] re-raises the captured error.
#[derive(Debug, Default)]
pub struct EnumerationBridge {
    captured: RefCell<Option<ResourceError>>,
}
impl EnumerationBridge {
    pub fn new() -> Self { Self::default() }

    /// Returns whether an error has been captured.
    pub fn is_captured(&self) -> bool { self.captured.borrow().is_some() }

    /// Run a callback body, capturing its error.
    pub fn guard<F: FnOnce() -> Result<(), ResourceError>>(&self, body: F) -> ControlFlow<()> {
        if self.is_captured() {
            return ControlFlow::Break(());
        }
        match body() {
            Ok(()) => ControlFlow::Continue(()),
            Err(error) => {
                warn!("stopping enumeration: {}", error);
                self.captured.borrow_mut().get_or_insert(error);
                ControlFlow::Break(())
            }
        }
    }

    /// Finish a provider call.
    /// Inside an enclosing callback, the re-raised error is captured again by the enclosing [`EnumerationBridge::guard`].
    ///
    /// # Returns
    /// Returns the captured error if a callback failed, otherwise the provider failure if the provider failed.
    pub fn finish<S: Into<String>>(
        &self, result: Result<(), ProviderError>, context: S,
    ) -> Result<(), ResourceError> {
        if let Some(error) = self.captured.borrow_mut().take() {
            return Err(error);
        }
        result.map_err(|source| ResourceError::provider(context, source))
    }
}
