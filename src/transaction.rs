//! Atomic updates of resources in an [`UpdateTarget`].
//!
//! A transaction runs in two phases. Queuing a resource encodes it and committing checks every
//! queued identity, so every encoding failure surfaces before the target is touched.
//! Committing then opens an update session, stages every queued update and ends the session
//! with commit only if all of them were accepted.

use ahash::RandomState;
use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::{directory::*, errors::*, id::*, provider::*, resource::*, settings::*};

/// Queued resource updates, committed all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct UpdateTransaction {
    updates: IndexMap<ResourceIdPair, Option<ResourceData>, RandomState>,
    options: UpdateOptions,
}
impl UpdateTransaction {
    pub fn new() -> Self { Self::default() }

    pub fn with_options(options: UpdateOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> UpdateOptions { self.options }

    /// Queue writing a resource with its codepage, replacing earlier updates of the same resource.
    ///
    /// # Returns
    /// Returns the encoding error of the resource. The transaction is left unchanged.
    pub fn put(&mut self, resource: &Resource) -> Result<&mut Self, ResourceError> {
        resource.id().check_encodable().map_err(|e| e.in_resource(resource.id()))?;
        let data = resource.encode()?;
        Ok(self.put_data(resource.id().clone(), ResourceData::new(data, resource.codepage())))
    }

    /// Queue writing raw bytes without codepage, replacing earlier updates of the same resource.
    pub fn put_raw(&mut self, id: ResourceIdPair, data: Vec<u8>) -> &mut Self {
        self.put_data(id, ResourceData::new(data, 0))
    }

    /// Queue writing resource data, replacing earlier updates of the same resource.
    pub fn put_data(&mut self, id: ResourceIdPair, data: ResourceData) -> &mut Self {
        self.updates.insert(id, Some(data));
        self
    }

    /// Queue deleting a resource, replacing earlier updates of the same resource.
    pub fn delete(&mut self, id: ResourceIdPair) -> &mut Self {
        self.updates.insert(id, None);
        self
    }

    /// Returns the number of queued updates.
    pub fn len(&self) -> usize { self.updates.len() }

    pub fn is_empty(&self) -> bool { self.updates.is_empty() }

    /// Returns whether an update of the resource is queued.
    pub fn contains(&self, id: &ResourceIdPair) -> bool { self.updates.contains_key(id) }

    /// Apply all queued updates to the target.
    ///
    /// # Returns
    /// Returns [`ResourceError::EncodingInvariantViolation`] if a queued identity can't be stored, before opening a session.
    /// Returns [`ResourceError::ProviderFailure`] if the target rejects the session, an update or the commit.
    /// The target is left unmodified in both cases.
    pub fn commit<T: UpdateTarget + ?Sized>(self, target: &mut T) -> Result<(), ResourceError> {
        for (id, data) in &self.updates {
            if data.is_some() {
                id.check_encodable().map_err(|e| e.in_resource(id))?;
            }
        }

        let mut session = target
            .begin_update(self.options.discard_existing)
            .map_err(|e| ResourceError::provider("beginning resource update", e))?;

        for (id, data) in &self.updates {
            if let Err(error) = session.update(id, data.as_ref()) {
                debug!("discarding resource update after failing to stage {}", id);
                if let Err(end_error) = session.end(false) {
                    warn!("failed to discard resource update: {}", end_error);
                }
                return Err(ResourceError::provider(format!("staging {}", id), error));
            }
        }

        session
            .end(true)
            .map_err(|e| ResourceError::provider("committing resource update", e))?;
        info!("committed {} resource updates", self.updates.len());
        Ok(())
    }
}
