//! Resources: identity plus either opaque bytes or a decoded structured model.

use std::any::Any;

use debug_ignore::DebugIgnore;

use crate::{constants::*, errors::*, id::*, registry::*};

/// Payload of a resource.
#[derive(Debug, Clone)]
pub enum ResourcePayload {
    /// Opaque bytes of a resource without registered codec.
    Generic(DebugIgnore<Vec<u8>>),
    /// Decoded model of a resource with registered codec.
    /// The model is the source of truth, bytes are derived by encoding it.
    Specialized(Box<dyn ResourceModel>),
}

/// A typed, named and language-tagged resource.
#[derive(Debug, Clone)]
pub struct Resource {
    id:           ResourceIdPair,
    payload:      ResourcePayload,
    physical_len: usize,
    codepage:     u32,
}
impl Resource {
    /// Create a generic resource wrapping raw bytes.
    pub fn generic(id: ResourceIdPair, data: Vec<u8>) -> Self {
        Self {
            id,
            physical_len: data.len(),
            payload: ResourcePayload::Generic(data.into()),
            codepage: 0,
        }
    }

    /// Create a specialized resource from a structured model.
    pub fn new<F: ResourceFormat>(id: ResourceIdPair, model: F) -> Self {
        Self::from_model(id, Box::new(model), 0)
    }

    pub(crate) fn from_model(
        id: ResourceIdPair, model: Box<dyn ResourceModel>, physical_len: usize,
    ) -> Self {
        Self {
            id,
            payload: ResourcePayload::Specialized(model),
            physical_len,
            codepage: 0,
        }
    }

    /// Returns the unique identity of the resource.
    pub fn id(&self) -> &ResourceIdPair { &self.id }

    /// Returns the type of the resource.
    pub fn type_(&self) -> &ResourceId { &self.id.type_ }

    /// Returns the name of the resource.
    pub fn name(&self) -> &ResourceId { &self.id.name }

    /// Returns the language of the resource.
    pub fn language(&self) -> LANGID { self.id.language }

    /// Returns the codepage recorded for the resource data.
    pub fn codepage(&self) -> u32 { self.codepage }

    /// Set the codepage recorded for the resource data.
    pub fn set_codepage(&mut self, codepage: u32) { self.codepage = codepage; }

    pub fn payload(&self) -> &ResourcePayload { &self.payload }

    /// Returns whether the resource has been decoded by a codec.
    pub fn is_specialized(&self) -> bool { matches!(self.payload, ResourcePayload::Specialized(_)) }

    /// Returns the number of bytes the resource occupied where it was loaded from.
    /// Resources not loaded from a provider occupy no bytes yet.
    pub fn physical_len(&self) -> usize { self.physical_len }

    /// Returns the raw bytes of a generic resource.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.payload {
            ResourcePayload::Generic(data) => Some(data.as_slice()),
            ResourcePayload::Specialized(_) => None,
        }
    }

    /// Replace the payload with raw bytes, turning the resource into a generic resource.
    pub fn set_data(&mut self, data: Vec<u8>) { self.payload = ResourcePayload::Generic(data.into()); }

    /// Replace the payload with a structured model.
    pub fn set_model<F: ResourceFormat>(&mut self, model: F) {
        self.payload = ResourcePayload::Specialized(Box::new(model));
    }

    /// Returns the structured model if the resource was decoded into `F`.
    pub fn model<F: ResourceFormat>(&self) -> Option<&F> {
        match &self.payload {
            ResourcePayload::Specialized(model) => model.as_any().downcast_ref::<F>(),
            ResourcePayload::Generic(_) => None,
        }
    }

    /// Returns the mutable structured model if the resource was decoded into `F`.
    pub fn model_mut<F: ResourceFormat>(&mut self) -> Option<&mut F> {
        match &mut self.payload {
            ResourcePayload::Specialized(model) => model.as_any_mut().downcast_mut::<F>(),
            ResourcePayload::Generic(_) => None,
        }
    }

    /// Returns the structured model as `Any`, for models registered through custom codecs.
    pub fn model_any(&self) -> Option<&dyn Any> {
        match &self.payload {
            ResourcePayload::Specialized(model) => Some(model.as_any()),
            ResourcePayload::Generic(_) => None,
        }
    }

    /// Encode the resource into raw bytes.
    ///
    /// # Returns
    /// Returns the encoding error of the structured model, annotated with the resource identity.
    pub fn encode(&self) -> Result<Vec<u8>, ResourceError> {
        match &self.payload {
            ResourcePayload::Generic(data) => Ok(data.to_vec()),
            ResourcePayload::Specialized(model) => {
                model.encode_model().map_err(|e| e.in_resource(&self.id))
            }
        }
    }

    /// Returns the number of bytes the resource encodes to.
    pub fn encoded_len(&self) -> Result<usize, ResourceError> {
        match &self.payload {
            ResourcePayload::Generic(data) => Ok(data.len()),
            ResourcePayload::Specialized(_) => self.encode().map(|data| data.len()),
        }
    }

    pub(crate) fn set_id(&mut self, id: ResourceIdPair) { self.id = id; }
}
impl From<&Resource> for ResourceIdPair {
    fn from(resource: &Resource) -> Self { resource.id.clone() }
}
