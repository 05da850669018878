//! Registry of resource codecs, mapping a resource type to the decoder producing its structured model.

use std::{any::Any, fmt, marker::PhantomData, sync::Arc};

use ahash::RandomState;
use indexmap::IndexMap;
use log::trace;

use crate::{constants::*, errors::*, formats::*, id::*, resource::*};

/// Binary format of a structured resource.
///
/// Implement this for a type to make it usable as a specialized resource with [`CodecRegistry::register_format`].
/// `encode` has to be the left inverse of `decode`: decoding the encoded bytes yields an equal value.
pub trait ResourceFormat: fmt::Debug + Clone + Send + Sync + 'static {
    /// Decode the structured model from raw resource bytes.
    ///
    /// # Returns
    /// Returns [`ResourceError::MalformedResource`] if the bytes are inconsistent with the layout.
    fn decode(data: &[u8]) -> Result<Self, ResourceError>;

    /// Encode the structured model into raw resource bytes.
    ///
    /// # Returns
    /// Returns [`ResourceError::EncodingInvariantViolation`] if the model can't be represented.
    fn encode(&self) -> Result<Vec<u8>, ResourceError>;
}

/// Object-safe view of a decoded resource model.
/// Implemented for every [`ResourceFormat`].
pub trait ResourceModel: fmt::Debug + Send + Sync {
    fn encode_model(&self) -> Result<Vec<u8>, ResourceError>;
    fn clone_model(&self) -> Box<dyn ResourceModel>;
    fn model_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
impl<T: ResourceFormat> ResourceModel for T {
    fn encode_model(&self) -> Result<Vec<u8>, ResourceError> { self.encode() }

    fn clone_model(&self) -> Box<dyn ResourceModel> { Box::new(self.clone()) }

    fn model_name(&self) -> &'static str { std::any::type_name::<T>() }

    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}
impl Clone for Box<dyn ResourceModel> {
    fn clone(&self) -> Self { self.clone_model() }
}

/// Factory decoding raw bytes of one resource type into a structured model.
pub trait ResourceCodec: Send + Sync {
    fn decode(&self, id: &ResourceIdPair, data: &[u8])
        -> Result<Box<dyn ResourceModel>, ResourceError>;
}
impl<F> ResourceCodec for F
where
    F: Fn(&ResourceIdPair, &[u8]) -> Result<Box<dyn ResourceModel>, ResourceError> + Send + Sync,
{
    fn decode(
        &self, id: &ResourceIdPair, data: &[u8],
    ) -> Result<Box<dyn ResourceModel>, ResourceError> {
        self(id, data)
    }
}

/// Constrain a closure to the [`ResourceCodec`] signature.
pub fn codec_fn<F>(codec: F) -> F
where
    F: Fn(&ResourceIdPair, &[u8]) -> Result<Box<dyn ResourceModel>, ResourceError> + Send + Sync,
{
    codec
}

/// Codec decoding a [`ResourceFormat`].
pub struct FormatCodec<T>(PhantomData<fn() -> T>);
impl<T> Default for FormatCodec<T> {
    fn default() -> Self { Self(PhantomData) }
}
impl<T: ResourceFormat> ResourceCodec for FormatCodec<T> {
    fn decode(
        &self, _id: &ResourceIdPair, data: &[u8],
    ) -> Result<Box<dyn ResourceModel>, ResourceError> {
        Ok(Box::new(T::decode(data)?))
    }
}

/// Mapping of resource types to codecs.
///
/// Cloning the registry is cheap and produces an independent snapshot:
/// registering codecs on the original afterwards doesn't affect the clone.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: IndexMap<ResourceId, Arc<dyn ResourceCodec>, RandomState>,
}
impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.codecs.keys()).finish()
    }
}
impl CodecRegistry {
    /// Create an empty registry. All resources decode as generic resources.
    pub fn new() -> Self { Self::default() }

    /// Create a registry with codecs for all resource formats implemented by this crate.
    pub fn known_types() -> Self {
        let mut registry = Self::new();
        registry.add_known_types();
        registry
    }

    /// Register codecs for all resource formats implemented by this crate, replacing existing ones.
    pub fn add_known_types(&mut self) -> &mut Self {
        self.set_format::<Manifest>(RT_MANIFEST);
        self.set_format::<Menu>(RT_MENU);
        self.set_format::<DialogTemplate>(RT_DIALOG);
        self.set_format::<StringTable>(RT_STRING);
        self.set_format::<VersionInfo>(RT_VERSION);
        self.set_format::<IconGroup>(RT_GROUP_ICON);
        self
    }

    /// Register a codec for a resource type.
    ///
    /// # Returns
    /// Returns [`ResourceError::DuplicateType`] if a codec is already registered for the type.
    pub fn register<T: Into<ResourceId>, C: ResourceCodec + 'static>(
        &mut self, type_: T, codec: C,
    ) -> Result<(), ResourceError> {
        let type_ = type_.into();
        if self.codecs.contains_key(&type_) {
            return Err(ResourceError::DuplicateType(type_));
        }
        self.codecs.insert(type_, Arc::new(codec));
        Ok(())
    }

    /// Register a [`ResourceFormat`] for a resource type.
    ///
    /// # Returns
    /// Returns [`ResourceError::DuplicateType`] if a codec is already registered for the type.
    pub fn register_format<F: ResourceFormat>(
        &mut self, type_: impl Into<ResourceId>,
    ) -> Result<(), ResourceError> {
        self.register(type_, FormatCodec::<F>::default())
    }

    /// Set the codec for a resource type.
    /// If a codec is already registered for the type, it will be replaced.
    /// # Returns
    /// The replaced codec.
    pub fn set<T: Into<ResourceId>, C: ResourceCodec + 'static>(
        &mut self, type_: T, codec: C,
    ) -> Option<Arc<dyn ResourceCodec>> {
        self.codecs.insert(type_.into(), Arc::new(codec))
    }

    /// Set a [`ResourceFormat`] for a resource type, replacing an existing codec.
    pub fn set_format<F: ResourceFormat>(
        &mut self, type_: impl Into<ResourceId>,
    ) -> Option<Arc<dyn ResourceCodec>> {
        self.set(type_, FormatCodec::<F>::default())
    }

    /// Remove the codec for a resource type.
    pub fn unregister(&mut self, type_: &ResourceId) -> Option<Arc<dyn ResourceCodec>> {
        self.codecs.shift_remove(type_)
    }

    /// Returns the codec registered for a resource type.
    pub fn resolve(&self, type_: &ResourceId) -> Option<&Arc<dyn ResourceCodec>> {
        self.codecs.get(type_)
    }

    /// Returns whether a codec is registered for a resource type.
    pub fn contains(&self, type_: &ResourceId) -> bool { self.codecs.contains_key(type_) }

    /// Returns the registered resource types.
    pub fn types(&self) -> impl Iterator<Item = &ResourceId> { self.codecs.keys() }

    /// Create a resource from raw bytes.
    /// Resources of types without a registered codec are wrapped unchanged as generic resources.
    ///
    /// # Returns
    /// Returns the decoding error of the registered codec, annotated with the resource identity.
    pub fn create_resource(
        &self, id: ResourceIdPair, data: Vec<u8>,
    ) -> Result<Resource, ResourceError> {
        match self.resolve(&id.type_) {
            Some(codec) => {
                trace!("decoding {} ({} bytes)", id, data.len());
                let model = codec.decode(&id, &data).map_err(|e| e.in_resource(&id))?;
                Ok(Resource::from_model(id, model, data.len()))
            }
            None => Ok(Resource::generic(id, data)),
        }
    }
}
