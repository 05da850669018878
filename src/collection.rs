//! Ordered, uniquely keyed collections of resources.

use std::{fmt, path::Path};

use ahash::RandomState;
use indexmap::{IndexMap, IndexSet};
use log::{debug, trace};

use crate::{
    constants::*,
    errors::*,
    id::*,
    image::*,
    provider::*,
    registry::*,
    resource::*,
    settings::*,
    transaction::*,
};

/// Attachment of a collection to a resource provider.
enum Attachment<'p> {
    /// Never attached, resources are added by the application.
    Detached,
    /// Attached to a live provider, resources can be loaded on demand.
    Open(Box<dyn ResourceProvider + 'p>),
    /// The provider has been released.
    Closed,
}
impl fmt::Debug for Attachment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attachment::Detached => f.write_str("Detached"),
            Attachment::Open(_) => f.write_str("Open"),
            Attachment::Closed => f.write_str("Closed"),
        }
    }
}

/// Insertion-ordered collection of resources keyed by their identity.
///
/// A collection is either built by the application, or opened on a [`ResourceProvider`].
/// Opened collections either load all resources up front and release the provider,
/// or keep the provider open to load resources on demand until [`ResourceCollection::close`] is called.
///
/// # Examples
/// ```
/// use resinfo::{ResourceCollection, LoadSettings, Manifest, Resource, ResourceIdPair, RT_MANIFEST};
///
/// let mut resources = ResourceCollection::open_file(BINARY_PATH, &LoadSettings::known_types())?;
///
/// let id = ResourceIdPair::new(RT_MANIFEST, 1, 0x0409);
/// resources.replace(Resource::new(id, Manifest::new(MANIFEST)));
///
/// resources.save_file(BINARY_PATH)?;
/// ```
#[derive(Debug)]
pub struct ResourceCollection<'p> {
    resources:  IndexMap<ResourceIdPair, Resource, RandomState>,
    registry:   CodecRegistry,
    name_case:  NameCase,
    attachment: Attachment<'p>,
}
impl Default for ResourceCollection<'_> {
    fn default() -> Self { Self::new() }
}
impl<'p> ResourceCollection<'p> {
    /// Create an empty detached collection without codecs.
    pub fn new() -> Self { Self::with_settings(&LoadSettings::new()) }

    /// Create an empty detached collection using the registry and name policy of the settings.
    pub fn with_settings(settings: &LoadSettings) -> Self {
        Self {
            resources:  IndexMap::default(),
            registry:   settings.registry.clone(),
            name_case:  settings.name_case,
            attachment: Attachment::Detached,
        }
    }

    /// Open a collection on a provider.
    ///
    /// With [`LoadSettings::load_all`], all resources are loaded and the provider is released before returning.
    /// Otherwise the provider stays open for [`ResourceCollection::load`].
    ///
    /// # Returns
    /// Returns the first error raised while loading all resources.
    pub fn open<P: ResourceProvider + 'p>(
        provider: P, settings: &LoadSettings,
    ) -> Result<Self, ResourceError> {
        let mut collection = Self::with_settings(settings);
        collection.attachment = Attachment::Open(Box::new(provider));
        if settings.load_all {
            collection.load_all()?;
            collection.close();
        }
        Ok(collection)
    }

    /// Load all resources of a provider into a collection that doesn't borrow the provider.
    /// The provider is released before returning, regardless of [`LoadSettings::load_all`].
    ///
    /// This allows saving the collection back into the image it was loaded from.
    ///
    /// # Returns
    /// Returns the first error raised while loading all resources.
    pub fn load_from<P: ResourceProvider>(
        provider: P, settings: &LoadSettings,
    ) -> Result<ResourceCollection<'static>, ResourceError> {
        let mut collection = ResourceCollection::with_settings(settings);
        collection.attachment = Attachment::Open(Box::new(provider));
        collection.load_all()?;
        Ok(collection.into_closed())
    }

    /// Release the provider and return the collection without borrowing it.
    pub fn into_closed(mut self) -> ResourceCollection<'static> {
        self.close();
        let attachment = match self.attachment {
            Attachment::Detached => Attachment::Detached,
            Attachment::Open(_) | Attachment::Closed => Attachment::Closed,
        };
        ResourceCollection {
            resources: self.resources,
            registry: self.registry,
            name_case: self.name_case,
            attachment,
        }
    }

    /// Open a collection on the image file at the given path.
    /// The image is read into memory, the file isn't kept open.
    pub fn open_file<P: AsRef<Path>>(
        path: P, settings: &LoadSettings,
    ) -> Result<ResourceCollection<'static>, ResourceError> {
        let path = path.as_ref();
        let image = Image::parse_file(path)
            .map_err(|e| ResourceError::provider(format!("reading {}", path.display()), e))?;
        ResourceCollection::open(image, settings)
    }

    /// Returns the codecs applied to loaded resources.
    pub fn registry(&self) -> &CodecRegistry { &self.registry }

    pub fn name_case(&self) -> NameCase { self.name_case }

    /// Returns whether the collection is attached to an open provider.
    pub fn is_open(&self) -> bool { matches!(self.attachment, Attachment::Open(_)) }

    /// Release the provider. Does nothing if the collection isn't attached to an open provider.
    pub fn close(&mut self) {
        if let Attachment::Open(_) = self.attachment {
            debug!("releasing resource provider after loading {} resources", self.resources.len());
            self.attachment = Attachment::Closed;
        }
    }

    /// Add a resource.
    ///
    /// # Returns
    /// Returns [`ResourceError::DuplicateKey`] if a resource with the same identity exists.
    /// The collection is left unchanged in that case.
    pub fn add(&mut self, mut resource: Resource) -> Result<&mut Resource, ResourceError> {
        let key = self.name_case.normalize(resource.id());
        if self.resources.contains_key(&key) {
            return Err(ResourceError::DuplicateKey(key));
        }
        resource.set_id(key.clone());
        let (index, _) = self.resources.insert_full(key, resource);
        Ok(&mut self.resources[index])
    }

    /// Decode raw bytes through the registry and add the resulting resource.
    ///
    /// # Returns
    /// Returns [`ResourceError::DuplicateKey`] if a resource with the same identity exists,
    /// or the decoding error of the registered codec.
    pub fn add_data(
        &mut self, id: ResourceIdPair, data: Vec<u8>,
    ) -> Result<&mut Resource, ResourceError> {
        let key = self.name_case.normalize(&id);
        if self.resources.contains_key(&key) {
            return Err(ResourceError::DuplicateKey(key));
        }
        let resource = self.registry.create_resource(key, data)?;
        self.add(resource)
    }

    /// Insert a resource, replacing a resource with the same identity in place.
    /// # Returns
    /// The replaced resource.
    pub fn replace(&mut self, mut resource: Resource) -> Option<Resource> {
        let key = self.name_case.normalize(resource.id());
        resource.set_id(key.clone());
        self.resources.insert(key, resource)
    }

    /// Remove a resource, keeping the order of the remaining resources.
    /// # Returns
    /// The removed resource, or `None` if no resource with the identity exists.
    pub fn remove(&mut self, id: &ResourceIdPair) -> Option<Resource> {
        self.resources.shift_remove(&self.name_case.normalize(id))
    }

    pub fn get(&self, id: &ResourceIdPair) -> Option<&Resource> {
        self.resources.get(&self.name_case.normalize(id))
    }

    pub fn get_mut(&mut self, id: &ResourceIdPair) -> Option<&mut Resource> {
        let key = self.name_case.normalize(id);
        self.resources.get_mut(&key)
    }

    pub fn contains(&self, id: &ResourceIdPair) -> bool {
        self.resources.contains_key(&self.name_case.normalize(id))
    }

    pub fn len(&self) -> usize { self.resources.len() }

    pub fn is_empty(&self) -> bool { self.resources.is_empty() }

    /// Returns the resources in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Resource> { self.resources.values() }

    /// Returns the resource identities in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &ResourceIdPair> { self.resources.keys() }

    /// Returns the resources of a type in insertion order.
    pub fn resources_of_type(&self, type_: &ResourceId) -> impl Iterator<Item = &Resource> + '_ {
        let type_ = self.name_case.normalize_id(type_);
        self.resources.values().filter(move |resource| *resource.type_() == type_)
    }

    /// Returns the distinct types of the resources in order of first appearance.
    pub fn resource_types(&self) -> Vec<&ResourceId> {
        self.resources
            .keys()
            .map(|id| &id.type_)
            .collect::<IndexSet<_, RandomState>>()
            .into_iter()
            .collect()
    }

    /// Load a resource from the open provider, decode it through the registry and add it.
    ///
    /// # Returns
    /// Returns [`ResourceError::ProviderClosed`] if the collection isn't attached to an open provider,
    /// [`ResourceError::DuplicateKey`] if the resource has already been loaded,
    /// [`ResourceError::NotFound`] if the provider doesn't contain the resource,
    /// or the decoding error of the registered codec.
    pub fn load<T: Into<ResourceId>, N: Into<ResourceId>>(
        &mut self, type_: T, name: N, language: LANGID,
    ) -> Result<&mut Resource, ResourceError> {
        self.load_with(ResourceIdPair::new(type_, name, language), true)
    }

    /// Load a resource from the open provider as a generic resource, bypassing the registry.
    ///
    /// # Returns
    /// Returns the same errors as [`ResourceCollection::load`], except for decoding errors.
    pub fn load_generic<T: Into<ResourceId>, N: Into<ResourceId>>(
        &mut self, type_: T, name: N, language: LANGID,
    ) -> Result<&mut Resource, ResourceError> {
        self.load_with(ResourceIdPair::new(type_, name, language), false)
    }

    fn load_with(&mut self, id: ResourceIdPair, decode: bool) -> Result<&mut Resource, ResourceError> {
        let Attachment::Open(provider) = &self.attachment else {
            return Err(ResourceError::ProviderClosed);
        };
        let key = self.name_case.normalize(&id);
        if self.resources.contains_key(&key) {
            return Err(ResourceError::DuplicateKey(key));
        }
        let registry = decode.then_some(&self.registry);
        let resource = fetch(&**provider, registry, &id, key.clone())?;
        let (index, _) = self.resources.insert_full(key, resource);
        Ok(&mut self.resources[index])
    }

    /// Load every resource of the open provider, walking types, then names, then languages.
    ///
    /// The walk stops at the first error, which is returned with its original cause.
    /// Resources loaded before the error stay in the collection.
    ///
    /// # Returns
    /// Returns the number of loaded resources,
    /// or [`ResourceError::ProviderClosed`] if the collection isn't attached to an open provider.
    pub fn load_all(&mut self) -> Result<usize, ResourceError> {
        let Self {
            resources,
            registry,
            name_case,
            attachment,
        } = self;
        let Attachment::Open(provider) = attachment else {
            return Err(ResourceError::ProviderClosed);
        };
        let provider: &dyn ResourceProvider = &**provider;
        let registry: &CodecRegistry = registry;
        let name_case = *name_case;

        let bridge = EnumerationBridge::new();
        let mut loaded = 0;
        let result = provider.enum_types(&mut |type_| {
            bridge.guard(|| {
                let result = provider.enum_names(type_, &mut |name| {
                    bridge.guard(|| {
                        let result = provider.enum_languages(type_, name, &mut |language| {
                            bridge.guard(|| {
                                let id = ResourceIdPair::new(type_, name, language);
                                let key = name_case.normalize(&id);
                                if resources.contains_key(&key) {
                                    return Err(ResourceError::DuplicateKey(key));
                                }
                                let resource = fetch(provider, Some(registry), &id, key.clone())?;
                                resources.insert(key, resource);
                                loaded += 1;
                                Ok(())
                            })
                        });
                        bridge.finish(
                            result,
                            format!("enumerating languages of {} : {}", type_.type_name(), name),
                        )
                    })
                });
                bridge.finish(result, format!("enumerating names of {}", type_.type_name()))
            })
        });
        bridge.finish(result, "enumerating resource types")?;
        debug!("loaded {} resources", loaded);
        Ok(loaded)
    }

    /// Write all resources into the target, replacing its existing resources.
    ///
    /// # Returns
    /// Returns the first encoding error, or [`ResourceError::ProviderFailure`] if the target rejects the update.
    /// Neither the collection nor the target is modified in that case.
    pub fn save<T: UpdateTarget + ?Sized>(&self, target: &mut T) -> Result<(), ResourceError> {
        self.save_with(target, UpdateOptions::new().with_discard_existing(true))
    }

    /// Write all resources into the target with the given options.
    pub fn save_with<T: UpdateTarget + ?Sized>(
        &self, target: &mut T, options: UpdateOptions,
    ) -> Result<(), ResourceError> {
        let mut transaction = UpdateTransaction::with_options(options);
        for resource in self.resources.values() {
            transaction.put(resource)?;
        }
        transaction.commit(target)
    }

    /// Write all resources into the image file at the given path, replacing its existing resources.
    /// The file is replaced atomically.
    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ResourceError> {
        self.save(&mut ImageFile::new(path.as_ref()))
    }
}

impl<'a, 'p> IntoIterator for &'a ResourceCollection<'p> {
    type IntoIter = indexmap::map::Values<'a, ResourceIdPair, Resource>;
    type Item = &'a Resource;

    fn into_iter(self) -> Self::IntoIter { self.resources.values() }
}

/// Load the bytes of a resource from a provider and create the resource under `key`.
fn fetch(
    provider: &dyn ResourceProvider, registry: Option<&CodecRegistry>, id: &ResourceIdPair,
    key: ResourceIdPair,
) -> Result<Resource, ResourceError> {
    let data = provider
        .load(id)
        .map_err(|e| ResourceError::provider(format!("loading {}", id), e))?
        .ok_or_else(|| ResourceError::NotFound(id.clone()))?;
    trace!("loaded {} ({} bytes)", id, data.len());
    let mut resource = match registry {
        Some(registry) => registry.create_resource(key, data.into_owned())?,
        None => Resource::generic(key, data.into_owned()),
    };
    resource.set_codepage(provider.codepage(id));
    Ok(resource)
}
