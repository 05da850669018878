//! Typed configuration of collections and update transactions.

use crate::{id::*, registry::*};

/// Comparison policy for named resource types and names.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum NameCase {
    /// Names compare by exact string value.
    #[default]
    Sensitive,
    /// Names compare ignoring case, the way the Windows loader looks resources up.
    /// Collection keys are stored upper-cased.
    Insensitive,
}
impl NameCase {
    /// Returns the identifier as it is keyed under this policy.
    pub fn normalize_id(&self, id: &ResourceId) -> ResourceId {
        match self {
            NameCase::Sensitive => id.clone(),
            NameCase::Insensitive => id.to_uppercase(),
        }
    }

    /// Returns the resource identity as it is keyed under this policy.
    pub fn normalize(&self, id: &ResourceIdPair) -> ResourceIdPair {
        ResourceIdPair {
            type_:    self.normalize_id(&id.type_),
            name:     self.normalize_id(&id.name),
            language: id.language,
        }
    }
}

/// Settings for opening a [`ResourceCollection`](crate::ResourceCollection).
#[derive(Debug, Clone)]
pub struct LoadSettings {
    /// Codecs applied to loaded resources. The collection keeps a snapshot.
    pub registry:  CodecRegistry,
    /// Load all resources on open and release the provider afterwards.
    /// Otherwise the provider stays open for on-demand loading until the collection is closed.
    pub load_all:  bool,
    pub name_case: NameCase,
}
impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            registry:  CodecRegistry::new(),
            load_all:  true,
            name_case: NameCase::Sensitive,
        }
    }
}
impl LoadSettings {
    pub fn new() -> Self { Self::default() }

    /// Settings decoding all resource formats implemented by this crate.
    pub fn known_types() -> Self {
        Self {
            registry: CodecRegistry::known_types(),
            ..Default::default()
        }
    }

    pub fn with_registry(mut self, registry: CodecRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_load_all(mut self, load_all: bool) -> Self {
        self.load_all = load_all;
        self
    }

    /// Keep the provider open for on-demand loading.
    pub fn lazy(self) -> Self { self.with_load_all(false) }

    pub fn with_name_case(mut self, name_case: NameCase) -> Self {
        self.name_case = name_case;
        self
    }
}

/// Options of an [`UpdateTransaction`](crate::UpdateTransaction).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct UpdateOptions {
    /// Remove all resources of the target not written by the transaction.
    pub discard_existing: bool,
}
impl UpdateOptions {
    pub fn new() -> Self { Self::default() }

    pub fn with_discard_existing(mut self, discard_existing: bool) -> Self {
        self.discard_existing = discard_existing;
        self
    }
}
