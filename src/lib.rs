//! **Res**ource **info**rmation for Windows portable executables.
//!
//! Supports:
//! * Addressing resources by type, name and language
//! * Decoding resources into structured models through an extensible codec registry
//! * Collecting resources eagerly or on demand from a resource provider
//! * Committing resources back into an image atomically
//!
//! See [`ResourceCollection`] for the main entry point for loading, modifying and saving resources.
//!
//! # Examples
//!
//! ### Version information
//! ```
//! use resinfo::{LoadSettings, ResourceCollection, VersionInfo, RT_VERSION, VS_PRODUCT_NAME};
//!
//! // load all resources and decode the known resource types
//! let mut resources = ResourceCollection::open_file(BINARY_PATH, &LoadSettings::known_types())?;
//!
//! // change the product name in every version resource
//! let ids = resources.resources_of_type(&RT_VERSION.into()).map(|r| r.id().clone()).collect::<Vec<_>>();
//! for id in ids {
//!     let version = resources.get_mut(&id).and_then(|r| r.model_mut::<VersionInfo>()).unwrap();
//!     for strings in version.strings.values_mut() {
//!         strings.insert(VS_PRODUCT_NAME.into(), "Product".into());
//!     }
//! }
//!
//! // write all resources back into the image
//! resources.save_file(BINARY_PATH)?;
//! ```
//!
//! ### Resource transfer
//! ```
//! use resinfo::{Image, ResourceCollection, LoadSettings};
//!
//! let source = Image::parse(std::fs::read(SOURCE_PATH)?)?;
//! let mut target = Image::parse(std::fs::read(TARGET_PATH)?)?;
//!
//! // copy all resources of the source image into the target image
//! ResourceCollection::open(&source, &LoadSettings::new())?.save(&mut target)?;
//!
//! target.write_file(TARGET_PATH)?;
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub(crate) mod collection;
pub(crate) mod directory;
pub(crate) mod errors;
pub(crate) mod id;
pub(crate) mod image;
pub(crate) mod provider;
pub(crate) mod registry;
pub(crate) mod resource;
pub(crate) mod settings;
pub(crate) mod transaction;
pub(crate) mod util;

pub mod constants;
pub mod formats;
pub mod types;

pub use crate::{
    collection::*,
    constants::*,
    directory::*,
    errors::*,
    formats::*,
    id::*,
    image::*,
    provider::*,
    registry::*,
    resource::*,
    settings::*,
    transaction::*,
};
