//! Structured models of the resource types decoded by [`CodecRegistry::known_types`](crate::CodecRegistry::known_types).

mod dialog;
mod icon;
mod manifest;
mod menu;
mod string_table;
mod version;

pub use dialog::*;
pub use icon::*;
pub use manifest::*;
pub use menu::*;
pub use string_table::*;
pub use version::*;
