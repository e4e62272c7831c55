//! # model-versioning
//!
//! Versioned JSON models for serde.
//!
//! A model's schema evolves, but documents written by older releases keep
//! arriving, and older consumers keep asking for the shapes they know.
//! `model-versioning` keeps that out of the model's own code: documents carry
//! a plain string version tag, and pluggable converters upgrade old documents
//! on read and downgrade the current shape on write.
//!
//! ## How It Works
//!
//! 1. On read, the tag (`modelVersion` by default) is removed from the JSON
//!    object. A missing tag falls back to the configured default.
//! 2. If the document is not at the current version, the `to_current`
//!    converter upgrades the tree; serde then decodes it into the model.
//! 3. On write, the output version is the instance's override property if
//!    set, else the default serialize version, else the current version.
//! 4. If that differs from the current version, the `to_target` converter
//!    downgrades the tree, and the tag is written unless that version is
//!    configured to go untagged.
//!
//! ## Example
//!
//! ```
//! use model_versioning::{FnConverter, ModelCodec, ModelVersioningBuilder, VersionedModel};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct Person {
//!     full_name: String,
//! }
//!
//! impl VersionedModel for Person {
//!     fn versioning() -> ModelVersioningBuilder {
//!         ModelVersioningBuilder::new("2.0")
//!             .default_serialize_version("1.0")
//!             .to_current(FnConverter::new("name-to-full-name").upgrade(|mut tree, _, _| {
//!                 if let Some(name) = tree.shift_remove("name") {
//!                     tree.insert("fullName".into(), name);
//!                 }
//!                 Ok(tree)
//!             }))
//!             .to_target(FnConverter::new("full-name-to-name").downgrade(|mut tree, _, _| {
//!                 if let Some(name) = tree.shift_remove("fullName") {
//!                     tree.insert("name".into(), name);
//!                 }
//!                 Ok(tree)
//!             }))
//!     }
//! }
//!
//! let codec = ModelCodec::<Person>::register().unwrap();
//!
//! let person = codec.from_str(r#"{"modelVersion":"1.0","name":"x"}"#).unwrap();
//! assert_eq!(person.full_name, "x");
//!
//! assert_eq!(codec.to_string(&person).unwrap(), r#"{"name":"x","modelVersion":"1.0"}"#);
//! ```

mod chain;
mod codec;
mod config;
mod converter;
mod deserialize;
mod error;
mod model;
mod rules;
mod serialize;
mod settings;
mod tag;
mod validate;

pub use chain::{ConversionStep, Direction, StepChain};
pub use codec::{JsonCodec, TreeCodec};
pub use config::{
    AccessorKind, ModelVersioningBuilder, ModelVersioningConfig, OverrideProperty, PropertyDescriptor,
    PropertyType,
};
pub use converter::{FnConverter, ModelConverter};
pub use deserialize::{upgrade, DeserializationPipeline, Upgraded};
pub use error::{ConfigurationError, ConverterError, Result, VersioningError};
pub use model::{ModelCodec, VersionedModel};
pub use rules::{FieldRule, RuleStep};
pub use serialize::{downgrade, SerializationPipeline};
pub use settings::{ConverterRegistry, ModelSettings, OverrideSettings};
pub use tag::{extract, inject, should_suppress, VersionTag, DEFAULT_PROPERTY_NAME};
pub use validate::ConfigValidator;

// Re-export proc macros when the `macros` feature is enabled.
#[cfg(feature = "macros")]
pub use model_versioning_macros::versioned_model;
