//! Model definitions loaded from TOML.
//!
//! ```toml
//! model = "Person"
//! current_version = "2.0"
//! default_deserialize_version = "1.0"
//! suppress_version = "2.0"
//!
//! [override_property]
//! name = "targetVersion"
//! default_to_source = true
//!
//! [[upgrade]]
//! from = "1.0"
//! to = "2.0"
//! rules = [{ op = "rename", from = "name", to = "fullName" }]
//!
//! [[downgrade]]
//! from = "2.0"
//! to = "1.0"
//! rules = [{ op = "rename", from = "fullName", to = "name" }]
//! ```
//!
//! Converters written in code are referenced by name through a
//! [`ConverterRegistry`] instead of rule lists.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::chain::{Direction, StepChain};
use crate::config::{
    ConverterSource, ModelVersioningBuilder, ModelVersioningConfig, PropertyDescriptor, PropertyType,
};
use crate::converter::ModelConverter;
use crate::error::ConfigurationError;
use crate::rules::RuleStep;
use crate::tag::DEFAULT_PROPERTY_NAME;

/// Top-level structure of a model definition file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSettings {
    /// Model name, used in logs.
    #[serde(default = "default_model")]
    pub model: String,
    pub current_version: String,
    #[serde(default = "default_property_name")]
    pub property_name: String,
    #[serde(default)]
    pub default_deserialize_version: String,
    #[serde(default)]
    pub default_serialize_version: String,
    pub suppress_version: Option<String>,
    #[serde(default)]
    pub always_convert: bool,
    /// Registered converter used on the read path.
    pub to_current_converter: Option<String>,
    /// Registered converter used on the write path.
    pub to_target_converter: Option<String>,
    pub override_property: Option<OverrideSettings>,
    /// Rule steps toward the current version.
    #[serde(default)]
    pub upgrade: Vec<RuleStep>,
    /// Rule steps away from the current version.
    #[serde(default)]
    pub downgrade: Vec<RuleStep>,
}

/// The `[override_property]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideSettings {
    pub name: String,
    #[serde(default)]
    pub default_to_source: bool,
}

fn default_model() -> String {
    "model".to_string()
}

fn default_property_name() -> String {
    DEFAULT_PROPERTY_NAME.to_string()
}

impl ModelSettings {
    /// Parse a model definition.
    pub fn from_toml(text: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(text).map_err(|e| ConfigurationError::Settings(e.to_string()))
    }

    /// Read and parse a model definition file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::Settings(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Rule steps compiled into a chain.
    pub fn rule_chain(&self) -> StepChain {
        let mut chain = StepChain::new(format!("{}-rules", self.model));
        for step in &self.upgrade {
            chain.register_upgrade(Box::new(step.clone()));
        }
        for step in &self.downgrade {
            chain.register_downgrade(Box::new(step.clone()));
        }
        chain
    }

    /// Every version mentioned by a rule step, paired with its direction.
    pub fn rule_versions(&self) -> Vec<(Direction, String)> {
        let chain = self.rule_chain();
        let mut out = Vec::new();
        for direction in [Direction::Upgrade, Direction::Downgrade] {
            for version in chain.known_versions(direction) {
                out.push((direction, version));
            }
        }
        out
    }

    /// Turn the settings into a builder, resolving converter names in
    /// `registry`.
    ///
    /// A named converter takes precedence over rule steps for its
    /// direction; rule steps, when present, fill the other one.
    pub fn into_builder(self, registry: &ConverterRegistry) -> Result<ModelVersioningBuilder, ConfigurationError> {
        let chain: Option<Arc<dyn ModelConverter>> = if self.upgrade.is_empty() && self.downgrade.is_empty() {
            None
        } else {
            Some(Arc::new(self.rule_chain()))
        };

        let mut builder = ModelVersioningBuilder::new(self.current_version)
            .model(self.model)
            .property_name(self.property_name)
            .default_deserialize_version(self.default_deserialize_version)
            .default_serialize_version(self.default_serialize_version)
            .always_convert(self.always_convert);

        if let Some(version) = self.suppress_version {
            builder = builder.suppress_version(version);
        }

        builder.to_current = match self.to_current_converter {
            Some(name) => Some(registry.source(&name)?),
            None if !self.upgrade.is_empty() => chain.clone().map(ConverterSource::Instance),
            None => None,
        };
        builder.to_target = match self.to_target_converter {
            Some(name) => Some(registry.source(&name)?),
            None if !self.downgrade.is_empty() => chain.map(ConverterSource::Instance),
            None => None,
        };

        if let Some(property) = self.override_property {
            builder = builder.property(
                PropertyDescriptor::field(property.name, PropertyType::OptionalString)
                    .serialize_to_version()
                    .default_to_source(property.default_to_source),
            );
        }

        Ok(builder)
    }

    /// Build and validate the configuration.
    pub fn build(self, registry: &ConverterRegistry) -> Result<ModelVersioningConfig, ConfigurationError> {
        self.into_builder(registry)?.build()
    }
}

type SharedFactory = Arc<dyn Fn() -> Result<Arc<dyn ModelConverter>, String> + Send + Sync>;

/// Converters available to settings files, by name.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    factories: HashMap<String, SharedFactory>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`. It runs once per model that
    /// references it, when that model is built.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Arc<dyn ModelConverter>, String> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Register a ready instance under `name`.
    pub fn register_instance(&mut self, name: impl Into<String>, converter: Arc<dyn ModelConverter>) {
        self.register(name, move || Ok(converter.clone()));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn source(&self, name: &str) -> Result<ConverterSource, ConfigurationError> {
        let factory = self
            .factories
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownConverter {
                name: name.to_string(),
            })?;
        Ok(ConverterSource::Factory {
            name: name.to_string(),
            make: Box::new(move || factory()),
        })
    }
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("names", &self.names())
            .finish()
    }
}
