use std::fmt;
use std::sync::Arc;

use crate::converter::ModelConverter;
use crate::error::ConfigurationError;
use crate::tag::{non_empty, VersionTag, DEFAULT_PROPERTY_NAME};
use crate::validate::ConfigValidator;

/// Declared type of a model property, as far as versioning cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyType {
    /// `String`.
    String,
    /// `Option<String>`.
    OptionalString,
    /// Anything else, named for error messages.
    Other(String),
}

impl PropertyType {
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String | Self::OptionalString)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "String"),
            Self::OptionalString => write!(f, "Option<String>"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// How a property is reached on the typed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    Field,
    Method,
}

/// A property of a model type, as declared at registration.
///
/// Only properties carrying the override marker matter to the validator;
/// the rest may be declared for completeness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub property_type: PropertyType,
    pub accessor: AccessorKind,
    pub has_getter: bool,
    pub override_marker: bool,
    pub default_to_source: bool,
}

impl PropertyDescriptor {
    /// A struct field. Fields are always readable.
    pub fn field(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            accessor: AccessorKind::Field,
            has_getter: true,
            override_marker: false,
            default_to_source: false,
        }
    }

    /// An accessor method pair.
    pub fn method(name: impl Into<String>, property_type: PropertyType, has_getter: bool) -> Self {
        Self {
            accessor: AccessorKind::Method,
            has_getter,
            ..Self::field(name, property_type)
        }
    }

    /// Mark this property as the per-instance output version.
    pub fn serialize_to_version(mut self) -> Self {
        self.override_marker = true;
        self
    }

    /// Populate the property with the version a document was read from.
    pub fn default_to_source(mut self, enabled: bool) -> Self {
        self.default_to_source = enabled;
        self
    }
}

/// The validated override property of a model type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideProperty {
    name: String,
    default_to_source: bool,
}

impl OverrideProperty {
    pub(crate) fn new(name: String, default_to_source: bool) -> Self {
        Self {
            name,
            default_to_source,
        }
    }

    /// JSON property name in the encoded tree.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether deserialization stamps the source version into it.
    pub fn default_to_source(&self) -> bool {
        self.default_to_source
    }
}

/// Versioning configuration of one model type.
///
/// Built once through [`ModelVersioningBuilder`], immutable afterwards and
/// cheap to clone; converters are shared behind `Arc`.
#[derive(Clone)]
pub struct ModelVersioningConfig {
    model: String,
    current_version: String,
    tag: VersionTag,
    default_serialize_version: Option<String>,
    always_convert: bool,
    to_current: Option<Arc<dyn ModelConverter>>,
    to_target: Option<Arc<dyn ModelConverter>>,
    override_property: Option<OverrideProperty>,
}

impl ModelVersioningConfig {
    /// Start a configuration for a model whose current version is `current_version`.
    pub fn builder(current_version: impl Into<String>) -> ModelVersioningBuilder {
        ModelVersioningBuilder::new(current_version)
    }

    /// Name used in log events.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    pub fn tag(&self) -> &VersionTag {
        &self.tag
    }

    pub fn property_name(&self) -> &str {
        self.tag.property_name()
    }

    pub fn default_deserialize_version(&self) -> Option<&str> {
        self.tag.default_version()
    }

    pub fn default_serialize_version(&self) -> Option<&str> {
        self.default_serialize_version.as_deref()
    }

    pub fn suppress_version(&self) -> Option<&str> {
        self.tag.suppress_version()
    }

    pub fn always_convert(&self) -> bool {
        self.always_convert
    }

    pub fn to_current_converter(&self) -> Option<&Arc<dyn ModelConverter>> {
        self.to_current.as_ref()
    }

    pub fn to_target_converter(&self) -> Option<&Arc<dyn ModelConverter>> {
        self.to_target.as_ref()
    }

    pub fn override_property(&self) -> Option<&OverrideProperty> {
        self.override_property.as_ref()
    }

    /// Whether the read path runs `to_current` for a document at `source`.
    pub fn needs_upgrade(&self, source: &str) -> bool {
        self.to_current.is_some() && (self.always_convert || source != self.current_version)
    }

    /// Whether the write path runs `to_target` for output at `target`.
    pub fn needs_downgrade(&self, target: &str) -> bool {
        self.to_target.is_some() && (self.always_convert || target != self.current_version)
    }

    /// Output version when no instance override applies: the default
    /// serialize version if set, else the current version.
    pub fn default_target_version(&self) -> &str {
        self.default_serialize_version
            .as_deref()
            .unwrap_or(&self.current_version)
    }
}

impl fmt::Debug for ModelVersioningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelVersioningConfig")
            .field("model", &self.model)
            .field("current_version", &self.current_version)
            .field("tag", &self.tag)
            .field("default_serialize_version", &self.default_serialize_version)
            .field("always_convert", &self.always_convert)
            .field("to_current", &self.to_current.as_ref().map(|c| c.name()))
            .field("to_target", &self.to_target.as_ref().map(|c| c.name()))
            .field("override_property", &self.override_property)
            .finish()
    }
}

type ConverterFactory =
    Box<dyn FnOnce() -> Result<Arc<dyn ModelConverter>, String> + Send>;

/// Where a converter comes from: a ready instance, or a factory run
/// during [`ModelVersioningBuilder::build`].
pub(crate) enum ConverterSource {
    Instance(Arc<dyn ModelConverter>),
    Factory { name: String, make: ConverterFactory },
}

impl ConverterSource {
    pub(crate) fn instantiate(self) -> Result<Arc<dyn ModelConverter>, ConfigurationError> {
        match self {
            Self::Instance(c) => Ok(c),
            Self::Factory { name, make } => {
                make().map_err(|reason| ConfigurationError::ConverterConstruction {
                    converter: name,
                    reason,
                })
            }
        }
    }
}

/// Builder for [`ModelVersioningConfig`].
///
/// ```
/// use model_versioning::{ModelVersioningConfig, PropertyDescriptor, PropertyType};
///
/// let config = ModelVersioningConfig::builder("2.0")
///     .default_deserialize_version("1.0")
///     .suppress_version("2.0")
///     .property(
///         PropertyDescriptor::field("targetVersion", PropertyType::OptionalString)
///             .serialize_to_version(),
///     )
///     .build()
///     .unwrap();
///
/// assert_eq!(config.property_name(), "modelVersion");
/// assert_eq!(config.override_property().unwrap().name(), "targetVersion");
/// ```
pub struct ModelVersioningBuilder {
    pub(crate) model: String,
    pub(crate) current_version: String,
    pub(crate) property_name: String,
    pub(crate) default_deserialize_version: Option<String>,
    pub(crate) default_serialize_version: Option<String>,
    pub(crate) suppress_version: Option<String>,
    pub(crate) always_convert: bool,
    pub(crate) to_current: Option<ConverterSource>,
    pub(crate) to_target: Option<ConverterSource>,
    pub(crate) properties: Vec<PropertyDescriptor>,
}

impl ModelVersioningBuilder {
    pub fn new(current_version: impl Into<String>) -> Self {
        Self {
            model: String::from("model"),
            current_version: current_version.into(),
            property_name: DEFAULT_PROPERTY_NAME.to_string(),
            default_deserialize_version: None,
            default_serialize_version: None,
            suppress_version: None,
            always_convert: false,
            to_current: None,
            to_target: None,
            properties: Vec::new(),
        }
    }

    /// Name of the model, for logs.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// JSON property carrying the version. Defaults to `modelVersion`.
    pub fn property_name(mut self, name: impl Into<String>) -> Self {
        self.property_name = name.into();
        self
    }

    /// Version assumed for documents without a tag. Empty means unset.
    pub fn default_deserialize_version(mut self, version: impl Into<String>) -> Self {
        self.default_deserialize_version = non_empty(Some(version.into()));
        self
    }

    /// Version written when no instance override applies. Empty means unset.
    pub fn default_serialize_version(mut self, version: impl Into<String>) -> Self {
        self.default_serialize_version = non_empty(Some(version.into()));
        self
    }

    /// Version for which the tag is omitted from output.
    pub fn suppress_version(mut self, version: impl Into<String>) -> Self {
        self.suppress_version = non_empty(Some(version.into()));
        self
    }

    /// Run converters even when source and target versions are equal.
    pub fn always_convert(mut self, always: bool) -> Self {
        self.always_convert = always;
        self
    }

    pub fn to_current(mut self, converter: impl ModelConverter + 'static) -> Self {
        self.to_current = Some(ConverterSource::Instance(Arc::new(converter)));
        self
    }

    pub fn to_target(mut self, converter: impl ModelConverter + 'static) -> Self {
        self.to_target = Some(ConverterSource::Instance(Arc::new(converter)));
        self
    }

    /// Use an already shared converter for both directions.
    pub fn converter(mut self, converter: Arc<dyn ModelConverter>) -> Self {
        self.to_current = Some(ConverterSource::Instance(converter.clone()));
        self.to_target = Some(ConverterSource::Instance(converter));
        self
    }

    /// Construct the read-path converter during `build`. A factory error
    /// fails registration.
    pub fn to_current_with<F>(mut self, name: impl Into<String>, make: F) -> Self
    where
        F: FnOnce() -> Result<Arc<dyn ModelConverter>, String> + Send + 'static,
    {
        self.to_current = Some(ConverterSource::Factory {
            name: name.into(),
            make: Box::new(make),
        });
        self
    }

    /// Construct the write-path converter during `build`.
    pub fn to_target_with<F>(mut self, name: impl Into<String>, make: F) -> Self
    where
        F: FnOnce() -> Result<Arc<dyn ModelConverter>, String> + Send + 'static,
    {
        self.to_target = Some(ConverterSource::Factory {
            name: name.into(),
            make: Box::new(make),
        });
        self
    }

    /// Declare a model property. Properties marked with
    /// [`PropertyDescriptor::serialize_to_version`] are override candidates.
    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<ModelVersioningConfig, ConfigurationError> {
        ConfigValidator::check_versions(&self.current_version, &self.property_name)?;
        let override_property = ConfigValidator::find_override_property(&self.properties)?;

        let to_current = self.to_current.map(ConverterSource::instantiate).transpose()?;
        let to_target = self.to_target.map(ConverterSource::instantiate).transpose()?;

        let tag = VersionTag::new(self.property_name)
            .with_default(self.default_deserialize_version)
            .with_suppression(self.suppress_version);

        let config = ModelVersioningConfig {
            model: self.model,
            current_version: self.current_version,
            tag,
            default_serialize_version: self.default_serialize_version,
            always_convert: self.always_convert,
            to_current,
            to_target,
            override_property,
        };

        tracing::debug!(
            model = %config.model,
            current_version = %config.current_version,
            property = config.property_name(),
            override_property = config.override_property.as_ref().map(|p| p.name()),
            "registered versioned model"
        );

        Ok(config)
    }
}
