use serde_json::{Map, Value};
use thiserror::Error;

/// Result alias used by the pipelines and the model codec.
pub type Result<T> = core::result::Result<T, VersioningError>;

/// Error raised by a single deserialize or serialize call.
#[derive(Debug, Error)]
pub enum VersioningError {
    /// The document is not a JSON object.
    #[error("value must be a JSON object, found {found}")]
    InvalidShape { found: &'static str },

    /// The version tag is absent and no default deserialize version is set.
    #[error("'{property}' property was not present and no default deserialize version is configured")]
    MissingVersion { property: String },

    /// A user-supplied converter failed. Propagated as returned.
    #[error(transparent)]
    Converter(#[from] ConverterError),

    /// The model's versioning configuration is invalid.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The byte codec or the typed binding failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The byte codec produced output that is not UTF-8 text.
    #[error("encoded output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Invalid model setup. Raised once, when the model is registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("current version must not be empty")]
    MissingCurrentVersion,

    #[error("version property name must not be empty")]
    EmptyPropertyName,

    #[error("override property must be present on at most one field or accessor (found '{first}' and '{second}')")]
    MultipleOverrideProperties { first: String, second: String },

    #[error("override property '{property}' must be a String or Option<String>, found {found}")]
    OverrideNotString { property: String, found: String },

    #[error("override property '{property}' has no accessible getter")]
    OverrideWithoutGetter { property: String },

    #[error("unable to create instance of converter '{converter}': {reason}")]
    ConverterConstruction { converter: String, reason: String },

    #[error("no converter registered under '{name}'")]
    UnknownConverter { name: String },

    #[error("invalid settings: {0}")]
    Settings(String),
}

/// Failure reported by a converter.
///
/// `partial` carries whatever state the converter had reached, when it
/// chose to hand it back.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("conversion {from} -> {to} failed: {reason}")]
pub struct ConverterError {
    pub from: String,
    pub to: String,
    pub reason: String,
    pub partial: Option<Map<String, Value>>,
}

impl ConverterError {
    pub fn new(from: impl Into<String>, to: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            reason: reason.into(),
            partial: None,
        }
    }

    /// Attach the tree as it stood when the conversion failed.
    pub fn with_partial(mut self, tree: Map<String, Value>) -> Self {
        self.partial = Some(tree);
        self
    }
}

/// Short JSON type name used in shape errors.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
