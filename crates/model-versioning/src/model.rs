use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::codec::{JsonCodec, TreeCodec};
use crate::config::{ModelVersioningBuilder, ModelVersioningConfig};
use crate::deserialize::DeserializationPipeline;
use crate::error::{ConfigurationError, Result};
use crate::serialize::SerializationPipeline;

/// A typed model whose JSON form carries a version tag.
///
/// Usually implemented with the `#[versioned_model]` attribute macro.
/// `serialize_to_version` exposes the override property, if the model has
/// one; the default says "no preference".
pub trait VersionedModel: Serialize + DeserializeOwned {
    /// Describe the model's versioning. Validated once by [`ModelCodec::register`].
    fn versioning() -> ModelVersioningBuilder;

    /// Per-instance output version.
    fn serialize_to_version(&self) -> Option<&str> {
        None
    }

    /// Change the per-instance output version.
    fn set_serialize_to_version(&mut self, version: Option<String>) {
        let _ = version;
    }
}

/// Reads and writes one model type through the versioning pipelines.
///
/// Registration happens once, in [`register`](Self::register); the codec
/// is then cheap to clone and safe to share across threads.
///
/// ```
/// use model_versioning::{ModelCodec, ModelVersioningBuilder, VersionedModel};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Note {
///     text: String,
/// }
///
/// impl VersionedModel for Note {
///     fn versioning() -> ModelVersioningBuilder {
///         ModelVersioningBuilder::new("1").model("Note")
///     }
/// }
///
/// let codec = ModelCodec::<Note>::register().unwrap();
/// let json = codec.to_string(&Note { text: "hi".into() }).unwrap();
/// assert_eq!(json, r#"{"text":"hi","modelVersion":"1"}"#);
/// assert_eq!(codec.from_str(&json).unwrap(), Note { text: "hi".into() });
/// ```
pub struct ModelCodec<T, C = JsonCodec> {
    config: Arc<ModelVersioningConfig>,
    codec: C,
    _model: PhantomData<fn() -> T>,
}

impl<T: VersionedModel> ModelCodec<T> {
    /// Build and validate `T`'s configuration.
    pub fn register() -> core::result::Result<Self, ConfigurationError> {
        Ok(Self::with_config(T::versioning().build()?))
    }

    /// Use an already built configuration.
    pub fn with_config(config: ModelVersioningConfig) -> Self {
        Self {
            config: Arc::new(config),
            codec: JsonCodec::default(),
            _model: PhantomData,
        }
    }
}

impl<T: VersionedModel, C: TreeCodec> ModelCodec<T, C> {
    /// Swap the byte codec.
    pub fn with_codec<D: TreeCodec>(self, codec: D) -> ModelCodec<T, D> {
        ModelCodec {
            config: self.config,
            codec,
            _model: PhantomData,
        }
    }

    pub fn config(&self) -> &ModelVersioningConfig {
        &self.config
    }

    /// Decode a tree of any supported version into `T`.
    pub fn from_value(&self, value: Value) -> Result<T> {
        let upgraded = DeserializationPipeline::new(&self.config).run(value)?;
        Ok(serde_json::from_value(Value::Object(upgraded.tree))?)
    }

    pub fn from_slice(&self, bytes: &[u8]) -> Result<T> {
        self.from_value(self.codec.decode(bytes)?)
    }

    pub fn from_str(&self, text: &str) -> Result<T> {
        self.from_slice(text.as_bytes())
    }

    /// Encode `value` into a tree at its resolved output version.
    pub fn to_value(&self, value: &T) -> Result<Value> {
        let tree = serde_json::to_value(value)?;
        let tree = SerializationPipeline::new(&self.config).run(tree, value.serialize_to_version())?;
        Ok(Value::Object(tree))
    }

    pub fn to_vec(&self, value: &T) -> Result<Vec<u8>> {
        Ok(self.codec.encode(&self.to_value(value)?)?)
    }

    pub fn to_string(&self, value: &T) -> Result<String> {
        Ok(String::from_utf8(self.to_vec(value)?)?)
    }
}

impl<T, C: Clone> Clone for ModelCodec<T, C> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            codec: self.codec.clone(),
            _model: PhantomData,
        }
    }
}

impl<T, C: fmt::Debug> fmt::Debug for ModelCodec<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCodec")
            .field("model", &std::any::type_name::<T>())
            .field("config", &self.config)
            .field("codec", &self.codec)
            .finish()
    }
}
