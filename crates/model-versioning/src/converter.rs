use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::ConverterError;

/// Converts a model's JSON tree between two named versions.
///
/// `to_current` runs on read, upgrading a document from the version it was
/// written in to the model's current version. `to_target` runs on write,
/// downgrading the current shape to the version the caller asked for.
/// Both default to returning the tree untouched, so a converter only
/// implements the direction it serves.
///
/// Converters are shared by every document of a model type, possibly across
/// threads, and must not keep per-call state.
///
/// # Example
///
/// ```
/// use model_versioning::{ConverterError, ModelConverter};
/// use serde_json::{Map, Value};
///
/// struct RenameName;
///
/// impl ModelConverter for RenameName {
///     fn to_current(
///         &self,
///         mut tree: Map<String, Value>,
///         _from: &str,
///         _to: &str,
///     ) -> Result<Map<String, Value>, ConverterError> {
///         if let Some(name) = tree.shift_remove("name") {
///             tree.insert("fullName".into(), name);
///         }
///         Ok(tree)
///     }
/// }
/// ```
pub trait ModelConverter: Send + Sync {
    /// Upgrade `tree` from `from` to `to` (the current version).
    fn to_current(
        &self,
        tree: Map<String, Value>,
        from: &str,
        to: &str,
    ) -> Result<Map<String, Value>, ConverterError> {
        let _ = (from, to);
        Ok(tree)
    }

    /// Downgrade `tree` from `from` (the current version) to `to`.
    fn to_target(
        &self,
        tree: Map<String, Value>,
        from: &str,
        to: &str,
    ) -> Result<Map<String, Value>, ConverterError> {
        let _ = (from, to);
        Ok(tree)
    }

    /// Name used in logs and configuration errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<C: ModelConverter + ?Sized> ModelConverter for Arc<C> {
    fn to_current(
        &self,
        tree: Map<String, Value>,
        from: &str,
        to: &str,
    ) -> Result<Map<String, Value>, ConverterError> {
        (**self).to_current(tree, from, to)
    }

    fn to_target(
        &self,
        tree: Map<String, Value>,
        from: &str,
        to: &str,
    ) -> Result<Map<String, Value>, ConverterError> {
        (**self).to_target(tree, from, to)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

type ConvertFn =
    dyn Fn(Map<String, Value>, &str, &str) -> Result<Map<String, Value>, ConverterError> + Send + Sync;

/// A converter assembled from closures.
///
/// ```
/// use model_versioning::{FnConverter, ModelConverter};
/// use serde_json::{json, Map};
///
/// let converter = FnConverter::new("stamp").upgrade(|mut tree, from, _to| {
///     tree.insert("migratedFrom".into(), json!(from));
///     Ok(tree)
/// });
///
/// let tree = converter.to_current(Map::new(), "1.0", "2.0").unwrap();
/// assert_eq!(tree["migratedFrom"], json!("1.0"));
/// ```
pub struct FnConverter {
    name: String,
    upgrade: Option<Box<ConvertFn>>,
    downgrade: Option<Box<ConvertFn>>,
}

impl FnConverter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            upgrade: None,
            downgrade: None,
        }
    }

    /// Closure used for `to_current`.
    pub fn upgrade<F>(mut self, f: F) -> Self
    where
        F: Fn(Map<String, Value>, &str, &str) -> Result<Map<String, Value>, ConverterError>
            + Send
            + Sync
            + 'static,
    {
        self.upgrade = Some(Box::new(f));
        self
    }

    /// Closure used for `to_target`.
    pub fn downgrade<F>(mut self, f: F) -> Self
    where
        F: Fn(Map<String, Value>, &str, &str) -> Result<Map<String, Value>, ConverterError>
            + Send
            + Sync
            + 'static,
    {
        self.downgrade = Some(Box::new(f));
        self
    }
}

impl ModelConverter for FnConverter {
    fn to_current(
        &self,
        tree: Map<String, Value>,
        from: &str,
        to: &str,
    ) -> Result<Map<String, Value>, ConverterError> {
        match &self.upgrade {
            Some(f) => f(tree, from, to),
            None => Ok(tree),
        }
    }

    fn to_target(
        &self,
        tree: Map<String, Value>,
        from: &str,
        to: &str,
    ) -> Result<Map<String, Value>, ConverterError> {
        match &self.downgrade {
            Some(f) => f(tree, from, to),
            None => Ok(tree),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for FnConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnConverter")
            .field("name", &self.name)
            .field("upgrade", &self.upgrade.is_some())
            .field("downgrade", &self.downgrade.is_some())
            .finish()
    }
}
