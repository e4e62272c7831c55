//! The version tag: a plain string property stored beside the model's own
//! top-level properties.
//!
//! ```text
//! {"name": "x", "modelVersion": "1.0"}
//! ```

use serde_json::{Map, Value};

use crate::error::{Result, VersioningError};

/// Default JSON property carrying the version.
pub const DEFAULT_PROPERTY_NAME: &str = "modelVersion";

/// Remove `property_name` from `tree` and return its textual value.
///
/// Strings are returned as-is, numbers and booleans in their textual form.
/// `null`, empty strings, arrays and objects count as absent.
pub fn extract(tree: &mut Map<String, Value>, property_name: &str) -> Option<String> {
    match tree.shift_remove(property_name)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Set `property_name` to `version`, overwriting any existing value.
pub fn inject(tree: &mut Map<String, Value>, property_name: &str, version: &str) {
    tree.insert(property_name.to_string(), Value::String(version.to_string()));
}

/// True iff a suppression version is configured and equals `version`.
pub fn should_suppress(version: &str, suppression: Option<&str>) -> bool {
    suppression == Some(version)
}

/// The tag's name together with its defaulting and suppression policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag {
    property_name: String,
    default_version: Option<String>,
    suppress_version: Option<String>,
}

impl VersionTag {
    /// A tag stored under `property_name` with no default and no suppression.
    pub fn new(property_name: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
            default_version: None,
            suppress_version: None,
        }
    }

    /// Version assumed when an inbound document carries no tag.
    pub fn with_default(mut self, version: Option<String>) -> Self {
        self.default_version = non_empty(version);
        self
    }

    /// Version for which the tag is left out of outbound documents.
    pub fn with_suppression(mut self, version: Option<String>) -> Self {
        self.suppress_version = non_empty(version);
        self
    }

    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    pub fn default_version(&self) -> Option<&str> {
        self.default_version.as_deref()
    }

    pub fn suppress_version(&self) -> Option<&str> {
        self.suppress_version.as_deref()
    }

    /// Remove the tag from `tree` and return its value.
    pub fn extract(&self, tree: &mut Map<String, Value>) -> Option<String> {
        extract(tree, &self.property_name)
    }

    /// Remove the tag and resolve the source version, falling back to the
    /// configured default.
    pub fn source_version(&self, tree: &mut Map<String, Value>) -> Result<String> {
        self.resolve(self.extract(tree))
    }

    /// Source version for an already extracted tag value.
    pub fn resolve(&self, tagged: Option<String>) -> Result<String> {
        tagged
            .or_else(|| self.default_version.clone())
            .ok_or_else(|| VersioningError::MissingVersion {
                property: self.property_name.clone(),
            })
    }

    pub fn should_suppress(&self, version: &str) -> bool {
        should_suppress(version, self.suppress_version())
    }

    /// Stamp `version` into `tree` unless it is the suppressed version.
    /// Returns whether the tag was written.
    pub fn apply(&self, tree: &mut Map<String, Value>, version: &str) -> bool {
        if self.should_suppress(version) {
            return false;
        }
        inject(tree, &self.property_name, version);
        true
    }
}

impl Default for VersionTag {
    fn default() -> Self {
        Self::new(DEFAULT_PROPERTY_NAME)
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
