//! Declarative conversion steps.
//!
//! Most schema changes are renames, removals and new fields with a default.
//! [`RuleStep`] expresses those as data, so they can live in a settings file
//! instead of code:
//!
//! ```toml
//! [[upgrade]]
//! from = "1.0"
//! to = "2.0"
//! rules = [
//!     { op = "rename", from = "name", to = "fullName" },
//!     { op = "default", field = "tags", value = [] },
//! ]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chain::ConversionStep;
use crate::error::ConverterError;

/// One edit applied to the top level of a tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FieldRule {
    /// Move `from` to `to`. No-op when `from` is absent.
    Rename { from: String, to: String },
    /// Drop `field`.
    Remove { field: String },
    /// Insert `value` when `field` is absent.
    Default { field: String, value: Value },
    /// Overwrite `field` with `value`.
    Set { field: String, value: Value },
}

impl FieldRule {
    fn apply(&self, tree: &mut Map<String, Value>) {
        match self {
            Self::Rename { from, to } => {
                if let Some(value) = tree.shift_remove(from) {
                    tree.insert(to.clone(), value);
                }
            }
            Self::Remove { field } => {
                tree.shift_remove(field);
            }
            Self::Default { field, value } => {
                if !tree.contains_key(field) {
                    tree.insert(field.clone(), value.clone());
                }
            }
            Self::Set { field, value } => {
                tree.insert(field.clone(), value.clone());
            }
        }
    }
}

/// A conversion step made of an ordered list of [`FieldRule`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleStep {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub rules: Vec<FieldRule>,
}

impl RuleStep {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rename(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rule(FieldRule::Rename {
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn remove(self, field: impl Into<String>) -> Self {
        self.rule(FieldRule::Remove {
            field: field.into(),
        })
    }

    pub fn default_value(self, field: impl Into<String>, value: Value) -> Self {
        self.rule(FieldRule::Default {
            field: field.into(),
            value,
        })
    }
}

impl ConversionStep for RuleStep {
    fn source_version(&self) -> &str {
        &self.from
    }

    fn target_version(&self) -> &str {
        &self.to
    }

    fn apply(&self, mut tree: Map<String, Value>) -> Result<Map<String, Value>, ConverterError> {
        for rule in &self.rules {
            rule.apply(&mut tree);
        }
        Ok(tree)
    }
}
