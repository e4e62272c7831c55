use serde_json::{Map, Value};

use crate::config::ModelVersioningConfig;
use crate::error::{json_kind, Result, VersioningError};

/// Write path: resolve the target version, downgrade from the current
/// version, then tag (or not) the result.
#[derive(Debug, Clone, Copy)]
pub struct SerializationPipeline<'a> {
    config: &'a ModelVersioningConfig,
}

impl<'a> SerializationPipeline<'a> {
    pub fn new(config: &'a ModelVersioningConfig) -> Self {
        Self { config }
    }

    /// Resolve the output version.
    ///
    /// An instance override wins, then the default serialize version, then
    /// the current version. An override that is set but empty means the
    /// current version.
    pub fn target_version<'v>(&'v self, requested: Option<&'v str>) -> &'v str {
        match requested {
            Some("") => self.config.current_version(),
            Some(version) => version,
            None => self.config.default_target_version(),
        }
    }

    /// Remove the override property from `tree` and resolve the output
    /// version.
    ///
    /// `requested` is the instance's override value. When it is `None`, the
    /// string found under the override property in `tree` is used instead.
    pub fn resolve_target(&self, tree: &mut Map<String, Value>, requested: Option<&str>) -> String {
        let encoded_override = self
            .config
            .override_property()
            .and_then(|p| tree.shift_remove(p.name()))
            .and_then(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            });

        self.target_version(requested.or(encoded_override.as_deref()))
            .to_string()
    }

    /// Run the write path on a tree encoded from a current-version object.
    ///
    /// The override property is removed before conversion and never
    /// reaches the output; see [`resolve_target`](Self::resolve_target).
    pub fn run(&self, tree: Value, requested: Option<&str>) -> Result<Map<String, Value>> {
        let config = self.config;

        let mut tree = match tree {
            Value::Object(map) => map,
            other => {
                return Err(VersioningError::InvalidShape {
                    found: json_kind(&other),
                })
            }
        };

        let target = self.resolve_target(&mut tree, requested);
        let current = config.current_version();

        if let Some(converter) = config.to_target_converter().filter(|_| config.needs_downgrade(&target)) {
            tracing::debug!(
                model = config.model(),
                from = current,
                to = %target,
                converter = converter.name(),
                "converting to target version"
            );
            tree = converter.to_target(tree, current, &target)?;
        }

        if !config.tag().apply(&mut tree, &target) {
            tracing::trace!(model = config.model(), version = %target, "version tag suppressed");
        }

        Ok(tree)
    }
}

/// Run the write path on `tree` with `config`.
pub fn downgrade(
    tree: Value,
    config: &ModelVersioningConfig,
    requested: Option<&str>,
) -> Result<Map<String, Value>> {
    SerializationPipeline::new(config).run(tree, requested)
}
