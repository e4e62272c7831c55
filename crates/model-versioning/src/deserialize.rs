use serde_json::{Map, Value};

use crate::config::ModelVersioningConfig;
use crate::error::{json_kind, Result, VersioningError};

/// Output of the read path: a tree in the current version's shape, ready
/// for typed decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Upgraded {
    /// Tree without the version tag.
    pub tree: Map<String, Value>,
    /// Version the document was read as.
    pub source_version: String,
    /// Whether the version came from the document's own tag rather than
    /// the default.
    pub tagged: bool,
    /// Whether the `to_current` converter ran.
    pub converted: bool,
}

/// Read path: strip the tag, upgrade to the current version, stamp the
/// override property.
#[derive(Debug, Clone, Copy)]
pub struct DeserializationPipeline<'a> {
    config: &'a ModelVersioningConfig,
}

impl<'a> DeserializationPipeline<'a> {
    pub fn new(config: &'a ModelVersioningConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, value: Value) -> Result<Upgraded> {
        let config = self.config;

        let mut tree = match value {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(VersioningError::InvalidShape {
                    found: json_kind(&other),
                })
            }
        };

        let extracted = config.tag().extract(&mut tree);
        let tagged = extracted.is_some();
        let source_version = config.tag().resolve(extracted)?;
        let current = config.current_version();

        let mut converted = false;
        if let Some(converter) = config.to_current_converter().filter(|_| config.needs_upgrade(&source_version)) {
            tracing::debug!(
                model = config.model(),
                from = %source_version,
                to = current,
                converter = converter.name(),
                "converting to current version"
            );
            tree = converter.to_current(tree, &source_version, current)?;
            converted = true;
        } else {
            tracing::trace!(model = config.model(), version = %source_version, "no upgrade needed");
        }

        if let Some(property) = config.override_property().filter(|p| p.default_to_source()) {
            tree.insert(property.name().to_string(), Value::String(source_version.clone()));
        }

        Ok(Upgraded {
            tree,
            source_version,
            tagged,
            converted,
        })
    }
}

/// Run the read path on `value` with `config`.
pub fn upgrade(value: Value, config: &ModelVersioningConfig) -> Result<Upgraded> {
    DeserializationPipeline::new(config).run(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PropertyDescriptor, PropertyType};
    use crate::converter::FnConverter;
    use crate::error::ConverterError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn rename_name() -> FnConverter {
        FnConverter::new("rename").upgrade(|mut tree, _, _| {
            if let Some(v) = tree.shift_remove("name") {
                tree.insert("fullName".into(), v);
            }
            Ok(tree)
        })
    }

    #[test]
    fn upgrades_old_document() {
        let config = ModelVersioningConfig::builder("2.0")
            .to_current(rename_name())
            .build()
            .unwrap();

        let out = upgrade(json!({"modelVersion": "1.0", "name": "x"}), &config).unwrap();
        assert_eq!(Value::Object(out.tree), json!({"fullName": "x"}));
        assert_eq!(out.source_version, "1.0");
        assert!(out.tagged);
        assert!(out.converted);
    }

    #[test]
    fn current_document_passes_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let config = ModelVersioningConfig::builder("2.0")
            .to_current(FnConverter::new("count").upgrade(move |tree, _, _| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(tree)
            }))
            .build()
            .unwrap();

        let out = upgrade(json!({"modelVersion": "2.0", "fullName": "x"}), &config).unwrap();
        assert_eq!(Value::Object(out.tree), json!({"fullName": "x"}));
        assert!(!out.converted);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn always_convert_runs_on_current() {
        let config = ModelVersioningConfig::builder("2.0")
            .always_convert(true)
            .to_current(FnConverter::new("mark").upgrade(|mut tree, from, to| {
                tree.insert("seen".into(), json!([from, to]));
                Ok(tree)
            }))
            .build()
            .unwrap();

        let out = upgrade(json!({"modelVersion": "2.0"}), &config).unwrap();
        assert_eq!(out.tree["seen"], json!(["2.0", "2.0"]));
    }

    #[test]
    fn without_converter_old_data_is_kept() {
        let config = ModelVersioningConfig::builder("2.0").build().unwrap();
        let out = upgrade(json!({"modelVersion": "1.0", "name": "x"}), &config).unwrap();
        assert_eq!(Value::Object(out.tree), json!({"name": "x"}));
        assert!(!out.converted);
    }

    #[test]
    fn null_becomes_empty_object() {
        let config = ModelVersioningConfig::builder("2.0")
            .default_deserialize_version("2.0")
            .build()
            .unwrap();
        let out = upgrade(Value::Null, &config).unwrap();
        assert!(out.tree.is_empty());
        assert_eq!(out.source_version, "2.0");
    }

    #[test]
    fn non_object_rejected() {
        let config = ModelVersioningConfig::builder("2.0").build().unwrap();
        for value in [json!([]), json!("1.0"), json!(4)] {
            let err = upgrade(value, &config).unwrap_err();
            assert!(matches!(err, VersioningError::InvalidShape { .. }), "{err}");
        }
    }

    #[test]
    fn missing_tag_without_default() {
        let config = ModelVersioningConfig::builder("2.0").build().unwrap();
        let err = upgrade(json!({}), &config).unwrap_err();
        assert!(matches!(err, VersioningError::MissingVersion { .. }));
    }

    #[test]
    fn missing_tag_with_default() {
        let config = ModelVersioningConfig::builder("2.0")
            .default_deserialize_version("1.0")
            .to_current(rename_name())
            .build()
            .unwrap();
        let out = upgrade(json!({"name": "x"}), &config).unwrap();
        assert_eq!(out.source_version, "1.0");
        assert!(!out.tagged);
        assert_eq!(Value::Object(out.tree), json!({"fullName": "x"}));
    }

    #[test]
    fn custom_property_name() {
        let config = ModelVersioningConfig::builder("2")
            .property_name("_v")
            .build()
            .unwrap();
        let out = upgrade(json!({"_v": "2", "modelVersion": "kept"}), &config).unwrap();
        assert_eq!(Value::Object(out.tree), json!({"modelVersion": "kept"}));
    }

    #[test]
    fn stamps_source_version_after_conversion() {
        let config = ModelVersioningConfig::builder("2.0")
            .to_current(FnConverter::new("check").upgrade(|tree, from, to| {
                if tree.contains_key("target") {
                    return Err(ConverterError::new(from, to, "stamped too early"));
                }
                Ok(tree)
            }))
            .property(
                PropertyDescriptor::field("target", PropertyType::OptionalString)
                    .serialize_to_version()
                    .default_to_source(true),
            )
            .build()
            .unwrap();

        let out = upgrade(json!({"modelVersion": "1.0"}), &config).unwrap();
        assert_eq!(out.tree["target"], json!("1.0"));
    }

    #[test]
    fn no_stamp_unless_enabled() {
        let config = ModelVersioningConfig::builder("2.0")
            .property(PropertyDescriptor::field("target", PropertyType::OptionalString).serialize_to_version())
            .build()
            .unwrap();
        let out = upgrade(json!({"modelVersion": "1.0"}), &config).unwrap();
        assert!(!out.tree.contains_key("target"));
    }

    #[test]
    fn converter_error_propagates_verbatim() {
        let config = ModelVersioningConfig::builder("2.0")
            .to_current(FnConverter::new("fail").upgrade(|tree, from, to| {
                Err(ConverterError::new(from, to, "bad data").with_partial(tree))
            }))
            .build()
            .unwrap();

        let err = upgrade(json!({"modelVersion": "1.0", "a": 1}), &config).unwrap_err();
        match err {
            VersioningError::Converter(e) => {
                assert_eq!(e.reason, "bad data");
                assert_eq!(e.partial.map(Value::Object), Some(json!({"a": 1})));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
