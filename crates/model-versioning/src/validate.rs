use crate::config::{AccessorKind, OverrideProperty, PropertyDescriptor};
use crate::error::ConfigurationError;

/// Registration-time checks on a model's versioning setup.
pub struct ConfigValidator;

impl ConfigValidator {
    /// The current version and tag property name must be non-empty.
    pub fn check_versions(current_version: &str, property_name: &str) -> Result<(), ConfigurationError> {
        if current_version.is_empty() {
            return Err(ConfigurationError::MissingCurrentVersion);
        }
        if property_name.is_empty() {
            return Err(ConfigurationError::EmptyPropertyName);
        }
        Ok(())
    }

    /// Find the single property carrying the override marker.
    ///
    /// Zero candidates is fine. More than one, a non-string candidate, or an
    /// accessor without a getter is a configuration error.
    pub fn find_override_property(
        properties: &[PropertyDescriptor],
    ) -> Result<Option<OverrideProperty>, ConfigurationError> {
        let mut found: Option<&PropertyDescriptor> = None;

        for property in properties.iter().filter(|p| p.override_marker) {
            if let Some(first) = found {
                return Err(ConfigurationError::MultipleOverrideProperties {
                    first: first.name.clone(),
                    second: property.name.clone(),
                });
            }
            if !property.property_type.is_string() {
                return Err(ConfigurationError::OverrideNotString {
                    property: property.name.clone(),
                    found: property.property_type.to_string(),
                });
            }
            if property.accessor == AccessorKind::Method && !property.has_getter {
                return Err(ConfigurationError::OverrideWithoutGetter {
                    property: property.name.clone(),
                });
            }
            found = Some(property);
        }

        Ok(found.map(|p| OverrideProperty::new(p.name.clone(), p.default_to_source)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PropertyType;

    #[test]
    fn empty_versions_rejected() {
        assert_eq!(
            ConfigValidator::check_versions("", "modelVersion"),
            Err(ConfigurationError::MissingCurrentVersion)
        );
        assert_eq!(
            ConfigValidator::check_versions("1.0", ""),
            Err(ConfigurationError::EmptyPropertyName)
        );
        assert!(ConfigValidator::check_versions("1.0", "v").is_ok());
    }

    #[test]
    fn no_candidates() {
        let props = [PropertyDescriptor::field("name", PropertyType::String)];
        assert_eq!(ConfigValidator::find_override_property(&props), Ok(None));
    }

    #[test]
    fn single_candidate() {
        let props = [
            PropertyDescriptor::field("name", PropertyType::String),
            PropertyDescriptor::field("target", PropertyType::OptionalString)
                .serialize_to_version()
                .default_to_source(true),
        ];
        let found = ConfigValidator::find_override_property(&props).unwrap().unwrap();
        assert_eq!(found.name(), "target");
        assert!(found.default_to_source());
    }

    #[test]
    fn two_candidates_rejected() {
        let props = [
            PropertyDescriptor::field("a", PropertyType::String).serialize_to_version(),
            PropertyDescriptor::method("b", PropertyType::String, true).serialize_to_version(),
        ];
        assert_eq!(
            ConfigValidator::find_override_property(&props),
            Err(ConfigurationError::MultipleOverrideProperties {
                first: "a".into(),
                second: "b".into(),
            })
        );
    }

    #[test]
    fn non_string_rejected() {
        let props = [PropertyDescriptor::field("v", PropertyType::Other("u32".into())).serialize_to_version()];
        let err = ConfigValidator::find_override_property(&props).unwrap_err();
        assert_eq!(
            err.to_string(),
            "override property 'v' must be a String or Option<String>, found u32"
        );
    }

    #[test]
    fn accessor_without_getter_rejected() {
        let props = [PropertyDescriptor::method("v", PropertyType::String, false).serialize_to_version()];
        assert_eq!(
            ConfigValidator::find_override_property(&props),
            Err(ConfigurationError::OverrideWithoutGetter {
                property: "v".into()
            })
        );
    }
}
