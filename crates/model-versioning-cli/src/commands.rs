use std::io::Read;

use model_versioning::{
    downgrade, upgrade, ConverterRegistry, Direction, JsonCodec, ModelSettings, ModelVersioningConfig,
    SerializationPipeline, TreeCodec,
};
use serde_json::Value;

type Result<T = ()> = std::result::Result<T, Box<dyn std::error::Error>>;

fn load_model(path: &str) -> Result<(ModelSettings, ModelVersioningConfig)> {
    let settings = ModelSettings::load(path)?;
    let config = settings.clone().build(&ConverterRegistry::new())?;
    Ok((settings, config))
}

fn read_input(input: Option<&str>) -> Result<Value> {
    let bytes = match input {
        Some(path) => std::fs::read(path).map_err(|e| format!("{path}: {e}"))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };
    Ok(JsonCodec::compact().decode(&bytes)?)
}

/// Read `value` at whatever version it carries and write it at `to`.
pub fn convert_value(config: &ModelVersioningConfig, value: Value, to: Option<&str>) -> Result<Value> {
    let upgraded = upgrade(value, config)?;
    tracing::info!(
        from = %upgraded.source_version,
        current = config.current_version(),
        converted = upgraded.converted,
        "document read"
    );
    let tree = downgrade(Value::Object(upgraded.tree), config, to)?;
    Ok(Value::Object(tree))
}

/// `modelver convert <model> [input]` — Convert a document between versions.
pub fn convert(model: &str, input: Option<&str>, to: Option<&str>, pretty: bool) -> Result {
    let (_, config) = load_model(model)?;
    let value = read_input(input)?;
    let out = convert_value(&config, value, to)?;

    let codec = if pretty {
        JsonCodec::pretty()
    } else {
        JsonCodec::compact()
    };
    println!("{}", String::from_utf8(codec.encode(&out)?)?);
    Ok(())
}

/// Summary of what reading a document would do.
#[derive(Debug, PartialEq, Eq)]
pub struct Inspection {
    pub tagged: Option<String>,
    pub source_version: String,
    pub would_convert: bool,
    pub output_version: String,
    pub output_tagged: bool,
}

/// Run the read path on `value` and resolve the version the write path
/// would pick for the result.
pub fn inspect_value(config: &ModelVersioningConfig, value: Value) -> Result<Inspection> {
    let mut upgraded = upgrade(value, config)?;
    let output_version = SerializationPipeline::new(config).resolve_target(&mut upgraded.tree, None);

    Ok(Inspection {
        tagged: upgraded.tagged.then(|| upgraded.source_version.clone()),
        output_tagged: !config.tag().should_suppress(&output_version),
        source_version: upgraded.source_version,
        would_convert: upgraded.converted,
        output_version,
    })
}

/// `modelver inspect <model> [input]` — Show a document's version handling.
pub fn inspect(model: &str, input: Option<&str>) -> Result {
    let (_, config) = load_model(model)?;
    let value = read_input(input)?;
    let report = inspect_value(&config, value)?;

    println!("Model: {} (current version {})", config.model(), config.current_version());
    match &report.tagged {
        Some(v) => println!("  {:<16} {v}", "Tagged version:"),
        None => println!("  {:<16} (none, default {})", "Tagged version:", report.source_version),
    }
    println!(
        "  {:<16} {}",
        "Upgrade:",
        if report.would_convert { "yes" } else { "no" }
    );
    println!(
        "  {:<16} {}{}",
        "Writes as:",
        report.output_version,
        if report.output_tagged { "" } else { " (untagged)" }
    );
    Ok(())
}

/// Problems found in a model definition's rule chains.
pub fn check_settings(settings: &ModelSettings, config: &ModelVersioningConfig) -> Vec<String> {
    let chain = settings.rule_chain();
    let current = config.current_version();
    let mut problems = Vec::new();

    for (direction, version) in settings.rule_versions() {
        if version == current {
            continue;
        }
        let result = match direction {
            Direction::Upgrade if settings.to_current_converter.is_none() => {
                chain.validate_path(direction, &version, current)
            }
            Direction::Downgrade if settings.to_target_converter.is_none() => {
                chain.validate_path(direction, current, &version)
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            problems.push(e.reason);
        }
    }
    problems
}

/// `modelver check <model>` — Validate a model definition.
pub fn check(model: &str) -> Result {
    let (settings, config) = load_model(model)?;
    let problems = check_settings(&settings, &config);

    println!("Model: {} (current version {})", config.model(), config.current_version());
    println!("  {:<16} {}", "Tag property:", config.property_name());
    if let Some(p) = config.override_property() {
        println!("  {:<16} {}", "Override:", p.name());
    }
    println!("  {:<16} {}", "Rule steps:", settings.upgrade.len() + settings.downgrade.len());

    if problems.is_empty() {
        println!("  OK");
        return Ok(());
    }
    for problem in &problems {
        println!("  ! {problem}");
    }
    Err(format!("{} problem(s) found", problems.len()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_versioning::VersioningError;
    use serde_json::json;
    use std::io::Write;

    const PERSON: &str = r#"
model = "Person"
current_version = "3.0"

[override_property]
name = "targetVersion"
default_to_source = true

[[upgrade]]
from = "1.0"
to = "2.0"
rules = [{ op = "rename", from = "name", to = "fullName" }]

[[upgrade]]
from = "2.0"
to = "3.0"
rules = [{ op = "default", field = "tags", value = [] }]

[[downgrade]]
from = "3.0"
to = "2.0"
rules = [{ op = "remove", field = "tags" }]

[[downgrade]]
from = "2.0"
to = "1.0"
rules = [{ op = "rename", from = "fullName", to = "name" }]
"#;

    fn person() -> (ModelSettings, ModelVersioningConfig) {
        let settings = ModelSettings::from_toml(PERSON).unwrap();
        let config = settings.clone().build(&ConverterRegistry::new()).unwrap();
        (settings, config)
    }

    #[test]
    fn convert_keeps_source_version_by_default() {
        let (_, config) = person();
        let out = convert_value(&config, json!({"modelVersion": "1.0", "name": "x"}), None).unwrap();
        assert_eq!(out, json!({"name": "x", "modelVersion": "1.0"}));
    }

    #[test]
    fn convert_to_explicit_version() {
        let (_, config) = person();
        let out = convert_value(&config, json!({"modelVersion": "1.0", "name": "x"}), Some("3.0")).unwrap();
        assert_eq!(out, json!({"fullName": "x", "tags": [], "modelVersion": "3.0"}));

        let out = convert_value(&config, json!({"modelVersion": "3.0", "fullName": "x", "tags": []}), Some("2.0"))
            .unwrap();
        assert_eq!(out, json!({"fullName": "x", "modelVersion": "2.0"}));
    }

    #[test]
    fn inspect_reports_plan() {
        let (_, config) = person();
        let report = inspect_value(&config, json!({"modelVersion": "1.0"})).unwrap();
        assert_eq!(
            report,
            Inspection {
                tagged: Some("1.0".into()),
                source_version: "1.0".into(),
                would_convert: true,
                output_version: "1.0".into(),
                output_tagged: true,
            }
        );
    }

    #[test]
    fn inspect_reports_pipeline_errors() {
        let (_, config) = person();
        let err = inspect_value(&config, json!({})).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VersioningError>(),
            Some(VersioningError::MissingVersion { .. })
        ));
        let err = inspect_value(&config, json!([1])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VersioningError>(),
            Some(VersioningError::InvalidShape { found: "array" })
        ));
    }

    #[test]
    fn inspect_and_convert_agree_on_carried_override() {
        let text = PERSON.replace("default_to_source = true", "default_to_source = false");
        let settings = ModelSettings::from_toml(&text).unwrap();
        let config = settings.build(&ConverterRegistry::new()).unwrap();
        let doc = json!({"modelVersion": "2.0", "fullName": "x", "targetVersion": "1.0"});

        let report = inspect_value(&config, doc.clone()).unwrap();
        assert_eq!(report.output_version, "1.0");
        assert!(report.would_convert);

        let out = convert_value(&config, doc, None).unwrap();
        assert_eq!(out, json!({"name": "x", "modelVersion": "1.0"}));
    }

    #[test]
    fn check_accepts_complete_chains() {
        let (settings, config) = person();
        assert!(check_settings(&settings, &config).is_empty());
    }

    #[test]
    fn check_reports_gaps() {
        let text = PERSON.replace("from = \"2.0\"\nto = \"3.0\"", "from = \"2.5\"\nto = \"3.0\"");
        let settings = ModelSettings::from_toml(&text).unwrap();
        let config = settings.clone().build(&ConverterRegistry::new()).unwrap();
        let problems = check_settings(&settings, &config);
        assert!(!problems.is_empty());
        assert!(problems.iter().all(|p| p.starts_with("upgrade")), "{problems:?}");
    }

    #[test]
    fn reads_model_and_document_from_files() {
        let mut model = tempfile::NamedTempFile::new().unwrap();
        model.write_all(PERSON.as_bytes()).unwrap();
        let mut doc = tempfile::NamedTempFile::new().unwrap();
        doc.write_all(br#"{"modelVersion":"2.0","fullName":"x"}"#).unwrap();

        let model_path = model.path().to_str().unwrap();
        let (_, config) = load_model(model_path).unwrap();
        let value = read_input(doc.path().to_str()).unwrap();
        let out = convert_value(&config, value, None).unwrap();
        assert_eq!(out, json!({"fullName": "x", "modelVersion": "2.0"}));
    }
}
