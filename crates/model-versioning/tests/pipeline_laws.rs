//! Behavioral laws of the read and write paths.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use model_versioning::{
    downgrade, upgrade, ConverterError, FnConverter, ModelVersioningConfig, PropertyDescriptor,
    PropertyType, VersioningError,
};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn counting_upgrade(calls: Arc<AtomicUsize>) -> FnConverter {
    FnConverter::new("counting").upgrade(move |tree, _, _| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(tree)
    })
}

fn version_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["1.0", "1.1", "2.0", "3.0"]).prop_map(str::to_string)
}

fn body_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..6).prop_map(|fields| {
        fields
            .into_iter()
            .filter(|(k, _)| k != "target")
            .map(|(k, v)| (k, json!(v)))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn current_version_passes_through(body in body_strategy()) {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = ModelVersioningConfig::builder("2.0")
            .to_current(counting_upgrade(calls.clone()))
            .build()
            .unwrap();

        let mut tagged = body.clone();
        tagged.insert("modelVersion".into(), json!("2.0"));

        let out = upgrade(Value::Object(tagged), &config).unwrap();
        prop_assert_eq!(out.tree, body);
        prop_assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn old_version_converts_exactly_once(body in body_strategy(), source in version_strategy()) {
        prop_assume!(source != "2.0");
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let record = seen.clone();
        let config = ModelVersioningConfig::builder("2.0")
            .to_current(FnConverter::new("record").upgrade(move |tree, from, to| {
                record.lock().unwrap().push((tree.clone(), from.to_string(), to.to_string()));
                Ok(tree)
            }))
            .build()
            .unwrap();

        let mut tagged = body.clone();
        tagged.insert("modelVersion".into(), json!(source.clone()));
        upgrade(Value::Object(tagged), &config).unwrap();

        let seen = seen.lock().unwrap();
        prop_assert_eq!(seen.len(), 1);
        prop_assert_eq!(&seen[0], &(body, source, "2.0".to_string()));
    }

    #[test]
    fn round_trip_at_current_version(body in body_strategy()) {
        let config = ModelVersioningConfig::builder("2.0")
            .to_current(FnConverter::new("id-up"))
            .to_target(FnConverter::new("id-down"))
            .build()
            .unwrap();

        let written = downgrade(Value::Object(body.clone()), &config, None).unwrap();
        prop_assert_eq!(&written["modelVersion"], &json!("2.0"));

        let read = upgrade(Value::Object(written), &config).unwrap();
        prop_assert_eq!(read.tree, body);
    }

    #[test]
    fn target_version_precedence(
        instance in proptest::option::of(version_strategy()),
        default in proptest::option::of(version_strategy()),
    ) {
        let mut builder = ModelVersioningConfig::builder("3.0").property(
            PropertyDescriptor::field("target", PropertyType::OptionalString).serialize_to_version(),
        );
        if let Some(d) = &default {
            builder = builder.default_serialize_version(d.clone());
        }
        let config = builder.build().unwrap();

        let mut tree = Map::new();
        if let Some(v) = &instance {
            tree.insert("target".into(), json!(v));
        }
        let out = downgrade(Value::Object(tree), &config, None).unwrap();

        let expected = instance.or(default).unwrap_or_else(|| "3.0".to_string());
        prop_assert_eq!(&out["modelVersion"], &json!(expected));
        prop_assert!(!out.contains_key("target"));
    }

    #[test]
    fn suppressed_version_has_no_tag(always in any::<bool>(), body in body_strategy()) {
        let config = ModelVersioningConfig::builder("2.0")
            .suppress_version("2.0")
            .always_convert(always)
            .to_target(FnConverter::new("id-down"))
            .build()
            .unwrap();

        let out = downgrade(Value::Object(body.clone()), &config, None).unwrap();
        prop_assert!(!out.contains_key("modelVersion"));
        prop_assert_eq!(out, body);
    }
}

#[test]
fn missing_tag_law() {
    let strict = ModelVersioningConfig::builder("2.0").build().unwrap();
    let err = upgrade(json!({}), &strict).unwrap_err();
    assert!(matches!(err, VersioningError::MissingVersion { .. }));

    let lenient = ModelVersioningConfig::builder("2.0")
        .default_deserialize_version("1.0")
        .to_current(FnConverter::new("mark").upgrade(|mut tree, from, _| {
            tree.insert("from".into(), json!(from));
            Ok(tree)
        }))
        .build()
        .unwrap();
    let out = upgrade(json!({}), &lenient).unwrap();
    assert_eq!(out.source_version, "1.0");
    assert_eq!(out.tree["from"], json!("1.0"));
}

#[test]
fn scenario_upgrade_renames_field() {
    let config = ModelVersioningConfig::builder("2.0")
        .property_name("modelVersion")
        .to_current(FnConverter::new("name->fullName").upgrade(|mut tree, _, _| {
            if let Some(v) = tree.shift_remove("name") {
                tree.insert("fullName".into(), v);
            }
            Ok(tree)
        }))
        .build()
        .unwrap();

    let out = upgrade(json!({"modelVersion": "1.0", "name": "x"}), &config).unwrap();
    assert_eq!(Value::Object(out.tree), json!({"fullName": "x"}));
}

#[test]
fn scenario_downgrade_with_default_serialize_version() {
    let config = ModelVersioningConfig::builder("2.0")
        .default_serialize_version("1.0")
        .to_target(FnConverter::new("fullName->name").downgrade(|mut tree, _, _| {
            if let Some(v) = tree.shift_remove("fullName") {
                tree.insert("name".into(), v);
            }
            Ok(tree)
        }))
        .build()
        .unwrap();

    let out = downgrade(json!({"fullName": "x"}), &config, None).unwrap();
    assert_eq!(
        serde_json::to_string(&out).unwrap(),
        r#"{"name":"x","modelVersion":"1.0"}"#
    );
}

#[test]
fn scenario_suppressed_current_version() {
    let config = ModelVersioningConfig::builder("2.0")
        .suppress_version("2.0")
        .build()
        .unwrap();
    let out = downgrade(json!({"fullName": "x"}), &config, None).unwrap();
    assert_eq!(Value::Object(out), json!({"fullName": "x"}));
}

#[test]
fn converter_error_is_all_or_nothing() {
    let config = ModelVersioningConfig::builder("2.0")
        .to_current(FnConverter::new("half").upgrade(|mut tree, from, to| {
            tree.insert("halfway".into(), json!(true));
            Err(ConverterError::new(from, to, "gave up").with_partial(tree))
        }))
        .build()
        .unwrap();

    let err = upgrade(json!({"modelVersion": "1.0"}), &config).unwrap_err();
    let VersioningError::Converter(err) = err else {
        panic!("expected converter error");
    };
    assert_eq!(err.partial.unwrap()["halfway"], json!(true));
}
