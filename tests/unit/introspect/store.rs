use super::*;

use crate::native::NativeLibrary;
use crate::native::inprocess::InProcessLibrary;
use crate::types::registry::TypeRegistryBuilder;

fn registry() -> TypeRegistry {
    let mut types = TypeRegistryBuilder::new();
    InProcessLibrary::new().register_types(&mut types);
    types.build()
}

fn load(json: &str) -> BindResult<DescriptorStore> {
    let feed = IntrospectionFeed::from_json(json)?;
    DescriptorStore::load(&feed, &registry())
}

#[test]
fn in_process_feed_loads() {
    let lib = InProcessLibrary::new();
    let store = DescriptorStore::load(&lib.introspect().unwrap(), &registry()).unwrap();

    assert!(store.contains("resize"));
    assert!(store.names().any(|n| n == "draw_rect"));
    let names = store.names().collect::<Vec<_>>();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);

    let max = store.get("max").unwrap();
    assert_eq!(max.return_arity(), 1);
    assert_eq!(max.optional_outputs().count(), 2);
}

#[test]
fn unregistered_tags_are_kept_as_not_implemented() {
    let lib = InProcessLibrary::new();
    let store = DescriptorStore::load(&lib.introspect().unwrap(), &registry()).unwrap();
    let missing = store.unimplemented_params();
    assert_eq!(missing.len(), 1);
    let (op, param, tag) = missing[0];
    assert_eq!((op, param, tag.as_str()), ("affine", "interpolate", "VipsInterpolate"));
}

#[test]
fn declared_defaults_become_host_values() {
    let store = load(
        r#"{"operations": [{"name": "join", "params": [
            {"name": "in", "type": "VipsArrayImage", "direction": "input", "required": true},
            {"name": "out", "type": "VipsImage", "direction": "output", "required": true},
            {"name": "background", "type": "VipsArrayDouble", "direction": "input", "default": [0, 255]}
        ]}]}"#,
    )
    .unwrap();
    let p = store.get("join").unwrap().param("background").unwrap().clone();
    assert_eq!(p.default, Some(Value::IntArray(vec![0, 255])));
    assert!(!p.required);
}

#[test]
fn bounds_default_open_ended() {
    let store = load(
        r#"{"operations": [{"name": "shift", "params": [
            {"name": "dx", "type": "gint", "direction": "input", "required": true, "min": -5}
        ]}]}"#,
    )
    .unwrap();
    let bounds = store.get("shift").unwrap().param("dx").unwrap().bounds.unwrap();
    assert_eq!(bounds.min, -5.0);
    assert_eq!(bounds.max, f64::INFINITY);
}

#[test]
fn malformed_feeds_are_introspection_errors() {
    let cases = [
        r#"{"operations": [{"name": "a", "params": []}, {"name": "a", "params": []}]}"#,
        r#"{"operations": [{"name": "a", "params": [
            {"name": "", "type": "gint", "direction": "input"}
        ]}]}"#,
        r#"{"operations": [{"name": "a", "params": [
            {"name": "x", "type": "gint", "direction": "input", "default": {"v": 1}}
        ]}]}"#,
        r#"{"operations": [{"name": "a", "params": [
            {"name": "x", "type": "gint", "direction": "input", "min": 3, "max": 1}
        ]}]}"#,
        r#"{"operations": [{"name": "a", "params": [
            {"name": "x", "type": "gint", "direction": "sideways"}
        ]}]}"#,
        "not json",
    ];
    for json in cases {
        assert!(
            matches!(load(json), Err(BindError::Introspection(_))),
            "feed accepted: {json}"
        );
    }
}
