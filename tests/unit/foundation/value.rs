use super::*;

#[test]
fn json_literals_map_to_host_values() {
    let v = |s: &str| Value::from_json(&serde_json::from_str(s).unwrap());
    assert_eq!(v("true"), Some(Value::Bool(true)));
    assert_eq!(v("3"), Some(Value::Int(3)));
    assert_eq!(v("0.5"), Some(Value::Double(0.5)));
    assert_eq!(v("\"lanczos3\""), Some(Value::Str("lanczos3".to_string())));
    assert_eq!(v("[1, 2]"), Some(Value::IntArray(vec![1, 2])));
    assert_eq!(v("[1, 2.5]"), Some(Value::DoubleArray(vec![1.0, 2.5])));
    assert_eq!(v("null"), None);
    assert_eq!(v("{\"a\": 1}"), None);
    assert_eq!(v("[1, \"x\"]"), None);
}

#[test]
fn int_widens_to_double_but_not_back() {
    assert_eq!(Value::Int(4).as_f64(), Some(4.0));
    assert_eq!(Value::Double(4.0).as_i64(), None);
}

#[test]
fn display_quotes_strings_and_lists_arrays() {
    assert_eq!(Value::from("nearest").to_string(), "\"nearest\"");
    assert_eq!(Value::from(vec![1.0, 2.5]).to_string(), "[1, 2.5]");
}

#[test]
fn target_clones_share_one_buffer() {
    let target = Target::new();
    let alias = target.clone();
    alias.write_all(b"abc");
    assert_eq!(target.bytes(), b"abc");
    assert_eq!(target, alias);
    assert_ne!(target, Target::new());
}

#[test]
fn blob_debug_reports_length_only() {
    let blob = Blob::new(vec![0u8; 12]);
    assert_eq!(format!("{blob:?}"), "Blob(12 bytes)");
    assert_eq!(blob.len(), 12);
}
