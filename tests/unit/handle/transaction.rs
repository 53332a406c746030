use super::*;

use crate::binding::binder::Binder;
use crate::config::RuntimeOpts;
use crate::native::inprocess::InProcessLibrary;

fn fixture() -> (Arc<InProcessLibrary>, Binder, ImageHandle) {
    let lib = InProcessLibrary::shared();
    let opts = RuntimeOpts {
        threads: Some(2),
        ..RuntimeOpts::default()
    };
    let binder = Binder::new(lib.clone(), opts).unwrap();
    let img = binder
        .call("black")
        .arg(16)
        .arg(8)
        .opt("bands", 3)
        .image()
        .unwrap();
    (lib, binder, img)
}

#[test]
fn new_fields_take_the_inferred_type() {
    let (_lib, binder, img) = fixture();
    let mut view = binder.transaction(&img).unwrap();
    view.set("title", "sunset").unwrap();
    view.set("delay", vec![40i64, 40]).unwrap();
    assert_eq!(view.get("title").unwrap(), Some(Value::from("sunset")));

    let out = view.commit().unwrap();
    assert_eq!(out.get("delay").unwrap(), Some(Value::IntArray(vec![40, 40])));
    assert_eq!(img.get("title").unwrap(), None);
}

#[test]
fn mistyped_set_leaves_view_open_and_unchanged() {
    let (_lib, binder, img) = fixture();
    let mut view = binder.transaction(&img).unwrap();
    view.set("page-height", 8).unwrap();

    let err = view.set("page-height", "tall").unwrap_err();
    match err {
        BindError::InvalidFieldType {
            field,
            expected,
            found,
        } => {
            assert_eq!(field, "page-height");
            assert_eq!(expected, "int");
            assert_eq!(found, "string");
        }
        other => panic!("expected InvalidFieldType, got {other:?}"),
    }
    assert_eq!(view.state(), ViewState::Open);
    assert_eq!(view.get("page-height").unwrap(), Some(Value::Int(8)));
}

#[test]
fn header_fields_keep_native_rules() {
    let (_lib, binder, img) = fixture();
    let mut view = binder.transaction(&img).unwrap();
    assert!(matches!(view.set("width", 3), Err(BindError::Native { .. })));
    view.set("xres", 2.5).unwrap();
    let out = view.commit().unwrap();
    assert_eq!(out.get("xres").unwrap(), Some(Value::Double(2.5)));
    assert_eq!(img.get("xres").unwrap(), Some(Value::Double(1.0)));
}

#[test]
fn remove_reports_whether_the_field_existed() {
    let (_lib, binder, img) = fixture();
    let tagged = binder
        .mutate(&img, |view| view.set("comment", "x"))
        .unwrap();

    let mut view = binder.transaction(&tagged).unwrap();
    assert!(view.remove("comment").unwrap());
    assert!(!view.remove("comment").unwrap());
    let out = view.commit().unwrap();
    assert_eq!(out.get("comment").unwrap(), None);
    assert_eq!(tagged.get("comment").unwrap(), Some(Value::from("x")));
}

#[test]
fn metadata_edits_share_pixels_and_pixel_writes_do_not() {
    let (lib, binder, img) = fixture();

    let retagged = binder.mutate(&img, |view| view.set("n", 1)).unwrap();
    assert!(lib.shares_pixels(&img, &retagged));

    let mut view = binder.transaction(&img).unwrap();
    view.apply(
        "draw_rect",
        &[vec![255.0].into(), Value::Int(0), Value::Int(0), Value::Int(4), Value::Int(4)],
        &BTreeMap::from([("fill".to_string(), Value::Bool(true))]),
    )
    .unwrap();
    let drawn = view.commit().unwrap();
    assert!(!lib.shares_pixels(&img, &drawn));
    assert!(lib.pixels(&img).unwrap().iter().all(|&v| v == 0));
    assert_eq!(lib.pixels(&drawn).unwrap()[..3], [255, 255, 255]);
}

#[test]
fn commit_refuses_an_aliased_duplicate() {
    let (_lib, binder, img) = fixture();
    let view = binder.transaction(&img).unwrap();
    let alias = view.duplicate.clone();
    assert!(matches!(view.commit(), Err(BindError::OutstandingAlias(1))));
    drop(alias);
    assert!(!img.is_borrowed());
}

#[test]
fn dropping_an_open_view_aborts() {
    let (lib, binder, img) = fixture();
    let live = lib.stats().live_objects;
    {
        let mut view = binder.transaction(&img).unwrap();
        view.set("scratch", true).unwrap();
        assert_eq!(lib.stats().live_objects, live + 1);
    }
    assert_eq!(lib.stats().live_objects, live);
    assert!(!img.is_borrowed());
    assert_eq!(img.get("scratch").unwrap(), None);
}

#[test]
fn in_place_ops_run_only_in_a_view() {
    let (_lib, binder, img) = fixture();
    let positional = [
        Value::from(vec![1.0]),
        Value::Int(0),
        Value::Int(0),
        Value::Int(1),
        Value::Int(1),
    ];
    let err = binder
        .invoke("draw_rect", &positional, &BTreeMap::new())
        .unwrap_err();
    assert!(matches!(err, BindError::RequiresTransaction(_)));

    let mut view = binder.transaction(&img).unwrap();
    let err = view.apply("invert", &[], &BTreeMap::new()).unwrap_err();
    assert!(matches!(err, BindError::Validation(_)));
    view.abort();
}
