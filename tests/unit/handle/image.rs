use super::*;

use crate::foundation::value::NativeValue;
use crate::native::inprocess::InProcessLibrary;
use crate::native::{NativeArgs, NativeLibrary};
use crate::types::registry::TypeRegistryBuilder;

fn fixture() -> (Arc<InProcessLibrary>, ImageHandle) {
    let lib = InProcessLibrary::shared();
    let mut types = TypeRegistryBuilder::new();
    lib.register_types(&mut types);
    let ctx = Arc::new(HandleContext::new(lib.clone(), types.build()));

    let mut args = NativeArgs::new();
    args.push("width", NativeValue::Int(8));
    args.push("height", NativeValue::Int(6));
    args.push("bands", NativeValue::Int(3));
    let mut out = lib.call("black", &args).unwrap();
    let Some(NativeValue::Object(id)) = out.remove("out") else {
        panic!("black did not produce an object");
    };
    (lib, ImageHandle::adopt(ctx, id))
}

#[test]
fn last_clone_releases_exactly_once() {
    let (lib, img) = fixture();
    let clones = (0..4).map(|_| img.clone()).collect::<Vec<_>>();
    assert_eq!(img.ref_count(), 5);
    assert!(clones.iter().all(|c| c.ptr_eq(&img)));

    drop(img);
    assert_eq!(lib.stats().releases, 0);
    drop(clones);

    let stats = lib.stats();
    assert_eq!(stats.releases, 1);
    assert_eq!(stats.invalid_releases, 0);
    assert_eq!(stats.live_objects, 0);
}

#[test]
fn header_fields_read_back_as_host_values() {
    let (_lib, img) = fixture();
    assert_eq!(img.width().unwrap(), 8);
    assert_eq!(img.height().unwrap(), 6);
    assert_eq!(img.bands().unwrap(), 3);
    assert_eq!(img.get("xres").unwrap(), Some(Value::Double(1.0)));
    assert_eq!(img.get("no-such-field").unwrap(), None);
    assert!(img.field_names().iter().any(|f| f == "yres"));
}

#[test]
fn borrow_is_exclusive_across_clones() {
    let (_lib, img) = fixture();
    let alias = img.clone();

    let guard = img.try_borrow().unwrap();
    assert_eq!(alias.state(), HandleState::ExclusivelyBorrowed);
    assert!(matches!(alias.try_borrow(), Err(BindError::AlreadyBorrowed)));

    drop(guard);
    assert_eq!(alias.state(), HandleState::Live);
    assert!(alias.try_borrow().is_ok());
}

#[test]
fn guard_keeps_the_object_alive() {
    let (lib, img) = fixture();
    let guard = img.try_borrow().unwrap();
    drop(img);
    assert_eq!(lib.stats().live_objects, 1);
    assert_eq!(guard.handle().width().unwrap(), 8);
    drop(guard);
    assert_eq!(lib.stats().live_objects, 0);
}
