use super::*;

use crate::handle::context::HandleContext;
use crate::native::inprocess::InProcessLibrary;
use crate::native::{NativeArgs, NativeLibrary};
use crate::types::registry::TypeRegistryBuilder;

struct Fixture {
    store: DescriptorStore,
    ctx: Arc<HandleContext>,
    img: ImageHandle,
}

impl Fixture {
    fn prepare(
        &self,
        name: &str,
        positional: &[Value],
        optional: &BTreeMap<String, Value>,
        in_place: Option<&ImageHandle>,
    ) -> BindResult<PreparedCall> {
        prepare(&self.store, &self.ctx, name, positional, optional, in_place)
    }
}

fn fixture() -> Fixture {
    let lib = InProcessLibrary::shared();
    let mut types = TypeRegistryBuilder::new();
    lib.register_types(&mut types);
    let registry = types.build();
    let store = DescriptorStore::load(&lib.introspect().unwrap(), &registry).unwrap();

    let mut args = NativeArgs::new();
    args.push("width", NativeValue::Int(8));
    args.push("height", NativeValue::Int(8));
    let mut out = lib.call("black", &args).unwrap();
    let Some(NativeValue::Object(id)) = out.remove("out") else {
        panic!("black did not produce an object");
    };
    let ctx = Arc::new(HandleContext::new(lib, registry));
    Fixture {
        store,
        img: ImageHandle::adopt(ctx.clone(), id),
        ctx,
    }
}

fn no_opts() -> BTreeMap<String, Value> {
    BTreeMap::new()
}

fn names(call: &PreparedCall) -> Vec<&str> {
    call.args.iter().map(|(n, _)| n).collect()
}

fn fails(result: BindResult<PreparedCall>) -> BindError {
    match result {
        Ok(call) => panic!("call to '{}' was accepted", call.op.name()),
        Err(e) => e,
    }
}

#[test]
fn unknown_operation_is_reported_first() {
    let f = fixture();
    let err = fails(f.prepare("unknown_op", &[], &no_opts(), None));
    assert!(matches!(err, BindError::UnknownOperation(ref n) if n == "unknown_op"));
}

#[test]
fn positional_count_must_match_required_inputs() {
    let f = fixture();
    let err = fails(f.prepare("black", &[Value::Int(1)], &no_opts(), None));
    assert!(matches!(
        err,
        BindError::ArityMismatch {
            expected: 2,
            got: 1,
            ..
        }
    ));
}

#[test]
fn optional_keys_must_be_declared_optional_inputs() {
    let f = fixture();
    let positional = [Value::Int(4), Value::Int(4)];
    for key in ["depth", "width", "out"] {
        let opts = BTreeMap::from([(key.to_string(), Value::Int(1))]);
        let err = fails(f.prepare("black", &positional, &opts, None));
        assert!(
            matches!(err, BindError::UnknownParameter { ref parameter, .. } if parameter == key),
            "{key}: {err}"
        );
    }
}

#[test]
fn declared_defaults_are_sent_and_missing_ones_omitted() {
    let f = fixture();
    let call = f.prepare("black", &[Value::Int(4), Value::Int(2)], &no_opts(), None).unwrap();
    assert_eq!(names(&call), ["width", "height", "bands"]);
    assert_eq!(call.args.get("bands"), Some(&NativeValue::Int(1)));

    let positional = [
        Value::from(&f.img),
        Value::Int(0),
        Value::Int(0),
        Value::Int(16),
        Value::Int(16),
    ];
    let call = f.prepare("embed", &positional, &no_opts(), None).unwrap();
    assert_eq!(call.args.get("extend"), Some(&NativeValue::Enum(0)));
    assert!(!call.args.contains("background"));
}

#[test]
fn booleans_without_a_declared_default_are_sent_as_false() {
    let f = fixture();
    let positional = [Value::from(&f.img), Value::Int(1), Value::Int(1)];
    let call = f.prepare("getpoint", &positional, &no_opts(), None).unwrap();
    assert_eq!(call.args.get("unpack_complex"), Some(&NativeValue::Bool(false)));
}

#[test]
fn unregistered_types_are_omitted_unless_supplied() {
    let f = fixture();
    let positional = [Value::from(&f.img), Value::from(vec![1.0, 0.0, 0.0, 1.0])];
    let call = f.prepare("affine", &positional, &no_opts(), None).unwrap();
    assert_eq!(names(&call), ["in", "matrix"]);

    let opts = BTreeMap::from([("interpolate".to_string(), Value::from("bilinear"))]);
    let err = fails(f.prepare("affine", &positional, &opts, None));
    assert!(matches!(err, BindError::NotImplemented { ref tag, .. } if tag == "VipsInterpolate"));
}

#[test]
fn first_cast_failure_stops_the_call() {
    let f = fixture();
    let opts = BTreeMap::from([("bands".to_string(), Value::Int(9))]);
    let err = fails(f.prepare("black", &[Value::Int(4), Value::Int(4)], &opts, None));
    assert!(matches!(err, BindError::Cast { ref parameter, .. } if parameter == "bands"));

    let err = fails(f.prepare("black", &[Value::from("wide"), Value::Int(4)], &opts, None));
    assert!(matches!(err, BindError::Cast { ref parameter, .. } if parameter == "width"));
}

#[test]
fn in_place_operations_bind_the_target_to_the_modified_parameter() {
    let f = fixture();
    let positional = [
        Value::from(vec![255.0]),
        Value::Int(0),
        Value::Int(0),
        Value::Int(1),
        Value::Int(1),
    ];
    let err = fails(f.prepare("draw_rect", &positional, &no_opts(), None));
    assert!(matches!(err, BindError::RequiresTransaction(_)));

    let call = f.prepare("draw_rect", &positional, &no_opts(), Some(&f.img)).unwrap();
    assert_eq!(
        names(&call),
        ["image", "ink", "left", "top", "width", "height", "fill"]
    );
    assert_eq!(call.args.get("image"), Some(&NativeValue::Image(f.img.clone())));

    let err = fails(f.prepare("invert", &[Value::from(&f.img)], &no_opts(), Some(&f.img)));
    assert!(matches!(err, BindError::Validation(_)));
}

#[test]
fn images_from_another_library_are_cast_errors() {
    let f = fixture();
    let other = fixture();

    let err = fails(f.prepare("invert", &[Value::from(&other.img)], &no_opts(), None));
    assert!(matches!(
        err,
        BindError::Cast { ref parameter, ref reason, .. }
            if parameter == "in" && reason.contains("different library")
    ));

    let mixed = Value::ImageArray(vec![f.img.clone(), other.img.clone()]);
    let err = fails(f.prepare("arrayjoin", &[mixed], &no_opts(), None));
    assert!(matches!(err, BindError::Cast { ref parameter, .. } if parameter == "in"));

    let own = Value::ImageArray(vec![f.img.clone(), f.img.clone()]);
    assert!(f.prepare("arrayjoin", &[own], &no_opts(), None).is_ok());
}
