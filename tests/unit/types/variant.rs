use super::*;

use crate::foundation::value::{Blob, ObjectId, Source, Target};
use crate::introspect::descriptor::Bounds;
use crate::native::inprocess::InProcessLibrary;
use crate::native::{NativeArgs, NativeLibrary};
use crate::types::registry::TypeRegistryBuilder;

fn context() -> (Arc<InProcessLibrary>, Arc<HandleContext>) {
    let lib = InProcessLibrary::shared();
    let mut types = TypeRegistryBuilder::new();
    lib.register_types(&mut types);
    let ctx = Arc::new(HandleContext::new(lib.clone(), types.build()));
    (lib, ctx)
}

fn black_object(lib: &InProcessLibrary) -> ObjectId {
    let mut args = NativeArgs::new();
    args.push("width", NativeValue::Int(4));
    args.push("height", NativeValue::Int(3));
    let mut out = lib.call("black", &args).unwrap();
    match out.remove("out") {
        Some(NativeValue::Object(id)) => id,
        other => panic!("black produced {other:?}"),
    }
}

fn black(lib: &InProcessLibrary, ctx: &Arc<HandleContext>) -> ImageHandle {
    ImageHandle::adopt(ctx.clone(), black_object(lib))
}

fn param(name: &str, variant: &TypeVariant) -> ParamDescriptor {
    ParamDescriptor::field(name, TypeTag::new("test"), variant.clone())
}

fn kernel() -> TypeVariant {
    TypeVariant::Enum(Arc::new(EnumSpec::new(
        "VipsKernel",
        [("nearest", 0), ("linear", 1), ("lanczos3", 5)],
    )))
}

#[test]
fn cast_then_read_back_returns_the_host_value() {
    let (lib, ctx) = context();
    let img = black(&lib, &ctx);
    let target = Target::new();

    let cases = vec![
        (TypeVariant::Image, Value::Image(img.clone()), Value::Image(img.clone())),
        (
            TypeVariant::ImageArray,
            Value::Image(img.clone()),
            Value::ImageArray(vec![img.clone()]),
        ),
        (kernel(), Value::from("LANCZOS3"), Value::from("lanczos3")),
        (kernel(), Value::Int(1), Value::from("linear")),
        (
            TypeVariant::DoubleArray,
            Value::IntArray(vec![1, 2]),
            Value::DoubleArray(vec![1.0, 2.0]),
        ),
        (
            TypeVariant::IntArray,
            Value::DoubleArray(vec![3.0, -4.0]),
            Value::IntArray(vec![3, -4]),
        ),
        (
            TypeVariant::Source,
            Value::Source(Source::from_bytes(b"png".to_vec())),
            Value::Source(Source::from_bytes(b"png".to_vec())),
        ),
        (
            TypeVariant::Target,
            Value::Target(target.clone()),
            Value::Target(target.clone()),
        ),
        (
            TypeVariant::Blob,
            Value::Blob(Blob::new(vec![1, 2, 3])),
            Value::Blob(Blob::new(vec![1, 2, 3])),
        ),
        (TypeVariant::Scalar(ScalarKind::Bool), Value::Bool(true), Value::Bool(true)),
        (TypeVariant::Scalar(ScalarKind::Int), Value::Int(-7), Value::Int(-7)),
        (TypeVariant::Scalar(ScalarKind::Double), Value::Int(2), Value::Double(2.0)),
        (TypeVariant::Scalar(ScalarKind::Str), Value::from("x"), Value::from("x")),
    ];

    for (variant, raw, expected) in cases {
        let p = param("p", &variant);
        let native = variant.cast(&raw, &p).unwrap();
        let back = variant.read_back("p", native, &ctx).unwrap();
        assert_eq!(back, expected, "variant {}", variant.name());
    }
}

#[test]
fn typespec_renders_static_types() {
    assert_eq!(TypeVariant::Image.typespec().to_string(), "Image");
    assert_eq!(TypeVariant::ImageArray.typespec().to_string(), "[Image]");
    assert_eq!(kernel().typespec().to_string(), "VipsKernel");
    assert_eq!(
        TypeVariant::NotImplemented(TypeTag::new("VipsInterpolate"))
            .typespec()
            .to_string(),
        "!VipsInterpolate"
    );
}

#[test]
fn cast_rejects_wrong_kind_and_names_the_parameter() {
    let variant = TypeVariant::Image;
    let err = variant.cast(&Value::Int(3), &param("in", &variant)).unwrap_err();
    match err {
        BindError::Cast {
            parameter,
            variant,
            reason,
        } => {
            assert_eq!(parameter, "in");
            assert_eq!(variant, "image");
            assert!(reason.contains("int"), "{reason}");
        }
        other => panic!("expected cast error, got {other:?}"),
    }
}

#[test]
fn enum_cast_lists_members_for_unknown_nick() {
    let variant = kernel();
    let err = variant
        .cast(&Value::from("bicubic"), &param("kernel", &variant))
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("nearest, linear, lanczos3"), "{msg}");

    let err = variant.cast(&Value::Int(9), &param("kernel", &variant)).unwrap_err();
    assert!(matches!(err, BindError::Cast { .. }));
}

#[test]
fn enum_nicks_ignore_case_and_separator_style() {
    let spec = EnumSpec::new("VipsExtend", [("copy-edge", 1)]);
    assert_eq!(spec.value_of("COPY_EDGE"), Some(1));
    assert_eq!(spec.nick_of(1), Some("copy-edge"));
    assert_eq!(spec.value_of("copy"), None);
}

#[test]
fn numeric_casts_check_range_and_bounds() {
    let int = TypeVariant::Scalar(ScalarKind::Int);
    assert!(int.cast(&Value::Int(i64::from(i32::MAX) + 1), &param("n", &int)).is_err());

    let double = TypeVariant::Scalar(ScalarKind::Double);
    let mut bounded = param("scale", &double);
    bounded.bounds = Some(Bounds { min: 0.0, max: 2.0 });
    assert!(double.cast(&Value::Double(1.5), &bounded).is_ok());
    let err = double.cast(&Value::Double(2.5), &bounded).unwrap_err();
    assert!(err.to_string().contains("outside [0, 2]"), "{err}");

    let ints = TypeVariant::IntArray;
    assert!(ints.cast(&Value::DoubleArray(vec![1.5]), &param("v", &ints)).is_err());
}

#[test]
fn double_arrays_cast_to_ints_across_the_full_i32_range() {
    let ints = TypeVariant::IntArray;
    let p = param("v", &ints);
    let min = f64::from(i32::MIN);
    let max = f64::from(i32::MAX);

    assert_eq!(
        ints.cast(&Value::DoubleArray(vec![min, -1.0, max]), &p).unwrap(),
        NativeValue::IntArray(vec![i32::MIN, -1, i32::MAX])
    );
    for x in [min - 1.0, max + 1.0, f64::NAN, f64::NEG_INFINITY] {
        let err = ints.cast(&Value::DoubleArray(vec![0.0, x]), &p).unwrap_err();
        assert!(err.to_string().contains("element 1"), "{x}: {err}");
    }
}

#[test]
fn empty_image_array_is_rejected() {
    let variant = TypeVariant::ImageArray;
    let err = variant
        .cast(&Value::ImageArray(Vec::new()), &param("in", &variant))
        .unwrap_err();
    assert!(matches!(err, BindError::Cast { .. }));
}

#[test]
fn declared_default_wins_and_is_checked() {
    let variant = kernel();
    let mut p = param("kernel", &variant);
    p.default = Some(Value::from("nearest"));
    let ctx = DefaultContext {
        operation: "resize",
        param: &p,
    };
    assert_eq!(variant.default(ctx).unwrap(), Value::from("nearest"));

    p.default = Some(Value::from("sinc"));
    let ctx = DefaultContext {
        operation: "resize",
        param: &p,
    };
    assert!(matches!(variant.default(ctx), Err(BindError::Introspection(_))));
}

#[test]
fn only_booleans_have_an_implicit_default() {
    let flag = TypeVariant::Scalar(ScalarKind::Bool);
    let p = param("fill", &flag);
    let ctx = DefaultContext {
        operation: "draw_rect",
        param: &p,
    };
    assert_eq!(flag.default(ctx).unwrap(), Value::Bool(false));

    for variant in [
        TypeVariant::Image,
        TypeVariant::Source,
        TypeVariant::Target,
        TypeVariant::DoubleArray,
        kernel(),
        TypeVariant::Scalar(ScalarKind::Double),
    ] {
        let p = param("p", &variant);
        let ctx = DefaultContext {
            operation: "op",
            param: &p,
        };
        assert!(
            matches!(variant.default(ctx), Err(BindError::UnsupportedDefault { .. })),
            "variant {}",
            variant.name()
        );
    }
}

#[test]
fn not_implemented_fails_cast_and_default() {
    let variant = TypeVariant::NotImplemented(TypeTag::new("VipsInterpolate"));
    let p = param("interpolate", &variant);

    let err = variant.cast(&Value::from("bilinear"), &p).unwrap_err();
    assert!(matches!(
        err,
        BindError::NotImplemented { ref tag, ref parameter }
            if tag == "VipsInterpolate" && parameter == "interpolate"
    ));

    let ctx = DefaultContext {
        operation: "affine",
        param: &p,
    };
    assert!(matches!(variant.default(ctx), Err(BindError::NotImplemented { .. })));
}

#[test]
fn mistyped_native_output_is_released() {
    let (lib, ctx) = context();
    let id = black_object(&lib);

    let err = TypeVariant::Scalar(ScalarKind::Double)
        .read_back("out", NativeValue::Object(id), &ctx)
        .unwrap_err();
    assert!(matches!(err, BindError::Native { .. }));
    assert_eq!(lib.stats().live_objects, 0);
}
