use super::*;

use crate::types::variant::ScalarKind;

fn p(name: &str, variant: TypeVariant, direction: Direction, required: bool) -> ParamDescriptor {
    ParamDescriptor {
        name: name.to_string(),
        tag: TypeTag::new("test"),
        variant,
        required,
        direction,
        default: None,
        bounds: None,
        description: String::new(),
    }
}

fn names<'a>(params: impl Iterator<Item = &'a ParamDescriptor>) -> Vec<&'a str> {
    params.map(|p| p.name.as_str()).collect()
}

fn double() -> TypeVariant {
    TypeVariant::Scalar(ScalarKind::Double)
}

fn resize() -> OperationDescriptor {
    let mut scale = p("scale", double(), Direction::Input, false);
    scale.default = Some(Value::Double(1.0));
    OperationDescriptor::new(
        "resize",
        "resize an image",
        vec![
            p("in", TypeVariant::Image, Direction::Input, true),
            p("out", TypeVariant::Image, Direction::Output, true),
            scale,
            p("vscale", double(), Direction::Input, false),
        ],
    )
    .unwrap()
}

#[test]
fn parameters_are_partitioned_in_feed_order() {
    let op = resize();
    assert_eq!(names(op.required_inputs()), ["in"]);
    assert_eq!(names(op.optional_inputs()), ["scale", "vscale"]);
    assert_eq!(names(op.required_outputs()), ["out"]);
    assert_eq!(op.positional_arity(), 1);
    assert_eq!(op.return_arity(), 1);
    assert!(!op.is_in_place());
    assert_eq!(names(op.params().iter()), ["in", "out", "scale", "vscale"]);
}

#[test]
fn signature_lists_positional_then_keyword_inputs() {
    assert_eq!(
        resize().signature(),
        "resize(in: Image, *, scale: f64 = 1, vscale: f64) -> (out: Image)"
    );
}

#[test]
fn signature_marks_modified_image_and_extras() {
    let op = OperationDescriptor::new(
        "draw_point",
        "",
        vec![
            p("image", TypeVariant::Image, Direction::Modify, true),
            p("ink", TypeVariant::DoubleArray, Direction::Input, true),
            p("hit", TypeVariant::Scalar(ScalarKind::Bool), Direction::Output, false),
        ],
    )
    .unwrap();
    assert!(op.is_in_place());
    assert_eq!(op.positional_arity(), 1);
    assert_eq!(op.modified_param().map(|p| p.name.as_str()), Some("image"));
    assert_eq!(
        op.signature(),
        "draw_point(&mut image: Image, ink: [f64]) -> () + {hit: bool}"
    );
}

#[test]
fn duplicate_parameter_names_are_rejected() {
    let err = OperationDescriptor::new(
        "copy",
        "",
        vec![
            p("in", TypeVariant::Image, Direction::Input, true),
            p("in", TypeVariant::Image, Direction::Output, true),
        ],
    )
    .unwrap_err();
    assert!(matches!(err, BindError::Introspection(_)));
}

#[test]
fn modified_parameter_must_be_a_single_required_image() {
    let not_image = OperationDescriptor::new(
        "bad",
        "",
        vec![p("n", double(), Direction::Modify, true)],
    );
    assert!(matches!(not_image, Err(BindError::Introspection(_))));

    let twice = OperationDescriptor::new(
        "bad",
        "",
        vec![
            p("a", TypeVariant::Image, Direction::Modify, true),
            p("b", TypeVariant::Image, Direction::Modify, true),
        ],
    );
    assert!(matches!(twice, Err(BindError::Introspection(_))));
}

#[test]
fn empty_operation_name_is_rejected() {
    assert!(OperationDescriptor::new(" ", "", Vec::new()).is_err());
}

#[test]
fn bounds_are_inclusive() {
    let b = Bounds { min: 0.0, max: 9.0 };
    assert!(b.contains(0.0));
    assert!(b.contains(9.0));
    assert!(!b.contains(9.5));
}
