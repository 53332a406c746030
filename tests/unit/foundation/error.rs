use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        BindError::native("boom")
            .to_string()
            .starts_with("native error:")
    );
    assert!(
        BindError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        BindError::introspection("x")
            .to_string()
            .contains("introspection error:")
    );
    assert!(
        BindError::cast("scale", "double", "found string")
            .to_string()
            .contains("parameter 'scale' expects double")
    );
}

#[test]
fn caller_errors_are_classified() {
    assert!(BindError::UnknownOperation("nope".to_string()).is_caller_error());
    assert!(
        BindError::ArityMismatch {
            operation: "resize".to_string(),
            expected: 1,
            got: 0,
        }
        .is_caller_error()
    );
    assert!(!BindError::native("x").is_caller_error());
    assert!(!BindError::AlreadyBorrowed.is_caller_error());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = BindError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
