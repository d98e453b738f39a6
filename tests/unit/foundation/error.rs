use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        OperationError::invalid_parameters("x")
            .to_string()
            .contains("invalid parameters:")
    );
    assert!(
        OperationError::source_unreadable("x")
            .to_string()
            .contains("source unreadable:")
    );
    assert!(
        OperationError::transform_invalid("x")
            .to_string()
            .contains("transform invalid:")
    );
    assert!(
        OperationError::encode_failed("x")
            .to_string()
            .contains("encode failed:")
    );
    assert_eq!(OperationError::Cancelled.to_string(), "cancelled");
}

#[test]
fn unsupported_kind_names_operation_and_kind() {
    let err = OperationError::unsupported_kind("crop", "audio");
    let msg = err.to_string();
    assert!(msg.contains("'crop'"));
    assert!(msg.contains("audio"));
    assert!(!err.is_cancelled());
    assert!(OperationError::Cancelled.is_cancelled());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = OperationError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
