use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        LaminateError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        LaminateError::backend("x")
            .to_string()
            .contains("backend error:")
    );
    assert!(
        LaminateError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = LaminateError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
