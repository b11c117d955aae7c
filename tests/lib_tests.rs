use css_fingerprint::*;

#[test]
fn test_version_info() {
    assert!(!VERSION.is_empty());
    assert_eq!(NAME, "css_fingerprint");
    assert!(!DESCRIPTION.is_empty());
}

#[test]
fn test_basic_builder_creation() {
    let _builder = CollatorBuilder::new();
}
