use linkgate::errors::LinkgateError;
use std::error::Error;

#[test]
fn test_codes_are_stable() {
    let cases = [
        (LinkgateError::not_found("x"), "E001"),
        (LinkgateError::conflict("x"), "E002"),
        (LinkgateError::validation("x"), "E003"),
        (LinkgateError::exhausted("x"), "E004"),
        (LinkgateError::storage("x"), "E005"),
        (LinkgateError::config("x"), "E006"),
    ];
    for (err, code) in cases {
        assert_eq!(err.code(), code);
    }
}

#[test]
fn test_display_includes_type_and_message() {
    let err = LinkgateError::exhausted("no free code after 5 attempts");
    let text = err.to_string();
    assert!(text.contains("Code Generation Exhausted"));
    assert!(text.contains("no free code after 5 attempts"));
    assert_eq!(err.message(), "no free code after 5 attempts");
}

#[test]
fn test_predicates() {
    assert!(LinkgateError::not_found("x").is_not_found());
    assert!(!LinkgateError::storage("x").is_not_found());
    assert!(LinkgateError::conflict("x").is_conflict());
}

#[test]
fn test_is_std_error() {
    let err: Box<dyn Error + Send + Sync> = Box::new(LinkgateError::storage("disk"));
    assert!(err.source().is_none());
    assert!(err.to_string().contains("disk"));
}

#[test]
fn test_config_error_conversion() {
    let err: LinkgateError = config::ConfigError::Message("bad value".into()).into();
    assert!(matches!(err, LinkgateError::Config(_)));
    assert!(err.message().contains("bad value"));
}

#[test]
fn test_colored_format_contains_code() {
    let err = LinkgateError::config("capacity must be greater than 0");
    let colored = err.format_colored();
    assert!(colored.contains("E006"));
    assert!(colored.contains("capacity must be greater than 0"));
}
