use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        CutlineError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        CutlineError::resource_load("x")
            .to_string()
            .contains("resource load error:")
    );
    assert!(CutlineError::setup("x").to_string().contains("setup error:"));
    assert!(
        CutlineError::render("x")
            .to_string()
            .contains("render error:")
    );
    assert!(
        CutlineError::encode("x")
            .to_string()
            .contains("encode error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = CutlineError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn only_setup_and_encode_failures_abort_exports() {
    assert!(CutlineError::setup("no surface").is_fatal_for_export());
    assert!(CutlineError::encode("pipe closed").is_fatal_for_export());
    assert!(!CutlineError::resource_load("timeout").is_fatal_for_export());
    assert!(!CutlineError::render("layer").is_fatal_for_export());
}
