//! Validating updates against a previous object.

use crate::common::{OutputMode, imageguard, input_under_test};

/// References already stored in the previous stream stay valid.
#[test]
fn test_update_keeps_stored_references() -> anyhow::Result<()> {
    imageguard()
        .config(input_under_test("config-scenarios/whitelist.yml"))
        .previous(input_under_test("imagestream-previous.yml"))
        .input(input_under_test("imagestream-updated-kept.yml"))
        .run()?;

    Ok(())
}

/// The same stream fails validation as a new object.
#[test]
fn test_create_rejects_stored_references() -> anyhow::Result<()> {
    let output = imageguard()
        .config(input_under_test("config-scenarios/whitelist.yml"))
        .input(input_under_test("imagestream-updated-kept.yml"))
        .expects_code(3)
        .run()?;

    assert!(output.contains("1 of 1 object invalid, 2 errors"));

    Ok(())
}

/// Newly introduced references are still checked.
#[test]
fn test_update_rejects_new_references() -> anyhow::Result<()> {
    let output = imageguard()
        .config(input_under_test("config-scenarios/whitelist.yml"))
        .previous(input_under_test("imagestream-previous.yml"))
        .input(input_under_test("imagestream-updated-new.yml"))
        .expects_code(3)
        .run()?;

    assert!(output.contains(
        r#"spec.tags[new].from.name: Forbidden: registry "example.org" not allowed by whitelist: "quay.io:443""#
    ));
    assert!(output.contains("1 of 1 object invalid, 1 error"));

    Ok(())
}

#[test]
fn test_status_update() -> anyhow::Result<()> {
    let output = imageguard()
        .config(input_under_test("config-scenarios/whitelist.yml"))
        .previous(input_under_test("imagestream-previous.yml"))
        .input(input_under_test("imagestream-status-new.yml"))
        .args(["--status"])
        .expects_code(3)
        .run()?;

    assert!(output.contains(
        r#"status.tags[fail].items[0].dockerImageReference: Forbidden: registry "example.org" not allowed by whitelist: "quay.io:443""#
    ));
    assert!(output.contains("1 of 1 object invalid, 1 error"));

    Ok(())
}

#[test]
fn test_update_kind_mismatch() -> anyhow::Result<()> {
    let output = imageguard()
        .previous(input_under_test("imagestream-previous.yml"))
        .input(input_under_test("imagestreamtag.yml"))
        .output(OutputMode::Stderr)
        .expects_code(1)
        .run()?;

    assert!(output.contains("--previous must hold an object of the same kind"));

    Ok(())
}

#[test]
fn test_update_needs_single_input() -> anyhow::Result<()> {
    let output = imageguard()
        .previous(input_under_test("imagestream-previous.yml"))
        .input(input_under_test("objects"))
        .output(OutputMode::Stderr)
        .expects_code(1)
        .run()?;

    assert!(output.contains("--previous needs exactly one input, got 2"));

    Ok(())
}
