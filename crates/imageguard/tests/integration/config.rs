//! Configuration loading and discovery tests.

use crate::common::{OutputMode, imageguard, input_under_test};

#[test]
fn test_whitelist_from_config() -> anyhow::Result<()> {
    insta::assert_snapshot!(
        imageguard()
            .config(input_under_test("config-scenarios/whitelist.yml"))
            .input(input_under_test("imagestream-forbidden.yml"))
            .args(["--format", "json"])
            .expects_code(3)
            .run()?,
        @r#"
    [
      {
        "path": "@@TEST_PREFIX@@/imagestream-forbidden.yml",
        "kind": "ImageStream",
        "name": "ruby",
        "errors": [
          {
            "type": "FieldValueForbidden",
            "field": "spec.dockerImageRepository",
            "badValue": "",
            "detail": "registry \"docker.io\" not allowed by whitelist: \"quay.io:443\""
          },
          {
            "type": "FieldValueForbidden",
            "field": "spec.tags[upstream].from.name",
            "badValue": "",
            "detail": "registry \"example.com\" not allowed by whitelist: \"quay.io:443\""
          }
        ]
      }
    ]
    "#
    );

    Ok(())
}

/// Imports are held to the same whitelist as image streams.
#[test]
fn test_import_whitelist_from_config() -> anyhow::Result<()> {
    insta::assert_snapshot!(
        imageguard()
            .config(input_under_test("config-scenarios/whitelist.yml"))
            .input(input_under_test("import-whitelist.yml"))
            .args(["--format", "json"])
            .expects_code(3)
            .run()?,
        @r#"
    [
      {
        "path": "@@TEST_PREFIX@@/import-whitelist.yml",
        "kind": "ImageStreamImport",
        "name": "ruby",
        "errors": [
          {
            "type": "FieldValueForbidden",
            "field": "spec.images[1].from.name",
            "badValue": "",
            "detail": "registry \"evil.example.com:443\" not allowed by whitelist: \"quay.io:443\""
          }
        ]
      }
    ]
    "#
    );

    Ok(())
}

#[test]
fn test_config_from_env() -> anyhow::Result<()> {
    let output = imageguard()
        .no_config(false)
        .setenv(
            "IMAGEGUARD_CONFIG",
            &input_under_test("config-scenarios/whitelist.yml"),
        )
        .input(input_under_test("imagestream-forbidden.yml"))
        .expects_code(3)
        .run()?;

    assert!(output.contains("1 of 1 object invalid, 2 errors"));

    Ok(())
}

#[test]
fn test_invalid_config() -> anyhow::Result<()> {
    let output = imageguard()
        .config(input_under_test("config-scenarios/invalid.yml"))
        .input(input_under_test("imagestream-valid.yml"))
        .output(OutputMode::Stderr)
        .expects_code(1)
        .run()?;

    assert!(output.contains("failed to load config"));
    assert!(output.contains("invalid configuration syntax"));

    Ok(())
}

/// A config in the working directory is discovered.
#[test]
fn test_discovers_config() -> anyhow::Result<()> {
    let output = imageguard()
        .no_config(false)
        .working_dir(input_under_test("config-scenarios/discovered"))
        .input(input_under_test("imagestream-valid.yml"))
        .expects_code(3)
        .run()?;

    assert!(output.contains(
        r#"spec.tags[3.3].from.name: Forbidden: registry "quay.io" not allowed by empty whitelist"#
    ));

    Ok(())
}

/// `--no-config` ignores discoverable configs.
#[test]
fn test_ignores_discoverable_config() -> anyhow::Result<()> {
    imageguard()
        .no_config(true)
        .working_dir(input_under_test("config-scenarios/discovered"))
        .input(input_under_test("imagestream-valid.yml"))
        .run()?;

    Ok(())
}
