//! Command-line behavior: inputs, output formats and exit codes.

use crate::common::{OutputMode, imageguard, input_under_test};

#[test]
fn test_valid_stream() -> anyhow::Result<()> {
    let output = imageguard()
        .input(input_under_test("imagestream-valid.yml"))
        .run()?;

    assert_eq!(
        output.trim(),
        "No invalid objects. Good job! (1 object checked)"
    );

    Ok(())
}

/// Without a config, no registry whitelisting happens.
#[test]
fn test_no_whitelist_admits_everything() -> anyhow::Result<()> {
    imageguard()
        .input(input_under_test("imagestream-forbidden.yml"))
        .run()?;

    Ok(())
}

#[test]
fn test_malformed_stream_json() -> anyhow::Result<()> {
    insta::assert_snapshot!(
        imageguard()
            .input(input_under_test("imagestream-malformed.yml"))
            .args(["--format", "json"])
            .expects_code(3)
            .run()?,
        @r#"
    [
      {
        "path": "@@TEST_PREFIX@@/imagestream-malformed.yml",
        "kind": "ImageStream",
        "name": "Ruby",
        "errors": [
          {
            "type": "FieldValueInvalid",
            "field": "metadata.name",
            "badValue": "Ruby",
            "detail": "must match \"[a-z0-9]+(?:(?:[._]|__|[-]*)[a-z0-9]+)*\""
          },
          {
            "type": "FieldValueInvalid",
            "field": "spec.tags[broken].from.name",
            "badValue": "quay.io/Sclorg/ruby:latest",
            "detail": "invalid reference format: repository name must be lowercase"
          },
          {
            "type": "FieldValueInvalid",
            "field": "spec.tags[scheduled].importPolicy.scheduled",
            "badValue": true,
            "detail": "only tags pointing to Docker repositories may be scheduled for background import"
          }
        ]
      }
    ]
    "#
    );

    Ok(())
}

#[test]
fn test_malformed_stream_plain() -> anyhow::Result<()> {
    let output = imageguard()
        .input(input_under_test("imagestream-malformed.yml"))
        .expects_code(3)
        .run()?;

    assert!(output.contains(r#"ImageStream "Ruby" is invalid"#));
    assert!(output.contains("@@TEST_PREFIX@@/imagestream-malformed.yml"));
    assert!(output.contains(
        r#"spec.tags[broken].from.name: Invalid value: "quay.io/Sclorg/ruby:latest": invalid reference format: repository name must be lowercase"#
    ));
    assert!(output.contains("1 of 1 object invalid, 3 errors"));

    Ok(())
}

#[test]
fn test_no_exit_codes() -> anyhow::Result<()> {
    imageguard()
        .input(input_under_test("imagestream-malformed.yml"))
        .args(["--no-exit-codes"])
        .run()?;

    Ok(())
}

/// Directories are walked; unrelated manifests are skipped.
#[test]
fn test_directory_input() -> anyhow::Result<()> {
    let output = imageguard()
        .input(input_under_test("objects"))
        .output(OutputMode::Both)
        .run()?;

    assert!(output.contains("skipping @@TEST_PREFIX@@/objects/deployment.yml"));
    assert!(output.contains("No invalid objects. Good job! (2 objects checked)"));

    Ok(())
}

/// Files named directly must hold an image resource.
#[test]
fn test_unrelated_file_input() -> anyhow::Result<()> {
    let output = imageguard()
        .input(input_under_test("deployment.yml"))
        .output(OutputMode::Stderr)
        .expects_code(1)
        .run()?;

    assert!(output.contains("fatal: no validation was performed"));
    assert!(output.contains("couldn't load @@TEST_PREFIX@@/deployment.yml as an image resource"));

    Ok(())
}

#[test]
fn test_missing_input() -> anyhow::Result<()> {
    let output = imageguard()
        .input("does-not-exist.yml")
        .output(OutputMode::Stderr)
        .expects_code(1)
        .run()?;

    assert!(output.contains("invalid input: does-not-exist.yml"));

    Ok(())
}

#[test]
fn test_import_hosts() -> anyhow::Result<()> {
    insta::assert_snapshot!(
        imageguard()
            .offline(false)
            .config(input_under_test("config-scenarios/blocked-cidrs.yml"))
            .input(input_under_test("import-blocked.yml"))
            .args(["--format", "json"])
            .expects_code(3)
            .run()?,
        @r#"
    [
      {
        "path": "@@TEST_PREFIX@@/import-blocked.yml",
        "kind": "ImageStreamImport",
        "name": "ruby",
        "errors": [
          {
            "type": "FieldValueForbidden",
            "field": "spec.images[0].from.name",
            "badValue": "",
            "detail": "loopback import not allowed"
          },
          {
            "type": "FieldValueForbidden",
            "field": "spec.images[1].from.name",
            "badValue": "",
            "detail": "link-local import not allowed"
          },
          {
            "type": "FieldValueForbidden",
            "field": "spec.repository.from.name",
            "badValue": "",
            "detail": "import from 10.0.0.0/8 not allowed"
          }
        ]
      }
    ]
    "#
    );

    Ok(())
}

/// Offline, import hosts aren't checked at all.
#[test]
fn test_import_hosts_offline() -> anyhow::Result<()> {
    imageguard()
        .config(input_under_test("config-scenarios/blocked-cidrs.yml"))
        .input(input_under_test("import-blocked.yml"))
        .run()?;

    Ok(())
}

#[test]
fn test_ping_conflicts_with_offline() -> anyhow::Result<()> {
    let output = imageguard()
        .input(input_under_test("import-blocked.yml"))
        .args(["--ping"])
        .output(OutputMode::Stderr)
        .expects_code(2)
        .run()?;

    assert!(output.contains("cannot be used with"));

    Ok(())
}

#[test]
fn test_completions() -> anyhow::Result<()> {
    let output = imageguard()
        .offline(false)
        .no_config(false)
        .args(["--completions", "bash"])
        .run()?;

    assert!(output.contains("_imageguard()"));

    Ok(())
}
