//! Collecting objects to validate from files and directories.

use std::fmt::{self, Display};

use anyhow::{Context as _, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use ignore::WalkBuilder;
use image_api::Object;
use owo_colors::OwoColorize;

use crate::tips;

/// A single object loaded from disk.
#[derive(Debug)]
pub(crate) struct Input {
    pub(crate) path: Utf8PathBuf,
    pub(crate) object: Object,
}

impl Input {
    /// Loads the object in `path`.
    pub(crate) fn load(path: &Utf8Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("couldn't read {path}"))?;

        let object = Object::from_yaml(&contents).with_context(|| {
            tips(
                format!("couldn't load {path} as an image resource"),
                &[
                    "inputs must contain a single Image, ImageStream, ImageStreamTag, ImageTag or ImageStreamImport",
                ],
            )
        })?;

        Ok(Self {
            path: path.into(),
            object,
        })
    }

    pub(crate) fn kind(&self) -> &'static str {
        self.object.kind()
    }

    pub(crate) fn name(&self) -> &str {
        &self.object.metadata().name
    }
}

impl Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\" ({})", self.kind(), self.name(), self.path)
    }
}

fn is_candidate(path: &Utf8Path) -> bool {
    path.is_file() && matches!(path.extension(), Some("yml" | "yaml" | "json"))
}

/// Walks `dir` for YAML and JSON files, honoring `.gitignore` files.
///
/// Files that don't hold an image resource are skipped with a warning,
/// since directories routinely contain unrelated manifests.
fn collect_from_dir(dir: &Utf8Path, inputs: &mut Vec<Input>) -> Result<()> {
    let mut walker = WalkBuilder::new(dir);
    walker
        .standard_filters(false)
        .require_git(false)
        .git_ignore(true)
        .git_exclude(true)
        .sort_by_file_name(|a, b| a.cmp(b));

    for entry in walker.build() {
        let entry = entry?;
        let path = <&Utf8Path>::try_from(entry.path())?;

        if !is_candidate(path) {
            continue;
        }

        match Input::load(path) {
            Ok(input) => inputs.push(input),
            Err(err) => tracing::warn!("skipping {path}: {err:#}"),
        }
    }

    Ok(())
}

/// Collects every input named on the command line.
///
/// Files named directly must load; a directory only needs to yield at
/// least one object between all the inputs.
pub(crate) fn collect_inputs(inputs: &[Utf8PathBuf]) -> Result<Vec<Input>> {
    let mut collected = vec![];

    for input in inputs {
        if input.is_file() {
            collected.push(Input::load(input)?);
        } else if input.is_dir() {
            collect_from_dir(input, &mut collected)?;
        } else {
            return Err(anyhow!(tips(
                format!("invalid input: {input}"),
                &[format!(
                    "pass a single {file} or a {directory}",
                    file = "file".green(),
                    directory = "directory".green(),
                )]
            )));
        }
    }

    if collected.is_empty() {
        return Err(anyhow!("no inputs collected"));
    }

    tracing::debug!("collected {} input(s)", collected.len());

    Ok(collected)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8Path;

    use super::collect_inputs;

    const STREAM: &str = "kind: ImageStream\nmetadata:\n  name: ruby\n  namespace: default\n";

    #[test]
    fn test_collect_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();

        fs::create_dir(dir.join("nested")).unwrap();
        fs::write(dir.join("b.yml"), STREAM).unwrap();
        fs::write(dir.join("nested").join("a.yaml"), STREAM).unwrap();
        // Not image resources, or not YAML at all.
        fs::write(dir.join("deployment.yml"), "kind: Deployment\n").unwrap();
        fs::write(dir.join("README.md"), "# hi").unwrap();
        // Ignored.
        fs::write(dir.join(".gitignore"), "ignored.yml\n").unwrap();
        fs::write(dir.join("ignored.yml"), STREAM).unwrap();

        let inputs = collect_inputs(&[dir.to_path_buf()]).unwrap();
        let names = inputs
            .iter()
            .map(|input| input.path.strip_prefix(dir).unwrap().as_str().to_string())
            .collect::<Vec<_>>();

        assert_eq!(names, ["b.yml", "nested/a.yaml"]);
    }

    #[test]
    fn test_explicit_file_must_load() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        fs::write(dir.join("deployment.yml"), "kind: Deployment\n").unwrap();

        assert!(collect_inputs(&[dir.join("deployment.yml")]).is_err());
        assert!(collect_inputs(&[dir.to_path_buf()]).is_err());
        assert!(collect_inputs(&[dir.join("missing.yml")]).is_err());
    }
}
