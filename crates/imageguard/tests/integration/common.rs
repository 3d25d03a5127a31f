use anyhow::Result;
use camino::Utf8PathBuf;
use std::{env::current_dir, sync::LazyLock};

use assert_cmd::{Command, cargo};

static TEST_PREFIX: LazyLock<Utf8PathBuf> = LazyLock::new(|| {
    let current_dir = current_dir().expect("Cannot figure out current directory");

    let file_path = current_dir
        .join("tests")
        .join("integration")
        .join("test-data");

    if !file_path.exists() {
        panic!("Cannot find test data directory: {}", file_path.display());
    }

    Utf8PathBuf::try_from(file_path).expect("Cannot create UTF-8 path from test data directory")
});

pub fn input_under_test(name: &str) -> String {
    let file_path = TEST_PREFIX.join(name);

    if !file_path.exists() {
        panic!("Cannot find input under test: {file_path}");
    }

    file_path.to_string()
}

pub enum OutputMode {
    Stdout,
    Stderr,
    Both,
}

pub struct Imageguard {
    cmd: Command,
    inputs: Vec<String>,
    config: Option<String>,
    previous: Option<String>,
    no_config: bool,
    offline: bool,
    output: OutputMode,
    expected_code: i32,
}

impl Imageguard {
    /// Create a new imageguard runner.
    pub fn new() -> Self {
        let mut cmd = Command::new(cargo::cargo_bin!());

        // Start from a clean environment, so that e.g. `IMAGEGUARD_CONFIG`
        // or `RUST_LOG` in the caller's environment don't leak in.
        cmd.env_clear();

        Self {
            cmd,
            inputs: vec![],
            config: None,
            previous: None,
            no_config: true,
            offline: true,
            output: OutputMode::Stdout,
            expected_code: 0,
        }
    }

    pub fn args<'a>(mut self, args: impl IntoIterator<Item = &'a str>) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn setenv(mut self, key: &str, value: &str) -> Self {
        self.cmd.env(key, value);
        self
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.inputs.push(input.into());
        self
    }

    /// Loads the given config; this also enables config loading.
    pub fn config(mut self, config: impl Into<String>) -> Self {
        self.config = Some(config.into());
        self.no_config = false;
        self
    }

    pub fn no_config(mut self, flag: bool) -> Self {
        self.no_config = flag;
        self
    }

    pub fn previous(mut self, previous: impl Into<String>) -> Self {
        self.previous = Some(previous.into());
        self
    }

    pub fn offline(mut self, flag: bool) -> Self {
        self.offline = flag;
        self
    }

    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    pub fn expects_code(mut self, code: i32) -> Self {
        self.expected_code = code;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.cmd.current_dir(dir.into());
        self
    }

    pub fn run(mut self) -> Result<String> {
        if self.offline {
            self.cmd.arg("--offline");
        }

        if self.no_config {
            self.cmd.arg("--no-config");
        }

        if let Some(config) = &self.config {
            self.cmd.arg("--config").arg(config);
        }

        if let Some(previous) = &self.previous {
            self.cmd.arg("--previous").arg(previous);
        }

        for input in &self.inputs {
            self.cmd.arg(input);
        }

        let output = self.cmd.output()?;

        let mut raw = String::from_utf8(match self.output {
            OutputMode::Stdout => output.stdout,
            OutputMode::Stderr => output.stderr,
            OutputMode::Both => [output.stderr, output.stdout].concat(),
        })?;

        let exit_code = output.status.code();
        if exit_code != Some(self.expected_code) {
            anyhow::bail!("imageguard exited with unexpected code {exit_code:?}: {raw}");
        }

        let test_prefix_placeholder = "@@TEST_PREFIX@@";
        raw = raw.replace(TEST_PREFIX.as_str(), test_prefix_placeholder);

        // Normalize Windows '\' file paths to using '/', to get consistent snapshot test outputs
        if cfg!(windows) {
            raw = raw.replace('\\', "/");
        }

        let version_placeholder = "@@VERSION@@";
        raw = raw.replace(env!("CARGO_PKG_VERSION"), version_placeholder);

        Ok(raw)
    }
}

pub fn imageguard() -> Imageguard {
    Imageguard::new()
}
